//! Placeholder templates.
//!
//! ```text
//! $name              [_a-zA-Z][_a-zA-Z0-9]*
//! ${name}            [_a-zA-Z][_/.a-zA-Z0-9-]*
//! ${name | type}     type = string | int | float | yaml | json
//! ```
//!
//! A `$` that starts no valid placeholder is kept literally.
//!
//! `int` and `float` only take effect when the placeholder is the whole
//! template; the render then yields a number. Anywhere else they behave
//! like `string`, so `"v=${n|int}"` renders as text.

use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::resolver::Resolver;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_/.a-zA-Z0-9\-]*)(?:\s*\|\s*(?P<type>float|string|int|yaml|json))?\})",
    )
    .expect("placeholder pattern is valid")
});

/// How a resolved value is turned into output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conversion {
    #[default]
    String,
    Int,
    Float,
    Yaml,
    Json,
}

impl Conversion {
    fn from_name(name: &str) -> Self {
        match name {
            "int" => Conversion::Int,
            "float" => Conversion::Float,
            "yaml" => Conversion::Yaml,
            "json" => Conversion::Json,
            _ => Conversion::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Placeholder { name: String, conversion: Conversion },
}

/// Output of a render.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Rendered {
    pub fn into_string(self) -> String {
        match self {
            Rendered::Text(text) => text,
            Rendered::Int(n) => n.to_string(),
            Rendered::Float(n) => n.to_string(),
        }
    }

    pub fn into_value(self) -> serde_json::Value {
        match self {
            Rendered::Text(text) => serde_json::Value::String(text),
            Rendered::Int(n) => n.into(),
            Rendered::Float(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendered::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rendered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rendered::Text(text) => f.write_str(text),
            Rendered::Int(n) => write!(f, "{n}"),
            Rendered::Float(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed template. Parsing never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;
        for captures in PLACEHOLDER.captures_iter(source) {
            let Some(whole) = captures.get(0) else { continue };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            let name = captures
                .name("named")
                .or_else(|| captures.name("braced"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let conversion = captures
                .name("type")
                .map(|m| Conversion::from_name(m.as_str()))
                .unwrap_or_default();
            segments.push(Segment::Placeholder { name, conversion });
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }
        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Resolve every placeholder. Unresolvable names render as `""`.
    pub fn render(&self, resolver: &dyn Resolver) -> Rendered {
        if let [Segment::Placeholder { name, conversion }] = self.segments.as_slice() {
            let text = render_value(name, *conversion, resolver);
            return match conversion {
                Conversion::Int => match text.trim().parse::<i64>() {
                    Ok(n) => Rendered::Int(n),
                    Err(_) => {
                        warn!(placeholder = %name, value = %text, "Value is not an int");
                        Rendered::Text(text)
                    }
                },
                Conversion::Float => match text.trim().parse::<f64>() {
                    Ok(n) => Rendered::Float(n),
                    Err(_) => {
                        warn!(placeholder = %name, value = %text, "Value is not a float");
                        Rendered::Text(text)
                    }
                },
                _ => Rendered::Text(text),
            };
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, conversion } => {
                    out.push_str(&render_value(name, *conversion, resolver))
                }
            }
        }
        Rendered::Text(out)
    }

    /// Render and flatten to text.
    pub fn render_string(&self, resolver: &dyn Resolver) -> String {
        self.render(resolver).into_string()
    }
}

fn render_value(name: &str, conversion: Conversion, resolver: &dyn Resolver) -> String {
    let Some(value) = resolver.resolve(name).filter(|v| !v.is_null()) else {
        warn!(placeholder = %name, "Unresolved template variable");
        return String::new();
    };
    match conversion {
        Conversion::Yaml => serde_yaml::to_string(&value).unwrap_or_else(|e| {
            warn!(placeholder = %name, error = %e, "Failed to render yaml");
            String::new()
        }),
        Conversion::Json => value.to_string(),
        Conversion::String | Conversion::Int | Conversion::Float => plain_text(value),
    }
}

/// Strings verbatim, anything else as compact JSON.
pub fn plain_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}
