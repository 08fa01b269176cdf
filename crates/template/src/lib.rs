//! # Assistants Template
//!
//! Placeholder substitution used for prompts, inbound message formats and
//! tool requests. Templates are parsed once into literal and placeholder
//! segments, then rendered against a chain of resolvers: local bindings
//! first, cluster Prompts and Configs second.

pub mod resolver;
pub mod template;

pub use resolver::{ClusterResolver, Resolver, ResolverChain};
pub use template::{Conversion, Rendered, Segment, Template, plain_text};

use serde_json::{Map, Value};

/// Parse and render in one step.
pub fn substitute(template: &str, bindings: &Map<String, Value>, external: Option<&dyn Resolver>) -> Rendered {
    let mut chain = ResolverChain::new().with(bindings);
    if let Some(external) = external {
        chain = chain.with(external);
    }
    Template::parse(template).render(&chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn substitute_whole_int() {
        assert_eq!(substitute("${n|int}", &vars(json!({"n": 5})), None), Rendered::Int(5));
    }

    #[test]
    fn substitute_embedded_int() {
        assert_eq!(
            substitute("v=${n|int}", &vars(json!({"n": 5})), None),
            Rendered::Text("v=5".into())
        );
    }

    #[test]
    fn substitute_missing_is_empty() {
        assert_eq!(substitute("$missing", &Map::new(), None), Rendered::Text(String::new()));
    }

    #[test]
    fn local_bindings_shadow_external() {
        let external = vars(json!({"x": "outer", "y": "outer"}));
        let rendered = substitute("$x/$y", &vars(json!({"x": "inner"})), Some(&external));
        assert_eq!(rendered.into_string(), "inner/outer");
    }
}
