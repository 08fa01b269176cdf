//! Conversation history assembly.
//!
//! Example task logs are rendered as `Human:` / `Assistant:` exchanges with
//! a fenced code block. A tool block is emitted only where the tool set
//! changes from the previous example, and once more at the end if the
//! current tools differ from the last ones shown.

use std::sync::Arc;

use assistants_core::{TaskLog, ToolDescriptions};

const TOOL_SEPARATOR: &str = "=====";

/// Renders a header plus example task logs into agent history text.
#[derive(Debug, Clone)]
pub struct HistoryAssembler {
    code_language: String,
}

impl Default for HistoryAssembler {
    fn default() -> Self {
        Self::new("python")
    }
}

impl HistoryAssembler {
    pub fn new(code_language: impl Into<String>) -> Self {
        Self {
            code_language: code_language.into(),
        }
    }

    pub fn code_language(&self) -> &str {
        &self.code_language
    }

    pub fn assemble(&self, header: Option<&str>, examples: &[Arc<TaskLog>], current_tools: &ToolDescriptions) -> String {
        let mut blocks: Vec<String> = Vec::new();
        if let Some(header) = header.filter(|h| !h.is_empty()) {
            blocks.push(header.to_string());
        }

        let empty = ToolDescriptions::new();
        let mut previous_tools = &empty;
        for example in examples {
            let tools_changed = &example.tools != previous_tools;
            if tools_changed {
                previous_tools = &example.tools;
            }
            blocks.push(self.example_block(example, tools_changed));
        }

        if current_tools != previous_tools {
            blocks.push(tool_block(current_tools));
        }

        let mut history = blocks.join("\n\n");
        history.push('\n');
        history
    }

    fn example_block(&self, example: &TaskLog, with_tools: bool) -> String {
        let mut parts = Vec::with_capacity(5);
        if with_tools && !example.tools.is_empty() {
            parts.push(tool_block(&example.tools));
            parts.push(TOOL_SEPARATOR.to_string());
        }
        parts.push(format!("Human: {}", example.prompt));
        parts.push(format!("Assistant: {}", example.steps));
        parts.push(format!("```{}\n{}\n```", self.code_language, example.code));
        parts.join("\n\n")
    }
}

/// `Tools:` followed by one `- name: description` line per tool.
pub fn tool_block(tools: &ToolDescriptions) -> String {
    let mut block = String::from("Tools:");
    for (name, description) in tools {
        block.push_str(&format!("\n- {name}: {description}"));
    }
    block
}
