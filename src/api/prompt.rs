//! Chat prompt flattening and tool-call extraction

use serde_json::{json, Value};
use tracing::debug;

use crate::api::models::{ChatMessage, ToolCall, ToolSpec};

const TOOL_INSTRUCTION: &str = "\nWhen an action is required, respond ONLY with valid JSON in this format:\n\
{\n  \"tool\": \"<tool name>\",\n  \"arguments\": { <arguments> }\n}\n\
Do NOT include any extra text.\n";

/// Put the system overlay ahead of a prompt, separated by a line break
pub fn with_overlay(system: &str, prompt: &str) -> String {
    if system.is_empty() {
        prompt.to_string()
    } else {
        format!("{}\n{}", system, prompt)
    }
}

/// Render turns as `ROLE: content`, skipping empty ones
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| match m.content.as_deref() {
            Some(content) if !content.is_empty() => {
                Some(format!("{}: {}", m.role.to_uppercase(), content))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// List the callable tools followed by the JSON-only reply instruction
pub fn render_tool_block(tools: &[ToolSpec]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut block = String::from("AVAILABLE TOOLS:\n");
    for tool in tools {
        let parameters = tool.function.parameters.clone().unwrap_or_else(|| json!({}));
        block.push_str(&format!(
            "- name: {}\n  description: {}\n  parameters: {}\n",
            tool.function.name, tool.function.description, parameters
        ));
    }
    block.push_str(TOOL_INSTRUCTION);
    block
}

/// Build the single prompt sent to a provider for a chat call
pub fn build_chat_prompt(system: &str, messages: &[ChatMessage], tools: &[ToolSpec]) -> String {
    let tool_block = render_tool_block(tools);
    let conversation = flatten_messages(messages);

    [system, tool_block.as_str(), conversation.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Locate the first balanced `{...}` region, ignoring braces inside strings
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a `{"tool": name, "arguments": {...}}` object out of reply text.
///
/// Anything that does not parse or lacks a tool name yields `None`.
pub fn extract_tool_call(reply: &str) -> Option<ToolCall> {
    let candidate = first_balanced_object(reply)?;
    let parsed: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Reply is not a tool call");
            return None;
        }
    };

    let name = parsed.get("tool").and_then(Value::as_str).filter(|n| !n.is_empty())?;
    let arguments = match parsed.get("arguments") {
        Some(Value::Null) | None => json!({}),
        Some(arguments) => arguments.clone(),
    };

    Some(ToolCall::new(name, arguments))
}
