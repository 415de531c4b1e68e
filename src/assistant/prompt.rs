//! Prompt assembly for both front ends.

use crate::pdf::truncate_chars;
use crate::tool_protocol::ToolMetadata;

pub const EXPERT_PREAMBLE: &str = "You are an expert piping engineer.";
pub const CONTEXT_SEPARATOR: &str = "--------------------------------";
pub const ANSWER_STYLE: &str =
    "Answer technically, citing sections of the document where possible.";

/// Build the single-shot prompt for document chat.
///
/// Layout, in order: expert instructions, project, document context (cut to
/// `char_limit` characters), separator, the literal question, answer style.
pub fn build_document_prompt(
    project: &str,
    document_text: Option<&str>,
    question: &str,
    char_limit: usize,
) -> String {
    let context = document_text
        .map(|text| truncate_chars(text, char_limit))
        .unwrap_or("");

    format!(
        "{preamble}\nPROJECT CONTEXT: {project}\nUPLOADED DOCUMENTATION:\n{context}\n{sep}\nUSER QUESTION: {question}\n{style}",
        preamble = EXPERT_PREAMBLE,
        project = project,
        context = context,
        sep = CONTEXT_SEPARATOR,
        question = question,
        style = ANSWER_STYLE,
    )
}

/// System prompt for the library agent, including the tool catalogue and the
/// tool-call wire format the dispatch loop understands.
pub fn agent_system_prompt(project: &str, tools: &[ToolMetadata]) -> String {
    let mut prompt = String::new();
    prompt.push_str(EXPERT_PREAMBLE);
    prompt.push_str(" You assist engineers working on the project \"");
    prompt.push_str(project);
    prompt.push_str("\".\n\n");
    prompt.push_str(
        "Company documents (specifications, standards, datasheets, line lists) live in a \
         shared PDF library. To answer questions about them:\n\
         1. Use search_library with a short keyword to find candidate filenames.\n\
         2. Use read_document with the exact filename to read its text.\n\
         3. Use web_search only for public information the library does not cover.\n\
         Do not read a document again once it has been loaded in this conversation; its \
         text is already above. Cite the document name and page when you rely on it.\n",
    );

    if !tools.is_empty() {
        prompt.push_str("\nYou have access to the following tools:\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            if !tool.parameters.is_empty() {
                prompt.push_str("  Parameters:\n");
                for param in &tool.parameters {
                    prompt.push_str(&format!(
                        "    - {} ({}{}): {}\n",
                        param.name,
                        param.param_type.as_str(),
                        if param.required { ", required" } else { "" },
                        param.description.as_deref().unwrap_or("No description")
                    ));
                }
            }
        }
        prompt.push_str(
            "\nTo use a tool, respond with only a JSON object in the following format:\n\
             {\"tool_call\": {\"name\": \"tool_name\", \"parameters\": {...}}}\n\
             After the tool runs I will send you its result and you can continue. \
             When you have what you need, answer in plain text without any tool_call.\n",
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_protocol::{ToolParameter, ToolParameterType};

    #[test]
    fn document_prompt_orders_sections() {
        let prompt = build_document_prompt(
            "Brazi Refinery",
            Some("Section 4.2: all carbon steel lines shall be hydrotested."),
            "Which lines need hydrotest?",
            500_000,
        );
        let preamble = prompt.find(EXPERT_PREAMBLE).unwrap();
        let context = prompt.find("Section 4.2").unwrap();
        let question = prompt.find("Which lines need hydrotest?").unwrap();
        assert!(preamble < context && context < question);
        assert!(prompt.contains("PROJECT CONTEXT: Brazi Refinery"));
        assert!(prompt.ends_with(ANSWER_STYLE));
    }

    #[test]
    fn document_context_is_truncated() {
        let document = "x".repeat(50);
        let prompt = build_document_prompt("General", Some(&document), "q?", 10);
        assert!(prompt.contains(&"x".repeat(10)));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    #[test]
    fn missing_document_leaves_context_empty() {
        let prompt = build_document_prompt("General", None, "What is NPS?", 500_000);
        assert!(prompt.contains("UPLOADED DOCUMENTATION:\n\n"));
        assert!(prompt.contains("USER QUESTION: What is NPS?"));
    }

    #[test]
    fn agent_prompt_lists_tools() {
        let tools = vec![ToolMetadata::new("search_library", "Search the PDF library")
            .with_parameter(
                ToolParameter::new("keyword", ToolParameterType::String)
                    .with_description("Part of the filename")
                    .required(),
            )];
        let prompt = agent_system_prompt("Gas Pipeline", &tools);
        assert!(prompt.contains("\"Gas Pipeline\""));
        assert!(prompt.contains("- search_library: Search the PDF library"));
        assert!(prompt.contains("keyword (string, required): Part of the filename"));
        assert!(prompt.contains("{\"tool_call\""));
    }

    #[test]
    fn agent_prompt_without_tools_has_no_call_format() {
        let prompt = agent_system_prompt("General", &[]);
        assert!(!prompt.contains("tool_call"));
    }
}
