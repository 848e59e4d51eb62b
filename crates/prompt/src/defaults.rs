//! Built-in templates.
//!
//! Every engine starts from these and may swap any of them for a workspace
//! override with the same id.

use crate::types::PromptTemplate;
use std::collections::BTreeMap;

/// Answer a question from retrieved context. Variables: `context`, `query`.
pub const TEXT_QA_ID: &str = "query.text_qa";

/// Rewrite a follow-up into a standalone question. Variables: `chat_history`, `question`.
pub const CONDENSE_ID: &str = "chat.condense";

/// Pick a tool or answer. Variables: `system_instruction`, `tools`, `request`, `trace`, `budget_note`.
pub const AGENT_ROUTE_ID: &str = "agent.route";

/// Judge whether an answer is supported by context. Variables: `query`, `answer`, `context`.
pub const FAITHFULNESS_ID: &str = "eval.faithfulness";

/// Questions a fragment can answer. Variables: `context`, `num_questions`.
pub const QUESTIONS_ID: &str = "extract.questions";

/// Summarize one fragment. Variables: `context`.
pub const SUMMARY_ID: &str = "extract.summary";

const TEXT_QA: &str = "Context information is below.
---------------------
{{context}}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {{query}}
Answer: ";

const CONDENSE: &str = "Given the following conversation between a user and an assistant and a follow up question from the user,
rephrase the follow up question to be a standalone question that keeps all relevant context from the conversation.

Chat history:
{{chat_history}}

Follow up question: {{question}}
Standalone question: ";

const AGENT_ROUTE: &str = "{{system_instruction}}

You can call the following tools:
{{tools}}

User request: {{request}}

Tool calls so far:
{{trace}}
{{budget_note}}
Reply with a single JSON object and nothing else, either
{\"tool\": \"<tool name>\", \"input\": <JSON input matching the tool schema>}
to call a tool, or
{\"answer\": \"<final answer>\", \"explanation\": \"<how the tools were used>\"}
to finish.";

const FAITHFULNESS: &str = "Please tell if a given piece of information is supported by the context.
You need to answer with either YES or NO.
Answer YES if any of the context supports the information, even if most of the context is unrelated.

Question: {{query}}
Information: {{answer}}
Context:
{{context}}

Answer (YES or NO), then a short reason: ";

const QUESTIONS: &str = "Here is the context:
{{context}}

Given the contextual information, generate {{num_questions}} questions this context can provide specific answers to which are unlikely to be found elsewhere.
Higher-level summaries of surrounding context may be provided as well. Try using these summaries to generate better questions that this context can answer.
Write one question per line without numbering.
";

const SUMMARY: &str = "Here is the content of the section:
{{context}}

Summarize the key topics and entities of the section.
Summary: ";

fn builtin(id: &str, template: &str) -> PromptTemplate {
    PromptTemplate {
        id: id.to_string(),
        template: template.to_string(),
        partials: BTreeMap::new(),
    }
}

pub fn text_qa() -> PromptTemplate {
    builtin(TEXT_QA_ID, TEXT_QA)
}

pub fn condense() -> PromptTemplate {
    builtin(CONDENSE_ID, CONDENSE)
}

pub fn agent_route() -> PromptTemplate {
    builtin(AGENT_ROUTE_ID, AGENT_ROUTE)
}

pub fn faithfulness() -> PromptTemplate {
    builtin(FAITHFULNESS_ID, FAITHFULNESS)
}

pub fn questions() -> PromptTemplate {
    builtin(QUESTIONS_ID, QUESTIONS)
}

pub fn summary() -> PromptTemplate {
    builtin(SUMMARY_ID, SUMMARY)
}

/// Built-in template by id.
pub fn builtin_template(id: &str) -> Option<PromptTemplate> {
    match id {
        TEXT_QA_ID => Some(text_qa()),
        CONDENSE_ID => Some(condense()),
        AGENT_ROUTE_ID => Some(agent_route()),
        FAITHFULNESS_ID => Some(faithfulness()),
        QUESTIONS_ID => Some(questions()),
        SUMMARY_ID => Some(summary()),
        _ => None,
    }
}

pub fn builtin_ids() -> [&'static str; 6] {
    [
        TEXT_QA_ID,
        CONDENSE_ID,
        AGENT_ROUTE_ID,
        FAITHFULNESS_ID,
        QUESTIONS_ID,
        SUMMARY_ID,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_compile_and_declare_variables() {
        for id in builtin_ids() {
            let template = builtin_template(id).unwrap();
            assert!(PromptTemplate::new(id, template.template.clone()).is_ok());
        }

        assert_eq!(
            text_qa().variables(),
            vec!["context".to_string(), "query".to_string()]
        );
        assert_eq!(
            condense().variables(),
            vec!["chat_history".to_string(), "question".to_string()]
        );
    }

    #[test]
    fn test_agent_route_renders() {
        let rendered = agent_route()
            .render(&[
                ("system_instruction", "Explain your reasoning."),
                ("tools", "- lyft_10k: Lyft financials"),
                ("request", "Compare revenue"),
                ("trace", "(none)"),
                ("budget_note", ""),
            ])
            .unwrap();
        assert!(rendered.contains("lyft_10k"));
        assert!(rendered.contains("{\"tool\""));
    }
}
