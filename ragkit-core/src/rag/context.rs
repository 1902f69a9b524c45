//! Context assembly for answer generation.

use crate::rag::retriever::RetrievedPassage;

/// Context block handed to the chat model, plus the titles it cites.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub context_text: String,
    pub titles: Vec<String>,
}

/// Render passages as `[Source: {title}]\n{content}` blocks separated by a
/// blank line, in rank order.
pub fn assemble(passages: &[RetrievedPassage]) -> AssembledContext {
    let context_text = passages
        .iter()
        .map(|p| format!("[Source: {}]\n{}", p.title, p.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    AssembledContext {
        context_text,
        titles: passages.iter().map(|p| p.title.clone()).collect(),
    }
}

/// The user turn: the context followed by the question.
pub fn user_message(context: &AssembledContext, question: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}",
        context.context_text, question
    )
}
