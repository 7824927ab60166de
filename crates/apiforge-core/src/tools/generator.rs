//! Grounded code generation from retrieved API documentation.

use std::sync::Arc;

use apiforge_llm::provider::{LlmProvider, Message, Role};

use crate::tools::retriever::RetrievedEntry;

const SYSTEM_PROMPT: &str = "You are a payment API integration assistant. \
Using only the API documentation provided, answer with exactly two fenced code blocks: \
first a ```frontend block with browser-side JavaScript, \
then a ```backend block with server-side code. \
No prose outside the blocks.";

/// Final answer for one query. `synthetic` marks the predefined fallback used
/// when the model response could not be obtained or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub query: String,
    pub frontend: String,
    pub backend: String,
    pub synthetic: bool,
}

pub struct Generator<P: LlmProvider> {
    provider: Arc<P>,
}

impl<P: LlmProvider> Generator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Produce code for `query` grounded in `context`. Never fails: provider
    /// errors (rate limits included, after the provider's own retries) and
    /// unparseable responses degrade to the synthetic fallback.
    pub async fn generate(&self, query: &str, context: &[RetrievedEntry]) -> GeneratedCode {
        let messages = build_messages(query, context);

        let response = match self.provider.chat(&messages).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("generation failed for query {query:?}, using fallback: {e}");
                return fallback(query);
            }
        };

        match parse_response(query, &response) {
            Some(result) => result,
            None => {
                tracing::warn!(
                    "response for query {query:?} did not match the frontend/backend shape, using fallback"
                );
                fallback(query)
            }
        }
    }
}

fn build_messages(query: &str, context: &[RetrievedEntry]) -> Vec<Message> {
    let mut doc = String::from("API documentation:\n\n");
    if context.is_empty() {
        doc.push_str("(no matching documentation found)\n");
    }
    for hit in context {
        let e = &hit.entry;
        doc.push_str(&format!(
            "### {}\n{} {}\n{}\n",
            e.name, e.method, e.endpoint, e.description
        ));
        if !e.example.is_empty() {
            doc.push_str(&format!("Example: {}\n", e.example));
        }
        doc.push('\n');
    }
    doc.push_str(&format!("Question: {query}\n"));

    vec![
        Message::new(Role::System, SYSTEM_PROMPT),
        Message::new(Role::User, doc),
    ]
}

/// Extract the contents of a ```label fenced block. The label must follow the
/// opening fence directly.
fn extract_labeled_block(text: &str, label: &str) -> Option<String> {
    let fence = format!("```{label}");
    let start = text.find(&fence)?;
    let after = &text[start + fence.len()..];
    let end = after.find("```")?;
    Some(after[..end].trim().to_owned())
}

/// Both blocks must be present and non-empty; a partial match is a parse
/// failure.
fn parse_response(query: &str, response: &str) -> Option<GeneratedCode> {
    let frontend = extract_labeled_block(response, "frontend")?;
    let backend = extract_labeled_block(response, "backend")?;
    if frontend.is_empty() || backend.is_empty() {
        return None;
    }
    Some(GeneratedCode {
        query: query.to_owned(),
        frontend,
        backend,
        synthetic: false,
    })
}

fn fallback(query: &str) -> GeneratedCode {
    GeneratedCode {
        query: query.to_owned(),
        frontend: format!(
            "// Placeholder frontend snippet.\n\
             // The live generation for {query:?} was unavailable.\n\
             async function submitRequest(payload) {{\n  \
               const res = await fetch('/api/proxy', {{ method: 'POST', body: JSON.stringify(payload) }});\n  \
               return res.json();\n\
             }}"
        ),
        backend: format!(
            "# Placeholder backend snippet.\n\
             # The live generation for {query:?} was unavailable.\n\
             def handle_request(payload):\n    \
                 raise NotImplementedError(\"regenerate once the API is reachable\")"
        ),
        synthetic: true,
    }
}
