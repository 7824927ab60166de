//! Reasoning agent: an explicit state machine over the retriever and
//! generator tools, with a bounded iteration count per query.

use apiforge_llm::provider::LlmProvider;

use crate::tools::generator::{GeneratedCode, Generator};
use crate::tools::retriever::{RetrievedEntry, Retriever};

pub const DEFAULT_MAX_ITERATIONS: usize = 4;

#[derive(Debug)]
enum AgentState {
    AwaitingQuery,
    SelectingTool,
    AwaitingToolResult(ToolCall),
    Responding(GeneratedCode),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolCall {
    Retrieve,
    Generate,
}

/// One completed query/response pair kept for the session lifetime.
#[derive(Debug, Clone)]
pub struct Turn {
    pub query: String,
    pub result: GeneratedCode,
}

/// Per-query outcome. `IterationLimit` is a recoverable failure: the session
/// continues with the next query and no document is written for this one.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Answered(GeneratedCode),
    IterationLimit,
}

pub struct Agent<P: LlmProvider> {
    retriever: Retriever,
    generator: Generator<P>,
    conversation: Vec<Turn>,
    max_iterations: usize,
}

impl<P: LlmProvider> Agent<P> {
    #[must_use]
    pub fn new(retriever: Retriever, generator: Generator<P>, max_iterations: usize) -> Self {
        Self {
            retriever,
            generator,
            conversation: Vec::new(),
            max_iterations,
        }
    }

    /// Run one query to completion, fallback, or iteration-limit abort.
    ///
    /// Tool selection: retrieve first, then generate once grounding context
    /// has been gathered. Completed turns are appended to the conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if a tool fails in a non-degradable way (for example
    /// the query embedding itself cannot be computed). Such errors abort this
    /// query only; the agent remains usable.
    pub async fn run_query(&mut self, query: &str) -> anyhow::Result<QueryOutcome> {
        let mut state = AgentState::AwaitingQuery;
        let mut context: Option<Vec<RetrievedEntry>> = None;
        let mut iterations = 0usize;
        let mut answer = None;

        loop {
            state = match state {
                AgentState::AwaitingQuery => AgentState::SelectingTool,
                AgentState::SelectingTool => {
                    iterations += 1;
                    if iterations > self.max_iterations {
                        tracing::warn!(
                            "query {query:?} exceeded {} tool iterations, aborting",
                            self.max_iterations
                        );
                        AgentState::Done
                    } else if context.is_none() {
                        AgentState::AwaitingToolResult(ToolCall::Retrieve)
                    } else {
                        AgentState::AwaitingToolResult(ToolCall::Generate)
                    }
                }
                AgentState::AwaitingToolResult(ToolCall::Retrieve) => {
                    let hits = self.retriever.retrieve(query).await?;
                    tracing::debug!("retrieved {} entries for query {query:?}", hits.len());
                    context = Some(hits);
                    AgentState::SelectingTool
                }
                AgentState::AwaitingToolResult(ToolCall::Generate) => {
                    let ctx = context.as_deref().unwrap_or(&[]);
                    AgentState::Responding(self.generator.generate(query, ctx).await)
                }
                AgentState::Responding(result) => {
                    self.conversation.push(Turn {
                        query: query.to_owned(),
                        result: result.clone(),
                    });
                    answer = Some(result);
                    AgentState::Done
                }
                AgentState::Done => break,
            };
        }

        Ok(match answer {
            Some(result) => QueryOutcome::Answered(result),
            None => QueryOutcome::IterationLimit,
        })
    }

    /// Completed turns, oldest first.
    #[must_use]
    pub fn conversation(&self) -> &[Turn] {
        &self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use apiforge_llm::mock::MockProvider;
    use apiforge_llm::provider::EmbedFuture;
    use apiforge_memory::index::DocIndex;
    use apiforge_memory::InMemoryVectorStore;

    use crate::dataset::placeholder_entries;
    use crate::tools::retriever::to_index_doc;

    fn constant_embed() -> Box<dyn Fn(&str) -> EmbedFuture + Send + Sync> {
        Box::new(|_| Box::pin(async { Ok(vec![1.0, 0.0]) }))
    }

    async fn built_retriever() -> Retriever {
        let mut index = DocIndex::new(Box::new(InMemoryVectorStore::new()), constant_embed());
        let docs: Vec<_> = placeholder_entries().iter().map(to_index_doc).collect();
        index.build(&docs).await.unwrap();
        Retriever::new(index, 3)
    }

    fn structured_response() -> String {
        "```frontend\nfetch('/v2/payments');\n```\n```backend\npost('/v2/payments')\n```".into()
    }

    #[tokio::test]
    async fn answers_with_retrieve_then_generate() {
        let retriever = built_retriever().await;
        let provider = Arc::new(MockProvider::with_responses(vec![structured_response()]));
        let mut agent = Agent::new(retriever, Generator::new(provider), DEFAULT_MAX_ITERATIONS);

        let outcome = agent.run_query("create a payment").await.unwrap();
        match outcome {
            QueryOutcome::Answered(result) => {
                assert!(!result.synthetic);
                assert!(result.backend.contains("/v2/payments"));
            }
            QueryOutcome::IterationLimit => panic!("expected an answer"),
        }
        assert_eq!(agent.conversation().len(), 1);
        assert_eq!(agent.conversation()[0].query, "create a payment");
    }

    #[tokio::test]
    async fn iteration_limit_is_recoverable() {
        // One iteration is only enough to retrieve, never to generate.
        let retriever = built_retriever().await;
        let provider = Arc::new(MockProvider::with_responses(vec![structured_response()]));
        let mut agent = Agent::new(retriever, Generator::new(provider), 1);

        let outcome = agent.run_query("first").await.unwrap();
        assert!(matches!(outcome, QueryOutcome::IterationLimit));
        assert!(agent.conversation().is_empty());
    }

    #[tokio::test]
    async fn session_continues_after_degraded_query() {
        let retriever = built_retriever().await;
        // First query hits an unparseable response, second parses fine.
        let provider = Arc::new(MockProvider::with_responses(vec![
            "no code blocks here".into(),
            structured_response(),
        ]));
        let mut agent = Agent::new(retriever, Generator::new(provider), DEFAULT_MAX_ITERATIONS);

        let first = agent.run_query("one").await.unwrap();
        let QueryOutcome::Answered(first) = first else {
            panic!("expected fallback answer");
        };
        assert!(first.synthetic);

        let second = agent.run_query("two").await.unwrap();
        let QueryOutcome::Answered(second) = second else {
            panic!("expected real answer");
        };
        assert!(!second.synthetic);

        assert_eq!(agent.conversation().len(), 2);
    }

    #[tokio::test]
    async fn query_embedding_failure_aborts_only_that_query() {
        // Embeds succeed for the dataset but fail for one marked query.
        let embed: Box<dyn Fn(&str) -> EmbedFuture + Send + Sync> = Box::new(|text| {
            let doomed = text.starts_with("doomed");
            Box::pin(async move {
                if doomed {
                    Err(apiforge_llm::LlmError::RateLimited)
                } else {
                    Ok(vec![1.0, 0.0])
                }
            })
        });
        let mut index = DocIndex::new(Box::new(InMemoryVectorStore::new()), embed);
        let docs: Vec<_> = placeholder_entries().iter().map(to_index_doc).collect();
        index.build(&docs).await.unwrap();

        let provider = Arc::new(MockProvider::with_responses(vec![
            structured_response(),
            structured_response(),
        ]));
        let mut agent = Agent::new(
            Retriever::new(index, 3),
            Generator::new(provider),
            DEFAULT_MAX_ITERATIONS,
        );

        assert!(agent.run_query("doomed query").await.is_err());
        assert!(agent.conversation().is_empty());

        let next = agent.run_query("create a payment").await.unwrap();
        assert!(matches!(next, QueryOutcome::Answered(_)));
        assert_eq!(agent.conversation().len(), 1);
    }

    #[tokio::test]
    async fn empty_index_still_answers() {
        let index = DocIndex::new(Box::new(InMemoryVectorStore::new()), constant_embed());
        let retriever = Retriever::new(index, 3);
        let provider = Arc::new(MockProvider::with_responses(vec![structured_response()]));
        let mut agent = Agent::new(retriever, Generator::new(provider), DEFAULT_MAX_ITERATIONS);

        let outcome = agent.run_query("anything").await.unwrap();
        assert!(matches!(outcome, QueryOutcome::Answered(_)));
    }
}
