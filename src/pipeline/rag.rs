//! Simulated retrieval-augmented answering.
//!
//! The model ranks the supplied chunks, the top ranked ones become the
//! context, and the same question is answered with and without it.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_items, check_model, require_text, BoxFut, Operation};
use crate::output_parser::ranked_chunk_indices;
use crate::prompt::char_prefix;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// Chunks used as context.
pub const TOP_K: usize = 3;

/// Characters of each selected chunk echoed in the report.
pub const CHUNK_ECHO_CHARS: usize = 200;

/// Request body for `rag_simulator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagRequest {
    pub query: String,
    /// 1-20 chunks, referred to by 1-based index.
    pub knowledge_chunks: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedChunk {
    /// 1-based.
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagReport {
    /// Raw retriever reply.
    pub retrieval: String,
    pub selected_chunks: Vec<SelectedChunk>,
    pub answer_with_context: String,
    pub answer_without_context: String,
    pub num_chunks_total: usize,
    pub num_chunks_retrieved: usize,
}

/// 0-based positions of the chunks to use.
///
/// The first [`TOP_K`] ranked entries are kept if they point at a real
/// chunk. A reply that does not parse selects the first [`TOP_K`] chunks.
fn select(retrieval: &str, total: usize) -> Vec<usize> {
    match ranked_chunk_indices(retrieval) {
        Some(ranked) => ranked
            .into_iter()
            .take(TOP_K)
            .filter(|&i| i >= 1 && (i as usize) <= total)
            .map(|i| i as usize - 1)
            .collect(),
        None => (0..total.min(TOP_K)).collect(),
    }
}

fn echo(text: &str) -> String {
    let prefix = char_prefix(text, CHUNK_ECHO_CHARS);
    if prefix.len() < text.len() {
        format!("{prefix}...")
    } else {
        prefix.to_string()
    }
}

impl Operation for RagRequest {
    fn category(&self) -> &'static str {
        "rag_simulator"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("query", &self.query)?;
        check_items("knowledge_chunks", &self.knowledge_chunks, 1, 20)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl RagRequest {
    /// `[Chunk N]: text` blocks for the given 0-based positions.
    fn labelled(&self, positions: &[usize]) -> String {
        positions
            .iter()
            .map(|&i| format!("[Chunk {}]: {}", i + 1, self.knowledge_chunks[i]))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();

        let all: Vec<usize> = (0..self.knowledge_chunks.len()).collect();
        let chunks = self.labelled(&all);
        let retrieval = run
            .call(
                ctx,
                LlmCall::new("rag_retriever")
                    .var("query", &self.query)
                    .var("chunks", chunks)
                    .with_model(model),
            )
            .await?;

        let picked = select(&retrieval.output, self.knowledge_chunks.len());
        let context = self.labelled(&picked);

        let with_context = run
            .call(
                ctx,
                LlmCall::new("rag_generator")
                    .var("query", &self.query)
                    .var("context", context)
                    .with_model(model),
            )
            .await?;
        let without_context = run
            .call(
                ctx,
                LlmCall::new("rag_baseline")
                    .var("query", &self.query)
                    .with_model(model),
            )
            .await?;

        let selected_chunks: Vec<SelectedChunk> = picked
            .iter()
            .map(|&i| SelectedChunk {
                chunk_index: i + 1,
                text: echo(&self.knowledge_chunks[i]),
            })
            .collect();
        let report = RagReport {
            retrieval: retrieval.output,
            num_chunks_total: self.knowledge_chunks.len(),
            num_chunks_retrieved: selected_chunks.len(),
            selected_chunks,
            answer_with_context: with_context.output.clone(),
            answer_without_context: without_context.output,
        };
        Ok(run.finish(with_context.output, |_| Detail::Rag(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::testing::mock_ctx;

    fn request(chunks: &[&str]) -> RagRequest {
        RagRequest {
            query: "When was the bridge built?".to_string(),
            knowledge_chunks: chunks.iter().map(|c| c.to_string()).collect(),
            model: None,
        }
    }

    #[test]
    fn test_select_ranked() {
        let reply = r#"{"ranked_chunks": [
            {"chunk_index": 4}, {"chunk_index": 9}, {"chunk_index": 2}, {"chunk_index": 1}
        ]}"#;
        // 9 is out of range and the fourth entry is beyond the top three
        assert_eq!(select(reply, 5), vec![3, 1]);
    }

    #[test]
    fn test_select_fallback() {
        assert_eq!(select("chunk 2 looks best", 5), vec![0, 1, 2]);
        assert_eq!(select("no json", 2), vec![0, 1]);
        assert_eq!(select(r#"{"query_analysis": "none relevant"}"#, 5), Vec::<usize>::new());
    }

    #[test]
    fn test_echo_truncates() {
        assert_eq!(echo("short"), "short");
        let long = "a".repeat(250);
        assert_eq!(echo(&long), format!("{}...", "a".repeat(CHUNK_ECHO_CHARS)));
    }

    #[tokio::test]
    async fn test_retrieve_then_answer_twice() {
        let (ctx, mock) = mock_ctx(&[
            r#"{"ranked_chunks": [{"chunk_index": 2, "relevance": 9}]}"#,
            "Built in 1932 [Chunk 2].",
            "I am not sure.",
        ]);
        let req = request(&["The river is wide.", "The bridge opened in 1932.", "Tolls apply."]);
        let outcome = run(&req, &ctx).await.unwrap();
        let Detail::Rag(ref report) = outcome.detail else {
            panic!("expected rag detail");
        };

        assert_eq!(mock.calls(), 3);
        assert_eq!(report.num_chunks_total, 3);
        assert_eq!(report.num_chunks_retrieved, 1);
        assert_eq!(report.selected_chunks[0].chunk_index, 2);
        assert_eq!(report.answer_without_context, "I am not sure.");
        assert_eq!(outcome.output, "Built in 1932 [Chunk 2].");

        let sent = mock.requests();
        assert!(sent[0].prompt.ends_with(
            "[Chunk 1]: The river is wide.\n\n[Chunk 2]: The bridge opened in 1932.\n\n[Chunk 3]: Tolls apply."
        ));
        assert_eq!(
            sent[1].prompt,
            "Question: When was the bridge built?\n\nRetrieved context:\n[Chunk 2]: The bridge opened in 1932."
        );
        assert_eq!(sent[2].prompt, "When was the bridge built?");
    }

    #[tokio::test]
    async fn test_context_keeps_chunk_labels() {
        let (ctx, mock) = mock_ctx(&[
            r#"{"ranked_chunks": [{"chunk_index": 3}, {"chunk_index": 1}]}"#,
            "answer",
        ]);
        run(&request(&["alpha", "beta", "gamma"]), &ctx).await.unwrap();
        let sent = mock.requests();
        assert!(sent[1]
            .prompt
            .ends_with("Retrieved context:\n[Chunk 3]: gamma\n\n[Chunk 1]: alpha"));
    }

    #[test]
    fn test_chunk_limits() {
        assert!(request(&[]).validate().is_err());
        assert!(request(&["c"; 21]).validate().is_err());
    }
}
