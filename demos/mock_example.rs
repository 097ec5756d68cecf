//! Example: running a pipeline against MockBackend without a live LLM.
//!
//! Run with: `cargo run --example mock_example`

use prompt_engine::operation::run;
use prompt_engine::pipeline::SchemaRequest;
use prompt_engine::{Detail, ExecCtx, LlmClient, MockBackend, Provider};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // First reply is broken JSON, the second one is valid.
    let mock = Arc::new(MockBackend::new(vec![
        "```json\n{\"title\": \"Inception\", \"rating\": }\n```".to_string(),
        "{\"title\": \"Inception\", \"rating\": 9.2, \"summary\": \"Dreams within dreams.\"}".to_string(),
    ]));

    let client = LlmClient::builder()
        .backend(Provider::OpenAi, mock.clone())
        .build()?;
    let ctx = ExecCtx::builder().client(Arc::new(client)).build()?;

    let mut request = SchemaRequest::new(
        "Review the movie.",
        r#"{"type": "object", "required": ["title", "rating", "summary"]}"#,
        "Inception",
    );
    request.required_keys = vec!["title".into(), "rating".into(), "summary".into()];

    let outcome = run(&request, &ctx).await?;
    if let Detail::Schema(report) = &outcome.detail {
        for attempt in &report.attempts {
            println!(
                "attempt {}: valid={} {}",
                attempt.attempt,
                attempt.valid,
                attempt.error.as_deref().unwrap_or("")
            );
        }
        println!("success: {}", report.success);
    }
    println!("result: {}", outcome.output);
    println!(
        "tokens: {} in / {} out, {} calls",
        outcome.tokens_input,
        outcome.tokens_output,
        mock.calls()
    );

    Ok(())
}
