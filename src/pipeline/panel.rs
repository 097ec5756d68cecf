//! Expert panel: one call per persona, then a moderator synthesis.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_items, check_model, require_text, BoxFut, Operation};
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// Known persona keys with their display name and description.
pub const PERSONAS: &[(&str, &str, &str)] = &[
    (
        "optimist",
        "Optimist Strategist",
        "strategic thinker who focuses on opportunities, growth potential, and positive outcomes",
    ),
    (
        "skeptic",
        "Skeptical Analyst",
        "critical analyst who questions assumptions, identifies flaws, and stress-tests ideas",
    ),
    (
        "risk_mgr",
        "Risk Manager",
        "risk management professional who evaluates threats, vulnerabilities, and mitigation strategies",
    ),
    (
        "technical",
        "Technical Expert",
        "technology specialist who assesses feasibility, implementation complexity, and technical trade-offs",
    ),
    (
        "end_user",
        "End-User Advocate",
        "user experience champion who evaluates from the customer/end-user perspective",
    ),
    (
        "financial",
        "Financial Advisor",
        "financial expert who analyzes costs, ROI, and economic viability",
    ),
];

const UNKNOWN_PERSONA: &str = "domain expert";

/// Display name and description for `key`. Unknown keys are used as the
/// name of a generic domain expert.
pub fn persona(key: &str) -> (&str, &'static str) {
    PERSONAS
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, name, desc)| (*name, *desc))
        .unwrap_or((key, UNKNOWN_PERSONA))
}

fn default_personas() -> Vec<String> {
    ["optimist", "skeptic", "risk_mgr"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Request body for `expert_panel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertPanelRequest {
    pub topic: String,
    /// Persona keys, consulted in order (1-6).
    #[serde(default = "default_personas")]
    pub personas: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpertResponse {
    pub persona: String,
    pub persona_key: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelReport {
    pub expert_responses: Vec<ExpertResponse>,
    pub synthesis: String,
    pub num_experts: usize,
}

impl Operation for ExpertPanelRequest {
    fn category(&self) -> &'static str {
        "expert_panel"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("topic", &self.topic)?;
        check_items("personas", &self.personas, 1, PERSONAS.len())?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl ExpertPanelRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();
        let mut expert_responses = Vec::with_capacity(self.personas.len());

        for key in &self.personas {
            let (name, description) = persona(key);
            let inv = run
                .call(
                    ctx,
                    LlmCall::new("expert_panel_persona")
                        .var("persona_name", name)
                        .var("persona_description", description)
                        .var("topic", &self.topic)
                        .with_model(model),
                )
                .await?;
            expert_responses.push(ExpertResponse {
                persona: name.to_string(),
                persona_key: key.clone(),
                response: inv.output,
            });
        }

        let panel = expert_responses
            .iter()
            .map(|e| format!("--- {} ---\n{}", e.persona, e.response))
            .collect::<Vec<_>>()
            .join("\n\n");
        let moderator = run
            .call(
                ctx,
                LlmCall::new("expert_panel_moderator")
                    .var("topic", &self.topic)
                    .var("panel", panel)
                    .with_model(model),
            )
            .await?;

        let report = PanelReport {
            num_experts: expert_responses.len(),
            expert_responses,
            synthesis: moderator.output.clone(),
        };
        Ok(run.finish(moderator.output, |_| Detail::ExpertPanel(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::testing::mock_ctx;

    #[test]
    fn test_persona_lookup() {
        assert_eq!(persona("skeptic").0, "Skeptical Analyst");
        assert_eq!(persona("historian"), ("historian", "domain expert"));
    }

    #[test]
    fn test_default_personas() {
        let req: ExpertPanelRequest = serde_json::from_str(r#"{"topic": "4-day week"}"#).unwrap();
        assert_eq!(req.personas, vec!["optimist", "skeptic", "risk_mgr"]);
        assert!(req.validate().is_ok());
    }

    #[tokio::test]
    async fn test_personas_then_moderator() {
        let (ctx, mock) = mock_ctx(&["Great idea", "Prove it", "Balanced view"]);
        let req = ExpertPanelRequest {
            topic: "Adopt a 4-day week".to_string(),
            personas: vec!["optimist".to_string(), "historian".to_string()],
            model: None,
        };
        let outcome = run(&req, &ctx).await.unwrap();
        let Detail::ExpertPanel(ref report) = outcome.detail else {
            panic!("expected panel detail");
        };

        assert_eq!(mock.calls(), 3);
        assert_eq!(report.num_experts, 2);
        assert_eq!(report.expert_responses[1].persona, "historian");
        assert_eq!(report.expert_responses[1].persona_key, "historian");
        assert_eq!(report.synthesis, "Balanced view");
        assert_eq!(outcome.output, "Balanced view");

        let sent = mock.requests();
        assert!(sent[0].system_prompt.starts_with("You are the Optimist Strategist, a strategic thinker"));
        assert!(sent[1].system_prompt.starts_with("You are the historian, a domain expert."));
        assert_eq!(
            sent[2].prompt,
            "Topic: Adopt a 4-day week\n\nExpert perspectives:\n\
             --- Optimist Strategist ---\nGreat idea\n\n--- historian ---\nProve it"
        );
    }

    #[test]
    fn test_too_many_personas() {
        let req = ExpertPanelRequest {
            topic: "t".to_string(),
            personas: vec!["optimist".to_string(); 7],
            model: None,
        };
        assert!(req.validate().is_err());
    }
}
