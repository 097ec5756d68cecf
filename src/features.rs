//! Single-call features.
//!
//! Each request type renders one template and makes one adapter call. The
//! serde defaults are the defaults of the HTTP API: a body only needs the
//! required text fields.

use crate::error::Result;
use crate::llm_call::LlmCall;
use crate::operation::{
    check_items, check_model, check_range, check_temperature, require_text, SingleCall,
};
use crate::prompt::bullet_list;
use serde::{Deserialize, Serialize};

fn default_quiz_questions() -> u32 {
    5
}

fn default_difficulty_mix() -> String {
    "2 easy, 2 intermediate, 1 hard".to_string()
}

fn default_quiz_max_tokens() -> u32 {
    2048
}

fn default_num_slides() -> u32 {
    3
}

fn default_slide_style() -> String {
    "professional".to_string()
}

fn default_creative_temperature() -> f64 {
    0.7
}

fn default_company_name() -> String {
    "Our Company".to_string()
}

fn default_agent_name() -> String {
    "Support Agent".to_string()
}

fn default_support_temperature() -> f64 {
    0.3
}

fn default_custom_max_tokens() -> u32 {
    1024
}

/// Shared checks for the request-level sampling overrides.
fn check_sampling(temperature: f64, max_tokens: Option<u32>) -> Result<()> {
    check_temperature(temperature)?;
    if let Some(tokens) = max_tokens {
        check_range("max_tokens", tokens, 1, 4096)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Content features
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub review_text: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for FeedbackRequest {
    const CATEGORY: &'static str = "feedback_analysis";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("review_text", &self.review_text)?;
        check_sampling(self.temperature, None)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("review", &self.review_text)
            .with_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub transcript: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for MeetingRequest {
    const CATEGORY: &'static str = "meeting_summarizer";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("transcript", &self.transcript)?;
        check_sampling(self.temperature, None)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("transcript", &self.transcript)
            .with_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRequest {
    pub content: String,
    /// 1-20.
    #[serde(default = "default_quiz_questions")]
    pub num_questions: u32,
    #[serde(default = "default_difficulty_mix")]
    pub difficulty_mix: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_quiz_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for QuizRequest {
    const CATEGORY: &'static str = "quiz_generator";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("content", &self.content)?;
        check_range("num_questions", self.num_questions, 1, 20)?;
        check_sampling(self.temperature, Some(self.max_tokens))?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("num_questions", self.num_questions.to_string())
            .var("difficulty_mix", &self.difficulty_mix)
            .var("content", &self.content)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideScriptRequest {
    pub topic: String,
    /// 1-20.
    #[serde(default = "default_num_slides")]
    pub num_slides: u32,
    #[serde(default = "default_slide_style")]
    pub style: String,
    #[serde(default = "default_creative_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for SlideScriptRequest {
    const CATEGORY: &'static str = "slide_script";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("topic", &self.topic)?;
        check_range("num_slides", self.num_slides, 1, 20)?;
        check_sampling(self.temperature, None)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("style", &self.style)
            .var("topic", &self.topic)
            .var("num_slides", self.num_slides.to_string())
            .with_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintRequest {
    pub complaint: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_support_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for ComplaintRequest {
    const CATEGORY: &'static str = "complaint_response";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("complaint", &self.complaint)?;
        check_sampling(self.temperature, None)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("agent_name", &self.agent_name)
            .var("company_name", &self.company_name)
            .var("complaint", &self.complaint)
            .with_temperature(self.temperature)
    }
}

/// Free-form call: the caller supplies both prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRequest {
    #[serde(default)]
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default = "default_creative_temperature")]
    pub temperature: f64,
    #[serde(default = "default_custom_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for CustomRequest {
    const CATEGORY: &'static str = "custom";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("user_prompt", &self.user_prompt)?;
        check_sampling(self.temperature, Some(self.max_tokens))?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("system_prompt", &self.system_prompt)
            .var("user_prompt", &self.user_prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

// ---------------------------------------------------------------------------
// Prompt engineering tools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraderRequest {
    pub prompt_text: String,
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for GraderRequest {
    const CATEGORY: &'static str = "prompt_grader";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        let task_type_line = if self.task_type.is_empty() {
            String::new()
        } else {
            format!("\n\nTask type: {}", self.task_type)
        };
        let domain_line = if self.domain.is_empty() {
            String::new()
        } else {
            format!("\nDomain: {}", self.domain)
        };
        LlmCall::new(Self::CATEGORY)
            .var("prompt_text", &self.prompt_text)
            .var("task_type_line", task_type_line)
            .var("domain_line", domain_line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerRequest {
    pub prompt_text: String,
    /// Output of an earlier `prompt_grader` run.
    pub grading_output: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for OptimizerRequest {
    const CATEGORY: &'static str = "prompt_optimizer";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        require_text("grading_output", &self.grading_output)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("prompt_text", &self.prompt_text)
            .var("grading_output", &self.grading_output)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionRequest {
    pub system_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for InjectionRequest {
    const CATEGORY: &'static str = "injection_tester";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("system_prompt", &self.system_prompt)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY).var("system_prompt", &self.system_prompt)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotRequest {
    pub task_description: String,
    /// Example input/output pairs as free text.
    pub examples: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for FewShotRequest {
    const CATEGORY: &'static str = "fewshot_builder";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("task_description", &self.task_description)?;
        require_text("examples", &self.examples)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("task_description", &self.task_description)
            .var("examples", &self.examples)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostOptimizerRequest {
    pub prompt_text: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for CostOptimizerRequest {
    const CATEGORY: &'static str = "cost_optimizer";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("system_prompt", &self.system_prompt)
            .var("prompt_text", &self.prompt_text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizerRequest {
    pub prompt_text: String,
    pub target_language: String,
    #[serde(default)]
    pub cultural_context: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for LocalizerRequest {
    const CATEGORY: &'static str = "localizer";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        require_text("target_language", &self.target_language)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        let cultural_line = if self.cultural_context.is_empty() {
            String::new()
        } else {
            format!("Cultural context notes: {}\n", self.cultural_context)
        };
        LlmCall::new(Self::CATEGORY)
            .var("target_language", &self.target_language)
            .var("cultural_line", cultural_line)
            .var("prompt_text", &self.prompt_text)
    }
}

// ---------------------------------------------------------------------------
// Analysis features
// ---------------------------------------------------------------------------

/// One source for [`DocumentQaRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub label: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentQaRequest {
    pub question: String,
    /// 1-10 sources.
    pub documents: Vec<SourceDocument>,
    #[serde(default)]
    pub model: Option<String>,
}

impl DocumentQaRequest {
    fn documents_block(&self) -> String {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let label = match doc.label.as_deref() {
                    Some(l) if !l.trim().is_empty() => l.to_string(),
                    _ => format!("Document {}", i + 1),
                };
                format!("--- Source {}: {} ---\n{}", i + 1, label, doc.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl SingleCall for DocumentQaRequest {
    const CATEGORY: &'static str = "document_qa";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("question", &self.question)?;
        let texts: Vec<String> = self.documents.iter().map(|d| d.text.clone()).collect();
        check_items("documents", &texts, 1, 10)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("question", &self.question)
            .var("documents", self.documents_block())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub policy_text: String,
    pub document_text: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for ComplianceRequest {
    const CATEGORY: &'static str = "compliance_checker";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("policy_text", &self.policy_text)?;
        require_text("document_text", &self.document_text)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("policy_text", &self.policy_text)
            .var("document_text", &self.document_text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneRequest {
    pub text: String,
    pub target_tone: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for ToneRequest {
    const CATEGORY: &'static str = "tone_transformer";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("text", &self.text)?;
        require_text("target_tone", &self.target_tone)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("target_tone", &self.target_tone)
            .var("text", &self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisconceptionRequest {
    pub topic: String,
    pub student_answer: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for MisconceptionRequest {
    const CATEGORY: &'static str = "misconception_detector";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("topic", &self.topic)?;
        require_text("student_answer", &self.student_answer)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("topic", &self.topic)
            .var("student_answer", &self.student_answer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CotRequest {
    pub question: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for CotRequest {
    const CATEGORY: &'static str = "cot_visualizer";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("question", &self.question)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY).var("question", &self.question)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub plan: String,
    /// 1-10 stakeholder roles.
    pub stakeholders: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl SingleCall for ScenarioRequest {
    const CATEGORY: &'static str = "scenario_simulator";

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("plan", &self.plan)?;
        check_items("stakeholders", &self.stakeholders, 1, 10)?;
        check_model(self.model.as_deref())
    }

    fn call(&self) -> LlmCall {
        LlmCall::new(Self::CATEGORY)
            .var("plan", &self.plan)
            .var("stakeholders", bullet_list(&self.stakeholders))
    }
}
