//! Prompt template registry.
//!
//! Every adapter call renders a [`PromptTemplate`] looked up by key. The
//! registry is built once at startup and shared read-only behind an `Arc`.
//! With the `yaml` feature, a YAML file can replace or add entries before
//! the registry is frozen.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_max_tokens() -> u32 {
    1024
}

/// A system/user template pair plus sampling defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
    /// Model used when the request does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// Immutable map of template key to [`PromptTemplate`].
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The templates every built-in operation needs.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (key, template) in builtin_templates() {
            registry = registry.with(key, template);
        }
        registry
    }

    /// Insert or replace one template.
    pub fn with(mut self, key: impl Into<String>, template: PromptTemplate) -> Self {
        self.templates.insert(key.into(), template);
        self
    }

    /// Look up a template.
    pub fn get(&self, key: &str) -> Result<&PromptTemplate> {
        self.templates
            .get(key)
            .ok_or_else(|| PipelineError::UnknownTemplate(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Keys and templates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PromptTemplate)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge a YAML map of `key: template` over this registry.
    ///
    /// ```
    /// use prompt_engine::templates::TemplateRegistry;
    ///
    /// let registry = TemplateRegistry::builtin()
    ///     .with_overlay_yaml("cot_visualizer:\n  system: Think aloud.\n  user: \"{question}\"\n  temperature: 0.9\n")
    ///     .unwrap();
    /// assert_eq!(registry.get("cot_visualizer").unwrap().max_tokens, 1024);
    /// ```
    #[cfg(feature = "yaml")]
    pub fn with_overlay_yaml(mut self, yaml: &str) -> Result<Self> {
        let overlay: BTreeMap<String, PromptTemplate> = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::InvalidConfig(format!("template overlay: {e}")))?;
        self.templates.extend(overlay);
        Ok(self)
    }

    /// Read a YAML overlay from disk. See [`with_overlay_yaml`](Self::with_overlay_yaml).
    #[cfg(feature = "yaml")]
    pub fn with_overlay_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let registry = self.with_overlay_yaml(&yaml)?;
        tracing::info!(path = %path.display(), templates = registry.len(), "loaded template overlay");
        Ok(registry)
    }
}

/// Caller-supplied system and user text, passed through unchanged.
fn passthrough(temperature: f64, max_tokens: u32) -> PromptTemplate {
    PromptTemplate::new("{system_prompt}", "{user_prompt}")
        .with_temperature(temperature)
        .with_max_tokens(max_tokens)
}

fn builtin_templates() -> Vec<(&'static str, PromptTemplate)> {
    vec![
        // Single-call features
        (
            "feedback_analysis",
            PromptTemplate::new(
                "You analyze customer feedback. Return ONLY a JSON object:\n\
                 {{\"sentiment\": \"positive|neutral|negative\", \"topics\": [\"...\"], \
                 \"issues\": [\"...\"], \"summary\": \"...\"}}",
                "---\nHere is the data:\n{review}",
            ),
        ),
        (
            "meeting_summarizer",
            PromptTemplate::new(
                "You summarize meeting transcripts into a title, key decisions, \
                 action items with owners, and open questions. Use Markdown headings.",
                "---\nBelow is the transcript:\n{transcript}",
            ),
        ),
        (
            "quiz_generator",
            PromptTemplate::new(
                "You write multiple-choice quizzes from source material. Return ONLY a JSON array:\n\
                 [{{\"question\": \"...\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \
                 \"answer\": \"...\", \"difficulty\": \"easy|intermediate|hard\"}}]",
                "Generate {num_questions} questions with the following difficulty distribution: {difficulty_mix}\n\
                 ---\nBelow is the information on which you have to generate the Quiz:\n{content}",
            )
            .with_max_tokens(2048),
        ),
        (
            "slide_script",
            PromptTemplate::new(
                "You write slide scripts. Return ONLY a JSON array of slides:\n\
                 [{{\"title\": \"...\", \"bullets\": [\"...\"], \"speaker_notes\": \"...\"}}]",
                "Generate a {style} slide script on the topic: {topic}\n\
                 Create exactly {num_slides} slides.\n\
                 Please ensure that each slide contains enough information to provide a clear overview.",
            )
            .with_temperature(0.7),
        ),
        (
            "complaint_response",
            PromptTemplate::new(
                "You are {agent_name}, a customer support agent at {company_name}. \
                 Acknowledge the problem, apologise once, offer a concrete next step, \
                 and sign off with your name.",
                "User complaint:\n{complaint}",
            )
            .with_temperature(0.3),
        ),
        ("custom", passthrough(0.7, 1024)),
        (
            "prompt_grader",
            PromptTemplate::new(
                "You grade prompts for clarity, specificity, structure, and robustness. \
                 Return ONLY JSON:\n\
                 {{\"overall_score\": <0-100>, \"dimensions\": [{{\"name\": \"...\", \"score\": <0-10>, \
                 \"comment\": \"...\"}}], \"strengths\": [\"...\"], \"weaknesses\": [\"...\"]}}",
                "Analyze this prompt:\n\n---\n{prompt_text}\n---{task_type_line}{domain_line}",
            )
            .with_temperature(0.1)
            .with_max_tokens(2048),
        ),
        (
            "prompt_optimizer",
            PromptTemplate::new(
                "You rewrite prompts to fix every weakness named in an analysis. \
                 Return ONLY JSON:\n\
                 {{\"optimized_prompt\": \"...\", \"changes\": [{{\"issue\": \"...\", \"fix\": \"...\"}}]}}",
                "Original prompt:\n---\n{prompt_text}\n---\n\nAnalysis results:\n---\n{grading_output}\n---",
            )
            .with_temperature(0.3)
            .with_max_tokens(3072),
        ),
        (
            "injection_tester",
            PromptTemplate::new(
                "You are a red-team analyst. Probe the system prompt for injection, \
                 jailbreak and data-leak weaknesses. Return ONLY JSON:\n\
                 {{\"risk_level\": \"low|medium|high\", \"vulnerabilities\": [{{\"type\": \"...\", \
                 \"attack\": \"...\", \"mitigation\": \"...\"}}], \"hardened_prompt\": \"...\"}}",
                "Analyze this system prompt for vulnerabilities:\n\n---\n{system_prompt}\n---",
            )
            .with_temperature(0.2)
            .with_max_tokens(3072),
        ),
        (
            "fewshot_builder",
            PromptTemplate::new(
                "You build few-shot prompts. Pick the most instructive examples, \
                 normalise their format, and return the finished prompt with a short rationale.",
                "Task description: {task_description}\n\nExample input/output pairs:\n{examples}",
            )
            .with_temperature(0.3)
            .with_max_tokens(3072),
        ),
        (
            "document_qa",
            PromptTemplate::new(
                "Answer strictly from the supplied documents. Cite sources as [Source n]. \
                 Say so plainly when the documents do not contain the answer.",
                "Question: {question}\n\nDocuments:\n{documents}",
            )
            .with_temperature(0.1)
            .with_max_tokens(3072),
        ),
        (
            "compliance_checker",
            PromptTemplate::new(
                "You audit documents against a policy. Return ONLY JSON:\n\
                 {{\"compliant\": <true|false>, \"findings\": [{{\"rule\": \"...\", \
                 \"status\": \"met|violated|unclear\", \"evidence\": \"...\"}}]}}",
                "Policy/SOP:\n---\n{policy_text}\n---\n\nDocument to check:\n---\n{document_text}\n---",
            )
            .with_temperature(0.1)
            .with_max_tokens(3072),
        ),
        (
            "tone_transformer",
            PromptTemplate::new(
                "Rewrite text in the requested tone. Keep every fact and commitment unchanged.",
                "Target tone: {target_tone}\n\nText to transform:\n---\n{text}\n---",
            )
            .with_temperature(0.4)
            .with_max_tokens(2048),
        ),
        (
            "misconception_detector",
            PromptTemplate::new(
                "You are a patient tutor. Identify each misconception in the student's answer, \
                 explain the correct idea, and suggest a follow-up exercise.",
                "Topic/Subject: {topic}\n\nStudent's answer:\n---\n{student_answer}\n---",
            )
            .with_temperature(0.2)
            .with_max_tokens(2048),
        ),
        (
            "cot_visualizer",
            PromptTemplate::new(
                "Solve the question step by step. Number each step, state the reasoning \
                 behind it, and finish with a line starting `Answer:`.",
                "{question}",
            )
            .with_temperature(0.3)
            .with_max_tokens(3072),
        ),
        (
            "scenario_simulator",
            PromptTemplate::new(
                "Simulate how each stakeholder reacts to the plan: concerns, likely objections, \
                 and what would win their support. Close with overall risks.",
                "Plan/Proposal:\n---\n{plan}\n---\n\nStakeholder roles to simulate:\n{stakeholders}",
            )
            .with_temperature(0.5)
            .with_max_tokens(3072),
        ),
        (
            "localizer",
            PromptTemplate::new(
                "Localize prompts for a target language and culture. Adapt idioms, examples \
                 and formality rather than translating word for word.",
                "Target language: {target_language}\n{cultural_line}\nPrompt to localize:\n---\n{prompt_text}\n---",
            )
            .with_temperature(0.4)
            .with_max_tokens(3072),
        ),
        (
            "cost_optimizer",
            PromptTemplate::new(
                "You are a prompt cost optimization expert. Return ONLY JSON:\n\
                 {{\"original_estimated_tokens\": <n>, \"optimized_prompt\": \"...\", \
                 \"optimized_estimated_tokens\": <n>, \"savings_percent\": <n>, \
                 \"optimizations\": [{{\"type\": \"redundancy|verbosity|restructure\", \
                 \"original\": \"...\", \"optimized\": \"...\", \"tokens_saved\": <n>}}], \
                 \"tips\": [\"...\"]}}",
                "System prompt:\n---\n{system_prompt}\n---\n\nUser prompt:\n---\n{prompt_text}\n---",
            )
            .with_temperature(0.2)
            .with_max_tokens(2048),
        ),
        // Self-correcting loop
        ("self_correct_generate", passthrough(0.5, 2048)),
        (
            "self_correct_critic",
            PromptTemplate::new(
                "You are a strict reviewer. Score the response from 1 to 10. Return ONLY JSON:\n\
                 {{\"quality_score\": <1-10>, \"issues\": [\"...\"], \"suggestions\": [\"...\"], \
                 \"passes_threshold\": <true if quality_score >= {threshold}>}}",
                "Task: {prompt}\n\nResponse to evaluate:\n---\n{current}\n---{criteria_block}",
            )
            .with_temperature(0.1),
        ),
        (
            "self_correct_reviser",
            PromptTemplate::new(
                "Revise the response so it resolves every issue the critic raised. \
                 Return only the improved response.",
                "Original task: {prompt}\n\nCurrent response:\n---\n{current}\n---\n\n\
                 Critic's feedback:\n---\n{feedback}\n---",
            )
            .with_temperature(0.3)
            .with_max_tokens(2048),
        ),
        // Schema enforcer
        (
            "schema_enforcer",
            PromptTemplate::new(
                "Return ONLY a JSON value that validates against the schema. \
                 No prose and no Markdown fences.\n\nRequired JSON Schema:\n{schema}",
                "{prompt}\n\nInput:\n{input}{correction}",
            )
            .with_temperature(0.1)
            .with_max_tokens(2048),
        ),
        // Quality gate
        ("quality_gate_generate", passthrough(0.5, 2048)),
        (
            "quality_gate_safety",
            PromptTemplate::new(
                "Check content for safety, accuracy and task fit. Return ONLY JSON:\n\
                 {{\"passed\": <true|false>, \"checks\": [{{\"name\": \"...\", \"passed\": <true|false>, \
                 \"note\": \"...\"}}], \"issues\": [\"...\"]}}",
                "Content to review:\n---\n{content}\n---\n\nOriginal task: {task}",
            )
            .with_temperature(0.1),
        ),
        (
            "quality_gate_reviser",
            PromptTemplate::new(
                "Fix the content so that it resolves these review findings:\n{issues}\n\
                 Return only the corrected content.",
                "{content}",
            )
            .with_temperature(0.3)
            .with_max_tokens(2048),
        ),
        // Decomposition
        (
            "decomposition_planner",
            PromptTemplate::new(
                "Break the task into 2-5 ordered sub-tasks. Return ONLY JSON:\n\
                 {{\"task_analysis\": \"...\", \"sub_tasks\": [{{\"step\": 1, \"title\": \"...\", \
                 \"instruction\": \"...\"}}]}}",
                "{task}",
            )
            .with_temperature(0.2)
            .with_max_tokens(2048),
        ),
        (
            "decomposition_step",
            PromptTemplate::new(
                "Complete the following sub-task thoroughly and precisely.",
                "{instruction}{context_block}",
            )
            .with_temperature(0.4)
            .with_max_tokens(1536),
        ),
        (
            "decomposition_integrator",
            PromptTemplate::new(
                "Combine the sub-task results into one coherent final answer to the original task. \
                 Remove repetition and resolve contradictions.",
                "Original task: {task}\n\nSub-task results:\n{results}",
            )
            .with_temperature(0.3)
            .with_max_tokens(3072),
        ),
        // Fan-out loops
        ("batch_eval", passthrough(0.2, 2048)),
        ("consistency_run", passthrough(0.7, 2048)),
        (
            "consistency_analysis",
            PromptTemplate::new(
                "You are an output consistency analyzer. Compare these outputs from the same prompt.\n\
                 Return JSON: {{\"consistency_score\": <0-100>, \"consistent_elements\": [\"...\"], \
                 \"varying_elements\": [\"...\"], \"recommendation\": \"...\"}}",
                "{runs}",
            )
            .with_temperature(0.1),
        ),
        ("model_compare", passthrough(0.3, 2048)),
        // A/B compare
        ("ab_run", passthrough(0.3, 1024)),
        (
            "ab_judge",
            PromptTemplate::new(
                "You judge two outputs produced for the same input. Return ONLY JSON:\n\
                 {{\"winner\": \"A|B|tie\", \"scores\": {{\"A\": <0-10>, \"B\": <0-10>}}, \
                 \"reasoning\": \"...\"}}",
                "Task input:\n{input}\n\n--- Output A ---\n{output_a}\n\n--- Output B ---\n{output_b}",
            )
            .with_temperature(0.1),
        ),
        // Expert panel
        (
            "expert_panel_persona",
            PromptTemplate::new(
                "You are the {persona_name}, a {persona_description}. Give your view on the \
                 topic in under 200 words, staying in character.",
                "Topic for discussion:\n{topic}",
            )
            .with_temperature(0.6),
        ),
        (
            "expert_panel_moderator",
            PromptTemplate::new(
                "You moderate an expert panel. Summarise points of agreement and disagreement, \
                 then give a balanced recommendation.",
                "Topic: {topic}\n\nExpert perspectives:\n{panel}",
            )
            .with_temperature(0.2)
            .with_max_tokens(2048),
        ),
        // RAG simulation
        (
            "rag_retriever",
            PromptTemplate::new(
                "Rank the knowledge base chunks by relevance to the query. Return ONLY JSON:\n\
                 {{\"query_analysis\": \"...\", \"ranked_chunks\": [{{\"chunk_index\": <1-based>, \
                 \"relevance\": <0-10>, \"reason\": \"...\"}}]}}",
                "Query: {query}\n\nKnowledge base chunks:\n{chunks}",
            )
            .with_temperature(0.1),
        ),
        (
            "rag_generator",
            PromptTemplate::new(
                "Answer the question using only the retrieved context. Cite chunk numbers in [Chunk N] format. \
                 If the context is insufficient, say so.",
                "Question: {query}\n\nRetrieved context:\n{context}",
            )
            .with_temperature(0.3)
            .with_max_tokens(2048),
        ),
        (
            "rag_baseline",
            PromptTemplate::new(
                "Answer the following question to the best of your knowledge.",
                "{query}",
            )
            .with_temperature(0.3),
        ),
        // Challenge
        ("challenge_run", passthrough(0.2, 2048)),
        (
            "challenge_evaluator",
            PromptTemplate::new(
                "You are an automated prompt challenge evaluator. Score the output against the criteria.\n\n\
                 Return ONLY a JSON object:\n\
                 {{\"score\": <0-100>, \"passed\": <true|false>, \"feedback\": \"...\", \
                 \"criteria_met\": [\"...\"], \"criteria_missed\": [\"...\"]}}",
                "Challenge: {title}\nCriteria: {criteria}\nExpected behavior: {expected_behavior}\n\
                 Test input: {test_input}\nUser's prompt: {prompt_text}\nActual output:\n---\n{output}\n---",
            )
            .with_temperature(0.1),
        ),
        // Test suite
        ("test_case_run", passthrough(0.2, 2048)),
        (
            "test_case_evaluator",
            PromptTemplate::new(
                "You are a test evaluator. Return ONLY valid JSON.",
                "Evaluate this output. Score 0-100.\n\
                 Return JSON: {{\"score\": <0-100>, \"passed\": <bool>, \"evaluation\": \"<brief assessment>\"}}\n\n\
                 Expected: {expected_output}\nCriteria: {criteria}\nActual output:\n{output}",
            )
            .with_temperature(0.1)
            .with_max_tokens(512),
        ),
        // Multi-agent workflow
        (
            "agent_router",
            PromptTemplate::new(
                "You are a task routing agent. Analyze the given task and determine which \
                 specialized agents should handle it. Return a JSON object with: analysis, \
                 recommended_agents (list), execution_order, and reasoning.",
                "Task: {task}\nCategory: {category}\nInput preview: {preview}",
            ),
        ),
        ("agent_primary", passthrough(0.0, 1024)),
        (
            "agent_reviewer",
            PromptTemplate::new(
                "You are a quality review agent. Evaluate the AI-generated output for accuracy, \
                 completeness, tone, and usefulness. Provide a quality score (1-10), specific \
                 improvements, and a brief summary. Format as JSON with: quality_score, \
                 strengths, improvements, summary.",
                "Original task: {task}\n\nGenerated output:\n{output}",
            ),
        ),
    ]
}
