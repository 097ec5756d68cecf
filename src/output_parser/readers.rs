//! Typed readers for the JSON verdicts that pipelines branch on.
//!
//! Each reader documents its fallback. None of them fail: a verdict that
//! cannot be read takes its default and the pipeline carries on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json::parse_json_value;

/// `passes_threshold` from a critic verdict. Defaults to `false`.
pub fn critique_passes(text: &str) -> bool {
    parse_json_value(text)
        .ok()
        .and_then(|v| v.get("passes_threshold").and_then(Value::as_bool))
        .unwrap_or(false)
}

/// `passed` from a safety check. Defaults to `true`, including when the
/// verdict does not parse at all.
pub fn safety_passed(text: &str) -> bool {
    parse_json_value(text)
        .ok()
        .and_then(|v| v.get("passed").and_then(Value::as_bool))
        .unwrap_or(true)
}

/// Score given to an output whose evaluation could not be parsed.
pub const FALLBACK_SCORE: u8 = 50;

/// Feedback attached to an unparseable evaluation.
pub const FALLBACK_FEEDBACK: &str = "Could not auto-evaluate";

/// An evaluator verdict, clamped to a 0–100 score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: u8,
    pub passed: bool,
    pub feedback: String,
    #[serde(default)]
    pub criteria_met: Vec<String>,
    #[serde(default)]
    pub criteria_missed: Vec<String>,
    /// `false` when the fallback was used.
    pub parsed: bool,
}

impl Evaluation {
    /// Read an evaluator verdict.
    ///
    /// ```
    /// use prompt_engine::output_parser::Evaluation;
    ///
    /// let e = Evaluation::read("{\"score\": 140, \"passed\": TRUE}");
    /// assert_eq!(e.score, 100);
    /// assert!(e.passed);
    ///
    /// let fallback = Evaluation::read("great job!");
    /// assert_eq!(fallback.score, 50);
    /// assert_eq!(fallback.feedback, "Could not auto-evaluate");
    /// ```
    pub fn read(text: &str) -> Self {
        let Some(obj) = parse_json_value(text).ok().filter(Value::is_object) else {
            return Self::fallback();
        };

        let score = obj
            .get("score")
            .and_then(Value::as_f64)
            .map(|s| s.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0);
        let feedback = ["feedback", "evaluation"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        Self {
            score,
            passed: obj.get("passed").and_then(Value::as_bool).unwrap_or(false),
            feedback,
            criteria_met: string_list(obj.get("criteria_met")),
            criteria_missed: string_list(obj.get("criteria_missed")),
            parsed: true,
        }
    }

    pub fn fallback() -> Self {
        Self {
            score: FALLBACK_SCORE,
            passed: false,
            feedback: FALLBACK_FEEDBACK.to_string(),
            criteria_met: Vec::new(),
            criteria_missed: Vec::new(),
            parsed: false,
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// One step of a decomposition plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubTask {
    pub step: String,
    pub title: String,
    pub instruction: String,
}

/// Title of the single step used when a plan is unusable.
pub const FULL_TASK_TITLE: &str = "Full Task";

/// Read `sub_tasks` from a planner reply.
///
/// Falls back to a single "Full Task" step carrying the whole task when
/// the plan does not parse or lists no sub-tasks.
pub fn plan_sub_tasks(text: &str, task: &str) -> Vec<SubTask> {
    let parsed: Vec<SubTask> = parse_json_value(text)
        .ok()
        .and_then(|v| v.get("sub_tasks").and_then(Value::as_array).cloned())
        .unwrap_or_default()
        .iter()
        .filter(|item| item.is_object())
        .map(|item| SubTask {
            step: match item.get("step") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => "?".to_string(),
            },
            title: item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            instruction: item
                .get("instruction")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    if parsed.is_empty() {
        vec![SubTask {
            step: "1".to_string(),
            title: FULL_TASK_TITLE.to_string(),
            instruction: task.to_string(),
        }]
    } else {
        parsed
    }
}

/// `ranked_chunks[].chunk_index` values from a retriever reply, in order.
///
/// `None` when the reply does not parse; entries without an integer index
/// count as chunk 1.
pub fn ranked_chunk_indices(text: &str) -> Option<Vec<i64>> {
    let value = parse_json_value(text).ok()?;
    let ranked = value
        .get("ranked_chunks")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Some(
        ranked
            .iter()
            .map(|item| item.get("chunk_index").and_then(Value::as_i64).unwrap_or(1))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critique_passes() {
        assert!(critique_passes(r#"{"quality_score": 8, "passes_threshold": true}"#));
        assert!(critique_passes("```json\n{\"passes_threshold\": TRUE}\n```"));
        assert!(!critique_passes(r#"{"passes_threshold": false}"#));
        assert!(!critique_passes(r#"{"quality_score": 9}"#));
        assert!(!critique_passes("looks good to me"));
    }

    #[test]
    fn test_safety_defaults_to_passed() {
        assert!(!safety_passed(r#"{"passed": false, "checks": []}"#));
        assert!(safety_passed(r#"{"passed": true}"#));
        assert!(safety_passed(r#"{"checks": []}"#));
        assert!(safety_passed("I could not review this."));
        assert!(safety_passed(""));
    }

    #[test]
    fn test_evaluation_fields() {
        let e = Evaluation::read(
            r#"{"score": 72.4, "passed": true, "feedback": "Solid",
                "criteria_met": ["json"], "criteria_missed": ["phone", 3]}"#,
        );
        assert_eq!(e.score, 72);
        assert!(e.passed);
        assert_eq!(e.feedback, "Solid");
        assert_eq!(e.criteria_met, vec!["json"]);
        assert_eq!(e.criteria_missed, vec!["phone"]);
        assert!(e.parsed);
    }

    #[test]
    fn test_evaluation_clamps_and_defaults() {
        assert_eq!(Evaluation::read(r#"{"score": -5}"#).score, 0);
        let missing = Evaluation::read(r#"{"evaluation": "meh"}"#);
        assert_eq!(missing.score, 0);
        assert!(!missing.passed);
        assert_eq!(missing.feedback, "meh");
    }

    #[test]
    fn test_evaluation_fallback() {
        let e = Evaluation::read("[1, 2, 3]");
        assert_eq!(e, Evaluation::fallback());
        assert_eq!(e.score, FALLBACK_SCORE);
        assert!(!e.parsed);
    }

    #[test]
    fn test_plan_sub_tasks() {
        let plan = r#"{"task_analysis": "x", "sub_tasks": [
            {"step": 1, "title": "Research", "instruction": "Find facts"},
            {"step": "2", "title": "Write", "instruction": "Draft it"}
        ]}"#;
        let tasks = plan_sub_tasks(plan, "whole task");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].step, "1");
        assert_eq!(tasks[1].step, "2");
        assert_eq!(tasks[1].instruction, "Draft it");
    }

    #[test]
    fn test_plan_fallbacks() {
        for bad in ["not a plan", r#"{"sub_tasks": []}"#, r#"{"other": 1}"#] {
            let tasks = plan_sub_tasks(bad, "whole task");
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].title, FULL_TASK_TITLE);
            assert_eq!(tasks[0].instruction, "whole task");
        }
    }

    #[test]
    fn test_ranked_chunk_indices() {
        let reply = r#"{"ranked_chunks": [{"chunk_index": 3}, {"chunk_index": 1}, {"reason": "x"}]}"#;
        assert_eq!(ranked_chunk_indices(reply), Some(vec![3, 1, 1]));
        assert_eq!(ranked_chunk_indices(r#"{"query_analysis": "q"}"#), Some(vec![]));
        assert_eq!(ranked_chunk_indices("no ranking"), None);
    }
}
