//! Multi-turn reasoner: eight fixed analytical passes over the ranked
//! record set.
//!
//! The runner performs no I/O. A pass that panics is caught and
//! recorded as a zero-confidence step so the remaining passes still
//! run.

mod steps;

use chrono::Datelike;

use crate::models::{PaperRecord, ReasoningResult, ReasoningStep, ResearchContext};
use steps::{PassInput, PASSES};

/// Run every pass in contract order.
pub fn run(records: &[PaperRecord], context: &ResearchContext) -> ReasoningResult {
    run_at(records, context, chrono::Utc::now().year())
}

pub(crate) fn run_at(
    records: &[PaperRecord],
    context: &ResearchContext,
    current_year: i32,
) -> ReasoningResult {
    let mut steps: Vec<ReasoningStep> = Vec::with_capacity(PASSES.len());

    for (number, (kind, pass)) in PASSES.iter().enumerate() {
        let number = (number + 1) as u8;
        let input = PassInput {
            records,
            context,
            prior: &steps,
            current_year,
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pass(&input)));
        let step = match outcome {
            Ok(step) => step,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("analysis pass failed");
                tracing::warn!(step = number, kind = ?kind, message, "reasoning pass failed");
                ReasoningStep {
                    step: number,
                    kind: *kind,
                    description: "Analysis pass failed".to_string(),
                    result: serde_json::Value::Null,
                    confidence: 0.0,
                    rationale: format!("step aborted: {message}"),
                }
            }
        };
        steps.push(step);
    }

    let overall_confidence = if steps.is_empty() {
        0.0
    } else {
        steps.iter().map(|s| s.confidence).sum::<f64>() / steps.len() as f64
    };

    let key_insights = extract_insights(&steps);
    let recommended = records.iter().take(5).map(|r| r.title.clone()).collect();

    ReasoningResult {
        steps,
        overall_confidence,
        key_insights,
        recommended,
    }
}

/// Pull a compact set of human-readable insights out of the step
/// payloads: leading themes, foundational works, and coverage gaps.
fn extract_insights(steps: &[ReasoningStep]) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(themes) = steps.get(1).and_then(|s| s.result["themes"].as_array()) {
        let leading: Vec<&str> = themes
            .iter()
            .take(3)
            .filter_map(|t| t["term"].as_str())
            .collect();
        if !leading.is_empty() {
            insights.push(format!("Dominant themes: {}", leading.join(", ")));
        }
    }

    if let Some(foundational) = steps.get(6).and_then(|s| s.result["foundational"].as_array()) {
        for work in foundational.iter().take(3) {
            if let Some(title) = work["title"].as_str() {
                insights.push(format!("Foundational work: {title}"));
            }
        }
    }

    if let Some(gaps) = steps.get(4).and_then(|s| s.result["gaps"].as_array()) {
        for gap in gaps.iter().take(3) {
            if let Some(description) = gap["description"].as_str() {
                insights.push(format!("Gap: {description}"));
            }
        }
    }

    insights
}
