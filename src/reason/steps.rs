//! The eight analytical passes of the multi-turn reasoner.
//!
//! Every pass is a deterministic pure function of the ranked record
//! set, the research context, and the steps before it. Definition
//! order here is the contract order.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::json;

use crate::models::{PaperRecord, ReasoningStep, ResearchContext, StepKind};
use crate::utils::text::{is_stop_word, tokenize};

/// Everything a pass may look at.
pub struct PassInput<'a> {
    pub records: &'a [PaperRecord],
    pub context: &'a ResearchContext,
    pub prior: &'a [ReasoningStep],
    pub current_year: i32,
}

pub type Pass = fn(&PassInput<'_>) -> ReasoningStep;

/// The pass sequence, in contract order.
pub const PASSES: &[(StepKind, Pass)] = &[
    (StepKind::Categorization, categorize),
    (StepKind::ThemeIdentification, identify_themes),
    (StepKind::ConflictDetection, detect_conflicts),
    (StepKind::CrossValidation, cross_validate),
    (StepKind::GapIdentification, identify_gaps),
    (StepKind::ChronologicalAnalysis, chronological_analysis),
    (StepKind::CitationPatternAnalysis, citation_patterns),
    (StepKind::Synthesis, synthesize),
];

fn step(
    number: u8,
    kind: StepKind,
    description: &str,
    result: serde_json::Value,
    confidence: f64,
    rationale: String,
) -> ReasoningStep {
    ReasoningStep {
        step: number,
        kind,
        description: description.to_string(),
        result,
        confidence: confidence.clamp(0.0, 1.0),
        rationale,
    }
}

/// Meaningful tokens of a record's title and abstract.
fn record_tokens(record: &PaperRecord, min_len: usize) -> Vec<String> {
    let mut tokens = tokenize(&record.title, min_len);
    tokens.extend(tokenize(&record.abstract_text, min_len));
    tokens.retain(|t| !is_stop_word(t));
    tokens
}

/// Token frequencies across a record set, most frequent first,
/// alphabetical within equal counts for determinism.
fn token_frequencies(records: &[PaperRecord], min_len: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for token in record_tokens(record, min_len) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// A record's main topic: its first title token longer than four
/// characters that is not a stop word.
fn dominant_topic(record: &PaperRecord) -> Option<String> {
    tokenize(&record.title, 4)
        .into_iter()
        .find(|t| !is_stop_word(t))
}

// ===== Pass 1: categorization =====

fn categorize(input: &PassInput<'_>) -> ReasoningStep {
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for record in input.records {
        let text = format!("{} {}", record.title, record.abstract_text).to_lowercase();
        let field = crate::expand::detect_field(&text);
        *buckets.entry(field.id().to_string()).or_insert(0) += 1;
    }

    let rationale = format!(
        "Classified {} papers into {} fields by title and abstract keywords",
        input.records.len(),
        buckets.len()
    );
    step(
        1,
        StepKind::Categorization,
        "Categorize papers by research field",
        json!({ "categories": buckets }),
        0.85,
        rationale,
    )
}

// ===== Pass 2: theme identification =====

fn identify_themes(input: &PassInput<'_>) -> ReasoningStep {
    let total = input.records.len().max(1);
    let themes: Vec<serde_json::Value> = token_frequencies(input.records, 4)
        .into_iter()
        .take(20)
        .map(|(term, count)| {
            json!({
                "term": term,
                "count": count,
                "share": count as f64 / total as f64,
            })
        })
        .collect();

    let rationale = format!("Top {} recurring terms across titles and abstracts", themes.len());
    step(
        2,
        StepKind::ThemeIdentification,
        "Identify dominant themes",
        json!({ "themes": themes }),
        0.80,
        rationale,
    )
}

// ===== Pass 3: conflict detection =====

fn detect_conflicts(input: &PassInput<'_>) -> ReasoningStep {
    let mut groups: BTreeMap<String, Vec<&PaperRecord>> = BTreeMap::new();
    for record in input.records {
        if let Some(topic) = dominant_topic(record) {
            groups.entry(topic).or_default().push(record);
        }
    }

    let mut conflicts = Vec::new();
    for (topic, members) in &groups {
        if members.len() < 2 {
            continue;
        }
        let years: Vec<i32> = members.iter().filter_map(|r| r.year).collect();
        if let (Some(&min), Some(&max)) = (years.iter().min(), years.iter().max()) {
            // A wide temporal spread on one topic flags potentially
            // superseded findings.
            if max - min > 15 {
                conflicts.push(json!({
                    "topic": topic,
                    "kind": "temporal",
                    "years": [min, max],
                }));
            }
        }
    }

    let confidence = if conflicts.is_empty() { 0.95 } else { 0.70 };
    let rationale = if conflicts.is_empty() {
        "No conflicting findings detected across topic groups".to_string()
    } else {
        format!("{} topic groups show potentially conflicting findings", conflicts.len())
    };
    step(
        3,
        StepKind::ConflictDetection,
        "Detect conflicting findings",
        json!({ "conflicts": conflicts }),
        confidence,
        rationale,
    )
}

// ===== Pass 4: cross-validation =====

fn cross_validate(input: &PassInput<'_>) -> ReasoningStep {
    let total_sources: HashSet<&str> = input
        .records
        .iter()
        .flat_map(|r| r.sources_found_in.iter().map(String::as_str))
        .collect();

    let mut claim_sources: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
    for record in input.records {
        if let Some(topic) = dominant_topic(record) {
            claim_sources
                .entry(topic)
                .or_default()
                .extend(record.sources_found_in.iter().map(String::as_str));
        }
    }

    let validated: Vec<serde_json::Value> = claim_sources
        .iter()
        .filter(|(_, sources)| sources.len() >= 2)
        .map(|(topic, sources)| {
            let mut names: Vec<&str> = sources.iter().copied().collect();
            names.sort_unstable();
            json!({ "topic": topic, "sources": names })
        })
        .collect();

    let confidence = if claim_sources.is_empty() || total_sources.is_empty() {
        0.5
    } else {
        let avg_sources = claim_sources
            .values()
            .map(|s| s.len() as f64)
            .sum::<f64>()
            / claim_sources.len() as f64;
        (0.5 + 0.5 * avg_sources / total_sources.len() as f64).min(0.95)
    };

    let rationale = format!(
        "{} of {} topics are corroborated by at least two sources",
        validated.len(),
        claim_sources.len()
    );
    step(
        4,
        StepKind::CrossValidation,
        "Cross-validate claims across sources",
        json!({ "validated": validated }),
        confidence,
        rationale,
    )
}

// ===== Pass 5: gap identification =====

fn identify_gaps(input: &PassInput<'_>) -> ReasoningStep {
    let total = input.records.len();
    let mut gaps = Vec::new();

    let mut per_year: HashMap<i32, usize> = HashMap::new();
    for record in input.records {
        if let Some(year) = record.year {
            *per_year.entry(year).or_insert(0) += 1;
        }
    }
    for year in (input.current_year - 9)..=input.current_year {
        let count = per_year.get(&year).copied().unwrap_or(0);
        if count < total / 20 {
            gaps.push(json!({
                "kind": "temporal",
                "description": format!("limited research in {year}"),
                "count": count,
            }));
        }
    }

    for concept in &input.context.analysis.related_concepts {
        let needle = concept.to_lowercase();
        let coverage = input
            .records
            .iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.abstract_text.to_lowercase().contains(&needle)
            })
            .count();
        if coverage < total / 10 {
            gaps.push(json!({
                "kind": "conceptual",
                "description": format!("limited coverage of {concept}"),
                "count": coverage,
            }));
        }
    }

    let rationale = format!("{} coverage gaps across recent years and related concepts", gaps.len());
    step(
        5,
        StepKind::GapIdentification,
        "Identify research gaps",
        json!({ "gaps": gaps }),
        0.75,
        rationale,
    )
}

// ===== Pass 6: chronological analysis =====

fn chronological_analysis(input: &PassInput<'_>) -> ReasoningStep {
    let mut per_year: BTreeMap<i32, Vec<&PaperRecord>> = BTreeMap::new();
    for record in input.records {
        if let Some(year) = record.year {
            per_year.entry(year).or_default().push(record);
        }
    }

    let mut timeline = Vec::new();
    let mut previous_themes: HashSet<String> = HashSet::new();
    for (year, members) in &per_year {
        let owned: Vec<PaperRecord> = members.iter().map(|r| (*r).clone()).collect();
        let themes: Vec<String> = token_frequencies(&owned, 4)
            .into_iter()
            .take(5)
            .map(|(term, _)| term)
            .collect();
        let emerging: Vec<&String> =
            themes.iter().filter(|t| !previous_themes.contains(*t)).collect();

        timeline.push(json!({
            "year": year,
            "papers": members.len(),
            "themes": themes,
            "emerging": emerging,
        }));
        previous_themes = themes.iter().cloned().collect();
    }

    let rationale = format!("Theme evolution across {} publication years", timeline.len());
    step(
        6,
        StepKind::ChronologicalAnalysis,
        "Trace themes over time",
        json!({ "timeline": timeline }),
        0.85,
        rationale,
    )
}

// ===== Pass 7: citation-pattern analysis =====

fn citation_patterns(input: &PassInput<'_>) -> ReasoningStep {
    let mean = if input.records.is_empty() {
        0.0
    } else {
        input
            .records
            .iter()
            .map(|r| r.citations.unwrap_or(0) as f64)
            .sum::<f64>()
            / input.records.len() as f64
    };

    let mut by_citations: Vec<&PaperRecord> = input.records.iter().collect();
    by_citations.sort_by(|a, b| b.citations.unwrap_or(0).cmp(&a.citations.unwrap_or(0)));

    let mut foundational = Vec::new();
    let mut rising = Vec::new();
    for record in by_citations.iter().take(20) {
        let citations = record.citations.unwrap_or(0) as f64;
        match record.year {
            Some(year) if citations > 2.0 * mean && year < input.current_year - 5 => {
                foundational.push(json!({ "title": record.title, "citations": citations as u64, "year": year }));
            }
            Some(year) if year >= input.current_year - 2 && citations > mean => {
                rising.push(json!({ "title": record.title, "citations": citations as u64, "year": year }));
            }
            _ => {}
        }
    }

    let rationale = format!(
        "{} foundational works and {} rising papers against a mean of {mean:.1} citations",
        foundational.len(),
        rising.len()
    );
    step(
        7,
        StepKind::CitationPatternAnalysis,
        "Analyze citation patterns",
        json!({ "mean_citations": mean, "foundational": foundational, "rising_stars": rising }),
        0.90,
        rationale,
    )
}

// ===== Pass 8: synthesis =====

fn synthesize(input: &PassInput<'_>) -> ReasoningStep {
    let confident = input.prior.iter().filter(|s| s.confidence >= 0.70).count();
    let uncertain: Vec<&str> = input
        .prior
        .iter()
        .filter(|s| s.confidence < 0.70)
        .map(|s| s.description.as_str())
        .collect();

    let sources: HashSet<&str> = input
        .records
        .iter()
        .flat_map(|r| r.sources_found_in.iter().map(String::as_str))
        .collect();
    let years: Vec<i32> = input.records.iter().filter_map(|r| r.year).collect();
    let span = match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) => json!([min, max]),
        _ => serde_json::Value::Null,
    };

    let total = input.prior.len().max(1);
    let confidence = 0.5 + 0.5 * confident as f64 / total as f64;
    let rationale = format!(
        "{confident} of {} analysis steps reached the confirmation threshold",
        input.prior.len()
    );
    step(
        8,
        StepKind::Synthesis,
        "Synthesize findings",
        json!({
            "total_papers": input.records.len(),
            "distinct_sources": sources.len(),
            "year_span": span,
            "confirmed_steps": confident,
            "uncertain_steps": uncertain,
        }),
        confidence,
        rationale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand;
    use crate::models::{RecordBuilder, ResearchContext};

    const YEAR: i32 = 2026;

    fn context() -> ResearchContext {
        ResearchContext::new("widget research", expand::analyze("widget research"))
    }

    fn input<'a>(
        records: &'a [PaperRecord],
        context: &'a ResearchContext,
        prior: &'a [ReasoningStep],
    ) -> PassInput<'a> {
        PassInput {
            records,
            context,
            prior,
            current_year: YEAR,
        }
    }

    fn corpus() -> Vec<PaperRecord> {
        (0..10)
            .map(|i| {
                let mut record = RecordBuilder::new(
                    format!("Widget optimization study {i}"),
                    if i % 2 == 0 { "pubmed" } else { "arxiv" },
                )
                .abstract_text("Widget optimization across benchmark systems.")
                .year(2020 + (i as i32 % 4))
                .citations((i as u32) * 30)
                .build();
                if i % 3 == 0 {
                    record.add_source("crossref");
                }
                record
            })
            .collect()
    }

    #[test]
    fn test_themes_descending_and_bounded() {
        let records = corpus();
        let ctx = context();
        let step = identify_themes(&input(&records, &ctx, &[]));

        let themes = step.result["themes"].as_array().unwrap();
        assert!(themes.len() <= 20);
        let counts: Vec<u64> = themes.iter().map(|t| t["count"].as_u64().unwrap()).collect();
        let mut sorted = counts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(counts, sorted, "themes must be in descending frequency order");
    }

    #[test]
    fn test_chronological_years_non_decreasing() {
        let records = corpus();
        let ctx = context();
        let step = chronological_analysis(&input(&records, &ctx, &[]));

        let timeline = step.result["timeline"].as_array().unwrap();
        assert_eq!(timeline.len(), 4);
        let years: Vec<i64> = timeline.iter().map(|e| e["year"].as_i64().unwrap()).collect();
        let mut sorted = years.clone();
        sorted.sort_unstable();
        assert_eq!(years, sorted);
    }

    #[test]
    fn test_conflict_confidence_depends_on_findings() {
        let ctx = context();

        let calm = corpus();
        let step = detect_conflicts(&input(&calm, &ctx, &[]));
        assert_eq!(step.confidence, 0.95);

        let contested = vec![
            RecordBuilder::new("Widget theory", "a").year(1990).build(),
            RecordBuilder::new("Widget theory revisited", "b").year(2024).build(),
        ];
        let step = detect_conflicts(&input(&contested, &ctx, &[]));
        assert_eq!(step.confidence, 0.70);
        assert!(!step.result["conflicts"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_cross_validation_needs_two_sources() {
        let ctx = context();
        let mut single = RecordBuilder::new("Widget claims", "pubmed").build();
        let step = cross_validate(&input(std::slice::from_ref(&single), &ctx, &[]));
        assert!(step.result["validated"].as_array().unwrap().is_empty());

        single.add_source("crossref");
        let records = [single];
        let step = cross_validate(&input(&records, &ctx, &[]));
        assert_eq!(step.result["validated"].as_array().unwrap().len(), 1);
        assert!(step.confidence <= 0.95);
    }

    #[test]
    fn test_citation_patterns_classifies() {
        let ctx = context();
        let records = vec![
            RecordBuilder::new("Old foundational work", "a").year(2005).citations(900).build(),
            RecordBuilder::new("Brand new hit", "b").year(YEAR - 1).citations(500).build(),
            RecordBuilder::new("Quiet paper", "c").year(2020).citations(1).build(),
        ];

        let step = citation_patterns(&input(&records, &ctx, &[]));
        let foundational = step.result["foundational"].as_array().unwrap();
        let rising = step.result["rising_stars"].as_array().unwrap();
        assert_eq!(foundational.len(), 1);
        assert_eq!(foundational[0]["title"], "Old foundational work");
        assert_eq!(rising.len(), 1);
        assert_eq!(rising[0]["title"], "Brand new hit");
    }

    #[test]
    fn test_synthesis_partitions_by_confidence() {
        let ctx = context();
        let records = corpus();
        let prior = vec![
            step(1, StepKind::Categorization, "a", json!({}), 0.9, String::new()),
            step(2, StepKind::ThemeIdentification, "b", json!({}), 0.4, String::new()),
        ];

        let result = synthesize(&input(&records, &ctx, &prior));
        assert_eq!(result.result["confirmed_steps"], 1);
        assert_eq!(result.result["uncertain_steps"].as_array().unwrap().len(), 1);
        assert!((result.confidence - 0.75).abs() < 1e-9);
    }
}
