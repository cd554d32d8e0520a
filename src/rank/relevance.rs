//! Relevance ranking: a weighted sum of six fixed components.

use std::collections::HashSet;

use chrono::Datelike;

use crate::models::{AccessType, PaperRecord, QueryAnalysis};
use crate::utils::text::tokenize;

const WEIGHT_QUERY_MATCH: f64 = 0.30;
const WEIGHT_CITATIONS: f64 = 0.20;
const WEIGHT_RECENCY: f64 = 0.15;
const WEIGHT_AUTHORITY: f64 = 0.15;
const WEIGHT_OPEN_ACCESS: f64 = 0.10;
const WEIGHT_FULLTEXT: f64 = 0.10;

/// Score and sort records in place, most relevant first. Deterministic
/// for identical inputs; ties break by citation count, then year, then
/// insertion order.
pub fn rank(records: &mut Vec<PaperRecord>, analysis: &QueryAnalysis) {
    rank_at(records, analysis, chrono::Utc::now().year());
}

pub(crate) fn rank_at(records: &mut Vec<PaperRecord>, analysis: &QueryAnalysis, current_year: i32) {
    let query_terms: HashSet<String> = tokenize(&analysis.original, 2).into_iter().collect();
    let mut expanded_terms = query_terms.clone();
    for concept in &analysis.related_concepts {
        expanded_terms.extend(tokenize(concept, 2));
    }

    let max_citations = records
        .iter()
        .filter_map(|r| r.citations)
        .max()
        .unwrap_or(0);

    for record in records.iter_mut() {
        record.relevance = score(record, &query_terms, &expanded_terms, max_citations, current_year);
    }

    // Stable sort keeps insertion order as the final tiebreak.
    records.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| b.citations.unwrap_or(0).cmp(&a.citations.unwrap_or(0)))
            .then_with(|| b.year.unwrap_or(i32::MIN).cmp(&a.year.unwrap_or(i32::MIN)))
    });
}

fn score(
    record: &PaperRecord,
    query_terms: &HashSet<String>,
    expanded_terms: &HashSet<String>,
    max_citations: u32,
    current_year: i32,
) -> f64 {
    let query_match = 0.6 * field_match(&record.title, query_terms, expanded_terms)
        + 0.4 * field_match(&record.abstract_text, query_terms, expanded_terms);

    let total = WEIGHT_QUERY_MATCH * query_match
        + WEIGHT_CITATIONS * citation_impact(record.citations, max_citations)
        + WEIGHT_RECENCY * recency(record.year, current_year)
        + WEIGHT_AUTHORITY * best_authority(record)
        + WEIGHT_OPEN_ACCESS * open_access_bonus(record)
        + WEIGHT_FULLTEXT * fulltext_availability(record);

    total.clamp(0.0, 1.0)
}

/// `0.7 * exact/|Q| + 0.3 * expanded/|E|` over whitespace tokens of
/// length > 2.
fn field_match(
    text: &str,
    query_terms: &HashSet<String>,
    expanded_terms: &HashSet<String>,
) -> f64 {
    if text.is_empty() || query_terms.is_empty() {
        return 0.0;
    }
    let tokens: HashSet<String> = tokenize(text, 2).into_iter().collect();

    let exact = query_terms.intersection(&tokens).count() as f64 / query_terms.len() as f64;
    let expanded = if expanded_terms.is_empty() {
        0.0
    } else {
        expanded_terms.intersection(&tokens).count() as f64 / expanded_terms.len() as f64
    };

    0.7 * exact + 0.3 * expanded
}

/// `log(1 + 100 * c / max) / log(101)`, clamped to [0, 1].
fn citation_impact(citations: Option<u32>, max_citations: u32) -> f64 {
    let Some(citations) = citations else { return 0.0 };
    if max_citations == 0 {
        return 0.0;
    }
    let scaled = 100.0 * citations as f64 / max_citations as f64;
    ((1.0 + scaled).ln() / 101f64.ln()).clamp(0.0, 1.0)
}

/// Step function of publication age; missing year scores zero.
fn recency(year: Option<i32>, current_year: i32) -> f64 {
    let Some(year) = year else { return 0.0 };
    let age = current_year - year;
    match age {
        a if a <= 0 => 1.0,
        a if a <= 2 => 0.95,
        a if a <= 5 => 0.85,
        a if a <= 10 => 0.70,
        a if a <= 20 => 0.50,
        a => (0.50 - 0.02 * (a - 20) as f64).max(0.2),
    }
}

/// Fixed per-source authority table; unknown sources score 0.60. A
/// record observed in several sources gets its best one.
fn best_authority(record: &PaperRecord) -> f64 {
    record
        .sources_found_in
        .iter()
        .map(|source| source_authority(source))
        .fold(source_authority(&record.primary_source), f64::max)
}

pub(crate) fn source_authority(source: &str) -> f64 {
    match source {
        "pubmed" | "scopus" | "wos" | "nature" | "science" | "cell" => 0.95,
        "semantic_scholar" | "google_scholar" => 0.90,
        "crossref" | "openalex" | "springer" | "ieee" => 0.88,
        "europe_pmc" | "dimensions" => 0.85,
        "arxiv" => 0.82,
        "base" | "core" | "doaj" => 0.80,
        "biorxiv" | "medrxiv" => 0.75,
        "chemrxiv" | "ssrn" => 0.70,
        _ => 0.60,
    }
}

fn open_access_bonus(record: &PaperRecord) -> f64 {
    if record.access == AccessType::Open {
        1.0
    } else if record.pdf_url.is_some() {
        0.7
    } else {
        0.0
    }
}

fn fulltext_availability(record: &PaperRecord) -> f64 {
    if record.pdf_url.is_some() {
        1.0
    } else if record.arxiv_id.is_some()
        || (record.pmid.is_some() && record.access == AccessType::Open)
    {
        0.8
    } else {
        0.0
    }
}
