//! Reliability scoring: additive trust components, independent of
//! relevance.

use chrono::Datelike;

use crate::models::{PaperRecord, ReliabilityComponents, ReliabilityScore};

/// Journals whose presence alone earns the full reputation component.
const HIGH_IMPACT_JOURNALS: &[&str] = &[
    "nature",
    "science",
    "cell",
    "the lancet",
    "lancet",
    "new england journal of medicine",
    "jama",
    "bmj",
    "nature medicine",
    "nature genetics",
    "proceedings of the national academy of sciences",
    "pnas",
    "physical review letters",
    "journal of the american chemical society",
    "angewandte chemie",
];

/// Publishers counted as reputable when the journal itself is unknown.
const REPUTABLE_PUBLISHERS: &[&str] = &[
    "springer",
    "elsevier",
    "wiley",
    "american chemical society",
    "royal society of chemistry",
    "ieee",
    "oxford university press",
    "cambridge university press",
    "plos",
    "frontiers",
    "bmc",
];

const PREPRINT_SOURCES: &[&str] = &["arxiv", "biorxiv", "medrxiv", "chemrxiv", "ssrn"];

/// Maximum total deduction for asserted contradictions.
const MAX_CONTRADICTION_PENALTY: f64 = 0.25;

/// Publication venue class, inferred from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VenueClass {
    PeerReviewed,
    Conference,
    Preprint,
    Unknown,
}

/// Score every record in place. `contradictions` is the per-record
/// count of contradicting claims asserted downstream; pass an empty
/// slice when none are known.
pub fn score_all(records: &mut [PaperRecord]) {
    let year = chrono::Utc::now().year();
    for record in records.iter_mut() {
        let score = score_at(record, 0, year);
        record.reliability = Some(score);
    }
}

/// Score a single record with an explicit contradiction count and
/// reference year.
pub fn score_at(record: &PaperRecord, contradictions: usize, current_year: i32) -> ReliabilityScore {
    // Retraction overrides everything.
    if record.retracted {
        return ReliabilityScore::new(0.0, ReliabilityComponents::default());
    }

    let components = ReliabilityComponents {
        peer_review: peer_review_component(record),
        journal_reputation: journal_component(record),
        citation_impact: citation_component(record.citations),
        cross_source: cross_source_component(record.sources_found_in.len()),
        recency: recency_component(record.year, current_year),
        penalty: (0.05 * contradictions as f64).min(MAX_CONTRADICTION_PENALTY),
    };

    let total = components.peer_review
        + components.journal_reputation
        + components.citation_impact
        + components.cross_source
        + components.recency
        - components.penalty;

    ReliabilityScore::new(total, components)
}

fn classify_venue(record: &PaperRecord) -> VenueClass {
    let is_preprint_source = record
        .sources_found_in
        .iter()
        .any(|s| PREPRINT_SOURCES.contains(&s.as_str()))
        || record.arxiv_id.is_some();

    match &record.journal {
        Some(journal) => {
            let lower = journal.to_lowercase();
            if lower.contains("proceedings")
                || lower.contains("conference")
                || lower.contains("workshop")
                || lower.contains("symposium")
            {
                VenueClass::Conference
            } else {
                VenueClass::PeerReviewed
            }
        }
        None if is_preprint_source => VenueClass::Preprint,
        None => VenueClass::Unknown,
    }
}

fn peer_review_component(record: &PaperRecord) -> f64 {
    match classify_venue(record) {
        VenueClass::PeerReviewed => 0.30,
        VenueClass::Conference => 0.20,
        VenueClass::Preprint => 0.10,
        VenueClass::Unknown => 0.05,
    }
}

fn journal_component(record: &PaperRecord) -> f64 {
    if let Some(journal) = &record.journal {
        let lower = journal.to_lowercase();
        if HIGH_IMPACT_JOURNALS.iter().any(|j| lower == *j) {
            return 0.20;
        }
    }
    if let Some(publisher) = &record.publisher {
        let lower = publisher.to_lowercase();
        if REPUTABLE_PUBLISHERS.iter().any(|p| lower.contains(p)) {
            return 0.15;
        }
    }
    if record.journal.as_deref().is_some_and(|j| !j.is_empty()) {
        0.10
    } else {
        0.0
    }
}

fn citation_component(citations: Option<u32>) -> f64 {
    match citations.unwrap_or(0) {
        c if c >= 500 => 0.20,
        c if c >= 100 => 0.15,
        c if c >= 25 => 0.10,
        c if c >= 5 => 0.05,
        c if c >= 1 => 0.02,
        _ => 0.0,
    }
}

fn cross_source_component(sources: usize) -> f64 {
    match sources {
        s if s >= 5 => 0.20,
        s if s >= 3 => 0.15,
        2 => 0.10,
        _ => 0.05,
    }
}

fn recency_component(year: Option<i32>, current_year: i32) -> f64 {
    let Some(year) = year else { return 0.02 };
    match current_year - year {
        a if a <= 2 => 0.10,
        a if a <= 5 => 0.07,
        a if a <= 10 => 0.04,
        _ => 0.02,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, ReliabilityBand};

    const YEAR: i32 = 2026;

    #[test]
    fn test_nature_paper_scores_high() {
        let record = RecordBuilder::new("Landmark result", "pubmed")
            .journal("Nature")
            .citations(800)
            .year(YEAR - 5)
            .build();
        let mut record = record;
        record.add_source("crossref");
        record.add_source("openalex");
        record.add_source("scopus");

        let score = score_at(&record, 0, YEAR);
        assert!((score.score - 0.92).abs() < 1e-9);
        assert_eq!(score.band, ReliabilityBand::High);
    }

    #[test]
    fn test_fresh_preprint_scores_low() {
        let record = RecordBuilder::new("New preprint", "arxiv")
            .arxiv_id("2601.00001")
            .citations(3)
            .year(YEAR)
            .build();

        let score = score_at(&record, 0, YEAR);
        assert!((score.score - 0.27).abs() < 1e-9);
        assert_eq!(score.band, ReliabilityBand::Low);
    }

    #[test]
    fn test_retraction_forces_zero() {
        let record = RecordBuilder::new("Retracted landmark", "pubmed")
            .journal("Nature")
            .citations(5000)
            .year(YEAR - 1)
            .retracted(true)
            .build();

        let score = score_at(&record, 0, YEAR);
        assert_eq!(score.score, 0.0);
        assert_eq!(score.band, ReliabilityBand::Low);
    }

    #[test]
    fn test_contradiction_penalty_capped() {
        let record = RecordBuilder::new("Contested", "pubmed")
            .journal("Nature")
            .citations(800)
            .year(YEAR - 1)
            .build();

        let clean = score_at(&record, 0, YEAR).score;
        let two = score_at(&record, 2, YEAR).score;
        assert!((clean - two - 0.10).abs() < 1e-9);

        // Ten contradictions hit the 0.25 cap, not 0.50.
        let many = score_at(&record, 10, YEAR).score;
        assert!((clean - many - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_conference_venue() {
        let record = RecordBuilder::new("Systems paper", "crossref")
            .journal("Proceedings of SOSP")
            .build();
        let score = score_at(&record, 0, YEAR);
        assert_eq!(score.components.peer_review, 0.20);
    }

    #[test]
    fn test_publisher_reputation_without_known_journal() {
        let record = RecordBuilder::new("Obscure venue", "crossref")
            .journal("Journal of Applied Widgetry")
            .publisher("Elsevier BV")
            .build();
        let score = score_at(&record, 0, YEAR);
        assert_eq!(score.components.journal_reputation, 0.15);
    }

    #[test]
    fn test_scores_bounded() {
        let records = [
            RecordBuilder::new("A", "pubmed").journal("Nature").citations(10_000).year(YEAR).build(),
            RecordBuilder::new("B", "base").build(),
        ];
        for record in &records {
            let score = score_at(record, 0, YEAR);
            assert!((0.0..=1.0).contains(&score.score));
        }
    }

    #[test]
    fn test_score_all_populates_reliability() {
        let mut records = vec![RecordBuilder::new("A", "pubmed").journal("Nature").build()];
        score_all(&mut records);
        assert!(records[0].reliability.is_some());
    }
}
