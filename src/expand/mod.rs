//! Query analysis and expansion.
//!
//! A pure, deterministic layer: the raw query is classified into a
//! research field and an intent, enriched with canned per-field
//! concepts, and turned into a bounded list of query variations that
//! seed the fan-out. No I/O, no failure modes.

use chrono::Datelike;

use crate::models::{QueryAnalysis, QueryType, ResearchField};
use crate::utils::text::{is_stop_word, tokenize};

/// Upper bound on generated variations, original included.
const MAX_VARIATIONS: usize = 15;
/// Upper bound on related concepts attached to an analysis.
const MAX_RELATED: usize = 8;

/// Field vocabularies, tested in declared order; first match wins.
const FIELD_VOCABULARY: &[(ResearchField, &[&str])] = &[
    (
        ResearchField::MedicineBiology,
        &[
            "gene", "genome", "crispr", "dna", "rna", "protein", "cell", "cancer", "tumor",
            "disease", "clinical", "patient", "therapy", "drug", "vaccine", "immune", "medical",
            "medicine", "biology", "microbiome", "neuron", "epidemiology",
        ],
    ),
    (
        ResearchField::Physics,
        &[
            "quantum", "particle", "photon", "relativity", "cosmology", "plasma", "superconduct",
            "gravitational", "boson", "neutrino", "optics", "thermodynamics", "physics",
        ],
    ),
    (
        ResearchField::Chemistry,
        &[
            "molecule", "catalyst", "polymer", "synthesis", "organic", "inorganic",
            "electrochemical", "reaction", "compound", "spectroscopy", "chemistry", "chemical",
        ],
    ),
    (
        ResearchField::ComputerScience,
        &[
            "algorithm", "neural", "machine learning", "deep learning", "software", "compiler",
            "database", "network protocol", "artificial intelligence", "computer", "computing",
            "transformer", "reinforcement",
        ],
    ),
    (
        ResearchField::Engineering,
        &[
            "turbine", "structural", "mechanical", "aerospace", "robotics", "manufacturing",
            "materials", "engineering", "sensor", "control system",
        ],
    ),
    (
        ResearchField::SocialScience,
        &[
            "economic", "policy", "education", "sociology", "psychology", "political",
            "demographic", "survey", "behavioral", "social",
        ],
    ),
];

/// Related concepts appended to analyses, per field.
const RELATED_CONCEPTS: &[(ResearchField, &[&str])] = &[
    (
        ResearchField::MedicineBiology,
        &[
            "clinical trial", "gene expression", "biomarkers", "pathogenesis", "treatment",
            "drug discovery", "genomics", "immunotherapy",
        ],
    ),
    (
        ResearchField::Physics,
        &[
            "quantum mechanics", "field theory", "condensed matter", "simulation",
            "experimental validation", "symmetry breaking",
        ],
    ),
    (
        ResearchField::Chemistry,
        &[
            "catalysis", "molecular dynamics", "characterization", "green chemistry",
            "reaction mechanism", "materials synthesis",
        ],
    ),
    (
        ResearchField::ComputerScience,
        &[
            "machine learning", "optimization", "benchmark", "scalability", "neural networks",
            "distributed systems",
        ],
    ),
    (
        ResearchField::Engineering,
        &[
            "finite element", "prototyping", "reliability", "optimization", "simulation",
        ],
    ),
    (
        ResearchField::SocialScience,
        &[
            "longitudinal study", "survey data", "intervention", "policy analysis",
            "qualitative methods",
        ],
    ),
    (
        ResearchField::General,
        &["methodology", "state of the art", "applications"],
    ),
];

/// Short augmentation suffixes used only for variation generation.
const FIELD_AUGMENTATIONS: &[(ResearchField, &[&str])] = &[
    (ResearchField::MedicineBiology, &["clinical outcomes", "mechanism", "in vivo"]),
    (ResearchField::Physics, &["theory", "experiment", "measurement"]),
    (ResearchField::Chemistry, &["synthesis", "characterization", "kinetics"]),
    (ResearchField::ComputerScience, &["algorithm", "evaluation", "implementation"]),
    (ResearchField::Engineering, &["design", "testing", "performance"]),
    (ResearchField::SocialScience, &["case study", "empirical analysis"]),
    (ResearchField::General, &["analysis", "framework"]),
];

/// Query-intent vocabulary, tested in declared order.
const QUERY_TYPE_VOCABULARY: &[(QueryType, &[&str])] = &[
    (QueryType::MetaAnalysis, &["meta-analysis", "meta analysis", "systematic review"]),
    (QueryType::Review, &["review", "overview", "survey", "state of the art"]),
    (QueryType::Methodology, &["method", "protocol", "technique", "how to", "approach"]),
    (QueryType::Comparison, &["versus", " vs ", "compared", "comparison", "difference between"]),
];

/// Analyze a raw query into keywords, field, concepts, and intent.
pub fn analyze(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();

    let mut keywords = Vec::new();
    for token in tokenize(&lower, 2) {
        if !is_stop_word(&token) && !keywords.contains(&token) {
            keywords.push(token);
        }
    }

    let field = detect_field(&lower);
    let related_concepts = related_concepts(field)
        .iter()
        .map(|c| c.to_string())
        .take(MAX_RELATED)
        .collect();

    QueryAnalysis {
        original: query.to_string(),
        keywords,
        field,
        related_concepts,
        query_type: detect_query_type(&lower),
    }
}

/// First field whose vocabulary matches wins; default is general.
pub fn detect_field(lower_query: &str) -> ResearchField {
    for (field, vocabulary) in FIELD_VOCABULARY {
        if vocabulary.iter().any(|term| lower_query.contains(term)) {
            return *field;
        }
    }
    ResearchField::General
}

fn detect_query_type(lower_query: &str) -> QueryType {
    for (query_type, vocabulary) in QUERY_TYPE_VOCABULARY {
        if vocabulary.iter().any(|term| lower_query.contains(term)) {
            return *query_type;
        }
    }
    QueryType::Exploratory
}

fn related_concepts(field: ResearchField) -> &'static [&'static str] {
    RELATED_CONCEPTS
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, concepts)| *concepts)
        .unwrap_or(&[])
}

fn augmentations(field: ResearchField) -> &'static [&'static str] {
    FIELD_AUGMENTATIONS
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, terms)| *terms)
        .unwrap_or(&[])
}

/// Generate up to fifteen distinct query variations, original first.
pub fn variations(analysis: &QueryAnalysis) -> Vec<String> {
    variations_at(analysis, chrono::Utc::now().year())
}

pub(crate) fn variations_at(analysis: &QueryAnalysis, current_year: i32) -> Vec<String> {
    let base = analysis.original.trim();
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if out.len() < MAX_VARIATIONS && !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    push(base.to_string());
    push(format!("{base} review"));
    push(format!("{base} systematic review"));
    push(format!("{base} meta-analysis"));
    push(format!("{base} {current_year}"));
    push(format!("{base} {}", current_year - 1));

    for concept in &analysis.related_concepts {
        push(format!("{base} {}", concept.trim()));
    }
    for augmentation in augmentations(analysis.field).iter().take(3) {
        push(format!("{base} {augmentation}"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_detection_first_match_wins() {
        assert_eq!(detect_field("crispr gene therapy"), ResearchField::MedicineBiology);
        assert_eq!(detect_field("quantum error correction"), ResearchField::Physics);
        assert_eq!(detect_field("deep learning compilers"), ResearchField::ComputerScience);
        assert_eq!(detect_field("municipal bond pricing"), ResearchField::General);
        // "quantum chemistry" hits the physics vocabulary first, by order.
        assert_eq!(detect_field("quantum chemistry"), ResearchField::Physics);
    }

    #[test]
    fn test_query_type_detection() {
        assert_eq!(analyze("CRISPR systematic review").query_type, QueryType::MetaAnalysis);
        assert_eq!(analyze("a survey of transformers").query_type, QueryType::Review);
        assert_eq!(analyze("protocol for rna extraction").query_type, QueryType::Methodology);
        assert_eq!(analyze("bert versus gpt").query_type, QueryType::Comparison);
        assert_eq!(analyze("dark matter halos").query_type, QueryType::Exploratory);
    }

    #[test]
    fn test_keywords_filter_stop_words() {
        let analysis = analyze("the role of the microbiome in the gut");
        assert!(analysis.keywords.contains(&"microbiome".to_string()));
        assert!(analysis.keywords.contains(&"gut".to_string()));
        assert!(!analysis.keywords.contains(&"the".to_string()));
        // order preserved, no duplicates
        assert_eq!(
            analysis.keywords.iter().filter(|k| *k == "role").count(),
            1
        );
    }

    #[test]
    fn test_crispr_expansion() {
        let analysis = analyze("CRISPR gene therapy");
        assert_eq!(analysis.field, ResearchField::MedicineBiology);
        assert!(analysis.related_concepts.len() <= 8);

        let variations = variations_at(&analysis, 2026);
        assert_eq!(variations[0], "CRISPR gene therapy");
        assert!(variations.contains(&"CRISPR gene therapy review".to_string()));
        assert!(variations.contains(&"CRISPR gene therapy meta-analysis".to_string()));
        assert!(variations.contains(&"CRISPR gene therapy 2026".to_string()));
        assert!(variations.contains(&"CRISPR gene therapy 2025".to_string()));
    }

    #[test]
    fn test_variations_bounded_and_distinct() {
        let analysis = analyze("machine learning optimization methods");
        let variations = variations_at(&analysis, 2026);

        assert!(variations.len() <= 15);
        let mut sorted = variations.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), variations.len(), "variations must be distinct");
    }
}
