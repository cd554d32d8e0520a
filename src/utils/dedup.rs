//! Multi-layer deduplication of records gathered across sources.
//!
//! The fold runs in three layers: records carrying a DOI collapse by
//! normalized DOI; records without one collapse by PubMed or arXiv id;
//! whatever remains, plus every survivor of the first two layers, is
//! checked by title equivalence against the accumulating unique set.
//! Duplicate pairs are merged field by field (see
//! [`PaperRecord::merge_from`]).

use std::collections::HashMap;

use crate::models::PaperRecord;
use crate::utils::text::{
    jaccard, normalize_arxiv_id, normalize_doi, normalize_title, title_token_set,
};

/// Fold a raw record list into a unique set.
///
/// Output order: DOI-keyed survivors first, then PubMed/arXiv-keyed,
/// then title-only records, each group in insertion order. The fold is
/// idempotent.
pub fn dedup_records(records: Vec<PaperRecord>) -> Vec<PaperRecord> {
    if records.len() <= 1 {
        return records;
    }

    // Layer 1: collapse by normalized DOI.
    let mut doi_kept: Vec<PaperRecord> = Vec::new();
    let mut doi_index: HashMap<String, usize> = HashMap::new();
    let mut no_doi: Vec<PaperRecord> = Vec::new();

    for record in records {
        let doi_key = record
            .doi
            .as_deref()
            .map(normalize_doi)
            .filter(|d| !d.is_empty());

        match doi_key {
            Some(key) => match doi_index.get(&key) {
                Some(&i) => doi_kept[i].merge_from(record),
                None => {
                    doi_index.insert(key, doi_kept.len());
                    doi_kept.push(record);
                }
            },
            None => no_doi.push(record),
        }
    }

    // Layer 2: collapse DOI-less records by PubMed id or arXiv id. A
    // record carrying both ids registers under both keys so either
    // alias folds into the same survivor.
    let mut id_kept: Vec<PaperRecord> = Vec::new();
    let mut pmid_index: HashMap<String, usize> = HashMap::new();
    let mut arxiv_index: HashMap<String, usize> = HashMap::new();
    let mut title_only: Vec<PaperRecord> = Vec::new();

    for record in no_doi {
        let pmid = record.pmid.clone().filter(|p| !p.is_empty());
        let arxiv = record
            .arxiv_id
            .as_deref()
            .map(normalize_arxiv_id)
            .filter(|a| !a.is_empty());

        if pmid.is_none() && arxiv.is_none() {
            title_only.push(record);
            continue;
        }

        let existing = pmid
            .as_ref()
            .and_then(|p| pmid_index.get(p).copied())
            .or_else(|| arxiv.as_ref().and_then(|a| arxiv_index.get(a).copied()));

        match existing {
            Some(i) => id_kept[i].merge_from(record),
            None => {
                let i = id_kept.len();
                if let Some(p) = pmid {
                    pmid_index.insert(p, i);
                }
                if let Some(a) = arxiv {
                    arxiv_index.insert(a, i);
                }
                id_kept.push(record);
            }
        }
    }

    // Layer 3: title fold over everything, catching cross-identifier
    // duplicates among the layer 1/2 survivors as well. Sharded by the
    // first title token to stay near-linear.
    let mut unique: Vec<PaperRecord> = Vec::new();
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();

    for record in doi_kept.into_iter().chain(id_kept).chain(title_only) {
        let normalized = normalize_title(&record.title);

        let matched = first_title_token(&normalized).and_then(|token| {
            buckets.get(token).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| titles_equivalent(&record, &normalized, &unique[i]))
            })
        });

        match matched {
            Some(i) => unique[i].merge_from(record),
            None => {
                let i = unique.len();
                if let Some(token) = first_title_token(&normalized) {
                    buckets.entry(token.to_string()).or_default().push(i);
                }
                unique.push(record);
            }
        }
    }

    unique
}

fn first_title_token(normalized_title: &str) -> Option<&str> {
    normalized_title.split_whitespace().next()
}

/// Title-layer duplicate test: exact normalized match, near-total token
/// overlap, or strong overlap corroborated by year and first author.
fn titles_equivalent(candidate: &PaperRecord, candidate_title: &str, kept: &PaperRecord) -> bool {
    if candidate_title.is_empty() {
        return false;
    }

    let kept_title = normalize_title(&kept.title);
    if kept_title.is_empty() {
        return false;
    }

    if candidate_title == kept_title {
        return true;
    }

    let candidate_tokens = title_token_set(&candidate.title);
    let kept_tokens = title_token_set(&kept.title);
    let similarity = jaccard(&candidate_tokens, &kept_tokens);

    if similarity >= 0.95 {
        return true;
    }

    similarity >= 0.90
        && candidate.year.is_some()
        && candidate.year == kept.year
        && candidate.first_author_surname().is_some()
        && candidate.first_author_surname() == kept.first_author_surname()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;

    #[test]
    fn test_doi_fold_merges_fields() {
        let records = vec![
            RecordBuilder::new("Genome engineering", "pubmed")
                .doi("10.1038/nature12373")
                .abstract_text("foo")
                .citations(100)
                .build(),
            RecordBuilder::new("Genome engineering", "crossref")
                .doi("https://doi.org/10.1038/NATURE12373")
                .abstract_text("foo bar baz")
                .citations(150)
                .build(),
        ];

        let unique = dedup_records(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].abstract_text, "foo bar baz");
        assert_eq!(unique[0].citations, Some(150));
        assert_eq!(unique[0].primary_source, "pubmed");
        assert_eq!(unique[0].sources_found_in, vec!["pubmed", "crossref"]);
    }

    #[test]
    fn test_pmid_and_arxiv_fold() {
        let records = vec![
            RecordBuilder::new("Quantum widgets", "pubmed").pmid("1234").build(),
            RecordBuilder::new("Quantum widgets", "europe_pmc").pmid("1234").build(),
            RecordBuilder::new("Tensor gadgets", "arxiv")
                .arxiv_id("2301.00001v1")
                .build(),
            RecordBuilder::new("Tensor gadgets", "semantic_scholar")
                .arxiv_id("arXiv:2301.00001v2")
                .build(),
        ];

        let unique = dedup_records(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].pmid.as_deref(), Some("1234"));
        assert_eq!(unique[1].sources_found_in.len(), 2);
    }

    #[test]
    fn test_title_fold_collapses_across_identifiers() {
        let records = vec![
            RecordBuilder::new("A Study of Widgets", "crossref")
                .doi("10.1/x")
                .year(2020)
                .authors(["Smith", "Jones"])
                .build(),
            RecordBuilder::new("a study of widgets", "pubmed")
                .pmid("1234")
                .year(2020)
                .authors(["Smith", "Lee"])
                .build(),
        ];

        let unique = dedup_records(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].doi.as_deref(), Some("10.1/x"));
        assert_eq!(unique[0].pmid.as_deref(), Some("1234"));
    }

    #[test]
    fn test_token_overlap_thresholds() {
        // Same token set in a different order collapses outright.
        let unique = dedup_records(vec![
            RecordBuilder::new("beta alpha gamma", "s1").build(),
            RecordBuilder::new("alpha beta gamma", "s2").build(),
        ]);
        assert_eq!(unique.len(), 1);

        // 9 shared tokens out of 11 in the union: similarity ~0.82,
        // below both bars, so the records stay distinct.
        let title_a = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let title_b = "alpha beta gamma delta epsilon zeta eta theta iota lambda";
        let unique = dedup_records(vec![
            RecordBuilder::new(title_a, "s1").year(2021).authors(["Jane Smith"]).build(),
            RecordBuilder::new(title_b, "s2").year(2021).authors(["Jane Smith"]).build(),
        ]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_records_without_titles_do_not_collapse() {
        let records = vec![
            RecordBuilder::new("", "crossref").doi("10.1/a").build(),
            RecordBuilder::new("", "crossref").doi("10.1/b").build(),
        ];
        let unique = dedup_records(records);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_no_doi_collisions_after_fold() {
        let records = vec![
            RecordBuilder::new("One", "s1").doi("10.1/a").build(),
            RecordBuilder::new("Two", "s2").doi("10.1/b").build(),
            RecordBuilder::new("One", "s3").doi("10.1/A").build(),
        ];

        let unique = dedup_records(records);
        assert_eq!(unique.len(), 2);
        for i in 0..unique.len() {
            for j in (i + 1)..unique.len() {
                let (a, b) = (&unique[i], &unique[j]);
                if let (Some(da), Some(db)) = (a.doi.as_deref(), b.doi.as_deref()) {
                    assert_ne!(normalize_doi(da), normalize_doi(db));
                }
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            RecordBuilder::new("A Study of Widgets", "s1")
                .doi("10.1/x")
                .year(2020)
                .authors(["Smith"])
                .build(),
            RecordBuilder::new("a study of widgets", "s2")
                .pmid("1234")
                .year(2020)
                .authors(["Smith"])
                .build(),
            RecordBuilder::new("Unrelated paper", "s3").build(),
        ];

        let once = dedup_records(records);
        let twice = dedup_records(once.clone());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.title, b.title);
            assert_eq!(a.doi, b.doi);
            assert_eq!(a.sources_found_in, b.sources_found_in);
        }
    }

    #[test]
    fn test_output_ordering() {
        let records = vec![
            RecordBuilder::new("Title only", "s1").build(),
            RecordBuilder::new("Arxiv paper", "s2").arxiv_id("2301.1").build(),
            RecordBuilder::new("Doi paper", "s3").doi("10.1/z").build(),
        ];

        let unique = dedup_records(records);
        assert_eq!(unique[0].title, "Doi paper");
        assert_eq!(unique[1].title, "Arxiv paper");
        assert_eq!(unique[2].title, "Title only");
    }

    #[test]
    fn test_empty_and_single() {
        assert!(dedup_records(vec![]).is_empty());
        let one = vec![RecordBuilder::new("T", "s").build()];
        assert_eq!(dedup_records(one).len(), 1);
    }
}
