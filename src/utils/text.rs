//! Text and identifier normalization shared by dedup, ranking, and
//! the query expander.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Closed list of common English words removed from keyword lists.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "were",
    "which", "with",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn arxiv_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v\d+$").expect("static regex"))
}

/// Normalize a DOI: lowercase, resolver and scheme prefixes stripped.
pub fn normalize_doi(doi: &str) -> String {
    let doi = doi.trim().to_lowercase();
    let doi = doi
        .strip_prefix("https://doi.org/")
        .or_else(|| doi.strip_prefix("http://doi.org/"))
        .or_else(|| doi.strip_prefix("https://dx.doi.org/"))
        .or_else(|| doi.strip_prefix("doi:"))
        .unwrap_or(&doi);
    doi.trim().to_string()
}

/// Normalize an arXiv identifier: lowercase, `arxiv:` prefix and
/// trailing version suffix (`v1`, `v2`, ...) stripped.
pub fn normalize_arxiv_id(id: &str) -> String {
    let id = id.trim().to_lowercase();
    let id = id.strip_prefix("arxiv:").unwrap_or(&id);
    arxiv_version_re().replace(id, "").to_string()
}

/// Normalize a title for duplicate comparison: lowercase, punctuation
/// stripped, whitespace collapsed, leading article removed.
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    if matches!(words.first(), Some(&"a") | Some(&"an") | Some(&"the")) {
        words.remove(0);
    }
    words.join(" ")
}

/// Lowercased whitespace tokens longer than `min_len` characters.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > min_len)
        .map(str::to_string)
        .collect()
}

/// Token set used for title similarity (tokens longer than 2 chars).
pub fn title_token_set(title: &str) -> HashSet<String> {
    tokenize(&normalize_title(title), 2).into_iter().collect()
}

/// Jaccard similarity of two token sets. Empty-vs-empty is 0.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("10.1038/NATURE12373"), "10.1038/nature12373");
        assert_eq!(
            normalize_doi("https://doi.org/10.1038/nature12373"),
            "10.1038/nature12373"
        );
        assert_eq!(normalize_doi("doi:10.1038/nature12373"), "10.1038/nature12373");
        assert_eq!(normalize_doi("  10.1/X  "), "10.1/x");
    }

    #[test]
    fn test_normalize_arxiv_id() {
        assert_eq!(normalize_arxiv_id("2301.00001"), "2301.00001");
        assert_eq!(normalize_arxiv_id("2301.00001v3"), "2301.00001");
        assert_eq!(normalize_arxiv_id("arXiv:2301.00001v1"), "2301.00001");
        assert_eq!(normalize_arxiv_id("ARXIV:2301.00001"), "2301.00001");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("A Study of Widgets"), "study of widgets");
        assert_eq!(normalize_title("The  CRISPR-Cas9   system!"), "crispr cas9 system");
        assert_eq!(normalize_title("An apple a day"), "apple a day");
        assert_eq!(normalize_title(""), "");
    }

    #[test]
    fn test_tokenize_min_len() {
        let tokens = tokenize("Deep learning of RNA is fun", 2);
        assert_eq!(tokens, vec!["deep", "learning", "rna", "fun"]);
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<String> = ["study", "widgets"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["study", "widgets"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard(&a, &b), 1.0);

        let c: HashSet<String> = ["study", "gadgets"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &c) - 1.0 / 3.0).abs() < 1e-9);

        let empty = HashSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn test_stop_words() {
        assert!(is_stop_word("the"));
        assert!(!is_stop_word("crispr"));
    }
}
