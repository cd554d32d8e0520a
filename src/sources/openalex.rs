//! OpenAlex works API descriptor.

use crate::models::{AccessType, PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 3600;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "openalex",
        name: "OpenAlex",
        family: SourceFamily::PriorityAcademic,
        base_url: "https://api.openalex.org/works",
        query_param: "search",
        query_template: None,
        page_param: Some("per-page"),
        max_page_size: 200,
        extra_params: &[],
        mailto_param: Some("mailto"),
        publisher_param: None,
        year_params: Some(year_filter),
        auth: AuthStyle::None,
        requires_key: false,
        rpm: RPM,
        project,
    }
}

fn year_filter(start: Option<i32>, end: Option<i32>) -> Vec<(String, String)> {
    let mut clauses = Vec::new();
    if let Some(start) = start {
        clauses.push(format!("from_publication_date:{start}-01-01"));
    }
    if let Some(end) = end {
        clauses.push(format!("to_publication_date:{end}-12-31"));
    }
    if clauses.is_empty() {
        Vec::new()
    } else {
        vec![("filter".to_string(), clauses.join(","))]
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(results) = body["results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .map(|work| {
            let title = work["display_name"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "openalex");

            if let Some(doi) = work["doi"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(pmid) = work["ids"]["pmid"].as_str() {
                // OpenAlex reports the PMID as a resolver URL.
                if let Some(digits) = pmid.rsplit('/').find(|s| !s.is_empty()) {
                    builder = builder.pmid(digits);
                }
            }
            if let Some(year) = work["publication_year"].as_i64() {
                builder = builder.year(year as i32);
            }
            if let Some(authors) = work["authorships"].as_array() {
                builder = builder.authors(
                    authors
                        .iter()
                        .filter_map(|a| a["author"]["display_name"].as_str()),
                );
            }
            if let Some(journal) = work["primary_location"]["source"]["display_name"].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(publisher) =
                work["primary_location"]["source"]["host_organization_name"].as_str()
            {
                builder = builder.publisher(publisher);
            }
            if let Some(citations) = work["cited_by_count"].as_u64() {
                builder = builder.citations(citations as u32);
            }
            if let Some(concepts) = work["concepts"].as_array() {
                builder = builder.keywords(
                    concepts
                        .iter()
                        .filter_map(|c| c["display_name"].as_str())
                        .take(10),
                );
            }

            let abstract_text = rebuild_abstract(&work["abstract_inverted_index"]);
            if !abstract_text.is_empty() {
                builder = builder.abstract_text(abstract_text);
            }

            if work["open_access"]["is_oa"].as_bool() == Some(true) {
                builder = builder.access(AccessType::Open);
                if let Some(url) = work["open_access"]["oa_url"].as_str() {
                    builder = builder.pdf_url(url);
                }
            }

            builder.build()
        })
        .collect()
}

/// OpenAlex ships abstracts as an inverted index (token -> positions);
/// rebuild the plain text by placing each token at its positions.
fn rebuild_abstract(inverted: &serde_json::Value) -> String {
    let Some(index) = inverted.as_object() else {
        return String::new();
    };

    let mut placed: Vec<(usize, &str)> = Vec::new();
    for (token, positions) in index {
        if let Some(positions) = positions.as_array() {
            for position in positions.iter().filter_map(|p| p.as_u64()) {
                placed.push((position as usize, token.as_str()));
            }
        }
    }
    placed.sort_by_key(|(position, _)| *position);
    placed
        .into_iter()
        .map(|(_, token)| token)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_abstract() {
        let inverted: serde_json::Value =
            serde_json::from_str(r#"{"CRISPR":[0],"edits":[1,3],"genomes":[2]}"#).unwrap();
        assert_eq!(rebuild_abstract(&inverted), "CRISPR edits genomes edits");
        assert_eq!(rebuild_abstract(&serde_json::Value::Null), "");
    }

    #[test]
    fn test_project_work() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"results":[{
                "display_name":"Attention is all you need",
                "doi":"https://doi.org/10.48550/arxiv.1706.03762",
                "ids":{"pmid":"https://pubmed.ncbi.nlm.nih.gov/12345"},
                "publication_year":2017,
                "authorships":[{"author":{"display_name":"Ashish Vaswani"}}],
                "primary_location":{"source":{"display_name":"NeurIPS","host_organization_name":"Curran"}},
                "cited_by_count":90000,
                "open_access":{"is_oa":true,"oa_url":"https://arxiv.org/pdf/1706.03762"},
                "abstract_inverted_index":{"The":[0],"dominant":[1]}
            }]}"#,
        )
        .unwrap();

        let records = project(&body);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.pmid.as_deref(), Some("12345"));
        assert_eq!(r.year, Some(2017));
        assert_eq!(r.access, AccessType::Open);
        assert_eq!(r.abstract_text, "The dominant");
        assert_eq!(r.citations, Some(90000));
    }

    #[test]
    fn test_year_filter_single_sided() {
        assert_eq!(
            year_filter(None, Some(2015)),
            vec![("filter".to_string(), "to_publication_date:2015-12-31".to_string())]
        );
    }
}
