//! Europe PMC REST API descriptor.

use crate::models::{AccessType, PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 3600;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "europe_pmc",
        name: "Europe PMC",
        family: SourceFamily::PriorityAcademic,
        base_url: "https://www.ebi.ac.uk/europepmc/webservices/rest/search",
        query_param: "query",
        query_template: None,
        page_param: Some("pageSize"),
        max_page_size: 100,
        extra_params: &[("format", "json"), ("resultType", "core")],
        mailto_param: None,
        publisher_param: None,
        year_params: None,
        auth: AuthStyle::None,
        requires_key: false,
        rpm: RPM,
        project,
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(results) = body["resultList"]["result"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .map(|item| {
            let title = item["title"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "europe_pmc");

            if let Some(doi) = item["doi"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(pmid) = item["pmid"].as_str() {
                builder = builder.pmid(pmid);
            }
            if let Some(text) = item["abstractText"].as_str() {
                builder = builder.abstract_text(text);
            }
            if let Some(authors) = item["authorString"].as_str() {
                builder = builder.authors(
                    authors
                        .trim_end_matches('.')
                        .split(", ")
                        .filter(|a| !a.is_empty()),
                );
            }
            if let Some(year) = item["pubYear"].as_str().and_then(|y| y.parse::<i32>().ok()) {
                builder = builder.year(year);
            }
            if let Some(journal) = item["journalInfo"]["journal"]["title"].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(citations) = item["citedByCount"].as_u64() {
                builder = builder.citations(citations as u32);
            }
            if item["isOpenAccess"].as_str() == Some("Y") {
                builder = builder.access(AccessType::Open);
            }
            if let Some(keywords) = item["keywordList"]["keyword"].as_array() {
                builder = builder.keywords(keywords.iter().filter_map(|k| k.as_str()));
            }

            builder.build()
        })
        .collect()
}
