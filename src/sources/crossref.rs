//! CrossRef works API descriptor.
//!
//! CrossRef doubles as the generic DOI registry behind the composite
//! publisher adapter: its `query.publisher-name` filter is the
//! server-side publisher search every publisher fan-out rides on.

use crate::models::{AccessType, PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 3000;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "crossref",
        name: "CrossRef",
        family: SourceFamily::PriorityAcademic,
        base_url: "https://api.crossref.org/works",
        query_param: "query",
        query_template: None,
        page_param: Some("rows"),
        max_page_size: 100,
        extra_params: &[],
        mailto_param: Some("mailto"),
        publisher_param: Some("query.publisher-name"),
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
        clauses.push(format!("from-pub-date:{start}-01-01"));
    }
    if let Some(end) = end {
        clauses.push(format!("until-pub-date:{end}-12-31"));
    }
    if clauses.is_empty() {
        Vec::new()
    } else {
        vec![("filter".to_string(), clauses.join(","))]
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(items) = body["message"]["items"].as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| {
            let title = item["title"][0].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "crossref");

            if let Some(doi) = item["DOI"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(authors) = item["author"].as_array() {
                builder = builder.authors(authors.iter().map(author_name));
            }
            if let Some(year) = item["issued"]["date-parts"][0][0].as_i64() {
                builder = builder.year(year as i32);
            }
            if let Some(journal) = item["container-title"][0].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(publisher) = item["publisher"].as_str() {
                builder = builder.publisher(publisher);
            }
            if let Some(citations) = item["is-referenced-by-count"].as_u64() {
                builder = builder.citations(citations as u32);
            }
            if let Some(text) = item["abstract"].as_str() {
                builder = builder.abstract_text(text);
            }
            if let Some(subjects) = item["subject"].as_array() {
                builder = builder.keywords(subjects.iter().filter_map(|s| s.as_str()));
            }
            if let Some(pdf) = pdf_link(item) {
                builder = builder.pdf_url(pdf).access(AccessType::Open);
            }

            builder.build()
        })
        .collect()
}

fn author_name(author: &serde_json::Value) -> String {
    let given = author["given"].as_str().unwrap_or_default();
    let family = author["family"].as_str().unwrap_or_default();
    match (given.is_empty(), family.is_empty()) {
        (false, false) => format!("{given} {family}"),
        (true, false) => family.to_string(),
        (false, true) => given.to_string(),
        (true, true) => author["name"].as_str().unwrap_or_default().to_string(),
    }
}

fn pdf_link(item: &serde_json::Value) -> Option<&str> {
    item["link"].as_array()?.iter().find_map(|link| {
        (link["content-type"].as_str() == Some("application/pdf"))
            .then(|| link["URL"].as_str())
            .flatten()
    })
}
