//! Scopus search API descriptor. Requires an Elsevier API key.

use crate::models::{PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 540;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "scopus",
        name: "Scopus",
        family: SourceFamily::CitationDatabase,
        base_url: "https://api.elsevier.com/content/search/scopus",
        query_param: "query",
        query_template: None,
        page_param: Some("count"),
        max_page_size: 25,
        extra_params: &[("httpAccept", "application/json")],
        mailto_param: None,
        publisher_param: None,
        year_params: None,
        auth: AuthStyle::Header("X-ELS-APIKey"),
        requires_key: true,
        rpm: RPM,
        project,
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(entries) = body["search-results"]["entry"].as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| {
            let title = entry["dc:title"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "scopus");

            if let Some(doi) = entry["prism:doi"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(pmid) = entry["pubmed-id"].as_str() {
                builder = builder.pmid(pmid);
            }
            if let Some(creator) = entry["dc:creator"].as_str() {
                builder = builder.authors([creator]);
            }
            if let Some(journal) = entry["prism:publicationName"].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(year) = entry["prism:coverDate"]
                .as_str()
                .and_then(|d| d.split('-').next())
                .and_then(|y| y.parse::<i32>().ok())
            {
                builder = builder.year(year);
            }
            if let Some(citations) = entry["citedby-count"]
                .as_str()
                .and_then(|c| c.parse::<u32>().ok())
            {
                builder = builder.citations(citations);
            }

            builder.build()
        })
        .collect()
}
