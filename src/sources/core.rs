//! CORE v3 works API descriptor. Requires an API key.

use crate::models::{AccessType, PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 3600;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "core",
        name: "CORE",
        family: SourceFamily::Aggregator,
        base_url: "https://api.core.ac.uk/v3/search/works",
        query_param: "q",
        query_template: None,
        page_param: Some("limit"),
        max_page_size: 100,
        extra_params: &[],
        mailto_param: None,
        publisher_param: None,
        year_params: None,
        auth: AuthStyle::Bearer,
        requires_key: true,
        rpm: RPM,
        project,
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(results) = body["results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .map(|work| {
            let title = work["title"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "core");

            if let Some(doi) = work["doi"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(text) = work["abstract"].as_str() {
                builder = builder.abstract_text(text);
            }
            if let Some(authors) = work["authors"].as_array() {
                builder = builder.authors(authors.iter().filter_map(|a| a["name"].as_str()));
            }
            if let Some(year) = work["yearPublished"].as_i64() {
                builder = builder.year(year as i32);
            }
            if let Some(publisher) = work["publisher"].as_str() {
                builder = builder.publisher(publisher);
            }
            if let Some(download) = work["downloadUrl"].as_str() {
                if !download.is_empty() {
                    // CORE indexes open repositories; a hosted copy means
                    // the work is readable.
                    builder = builder.pdf_url(download).access(AccessType::Open);
                }
            }

            builder.build()
        })
        .collect()
}
