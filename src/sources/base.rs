//! BASE (Bielefeld Academic Search Engine) descriptor.

use crate::models::{PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 3600;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "base",
        name: "BASE",
        family: SourceFamily::Aggregator,
        base_url: "https://api.base-search.net/cgi-bin/BaseHttpSearchInterface.fcgi",
        query_param: "query",
        query_template: None,
        page_param: Some("hits"),
        max_page_size: 100,
        extra_params: &[("func", "PerformSearch"), ("format", "json")],
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
    let Some(docs) = body["response"]["docs"].as_array() else {
        return Vec::new();
    };

    docs.iter()
        .map(|doc| {
            let title = doc["dctitle"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "base");

            if let Some(doi) = doc["dcdoi"][0].as_str().or_else(|| doc["dcdoi"].as_str()) {
                builder = builder.doi(doi);
            }
            if let Some(creators) = doc["dccreator"].as_array() {
                builder = builder.authors(creators.iter().filter_map(|c| c.as_str()));
            } else if let Some(creator) = doc["dccreator"].as_str() {
                builder = builder.authors([creator]);
            }
            if let Some(year) = doc["dcyear"].as_str().and_then(|y| y.parse::<i32>().ok()) {
                builder = builder.year(year);
            }
            if let Some(description) = doc["dcdescription"].as_str() {
                builder = builder.abstract_text(description);
            }
            if let Some(publisher) = doc["dcpublisher"][0]
                .as_str()
                .or_else(|| doc["dcpublisher"].as_str())
            {
                builder = builder.publisher(publisher);
            }
            if let Some(link) = doc["dclink"].as_str() {
                if link.ends_with(".pdf") {
                    builder = builder.pdf_url(link);
                }
            }

            builder.build()
        })
        .collect()
}
