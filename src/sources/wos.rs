//! Web of Science Lite API descriptor. Requires an API key.

use crate::models::{PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 300;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "wos",
        name: "Web of Science",
        family: SourceFamily::CitationDatabase,
        base_url: "https://wos-api.clarivate.com/api/woslite",
        query_param: "usrQuery",
        // WoS wants a fielded query; TS= searches topic fields.
        query_template: Some("TS=({})"),
        page_param: Some("count"),
        max_page_size: 100,
        extra_params: &[("databaseId", "WOS"), ("firstRecord", "1")],
        mailto_param: None,
        publisher_param: None,
        year_params: None,
        auth: AuthStyle::Header("X-ApiKey"),
        requires_key: true,
        rpm: RPM,
        project,
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(entries) = body["Data"].as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| {
            let title = entry["Title"]["Title"][0].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "wos");

            if let Some(doi) = entry["Other"]["Identifier.Doi"][0].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(authors) = entry["Author"]["Authors"].as_array() {
                builder = builder.authors(authors.iter().filter_map(|a| a.as_str()));
            }
            if let Some(journal) = entry["Source"]["SourceTitle"][0].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(year) = entry["Source"]["Published.BiblioYear"][0]
                .as_str()
                .and_then(|y| y.parse::<i32>().ok())
            {
                builder = builder.year(year);
            }

            builder.build()
        })
        .collect()
}
