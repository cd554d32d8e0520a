//! Springer Nature Meta API descriptor. Requires an API key.

use crate::models::{AccessType, PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 300;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "springer",
        name: "Springer Nature",
        family: SourceFamily::Aggregator,
        base_url: "https://api.springernature.com/meta/v2/json",
        query_param: "q",
        query_template: None,
        page_param: Some("p"),
        max_page_size: 100,
        extra_params: &[],
        mailto_param: None,
        publisher_param: None,
        year_params: None,
        auth: AuthStyle::QueryParam("api_key"),
        requires_key: true,
        rpm: RPM,
        project,
    }
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(records) = body["records"].as_array() else {
        return Vec::new();
    };

    records
        .iter()
        .map(|item| {
            let title = item["title"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "springer").publisher("Springer");

            if let Some(doi) = item["doi"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(text) = item["abstract"].as_str() {
                builder = builder.abstract_text(text);
            }
            if let Some(creators) = item["creators"].as_array() {
                builder = builder.authors(creators.iter().filter_map(|c| c["creator"].as_str()));
            }
            if let Some(journal) = item["publicationName"].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(year) = item["publicationDate"]
                .as_str()
                .and_then(|d| d.split('-').next())
                .and_then(|y| y.parse::<i32>().ok())
            {
                builder = builder.year(year);
            }
            match item["openaccess"].as_str() {
                Some("true") => builder = builder.access(AccessType::Open),
                Some("false") => builder = builder.access(AccessType::Paywalled),
                _ => {}
            }

            builder.build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_records() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"records":[{
                "title":"Polymer chemistry advances",
                "doi":"10.1007/spr",
                "abstract":"Polymers.",
                "creators":[{"creator":"Müller, A."}],
                "publicationName":"Polymer Bulletin",
                "publicationDate":"2022-03-01",
                "openaccess":"false"
            }]}"#,
        )
        .unwrap();

        let records = project(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].publisher.as_deref(), Some("Springer"));
        assert_eq!(records[0].year, Some(2022));
        assert_eq!(records[0].access, AccessType::Paywalled);
    }
}
