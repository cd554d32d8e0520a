//! IEEE Xplore metadata API descriptor. Requires an API key.

use crate::models::{AccessType, PaperRecord, RecordBuilder};
use crate::sources::rest::{AuthStyle, RestDescriptor};
use crate::sources::SourceFamily;

pub const RPM: u32 = 200;

pub fn descriptor() -> RestDescriptor {
    RestDescriptor {
        id: "ieee",
        name: "IEEE Xplore",
        family: SourceFamily::Aggregator,
        base_url: "https://ieeexploreapi.ieee.org/api/v1/search/articles",
        query_param: "querytext",
        query_template: None,
        page_param: Some("max_records"),
        max_page_size: 200,
        extra_params: &[("format", "json")],
        mailto_param: None,
        publisher_param: None,
        year_params: Some(year_filter),
        auth: AuthStyle::QueryParam("apikey"),
        requires_key: true,
        rpm: RPM,
        project,
    }
}

fn year_filter(start: Option<i32>, end: Option<i32>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(start) = start {
        params.push(("start_year".to_string(), start.to_string()));
    }
    if let Some(end) = end {
        params.push(("end_year".to_string(), end.to_string()));
    }
    params
}

fn project(body: &serde_json::Value) -> Vec<PaperRecord> {
    let Some(articles) = body["articles"].as_array() else {
        return Vec::new();
    };

    articles
        .iter()
        .map(|article| {
            let title = article["title"].as_str().unwrap_or_default();
            let mut builder = RecordBuilder::new(title, "ieee").publisher("IEEE");

            if let Some(doi) = article["doi"].as_str() {
                builder = builder.doi(doi);
            }
            if let Some(text) = article["abstract"].as_str() {
                builder = builder.abstract_text(text);
            }
            if let Some(authors) = article["authors"]["authors"].as_array() {
                builder = builder.authors(authors.iter().filter_map(|a| a["full_name"].as_str()));
            }
            if let Some(journal) = article["publication_title"].as_str() {
                builder = builder.journal(journal);
            }
            if let Some(year) = article["publication_year"]
                .as_i64()
                .or_else(|| article["publication_year"].as_str().and_then(|y| y.parse().ok()))
            {
                builder = builder.year(year as i32);
            }
            if let Some(citations) = article["citing_paper_count"].as_u64() {
                builder = builder.citations(citations as u32);
            }
            if let Some(pdf) = article["pdf_url"].as_str() {
                builder = builder.pdf_url(pdf);
            }
            if article["access_type"].as_str() == Some("OPEN_ACCESS") {
                builder = builder.access(AccessType::Open);
            } else if article["access_type"].as_str() == Some("LOCKED") {
                builder = builder.access(AccessType::Paywalled);
            }
            if let Some(terms) = article["index_terms"]["ieee_terms"]["terms"].as_array() {
                builder = builder.keywords(terms.iter().filter_map(|t| t.as_str()));
            }

            builder.build()
        })
        .collect()
}
