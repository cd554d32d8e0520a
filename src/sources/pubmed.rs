//! PubMed adapter over the NCBI E-utilities, the two-step
//! esearch → efetch family reference.
//!
//! NCBI budgets requests per second rather than per minute: 3/s for
//! anonymous clients, 10/s with an API key.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{PaperRecord, RecordBuilder, SearchRequest};
use crate::sources::registry::SourceCapabilities;
use crate::sources::{finalize_records, Source, SourceError, SourceFamily};
use crate::utils::{api_retry_config, with_retry, HttpClient};

pub const RPM: u32 = 600;

const ANONYMOUS_RPS: u32 = 3;
const KEYED_RPS: u32 = 10;

#[derive(Debug)]
pub struct PubMedSource {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    email: Option<String>,
}

impl PubMedSource {
    pub fn new(api_key: Option<String>, email: Option<String>) -> Result<Self, SourceError> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let rps = if api_key.is_some() { KEYED_RPS } else { ANONYMOUS_RPS };
        Ok(Self {
            client: HttpClient::per_second(rps, email.as_deref())?,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            api_key,
            email,
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn common_params(&self) -> String {
        let mut params = String::new();
        if let Some(key) = &self.api_key {
            params.push_str(&format!("&api_key={key}"));
        }
        if let Some(email) = &self.email {
            params.push_str(&format!(
                "&tool={}&email={}",
                env!("CARGO_PKG_NAME"),
                urlencoding::encode(email)
            ));
        }
        params
    }

    fn build_term(request: &SearchRequest) -> String {
        match (request.year_start, request.year_end) {
            (None, None) => request.query.clone(),
            (start, end) => format!(
                "{} AND {}:{}[dp]",
                request.query,
                start.unwrap_or(1800),
                end.unwrap_or(3000)
            ),
        }
    }

    async fn fetch(&self, url: String) -> Result<String, SourceError> {
        with_retry(api_retry_config(), || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("PubMed: {e}")))?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "PubMed returned HTTP {}",
                        response.status()
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(format!("PubMed body: {e}")))
            }
        })
        .await
    }

    fn parse_article_set(xml: &str) -> Result<Vec<PaperRecord>, SourceError> {
        let set: PubmedArticleSet = quick_xml::de::from_str(xml)?;
        Ok(set.articles.iter().map(project_article).collect())
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::PriorityAcademic
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperRecord>, SourceError> {
        let search_url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmode=json&retmax={}{}",
            self.base_url,
            urlencoding::encode(&Self::build_term(request)),
            request.max_results.min(200),
            self.common_params()
        );

        let body = self.fetch(search_url).await?;
        let ids: EsearchEnvelope = serde_json::from_str(&body)?;
        if ids.esearchresult.idlist.is_empty() {
            return Ok(Vec::new());
        }

        let fetch_url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&rettype=abstract&retmode=xml{}",
            self.base_url,
            ids.esearchresult.idlist.join(","),
            self.common_params()
        );

        let xml = self.fetch(fetch_url).await?;
        let records = Self::parse_article_set(&xml)?;
        Ok(finalize_records(records, self.id(), request.max_results))
    }
}

// ===== E-utilities response shapes =====

#[derive(Debug, Deserialize)]
struct EsearchEnvelope {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "PubmedArticleSet")]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation")]
    citation: MedlineCitation,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: TextNode,
    #[serde(rename = "Article")]
    article: Article,
    #[serde(rename = "KeywordList")]
    keyword_list: Option<KeywordList>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(rename = "ArticleTitle")]
    title: Option<TextNode>,
    #[serde(rename = "Abstract")]
    abstract_node: Option<AbstractNode>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
struct AbstractNode {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "ForeName")]
    fore_name: Option<String>,
    #[serde(rename = "CollectiveName")]
    collective_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "JournalIssue")]
    issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeywordList {
    #[serde(rename = "Keyword", default)]
    keywords: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    article_ids: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// Text content of an element that may carry attributes or markup.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text")]
    text: Option<String>,
}

impl TextNode {
    fn as_str(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

fn project_article(article: &PubmedArticle) -> PaperRecord {
    let citation = &article.citation;
    let title = citation
        .article
        .title
        .as_ref()
        .map(TextNode::as_str)
        .unwrap_or_default();

    let mut builder = RecordBuilder::new(title, "pubmed").pmid(citation.pmid.as_str());

    if let Some(abstract_node) = &citation.article.abstract_node {
        let text = abstract_node
            .sections
            .iter()
            .map(TextNode::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        builder = builder.abstract_text(text.trim());
    }

    if let Some(author_list) = &citation.article.author_list {
        builder = builder.authors(author_list.authors.iter().filter_map(|author| {
            match (&author.fore_name, &author.last_name) {
                (Some(fore), Some(last)) => Some(format!("{fore} {last}")),
                (None, Some(last)) => Some(last.clone()),
                _ => author.collective_name.clone(),
            }
        }));
    }

    if let Some(journal) = &citation.article.journal {
        if let Some(journal_title) = &journal.title {
            builder = builder.journal(journal_title);
        }
        if let Some(year) = journal
            .issue
            .as_ref()
            .and_then(|i| i.pub_date.as_ref())
            .and_then(|d| d.year.as_ref())
            .and_then(|y| y.parse::<i32>().ok())
        {
            builder = builder.year(year);
        }
    }

    if let Some(keyword_list) = &citation.keyword_list {
        builder = builder.keywords(
            keyword_list
                .keywords
                .iter()
                .map(TextNode::as_str)
                .filter(|k| !k.is_empty()),
        );
    }

    if let Some(doi) = article
        .pubmed_data
        .as_ref()
        .and_then(|d| d.article_ids.as_ref())
        .and_then(|list| {
            list.ids
                .iter()
                .find(|id| id.id_type == "doi")
                .and_then(|id| id.value.clone())
        })
    {
        builder = builder.doi(doi);
    }

    builder.build()
}
