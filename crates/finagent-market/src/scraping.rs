//! Filing scraper for HTML pages and PDF documents

use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Title used when an HTML page has none
pub const UNTITLED: &str = "Untitled Document";

/// Text pulled from one filing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapedDocument {
    Html { title: String, content: String },
    Pdf { text_data: String },
}

impl ScrapedDocument {
    /// All extracted text, title first for HTML pages
    pub fn text(&self) -> String {
        match self {
            Self::Html { title, content } => format!("{title}\n{content}"),
            Self::Pdf { text_data } => text_data.clone(),
        }
    }
}

/// Formats the scraper understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Pdf,
}

impl DocumentKind {
    /// Detect the format from the extension of the URL path
    ///
    /// Query strings and fragments are ignored and matching is case-insensitive.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            // Relative or bare paths
            Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
        };

        let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "html" | "htm" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Fetches filings and extracts their text
#[derive(Debug, Clone)]
pub struct ScrapingAgent {
    client: Client,
}

impl ScrapingAgent {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Scrape one filing; any failure is logged and yields `None`
    #[instrument(skip(self))]
    pub async fn scrape_filing(&self, url: &str) -> Option<ScrapedDocument> {
        let Some(kind) = DocumentKind::from_url(url) else {
            warn!("Unsupported file type for URL: {url}");
            return None;
        };

        let bytes = match self.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Error fetching URL {url}: {e}");
                return None;
            }
        };

        match extract_document(kind, &bytes) {
            Ok(document) => {
                info!(bytes = bytes.len(), "Scraped filing");
                Some(document)
            }
            Err(e) => {
                error!("Error processing document from {url}: {e}");
                None
            }
        }
    }

    /// Scrape each URL in order; one failure never stops the batch
    pub async fn scrape_filings(&self, urls: &[String]) -> Vec<Option<ScrapedDocument>> {
        let mut documents = Vec::with_capacity(urls.len());
        for url in urls {
            documents.push(self.scrape_filing(url).await);
        }
        documents
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Extract text from downloaded bytes
pub fn extract_document(kind: DocumentKind, bytes: &[u8]) -> Result<ScrapedDocument> {
    match kind {
        DocumentKind::Html => parse_html(&String::from_utf8_lossy(bytes)),
        DocumentKind::Pdf => Ok(ScrapedDocument::Pdf {
            text_data: extract_pdf_text(bytes)?,
        }),
    }
}

/// Title and paragraph text of an HTML page
pub fn parse_html(html: &str) -> Result<ScrapedDocument> {
    let document = Html::parse_document(html);
    let title_selector = selector("title")?;
    let paragraph_selector = selector("p")?;

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let content = document
        .select(&paragraph_selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ScrapedDocument::Html { title, content })
}

/// Text of a PDF: pdf-extract first, then page-by-page lopdf
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    // pdf-extract panics on some malformed inputs
    let primary = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    match primary {
        Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text),
        Ok(Ok(_)) => debug!("pdf-extract found no text, trying lopdf"),
        Ok(Err(e)) => debug!("pdf-extract failed: {e}, trying lopdf"),
        Err(_) => debug!("pdf-extract panicked, trying lopdf"),
    }

    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| MarketError::Document(format!("unreadable PDF: {e}")))?;

    let mut pages = Vec::new();
    for page in document.get_pages().into_keys() {
        match document.extract_text(&[page]) {
            Ok(text) => pages.push(text),
            Err(e) => warn!(page, "Skipping unreadable PDF page: {e}"),
        }
    }

    let text = pages.join("\n");
    if text.trim().is_empty() {
        return Err(MarketError::Document("PDF contains no extractable text".into()));
    }
    Ok(text)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| MarketError::Document(format!("bad selector {css}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILING: &str = r#"
        <html>
          <head><title> Form 20-F  </title></head>
          <body>
            <h1>Annual report</h1>
            <p>Revenue grew 9% year over year.</p>
            <div><p> Export controls remain a key risk. </p></div>
          </body>
        </html>"#;

    #[test]
    fn test_parse_html_title_and_paragraphs() {
        let doc = parse_html(FILING).unwrap();
        assert_eq!(
            doc,
            ScrapedDocument::Html {
                title: "Form 20-F".to_string(),
                content: "Revenue grew 9% year over year.\nExport controls remain a key risk."
                    .to_string(),
            }
        );
    }

    #[test]
    fn test_parse_html_default_title() {
        let doc = parse_html("<html><body><p>Only text</p></body></html>").unwrap();
        match doc {
            ScrapedDocument::Html { title, content } => {
                assert_eq!(title, UNTITLED);
                assert_eq!(content, "Only text");
            }
            ScrapedDocument::Pdf { .. } => panic!("Expected HTML document"),
        }
    }

    #[test]
    fn test_document_kind_from_url() {
        assert_eq!(
            DocumentKind::from_url("https://www.sec.gov/Archives/edgar/data/1046179/form.htm"),
            Some(DocumentKind::Html)
        );
        assert_eq!(
            DocumentKind::from_url("https://example.com/reports/Q4.PDF?download=1#page=2"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_url("filings/annual.html"), Some(DocumentKind::Html));
        assert_eq!(DocumentKind::from_url("https://example.com/data.xlsx"), None);
        assert_eq!(DocumentKind::from_url("https://example.com/"), None);
    }

    #[test]
    fn test_serialized_shapes() {
        let html = serde_json::to_value(ScrapedDocument::Html {
            title: "t".into(),
            content: "c".into(),
        })
        .unwrap();
        assert_eq!(html, serde_json::json!({"title": "t", "content": "c"}));

        let pdf = serde_json::to_value(ScrapedDocument::Pdf {
            text_data: "x".into(),
        })
        .unwrap();
        assert_eq!(pdf, serde_json::json!({"text_data": "x"}));
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        let result = extract_document(DocumentKind::Pdf, b"definitely not a pdf");
        assert!(matches!(result, Err(MarketError::Document(_))));
    }

    #[tokio::test]
    async fn test_unsupported_extension_yields_none() {
        let agent = ScrapingAgent::new(&MarketConfig::default()).unwrap();
        let results = agent
            .scrape_filings(&[
                "https://example.com/report.docx".to_string(),
                "https://example.com/data.csv".to_string(),
            ])
            .await;
        assert_eq!(results, vec![None, None]);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_scrape_html() {
        let agent = ScrapingAgent::new(&MarketConfig::default()).unwrap();
        let doc = agent
            .scrape_filing("https://www.rust-lang.org/index.html")
            .await;
        assert!(doc.is_some());
    }
}
