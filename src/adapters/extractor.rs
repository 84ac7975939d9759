//! Content extraction from web pages, raw text and code.
//!
//! HTML is reduced with a handful of regular expressions: scripts, styles
//! and comments are dropped, the most specific content region
//! (`<article>`, then `<main>`, then `<body>`) is kept, and the remaining
//! tags are stripped.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use super::Extractor;
use crate::error::ProviderError;
use crate::library::{ContentType, RawMetadata};

/// Title used when a page has none
pub const NO_TITLE: &str = "No title Found";

/// Title given to extracted raw text
pub const TEXT_TITLE: &str = "Extracted text";

/// Title given to extracted code
pub const CODE_TITLE: &str = "Code snippet";

const USER_AGENT: &str = concat!("cognitive-canvas/", env!("CARGO_PKG_VERSION"));

/// Result of an extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub title: String,
    pub content: String,
    pub content_type: ContentType,
    /// Set for URL extractions only
    pub url: Option<String>,
    pub domain: Option<String>,
    pub metadata: RawMetadata,
}

/// Extract from raw prose. Whitespace is collapsed.
pub fn extract_text(text: &str) -> ExtractedContent {
    ExtractedContent {
        title: TEXT_TITLE.to_string(),
        content: clean_text(text),
        content_type: ContentType::Text,
        url: None,
        domain: None,
        metadata: RawMetadata::default(),
    }
}

/// Extract from a code snippet. Indentation is preserved.
pub fn extract_code(code: &str) -> ExtractedContent {
    ExtractedContent {
        title: CODE_TITLE.to_string(),
        content: clean_code(code),
        content_type: ContentType::Code,
        url: None,
        domain: None,
        metadata: RawMetadata::default(),
    }
}

/// Collapse every whitespace run to a single space and trim
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop leading and trailing blank lines, trailing spaces, and common
/// indentation
pub fn clean_code(code: &str) -> String {
    let lines: Vec<&str> = code.lines().map(str::trim_end).collect();

    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => return String::new(),
    };
    let body = &lines[first..=last];

    let indent = body
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    body.iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compiled patterns for HTML reduction
pub struct HtmlParser {
    title: Regex,
    heading: Regex,
    noise: Regex,
    comment: Regex,
    article: Regex,
    main: Regex,
    body: Regex,
    tag: Regex,
    meta: Regex,
    attr: Regex,
    numeric_entity: Regex,
}

impl HtmlParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>")?,
            heading: Regex::new(r"(?is)<h1[^>]*>(.*?)</h1\s*>")?,
            noise: Regex::new(
                r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>",
            )?,
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            article: Regex::new(r"(?is)<article\b[^>]*>(.*?)</article\s*>")?,
            main: Regex::new(r"(?is)<main\b[^>]*>(.*?)</main\s*>")?,
            body: Regex::new(r"(?is)<body\b[^>]*>(.*?)(?:</body\s*>|$)")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            meta: Regex::new(r"(?is)<meta\b[^>]*>")?,
            attr: Regex::new(r#"(?is)([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            numeric_entity: Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);")?,
        })
    }

    /// Reduce an HTML document to title, readable text and metadata
    pub fn parse(&self, html: &str) -> (String, String, RawMetadata) {
        let title = self
            .capture_text(&self.title, html)
            .or_else(|| self.capture_text(&self.heading, html))
            .unwrap_or_else(|| NO_TITLE.to_string());

        let metadata = self.metadata(html);
        let content = self.main_content(html);

        (title, content, metadata)
    }

    /// Readable text of the most specific content region
    pub fn main_content(&self, html: &str) -> String {
        let without_comments = self.comment.replace_all(html, " ");
        let cleaned = self.noise.replace_all(&without_comments, " ");

        let region = [&self.article, &self.main, &self.body]
            .iter()
            .find_map(|re| re.captures(&cleaned).and_then(|c| c.get(1)))
            .map(|m| m.as_str())
            .unwrap_or(&cleaned);

        self.to_text(region)
    }

    /// `<meta>` derived metadata; missing fields stay `None`
    pub fn metadata(&self, html: &str) -> RawMetadata {
        let mut tags: HashMap<String, String> = HashMap::new();

        for meta in self.meta.find_iter(html) {
            let mut key = None;
            let mut content = None;
            for cap in self.attr.captures_iter(meta.as_str()) {
                let name = cap[1].to_lowercase();
                let value = cap
                    .get(2)
                    .or_else(|| cap.get(3))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                match name.as_str() {
                    "name" | "property" | "itemprop" => key = Some(value.to_lowercase()),
                    "content" => content = Some(value),
                    _ => {}
                }
            }
            if let (Some(k), Some(v)) = (key, content) {
                tags.entry(k).or_insert_with(|| clean_text(&self.decode_entities(&v)));
            }
        }

        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| tags.get(*k))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        let date_published = first(&["article:published_time", "date", "pubdate", "datepublished"])
            .and_then(|raw| {
                let parsed = parse_date(&raw);
                if parsed.is_none() {
                    debug!(date = %raw, "Ignoring unparseable publication date");
                }
                parsed
            });

        RawMetadata {
            author: first(&["author", "article:author"]),
            abstract_text: first(&["description", "og:description"]),
            keywords: first(&["keywords"])
                .map(|k| {
                    k.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            date_published,
            citation: first(&["citation_title"]),
        }
    }

    fn capture_text(&self, re: &Regex, html: &str) -> Option<String> {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| self.to_text(m.as_str()))
            .filter(|t| !t.is_empty())
    }

    fn to_text(&self, fragment: &str) -> String {
        let stripped = self.tag.replace_all(fragment, " ");
        clean_text(&self.decode_entities(&stripped))
    }

    fn decode_entities(&self, text: &str) -> String {
        let numeric = self.numeric_entity.replace_all(text, |caps: &regex::Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        });

        numeric
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }
}

/// RFC 3339 timestamp or bare `YYYY-MM-DD` (midnight UTC)
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Fetches pages over HTTP and reduces them with [`HtmlParser`]
pub struct HttpExtractor {
    client: Client,
    parser: HtmlParser,
}

impl HttpExtractor {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Api(format!("Failed to create HTTP client: {}", e)))?;
        let parser = HtmlParser::new()
            .map_err(|e| ProviderError::Api(format!("Failed to compile HTML patterns: {}", e)))?;

        Ok(Self { client, parser })
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    #[instrument(skip(self))]
    async fn extract_url(&self, url: &str) -> Result<ExtractedContent, ProviderError> {
        let parsed = Url::parse(url)
            .map_err(|e| ProviderError::Validation(format!("invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::Validation(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self.client.get(parsed.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        let html = response.text().await?;
        let (title, content, metadata) = self.parser.parse(&html);

        debug!(
            title = %title,
            chars = content.len(),
            "Extracted page"
        );

        Ok(ExtractedContent {
            title,
            content,
            content_type: ContentType::Url,
            url: Some(url.to_string()),
            domain: parsed.host_str().map(str::to_string),
            metadata,
        })
    }
}
