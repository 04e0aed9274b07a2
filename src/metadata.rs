//! Citation metadata for a bare URL.
//!
//! An external extraction service turns a URL into structured fields; this
//! module validates the URL, calls the service, and formats the result as
//! reference text.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::config::MetadataSettings;
use crate::error::{CiteError, Result};

/// Structured citation fields for a web page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationMetadata {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    pub url: String,
}

/// Parses `input` as an absolute http(s) URL.
pub fn validate_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    let invalid = |reason: String| CiteError::InvalidUrl {
        url: trimmed.to_string(),
        reason,
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Formats metadata as the body of a reference line.
///
/// `[<date>. ]"[<title> | <siteName>](<url>)"[. <author>][. [<siteName>](<siteUrl>)].`
/// where every optional part appears only when present and `siteUrl` is the
/// URL's origin.
///
/// # Examples
///
/// ```
/// use cite_footnotes::{format_reference_body, CitationMetadata};
///
/// let metadata = CitationMetadata {
///     title: "Post".to_string(),
///     author: None,
///     date: None,
///     site_name: None,
///     url: "https://example.com/post".to_string(),
/// };
/// assert_eq!(format_reference_body(&metadata), "\"[Post](https://example.com/post)\".");
/// ```
pub fn format_reference_body(metadata: &CitationMetadata) -> String {
    let present = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let date = present(&metadata.date);
    let author = present(&metadata.author);
    let site_name = present(&metadata.site_name);

    let title = match metadata.title.trim() {
        "" => metadata.url.as_str(),
        title => title,
    };

    let mut body = String::new();
    if let Some(date) = &date {
        body.push_str(&format!("{}. ", date));
    }
    match &site_name {
        Some(site) => body.push_str(&format!("\"[{} | {}]({})\"", title, site, metadata.url)),
        None => body.push_str(&format!("\"[{}]({})\"", title, metadata.url)),
    }
    if let Some(author) = &author {
        body.push_str(&format!(". {}", author));
    }
    if let Some(site) = &site_name {
        if let Some(origin) = site_origin(&metadata.url) {
            body.push_str(&format!(". [{}]({})", site, origin));
        }
    }
    body.push('.');
    body
}

fn site_origin(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Turns a URL into citation metadata.
pub trait MetadataExtractor {
    fn extract(&self, url: &Url) -> Result<CitationMetadata>;
}

/// Response body of the extraction service. `url` may be omitted, in which
/// case the requested URL is used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    site_name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Calls an HTTP extraction service: `GET <endpoint>?url=<url>&token=<api_key>`.
#[derive(Debug, Clone)]
pub struct HttpMetadataExtractor {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpMetadataExtractor {
    pub fn new(settings: &MetadataSettings) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

impl MetadataExtractor for HttpMetadataExtractor {
    fn extract(&self, url: &Url) -> Result<CitationMetadata> {
        if self.endpoint.is_empty() {
            return Err(CiteError::MetadataFetchFailed(
                "no extraction endpoint configured".to_string(),
            ));
        }

        let mut request = ureq::get(&self.endpoint)
            .timeout(self.timeout)
            .query("url", url.as_str());
        if let Some(key) = &self.api_key {
            request = request.query("token", key);
        }

        tracing::debug!(endpoint = %self.endpoint, url = %url, "requesting metadata");
        let response = match request.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(status, _)) => {
                return Err(CiteError::MetadataFetchFailed(format!(
                    "service returned status {}",
                    status
                )))
            }
            Err(e) => return Err(CiteError::MetadataFetchFailed(e.to_string())),
        };

        let body: ExtractionResponse = response
            .into_json()
            .map_err(|e| CiteError::MetadataFetchFailed(format!("invalid response: {}", e)))?;

        let title = body
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CiteError::MetadataFetchFailed("response has no title".to_string()))?;

        Ok(CitationMetadata {
            title,
            author: body.author,
            date: body.date,
            site_name: body.site_name,
            url: body.url.unwrap_or_else(|| url.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata() -> CitationMetadata {
        CitationMetadata {
            title: "Rust 2024".to_string(),
            author: Some("Jane Doe".to_string()),
            date: Some("2024-02-01".to_string()),
            site_name: Some("Rust Blog".to_string()),
            url: "https://blog.rust-lang.org/2024/02/01/post.html".to_string(),
        }
    }

    #[test]
    fn test_format_all_fields() {
        assert_eq!(
            format_reference_body(&metadata()),
            "2024-02-01. \"[Rust 2024 | Rust Blog](https://blog.rust-lang.org/2024/02/01/post.html)\". Jane Doe. [Rust Blog](https://blog.rust-lang.org)."
        );
    }

    #[test]
    fn test_format_without_optional_fields() {
        let m = CitationMetadata {
            author: None,
            date: None,
            site_name: None,
            ..metadata()
        };
        assert_eq!(
            format_reference_body(&m),
            "\"[Rust 2024](https://blog.rust-lang.org/2024/02/01/post.html)\"."
        );
    }

    #[test]
    fn test_format_blank_fields_are_absent() {
        let m = CitationMetadata {
            author: Some("  ".to_string()),
            date: Some(String::new()),
            ..metadata()
        };
        let body = format_reference_body(&m);
        assert!(body.starts_with("\"[Rust 2024 | Rust Blog]"));
        assert!(!body.contains(". ."));
    }

    #[test]
    fn test_format_empty_title_falls_back_to_url() {
        let m = CitationMetadata {
            title: String::new(),
            author: None,
            date: None,
            site_name: None,
            url: "https://example.com/a".to_string(),
        };
        assert_eq!(
            format_reference_body(&m),
            "\"[https://example.com/a](https://example.com/a)\"."
        );
    }

    #[test]
    fn test_format_is_deterministic() {
        assert_eq!(format_reference_body(&metadata()), format_reference_body(&metadata()));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/page").is_ok());
        assert!(validate_url("  http://example.com  ").is_ok());
        assert!(matches!(validate_url("not a url"), Err(CiteError::InvalidUrl { .. })));
        assert!(matches!(
            validate_url("ftp://example.com/file"),
            Err(CiteError::InvalidUrl { .. })
        ));
        assert!(matches!(validate_url("mailto:a@b.c"), Err(CiteError::InvalidUrl { .. })));
    }

    #[test]
    fn test_metadata_json() {
        let json = r#"{"title": "T", "siteName": "S", "url": "https://s.example/t"}"#;
        let m: CitationMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(m.site_name.as_deref(), Some("S"));
        assert_eq!(m.author, None);
    }

    #[test]
    fn test_extractor_without_endpoint() {
        let extractor = HttpMetadataExtractor::new(&MetadataSettings::default());
        let url = validate_url("https://example.com").unwrap();
        assert!(matches!(
            extractor.extract(&url),
            Err(CiteError::MetadataFetchFailed(_))
        ));
    }
}
