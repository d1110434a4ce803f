// src/services/listing.rs

//! Candidate archive discovery from the remote index page.

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::AcquisitionConfig;

/// Lists candidate archive names from an index page.
pub struct IndexLister {
    client: Client,
    index_url: String,
    selector: Selector,
    pattern: Regex,
    timeout: std::time::Duration,
}

impl IndexLister {
    pub fn new(config: &AcquisitionConfig, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            index_url: config.index_url(),
            selector: parse_selector(&config.link_selector)?,
            pattern: config.file_regex()?,
            timeout: config.index_timeout(),
        })
    }

    /// Fetch the index page and return the matching file names in page order.
    pub async fn list(&self) -> Result<Vec<String>> {
        log::info!("Fetching index {}", self.index_url);
        let body = tokio::time::timeout(self.timeout, self.fetch_index())
            .await
            .map_err(|_| AppError::timeout(format!("loading {}", self.index_url), self.timeout))??;

        let candidates = self.extract(&body);
        log::info!("Found {} candidate archives", candidates.len());
        Ok(candidates)
    }

    /// Candidate names found in an already loaded page.
    pub fn extract(&self, html: &str) -> Vec<String> {
        extract_candidates(html, &self.selector, &self.pattern)
    }

    async fn fetch_index(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.index_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::fetch(&self.index_url, e))?;
        Ok(response.text().await?)
    }
}

/// Parse a CSS selector, mapping the parser's error into [`AppError`].
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// Names of linked files that match `pattern`, deduplicated, in page order.
///
/// The link target is taken from `href`, falling back to `src`. Only the last
/// path segment is matched, so absolute and relative links behave alike.
pub fn extract_candidates(html: &str, selector: &Selector, pattern: &Regex) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();

    for element in document.select(selector) {
        let attrs = element.value();
        let Some(target) = attrs.attr("href").or_else(|| attrs.attr("src")) else {
            continue;
        };
        let name = target
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim();
        if pattern.is_match(name) && seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <html><body>
          <a href="md5sums">md5sums</a>
          <a href="20130402.export.CSV.zip">20130402.export.CSV.zip</a>
          <a href="http://data.example.org/events/20130401.export.CSV.zip">abs</a>
          <a href="GDELT.MASTERREDUCEDV2.1979-2013.zip">master</a>
          <a href="20130402.export.CSV.zip">duplicate</a>
          <a>no target</a>
          <img src="1979.zip">
        </body></html>
    "#;

    fn default_pattern() -> Regex {
        AcquisitionConfig::default().file_regex().unwrap()
    }

    #[test]
    fn test_extracts_matching_links_in_order() {
        let names = extract_candidates(INDEX, &parse_selector("a").unwrap(), &default_pattern());
        assert_eq!(
            names,
            vec!["20130402.export.CSV.zip", "20130401.export.CSV.zip"]
        );
    }

    #[test]
    fn test_src_is_used_without_href() {
        let names = extract_candidates(
            INDEX,
            &parse_selector("a, img").unwrap(),
            &Regex::new(r"^[0-9]+\.zip$").unwrap(),
        );
        assert_eq!(names, vec!["1979.zip"]);
    }

    #[test]
    fn test_page_without_links() {
        let names = extract_candidates(
            "<html><body><p>empty</p></body></html>",
            &parse_selector("a").unwrap(),
            &default_pattern(),
        );
        assert!(names.is_empty());
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            parse_selector("a[[["),
            Err(AppError::Selector { .. })
        ));
    }
}
