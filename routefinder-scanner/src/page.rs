// Page context: what a scan session can see of one loaded page

use crate::error::{Result, ScanError};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Read access to a loaded page.
pub trait Page: Send + Sync {
    /// URLs of every resource the page loaded.
    fn resource_entries(&self) -> Result<Vec<String>>;

    /// `src` of every `<script>` element, empty for inline scripts.
    fn script_sources(&self) -> Result<Vec<String>>;

    /// Full document markup.
    fn markup(&self) -> Result<String>;

    /// Whether the document carries a framework root marker.
    fn has_framework_root(&self) -> bool;
}

/// Resource list heuristic for JavaScript bundles.
pub fn is_script_resource(url: &str) -> bool {
    url.contains(".js") || url.contains("chunk") || url.contains("bundle")
}

/// Immutable capture of a page after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub resources: Vec<String>,
    pub scripts: Vec<String>,
    pub markup: String,
    pub framework_root: bool,
}

const RESOURCE_SELECTORS: &[(&str, &str)] = &[
    ("script[src]", "src"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("iframe[src]", "src"),
    ("source[src]", "src"),
];

const FRAMEWORK_ROOT_SELECTOR: &str = "[data-reactroot], [vue-app], [ng-app]";

impl PageSnapshot {
    /// Loads `url` and captures it. A non-success status is an error.
    pub async fn load(client: &Client, url: &Url) -> Result<Self> {
        debug!("Loading page {}", url);
        let response = client.get(url.as_str()).send().await?.error_for_status()?;
        let final_url = response.url().clone();
        let body = response.text().await?;
        Self::from_html(&final_url, &body)
    }

    /// Parses already-fetched markup. Relative references resolve against
    /// `base`.
    pub fn from_html(base: &Url, html: &str) -> Result<Self> {
        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut resources = Vec::new();
        for (css, attr) in RESOURCE_SELECTORS {
            for element in document.select(&parse_selector(css)?) {
                if let Some(value) = element.value().attr(attr)
                    && let Some(absolute) = resolve_url(base, value)
                    && seen.insert(absolute.clone())
                {
                    resources.push(absolute);
                }
            }
        }

        let scripts = document
            .select(&parse_selector("script")?)
            .map(|element| {
                element
                    .value()
                    .attr("src")
                    .and_then(|src| resolve_url(base, src))
                    .unwrap_or_default()
            })
            .collect();

        let framework_root = document
            .select(&parse_selector(FRAMEWORK_ROOT_SELECTOR)?)
            .next()
            .is_some();

        Ok(Self {
            url: base.to_string(),
            resources,
            scripts,
            markup: html.to_string(),
            framework_root,
        })
    }
}

impl Page for PageSnapshot {
    fn resource_entries(&self) -> Result<Vec<String>> {
        Ok(self.resources.clone())
    }

    fn script_sources(&self) -> Result<Vec<String>> {
        Ok(self.scripts.clone())
    }

    fn markup(&self) -> Result<String> {
        Ok(self.markup.clone())
    }

    fn has_framework_root(&self) -> bool {
        self.framework_root
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::Other(format!("bad selector {}: {}", css, e)))
}

fn resolve_url(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty()
        || reference.starts_with("javascript:")
        || reference.starts_with("data:")
        || reference.starts_with('#')
    {
        return None;
    }

    let mut url = base.join(reference).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const SAMPLE: &str = r#"<html>
        <head>
            <link rel="stylesheet" href="/static/site.css">
            <link rel="modulepreload" href="/static/vendor-chunk.mjs">
            <script src="/static/main.js"></script>
            <script src="https://cdn.example.net/react.production.min.js"></script>
        </head>
        <body>
            <div id="root" data-reactroot></div>
            <img src="logo.png">
            <script>window.boot('/inline')</script>
            <script src="/static/main.js"></script>
        </body>
    </html>"#;

    #[test]
    fn test_from_html_collects_unique_resources() {
        let base = Url::parse("https://app.example.com/dashboard/").unwrap();
        let page = PageSnapshot::from_html(&base, SAMPLE).unwrap();

        assert_eq!(
            page.resources,
            vec![
                "https://app.example.com/static/main.js",
                "https://cdn.example.net/react.production.min.js",
                "https://app.example.com/static/site.css",
                "https://app.example.com/static/vendor-chunk.mjs",
                "https://app.example.com/dashboard/logo.png",
            ]
        );
    }

    #[test]
    fn test_from_html_keeps_every_script_element() {
        let base = Url::parse("https://app.example.com/").unwrap();
        let page = PageSnapshot::from_html(&base, SAMPLE).unwrap();

        assert_eq!(page.scripts.len(), 4);
        assert_eq!(page.scripts[0], "https://app.example.com/static/main.js");
        assert_eq!(page.scripts[2], "");
        assert!(page.has_framework_root());
    }

    #[test]
    fn test_script_resource_filter() {
        assert!(is_script_resource("https://x.test/app.js"));
        assert!(is_script_resource("https://x.test/vendor-chunk.mjs"));
        assert!(is_script_resource("https://x.test/bundle?v=2"));
        assert!(!is_script_resource("https://x.test/site.css"));
        assert!(!is_script_resource("https://x.test/logo.png"));
    }

    #[test]
    fn test_resolve_url_skips_pseudo_links() {
        let base = Url::parse("https://x.test/").unwrap();
        assert_eq!(resolve_url(&base, "javascript:void(0)"), None);
        assert_eq!(resolve_url(&base, "#top"), None);
        assert_eq!(
            resolve_url(&base, "/a.js#frag"),
            Some("https://x.test/a.js".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_fetches_and_parses() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(r#"<html><script src="/app.js"></script></html>"#),
            )
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let url = Url::parse(&mock_server.uri()).unwrap();
        let page = PageSnapshot::load(&client, &url).await.unwrap();

        assert_eq!(page.resources, vec![format!("{}/app.js", mock_server.uri())]);
        assert!(!page.has_framework_root());
    }

    #[tokio::test]
    async fn test_load_rejects_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let url = Url::parse(&mock_server.uri()).unwrap();
        assert!(PageSnapshot::load(&client, &url).await.is_err());
    }
}
