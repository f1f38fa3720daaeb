//! Static page renderer.
//!
//! Parses HTML as served, without running scripts. Useful for pages that are
//! rendered server-side, for saved snapshots (`file://` URLs), and as the
//! in-memory page behind tests.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::{parse_selector, Granularity};
use crate::error::{CheckError, Result};
use crate::page::{MarkupSource, PageRenderer, RawHost, SettledPage, TextSource};

/// Elements whose subtree never yields visible text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// An HTML document held in memory.
///
/// The document is re-parsed per query; `scraper::Html` is not `Send`.
#[derive(Debug, Clone)]
pub struct StaticPage {
    html: String,
}

impl StaticPage {
    #[must_use]
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    fn with_scope<T>(&self, scope: &str, f: impl FnOnce(ElementRef<'_>) -> Result<T>) -> Result<Option<T>> {
        let selector = parse_selector(scope)?;
        let document = Html::parse_document(&self.html);
        document.select(&selector).next().map(f).transpose()
    }
}

#[async_trait]
impl TextSource for StaticPage {
    async fn text_units(&self, scope: &str, granularity: Granularity) -> Result<Option<Vec<String>>> {
        self.with_scope(scope, |root| Ok(collect_texts(root, granularity)))
    }
}

#[async_trait]
impl MarkupSource for StaticPage {
    async fn host_markup(&self, scope: &str, hosts: &str) -> Result<Option<Vec<RawHost>>> {
        let host_selector = parse_selector(hosts)?;
        self.with_scope(scope, |root| Ok(collect_hosts(root, &host_selector)))
    }
}

fn collect_texts(root: ElementRef<'_>, granularity: Granularity) -> Vec<String> {
    root.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| !is_hidden(*el, root))
        .filter_map(|el| match granularity {
            Granularity::SingleTextChild => single_text_child(el),
            Granularity::InnerText => Some(visible_text(el)),
        })
        .collect()
}

fn collect_hosts(root: ElementRef<'_>, hosts: &Selector) -> Vec<RawHost> {
    root.select(hosts)
        .filter(|el| el.id() != root.id())
        .filter(|el| !is_hidden(*el, root))
        .filter(|el| is_outermost(*el, root, hosts))
        .map(|el| RawHost {
            markup: el.inner_html(),
            shadow: None,
        })
        .collect()
}

/// `el` or one of its ancestors below `root` is a hidden element.
fn is_hidden(el: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .take_while(|a| a.id() != root.id())
        .any(|a| HIDDEN_ELEMENTS.contains(&a.value().name()))
}

/// No ancestor between `el` and `root` also matches the host selector.
fn is_outermost(el: ElementRef<'_>, root: ElementRef<'_>, hosts: &Selector) -> bool {
    !el.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| a.id() != root.id())
        .any(|a| hosts.matches(&a))
}

fn single_text_child(el: ElementRef<'_>) -> Option<String> {
    let mut children = el.children();
    match (children.next(), children.next()) {
        (Some(only), None) => only.value().as_text().map(|t| String::from(&**t)),
        _ => None,
    }
}

fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(el, &mut out);
    out
}

fn push_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !HIDDEN_ELEMENTS.contains(&child_el.value().name()) {
                push_visible_text(child_el, out);
            }
        }
    }
}

/// Fetches `http(s)://` pages or reads `file://` snapshots; no scripts run.
pub struct StaticRenderer {
    client: reqwest::Client,
}

impl StaticRenderer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mathcheck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CheckError::Browser(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CheckError::navigation(url, e.to_string()))?;
        debug!("{} responded {}", url, response.status());
        response
            .text()
            .await
            .map_err(|e| CheckError::navigation(url, e.to_string()))
    }
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn settle(&self, url: &str) -> Result<Box<dyn SettledPage>> {
        let parsed =
            Url::parse(url).map_err(|e| CheckError::Usage(format!("invalid URL `{url}`: {e}")))?;

        let html = match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|()| CheckError::navigation(url, "not a local file path"))?;
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| CheckError::navigation(url, e.to_string()))?
            }
            "http" | "https" => self.fetch(url).await?,
            other => {
                return Err(CheckError::Usage(format!("unsupported URL scheme `{other}`")));
            }
        };

        info!("Loaded {} bytes from {}", html.len(), url);
        Ok(Box::new(StaticPage::from_html(html)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>t</title></head><body>
        <main id="content">
          <h1>Heading</h1>
          <p>Inline $x$ left raw</p>
          <p>Mixed <em>markup</em> here</p>
          <script>window.MathJax = { tex: { inlineMath: [['$', '$']] } };</script>
          <mjx-container class="MathJax"><mjx-math>ok</mjx-math>
            <mjx-container><mjx-math>nested</mjx-math></mjx-container>
          </mjx-container>
          <template><p>$inert$</p></template>
        </main>
        <footer><p>outside</p></footer>
    </body></html>"#;

    #[tokio::test]
    async fn strict_units_skip_scripts_and_templates() {
        let page = StaticPage::from_html(PAGE);
        let texts = page
            .text_units("#content", Granularity::SingleTextChild)
            .await
            .unwrap()
            .unwrap();
        let trimmed: Vec<_> = texts.iter().map(|t| t.trim()).collect();
        assert_eq!(trimmed, ["Heading", "Inline $x$ left raw", "markup", "ok", "nested"]);
    }

    #[tokio::test]
    async fn inner_text_units_include_composed_text() {
        let page = StaticPage::from_html(PAGE);
        let texts = page
            .text_units("#content", Granularity::InnerText)
            .await
            .unwrap()
            .unwrap();
        assert!(texts.iter().any(|t| t == "Mixed markup here"));
        assert!(texts.iter().all(|t| !t.contains("inlineMath")));
        assert!(texts.iter().all(|t| !t.contains("$inert$")));
    }

    #[tokio::test]
    async fn only_outermost_hosts_are_returned() {
        let page = StaticPage::from_html(PAGE);
        let hosts = page
            .host_markup("#content", "mjx-container")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hosts.len(), 1);
        assert!(hosts[0].markup.contains("nested"));
        assert!(hosts[0].shadow.is_none());
    }

    #[tokio::test]
    async fn missing_scope_is_none() {
        let page = StaticPage::from_html(PAGE);
        assert!(page
            .text_units("#nope", Granularity::SingleTextChild)
            .await
            .unwrap()
            .is_none());
        assert!(page.host_markup("#nope", ".katex").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_host_selector_is_an_error() {
        let page = StaticPage::from_html(PAGE);
        let err = page.host_markup("body", "[[").await.unwrap_err();
        assert!(matches!(err, CheckError::InvalidSelector { .. }));
    }

    #[tokio::test]
    async fn renderer_reads_file_urls() {
        let path = std::env::temp_dir().join(format!("mathcheck-{}.html", uuid::Uuid::new_v4()));
        std::fs::write(&path, "<body><p>$$a$$</p></body>").unwrap();
        let url = Url::from_file_path(&path).unwrap().to_string();

        let renderer = StaticRenderer::new(Duration::from_secs(5)).unwrap();
        let page = renderer.settle(&url).await.unwrap();
        let texts = page
            .text_units("body", Granularity::SingleTextChild)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(texts, ["$$a$$"]);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_a_navigation_error() {
        let renderer = StaticRenderer::new(Duration::from_secs(5)).unwrap();
        let err = renderer
            .settle("file:///definitely/not/here/mathcheck.html")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CheckError::Navigation { .. }));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_a_usage_error() {
        let renderer = StaticRenderer::new(Duration::from_secs(5)).unwrap();
        let err = renderer.settle("ftp://example.com/x").await.err().unwrap();
        assert!(matches!(err, CheckError::Usage(_)));
    }
}
