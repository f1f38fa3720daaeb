//! Scanner for error markers emitted by the math renderer itself.
//!
//! Renderers that fail to convert an expression still emit output, tagged
//! with a marker. Each host is scanned in its direct markup and then in each
//! embedded fragment, since widget renderers keep their real output there.
//!
//! ## Markers (priority order)
//!
//! - `mathml-error-color`: `<math mathcolor="red">`
//! - `mathjax-merror`: `<mjx-merror data-mjx-error="...">` (MathJax CHTML)
//! - `katex-error`: `<span class="katex-error">` (KaTeX, `throwOnError: false`)

use std::iter;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::model::{Hit, HitKind, HostMarkup, Location};

pub const MATHML_ERROR_COLOR: &str = "mathml-error-color";
pub const MATHJAX_MERROR: &str = "mathjax-merror";
pub const KATEX_ERROR: &str = "katex-error";

/// Snippet of the scope-level hit when no element could be localized.
pub const UNLOCALIZED_SNIPPET: &str = "render-error marker present, not localized to an element";

/// One renderer error signature.
#[derive(Debug, Clone)]
pub struct RenderErrorMarker {
    name: &'static str,
    /// Matches a whole flagged element, open tag to close tag.
    element: Regex,
    /// Matches the bare attribute/class signature anywhere.
    signature: Regex,
}

impl RenderErrorMarker {
    pub fn new(name: &'static str, element: &str, signature: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            element: Regex::new(element)?,
            signature: Regex::new(signature)?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the signature occurs anywhere in `markup`.
    #[must_use]
    pub fn is_present(&self, markup: &str) -> bool {
        self.signature.is_match(markup)
    }
}

static DEFAULT_MARKERS: LazyLock<Vec<RenderErrorMarker>> = LazyLock::new(|| {
    vec![
        RenderErrorMarker::new(
            MATHML_ERROR_COLOR,
            r#"(?is)<math\s[^>]*?\bmathcolor\s*=\s*["']?red\b[^>]*>.*?</math\s*>"#,
            r#"(?i)\bmathcolor\s*=\s*["']?red\b"#,
        )
        .unwrap(),
        RenderErrorMarker::new(
            MATHJAX_MERROR,
            r"(?is)<mjx-merror(?:\s[^>]*)?>.*?</mjx-merror\s*>",
            r"(?i)<mjx-merror\b|\bdata-mjx-error\b",
        )
        .unwrap(),
        RenderErrorMarker::new(
            KATEX_ERROR,
            r#"(?is)<span\s[^>]*?\bclass\s*=\s*["'][^"']*\bkatex-error\b[^"']*["'][^>]*>.*?</span\s*>"#,
            r"(?i)\bkatex-error\b",
        )
        .unwrap(),
    ]
});

/// Finds render-error markers in captured host markup.
#[derive(Debug, Clone)]
pub struct RenderErrorScanner {
    markers: Vec<RenderErrorMarker>,
}

impl RenderErrorScanner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            markers: DEFAULT_MARKERS.clone(),
        }
    }

    #[must_use]
    pub fn with_markers(markers: Vec<RenderErrorMarker>) -> Self {
        Self { markers }
    }

    /// Localized hits in host order, or a single scope-level hit when a
    /// marker signature exists but no flagged element could be isolated.
    #[must_use]
    pub fn scan(&self, hosts: &[HostMarkup]) -> Vec<Hit> {
        let mut hits = Vec::new();
        for host in hosts {
            for segment in iter::once(&host.markup).chain(&host.fragments) {
                self.scan_segment(host.index, segment, &mut hits);
            }
        }

        if hits.is_empty() {
            if let Some(marker) = self.unlocalized_marker(hosts) {
                hits.push(Hit {
                    location: Location::Scope,
                    kind: HitKind::RenderError,
                    snippet: UNLOCALIZED_SNIPPET.to_string(),
                    matched_by: marker,
                });
            }
        }

        hits
    }

    fn scan_segment(&self, index: usize, segment: &str, hits: &mut Vec<Hit>) {
        let mut found: Vec<(usize, &'static str, &str)> = self
            .markers
            .iter()
            .flat_map(|marker| {
                marker
                    .element
                    .find_iter(segment)
                    .map(move |m| (m.start(), marker.name, m.as_str()))
            })
            .collect();
        // document order within the segment; stable sort keeps table order on ties
        found.sort_by_key(|(start, _, _)| *start);

        hits.extend(found.into_iter().map(|(_, matched_by, markup)| Hit {
            location: Location::Host(index),
            kind: HitKind::RenderError,
            snippet: markup_text(markup),
            matched_by,
        }));
    }

    fn unlocalized_marker(&self, hosts: &[HostMarkup]) -> Option<&'static str> {
        self.markers
            .iter()
            .find(|marker| {
                hosts.iter().any(|host| {
                    marker.is_present(&host.markup)
                        || host.fragments.iter().any(|f| marker.is_present(f))
                })
            })
            .map(RenderErrorMarker::name)
    }
}

impl Default for RenderErrorScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Text content of a markup fragment, entities decoded, whitespace runs
/// collapsed to one space.
#[must_use]
pub fn markup_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
