//! Page renderer interfaces.
//!
//! The detection engine only sees a page through [`TextSource`] and
//! [`MarkupSource`]. Renderers hand out a [`SettledPage`] from
//! [`PageRenderer::settle`] only after their settle wait has finished, so
//! extraction never races the page's own math rendering.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Granularity;
use crate::error::Result;

/// Markup of one math host as reported by a renderer, before fragment
/// expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawHost {
    /// The element's serialized inner markup.
    pub markup: String,
    /// The element's shadow-root markup, when the renderer can see one.
    #[serde(default)]
    pub shadow: Option<String>,
}

/// Visible text of a scope.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Raw text of every qualifying element under `scope`, in document order.
    ///
    /// Returns `Ok(None)` when `scope` matches nothing. Trimming and
    /// empty-filtering are left to the caller.
    async fn text_units(&self, scope: &str, granularity: Granularity) -> Result<Option<Vec<String>>>;
}

/// Markup of math host elements in a scope.
#[async_trait]
pub trait MarkupSource: Send + Sync {
    /// Markup of every outermost element matching `hosts` under `scope`.
    ///
    /// Returns `Ok(None)` when `scope` matches nothing.
    async fn host_markup(&self, scope: &str, hosts: &str) -> Result<Option<Vec<RawHost>>>;
}

/// A page whose client-side rendering has finished.
pub trait SettledPage: TextSource + MarkupSource {}

impl<T: TextSource + MarkupSource> SettledPage for T {}

/// Loads a URL and waits for it to settle.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Navigate to `url` and return a handle once rendering has settled.
    ///
    /// Load failures and settle timeouts are
    /// [`CheckError::Navigation`](crate::CheckError::Navigation).
    async fn settle(&self, url: &str) -> Result<Box<dyn SettledPage>>;
}
