//! `mathcheck` - finds math a page failed to render
//!
//! Loads a page, lets its client-side math renderer (MathJax, KaTeX, ...)
//! finish, then reports:
//!
//! - **Raw source** left in visible text: `$$...$$`, `$...$`, `\frac{`,
//!   leftover `\(...\)` spans
//! - **Render errors** the renderer flagged itself: `<math mathcolor="red">`,
//!   `<mjx-merror>`, `.katex-error`, including output stored in shadow roots
//!   and `<template>` fragments
//!
//! # Example
//!
//! ```rust,no_run
//! use mathcheck::{CheckConfig, MathChecker, Report, ReportFormat, StaticRenderer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CheckConfig::default();
//!     let renderer = StaticRenderer::new(config.settle.timeout)?;
//!     let result = MathChecker::new(config)
//!         .check(&renderer, "https://example.com")
//!         .await?;
//!     print!("{}", Report::generate(&result, ReportFormat::Text)?);
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod check;
pub mod config;
pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod page;
pub mod render_error;
pub mod report;

pub use browser::{ChromeOptions, ChromeRenderer, StaticPage, StaticRenderer};
pub use check::MathChecker;
pub use config::{CheckConfig, Granularity, IndexBase, SettleConfig};
pub use detect::{Detector, PatternMatcher};
pub use error::{CheckError, Result};
pub use extract::Extractor;
pub use model::{DetectionResult, Extraction, Hit, HitKind, HostMarkup, Location, TextUnit};
pub use page::{MarkupSource, PageRenderer, RawHost, SettledPage, TextSource};
pub use render_error::{RenderErrorMarker, RenderErrorScanner};
pub use report::{Report, ReportFormat};

/// Version of mathcheck
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
