//! The check pipeline: settle → extract → match/scan → aggregate.

use tracing::info;

use crate::config::CheckConfig;
use crate::detect::PatternMatcher;
use crate::error::Result;
use crate::extract::Extractor;
use crate::model::{DetectionResult, Extraction};
use crate::page::{PageRenderer, SettledPage};
use crate::render_error::RenderErrorScanner;
use crate::report::aggregate;

/// Runs the detection engine against pages.
#[derive(Debug, Clone, Default)]
pub struct MathChecker {
    config: CheckConfig,
    matcher: PatternMatcher,
    scanner: RenderErrorScanner,
}

impl MathChecker {
    #[must_use]
    pub fn new(config: CheckConfig) -> Self {
        Self {
            config,
            matcher: PatternMatcher::new(),
            scanner: RenderErrorScanner::new(),
        }
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    #[must_use]
    pub fn with_scanner(mut self, scanner: RenderErrorScanner) -> Self {
        self.scanner = scanner;
        self
    }

    #[must_use]
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Load `url` through `renderer` and check it.
    pub async fn check(&self, renderer: &dyn PageRenderer, url: &str) -> Result<DetectionResult> {
        self.config.validate()?;
        info!("Checking {} with the {} renderer", url, renderer.name());
        let page = renderer.settle(url).await?;
        self.check_page(page.as_ref(), url).await
    }

    /// Check an already settled page.
    pub async fn check_page(&self, page: &dyn SettledPage, url: &str) -> Result<DetectionResult> {
        self.config.validate()?;
        let extraction = Extractor::new(&self.config).extract(page).await?;
        Ok(self.evaluate(url, &extraction))
    }

    /// Run both detectors over a captured snapshot. Pure.
    #[must_use]
    pub fn evaluate(&self, url: &str, extraction: &Extraction) -> DetectionResult {
        let pattern_hits = self.matcher.scan(&extraction.units);
        let render_error_hits = self.scanner.scan(&extraction.hosts);
        info!(
            "{} units, {} pattern hits, {} render-error hits",
            extraction.units.len(),
            pattern_hits.len(),
            render_error_hits.len()
        );
        aggregate(url, extraction, pattern_hits, render_error_hits)
    }
}
