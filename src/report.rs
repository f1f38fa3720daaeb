//! Report aggregation and rendering.

use std::fmt::Write as FmtWrite;

use crate::error::Result;
use crate::model::{DetectionResult, Extraction, Hit};

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable lines (default)
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Message printed when no pattern hit was found.
pub const NO_ISSUES: &str = "No raw math source found.";

/// Merge hits into a result: pattern hits first, then render-error hits,
/// each group in scan order. Nothing is filtered or deduplicated.
#[must_use]
pub fn aggregate(
    source_url: &str,
    extraction: &Extraction,
    pattern_hits: Vec<Hit>,
    render_error_hits: Vec<Hit>,
) -> DetectionResult {
    let mut hits = pattern_hits;
    hits.extend(render_error_hits);
    DetectionResult {
        source_url: source_url.to_string(),
        units_checked: extraction.units.len(),
        hits,
    }
}

/// Renders a [`DetectionResult`].
pub struct Report;

impl Report {
    pub fn generate(result: &DetectionResult, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(Self::to_text(result)),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(result)? + "\n"),
        }
    }

    fn to_text(result: &DetectionResult) -> String {
        let mut out = String::new();

        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "Checked {} text nodes on {}",
            result.units_checked, result.source_url
        );

        let pattern: Vec<&Hit> = result.pattern_hits().collect();
        if pattern.is_empty() {
            let _ = writeln!(out, "{NO_ISSUES}");
        } else {
            let _ = writeln!(out, "Potential unrendered math:");
            for hit in pattern {
                let _ = writeln!(out, "- [{}] {}", hit.location, hit.snippet);
            }
        }

        let render_errors: Vec<&Hit> = result.render_error_hits().collect();
        if !render_errors.is_empty() {
            let _ = writeln!(out, "Render errors: {}", render_errors.len());
            for hit in render_errors {
                let _ = writeln!(out, "- [{}] {}", hit.location, hit.snippet);
            }
        }

        out
    }
}
