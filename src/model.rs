//! Value types shared by the extractor, the detectors and the report.

use std::fmt;

use serde::Serialize;

/// One visible text unit, in extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextUnit {
    pub index: usize,
    pub content: String,
}

/// Serialized markup of one math host element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMarkup {
    pub index: usize,
    /// Inner markup with embedded `<template>` fragments cut out.
    pub markup: String,
    /// Shadow-root markup first (when present), then each top-level template.
    pub fragments: Vec<String>,
}

/// Snapshot captured from a settled page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub units: Vec<TextUnit>,
    pub hosts: Vec<HostMarkup>,
}

/// What produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitKind {
    /// Raw math source left in visible text.
    Pattern,
    /// Renderer-emitted error marker.
    RenderError,
}

/// Where a hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "index", rename_all = "kebab-case")]
pub enum Location {
    /// A [`TextUnit`] index.
    Unit(usize),
    /// A [`HostMarkup`] index.
    Host(usize),
    /// Somewhere in the scope, not attributable to one element.
    Scope,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(i) | Self::Host(i) => write!(f, "{i}"),
            Self::Scope => f.write_str("scope"),
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    pub location: Location,
    pub kind: HitKind,
    pub snippet: String,
    /// Detector or marker name.
    pub matched_by: &'static str,
}

/// The report of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub source_url: String,
    pub units_checked: usize,
    pub hits: Vec<Hit>,
}

impl DetectionResult {
    pub fn pattern_hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().filter(|h| h.kind == HitKind::Pattern)
    }

    pub fn render_error_hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().filter(|h| h.kind == HitKind::RenderError)
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.hits.is_empty()
    }
}
