//! Text/markup extraction from a settled page.
//!
//! Turns the raw strings a [`SettledPage`] hands back into indexed
//! [`TextUnit`]s and [`HostMarkup`]s. Embedded fragments (shadow roots and
//! `<template>` contents) are expanded exactly one level, whatever the host
//! element type is.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::{CheckConfig, IndexBase};
use crate::error::{CheckError, Result};
use crate::model::{Extraction, HostMarkup, TextUnit};
use crate::page::{RawHost, SettledPage};

static TEMPLATE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?template(?:\s[^>]*)?>").unwrap());

/// Pulls text units and host markup out of a settled page.
pub struct Extractor<'a> {
    config: &'a CheckConfig,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub fn new(config: &'a CheckConfig) -> Self {
        Self { config }
    }

    /// Capture the snapshot the detectors run on.
    ///
    /// Fails with [`CheckError::ScopeNotFound`] when the scope selector
    /// matches nothing.
    pub async fn extract(&self, page: &dyn SettledPage) -> Result<Extraction> {
        let scope = &self.config.scope;

        let texts = page
            .text_units(scope, self.config.granularity)
            .await?
            .ok_or_else(|| CheckError::ScopeNotFound(scope.clone()))?;

        let raw_hosts = page
            .host_markup(scope, &self.config.hosts)
            .await?
            .ok_or_else(|| CheckError::ScopeNotFound(scope.clone()))?;

        let units = build_units(texts, self.config.index_base);
        let offset = self.config.index_base.offset();
        let hosts: Vec<HostMarkup> = raw_hosts
            .into_iter()
            .enumerate()
            .map(|(i, raw)| expand_fragments(i + offset, raw))
            .collect();

        debug!(
            "Extracted {} text units and {} math hosts from `{}`",
            units.len(),
            hosts.len(),
            scope
        );

        Ok(Extraction { units, hosts })
    }
}

/// Trim, drop empty strings, then number what is left.
pub fn build_units<I>(texts: I, base: IndexBase) -> Vec<TextUnit>
where
    I: IntoIterator<Item = String>,
{
    texts
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(i, content)| TextUnit {
            index: i + base.offset(),
            content,
        })
        .collect()
}

/// Expand one level of embedded fragments of a host.
///
/// The shadow root (if any) becomes the first fragment. Every top-level
/// `<template>` is cut out of the direct markup and its contents appended as
/// a fragment. Templates nested inside a template stay in that fragment.
#[must_use]
pub fn expand_fragments(index: usize, raw: RawHost) -> HostMarkup {
    let (markup, templates) = split_templates(&raw.markup);

    let mut fragments = Vec::with_capacity(templates.len() + 1);
    if let Some(shadow) = raw.shadow {
        fragments.push(shadow);
    }
    fragments.extend(templates);

    HostMarkup {
        index,
        markup,
        fragments,
    }
}

fn split_templates(markup: &str) -> (String, Vec<String>) {
    let mut direct = String::with_capacity(markup.len());
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut cursor = 0;
    let mut content_start = 0;

    for tag in TEMPLATE_TAG.find_iter(markup) {
        if tag.as_str().starts_with("</") {
            match depth {
                // stray close tag stays in the direct markup
                0 => {}
                1 => {
                    fragments.push(markup[content_start..tag.start()].to_string());
                    cursor = tag.end();
                    depth = 0;
                }
                _ => depth -= 1,
            }
        } else {
            if depth == 0 {
                direct.push_str(&markup[cursor..tag.start()]);
                content_start = tag.end();
            }
            depth += 1;
        }
    }

    if depth > 0 {
        // unterminated template runs to the end of the markup
        fragments.push(markup[content_start..].to_string());
    } else {
        direct.push_str(&markup[cursor..]);
    }

    (direct, fragments)
}
