//! Pattern matching for math source left unrendered in visible text.
//!
//! ## Detectors (priority order)
//!
//! | Name | Looks for |
//! |------|-----------|
//! | `block-delimiter` | `$$` anywhere |
//! | `inline-delimiter-pair` | `$...$` on one line |
//! | `latex-command` | `\frac{`, `\sqrt{`, `\mathbf{`, ... |
//! | `escaped-paren` | `( ... \ ... )` such as a leftover `\(x\)` or `\(\sin(x)\)` |
//!
//! A unit produces at most one hit, attributed to the first detector that
//! matches.
//!
//! ## Known false positives
//!
//! Prices such as `"$5 and $10"` match `inline-delimiter-pair`. This is a
//! property of the surface heuristic and is reported like any other hit.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Hit, HitKind, Location, TextUnit};

/// A named predicate over trimmed unit text.
#[derive(Debug, Clone)]
pub struct Detector {
    name: &'static str,
    regex: Regex,
}

impl Detector {
    /// Build a detector from a regex pattern.
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The pattern this detector applies.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

pub const BLOCK_DELIMITER: &str = "block-delimiter";
pub const INLINE_DELIMITER_PAIR: &str = "inline-delimiter-pair";
pub const LATEX_COMMAND: &str = "latex-command";
pub const ESCAPED_PAREN: &str = "escaped-paren";

static DEFAULT_DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    vec![
        Detector::new(BLOCK_DELIMITER, r"\$\$").unwrap(),
        Detector::new(INLINE_DELIMITER_PAIR, r"\$(.+?)\$").unwrap(),
        Detector::new(
            LATEX_COMMAND,
            r"\\(?:frac|dfrac|tfrac|sqrt|mathrm|mathbf|mathit|mathcal|mathbb|mathsf|textbf|text|operatorname|begin|end|hat|bar|vec|tilde|overline|underline|boldsymbol)\{",
        )
        .unwrap(),
        Detector::new(ESCAPED_PAREN, r"\(.*\\.*\)").unwrap(),
    ]
});

/// The built-in detector table.
#[must_use]
pub fn default_detectors() -> &'static [Detector] {
    &DEFAULT_DETECTORS
}

/// Applies an ordered detector table to text units.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    detectors: Vec<Detector>,
}

impl PatternMatcher {
    /// Matcher over the built-in table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: default_detectors().to_vec(),
        }
    }

    /// Matcher over a caller-supplied table, evaluated in the given order.
    #[must_use]
    pub fn with_detectors(detectors: Vec<Detector>) -> Self {
        Self { detectors }
    }

    #[must_use]
    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Name of the first detector matching `text`, if any.
    #[must_use]
    pub fn first_match(&self, text: &str) -> Option<&'static str> {
        let text = text.trim();
        self.detectors
            .iter()
            .find(|d| d.matches(text))
            .map(Detector::name)
    }

    /// One hit per unit that any detector matches, in unit order.
    #[must_use]
    pub fn scan(&self, units: &[TextUnit]) -> Vec<Hit> {
        units
            .iter()
            .filter_map(|unit| {
                self.first_match(&unit.content).map(|matched_by| Hit {
                    location: Location::Unit(unit.index),
                    kind: HitKind::Pattern,
                    snippet: unit.content.trim().to_string(),
                    matched_by,
                })
            })
            .collect()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(index: usize, content: &str) -> TextUnit {
        TextUnit {
            index,
            content: content.to_string(),
        }
    }

    #[test]
    fn currency_is_an_inline_pair_false_positive() {
        let matcher = PatternMatcher::new();
        assert_eq!(
            matcher.first_match("The price is $5 and $10"),
            Some(INLINE_DELIMITER_PAIR)
        );
    }

    #[test]
    fn plain_formula_without_delimiters_is_clean() {
        let matcher = PatternMatcher::new();
        assert_eq!(matcher.first_match("E = mc^2"), None);
    }

    #[test]
    fn block_marker_wins_over_inline_pair() {
        let matcher = PatternMatcher::new();
        assert_eq!(
            matcher.first_match("$$x^2 + y^2 = z^2$$"),
            Some(BLOCK_DELIMITER)
        );
    }

    #[test]
    fn lone_double_dollar_is_a_block_marker() {
        assert_eq!(PatternMatcher::new().first_match("see $$"), Some(BLOCK_DELIMITER));
    }

    #[test]
    fn single_dollar_is_clean() {
        assert_eq!(PatternMatcher::new().first_match("costs $5"), None);
    }

    #[test]
    fn inline_pair_does_not_cross_lines() {
        let matcher = PatternMatcher::new();
        assert_eq!(matcher.first_match("costs $5\nor $6 later"), None);
        assert_eq!(matcher.first_match("where $a_i$ is"), Some(INLINE_DELIMITER_PAIR));
    }

    #[test]
    fn latex_command_needs_an_opening_brace() {
        let matcher = PatternMatcher::new();
        assert_eq!(matcher.first_match(r"ratio \frac{a}{b}"), Some(LATEX_COMMAND));
        assert_eq!(matcher.first_match(r"\mathbb{R}^n"), Some(LATEX_COMMAND));
        assert_eq!(matcher.first_match(r"\frac a b"), None);
        assert_eq!(matcher.first_match("a fraction {a}"), None);
    }

    #[test]
    fn escaped_paren_span() {
        let matcher = PatternMatcher::new();
        assert_eq!(matcher.first_match(r"inline \(x^2\) here"), Some(ESCAPED_PAREN));
        assert_eq!(matcher.first_match(r"path (C:\temp)"), Some(ESCAPED_PAREN));
        assert_eq!(matcher.first_match("plain (aside) text"), None);
    }

    #[test]
    fn escaped_paren_span_with_inner_parens() {
        let matcher = PatternMatcher::new();
        assert_eq!(matcher.first_match(r"where \(\sin(x)\) holds"), Some(ESCAPED_PAREN));
        assert_eq!(matcher.first_match(r"let \(f(x) = 2\)"), Some(ESCAPED_PAREN));
        assert_eq!(matcher.first_match(r"(see \cos(y) below)"), Some(ESCAPED_PAREN));
        assert_eq!(matcher.first_match("f(x) = g(h(x))"), None);
    }

    #[test]
    fn one_hit_per_unit_with_first_detector() {
        let matcher = PatternMatcher::new();
        // block, inline pair and latex command all match
        let units = vec![unit(0, r"$$\frac{1}{2}$$ and $y$")];
        let hits = matcher.scan(&units);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched_by, BLOCK_DELIMITER);
        assert_eq!(hits[0].location, Location::Unit(0));
        assert_eq!(hits[0].kind, HitKind::Pattern);
    }

    #[test]
    fn scan_keeps_unit_order_and_indices() {
        let matcher = PatternMatcher::new();
        let units = vec![
            unit(1, "clean"),
            unit(2, "$a$"),
            unit(3, "also clean"),
            unit(4, r"\sqrt{2}"),
        ];
        let hits = matcher.scan(&units);
        let locations: Vec<_> = hits.iter().map(|h| h.location).collect();
        assert_eq!(locations, [Location::Unit(2), Location::Unit(4)]);
        assert_eq!(hits[1].matched_by, LATEX_COMMAND);
    }

    #[test]
    fn detectors_run_on_trimmed_text() {
        let matcher = PatternMatcher::new();
        let hits = matcher.scan(&[unit(0, "   $x$   ")]);
        assert_eq!(hits[0].snippet, "$x$");
    }

    #[test]
    fn custom_table_order_is_respected() {
        let matcher = PatternMatcher::with_detectors(vec![
            Detector::new("dollar", r"\$").unwrap(),
            Detector::new(BLOCK_DELIMITER, r"\$\$").unwrap(),
        ]);
        assert_eq!(matcher.first_match("$$x$$"), Some("dollar"));
        assert_eq!(matcher.detectors()[1].pattern(), r"\$\$");
    }

    #[test]
    fn scanning_twice_is_identical() {
        let matcher = PatternMatcher::new();
        let units = vec![unit(0, "$a$"), unit(1, "b"), unit(2, "$$c$$")];
        assert_eq!(matcher.scan(&units), matcher.scan(&units));
    }
}
