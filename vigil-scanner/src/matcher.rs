//! Term matching: scans fetched page content for configured terms and
//! computes the excess over each term's allowed threshold.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters of trailing context captured around a plain-text match.
const CONTEXT_WIDTH: usize = 30;

/// A term to look for, with the number of occurrences tolerated per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSpec {
    pub term: String,
    pub threshold: usize,
}

impl TermSpec {
    pub fn new(term: impl Into<String>, threshold: usize) -> Self {
        Self {
            term: term.into(),
            threshold,
        }
    }
}

/// How terms are searched for inside page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Literal substring occurrences anywhere in the page text.
    #[default]
    PlainText,
    /// Occurrences as part of a link target, captured up to the next
    /// quote or fragment marker.
    LinkLookup,
}

/// One term's result on one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermFinding {
    pub term: String,
    pub count: usize,
    pub excess: usize,
    /// Captured link strings (link mode) or context windows (plain mode).
    pub evidence: Vec<String>,
}

/// Outcome of scoring a single page.
#[derive(Debug, Clone, Default)]
pub struct PageScore {
    pub total_excess: usize,
    pub findings: Vec<TermFinding>,
}

struct CompiledTerm {
    spec: TermSpec,
    /// Present in link mode only: `(<term>...)` up to the next `'`, `"`
    /// or `#`, non-greedy.
    link_pattern: Option<Regex>,
}

/// Scores page content against a fixed set of terms. Patterns are
/// compiled once per run; terms are always evaluated in configuration
/// order so diagnostics stay deterministic.
pub struct TermMatcher {
    terms: Vec<CompiledTerm>,
    mode: MatchMode,
}

impl TermMatcher {
    pub fn new(terms: Vec<TermSpec>, mode: MatchMode) -> Result<Self> {
        let terms = terms
            .into_iter()
            .map(|spec| {
                let link_pattern = match mode {
                    MatchMode::LinkLookup => Some(Regex::new(&format!(
                        "({}.*?)['\"#]",
                        regex::escape(&spec.term)
                    ))?),
                    MatchMode::PlainText => None,
                };
                Ok(CompiledTerm { spec, link_pattern })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { terms, mode })
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Scans `content` for every configured term and sums the per-term
    /// excess over thresholds.
    pub fn score(&self, content: &str) -> PageScore {
        let mut score = PageScore::default();

        for compiled in &self.terms {
            let evidence = match &compiled.link_pattern {
                Some(pattern) => link_occurrences(pattern, content),
                None => plain_occurrences(content, &compiled.spec.term),
            };

            let count = evidence.len();
            let excess = count.saturating_sub(compiled.spec.threshold);
            score.total_excess += excess;

            if count > 0 {
                score.findings.push(TermFinding {
                    term: compiled.spec.term.clone(),
                    count,
                    excess,
                    evidence,
                });
            }
        }

        score
    }
}

/// All link-style occurrences: the term plus everything up to (but not
/// including) the first terminating quote or `#`. Matches that never
/// reach a terminator are not counted.
fn link_occurrences(pattern: &Regex, content: &str) -> Vec<String> {
    pattern
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// All (overlapping) literal occurrences of `term`, each captured with a
/// trailing context window clipped at the end of the content.
fn plain_occurrences(content: &str, term: &str) -> Vec<String> {
    let Some(first_char) = term.chars().next() else {
        return Vec::new();
    };
    let window = term.chars().count() + CONTEXT_WIDTH;

    let mut occurrences = Vec::new();
    let mut offset = 0;
    while let Some(pos) = content[offset..].find(term) {
        let start = offset + pos;
        occurrences.push(content[start..].chars().take(window).collect());
        // Advance one character so self-overlapping terms are all seen.
        offset = start + first_char.len_utf8();
    }
    occurrences
}
