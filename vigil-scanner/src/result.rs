use crate::matcher::TermFinding;
use serde::{Deserialize, Serialize};

/// One fully scored page: a single entry of the visited set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    /// Total occurrences beyond the configured thresholds, summed over
    /// all terms. Zero means the page is clear.
    pub excess: usize,
    pub findings: Vec<TermFinding>,
}

impl PageResult {
    pub fn new(url: String, excess: usize, findings: Vec<TermFinding>) -> Self {
        Self {
            url,
            excess,
            findings,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.excess == 0
    }
}
