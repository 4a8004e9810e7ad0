//! Run configuration: base domain, term specs and crawl knobs.

use std::time::Duration;
use thiserror::Error;
use url::Url;
use vigil_scanner::matcher::{MatchMode, TermSpec};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid base domain '{domain}': {source}")]
    InvalidBaseDomain {
        domain: String,
        source: url::ParseError,
    },

    #[error("Invalid threshold in term spec '{spec}': {source}")]
    InvalidThreshold {
        spec: String,
        source: std::num::ParseIntError,
    },

    #[error("At least one term is required")]
    NoTerms,
}

/// Options for one audit run.
///
/// `base_domain` is kept as the raw string the operator supplied: it is
/// used both as the seed URL and as the substring domain-membership test,
/// and normalizing it through a URL parser would change which links pass
/// the filter. It must still parse as a URL for the run to start.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_domain: String,
    pub terms: Vec<TermSpec>,
    pub mode: MatchMode,
    /// 1 = summary + failures, 2 = page progress, 3 = dedup detail.
    pub verbosity: u8,
    pub workers: usize,
    pub max_pages: Option<usize>,
    pub fetch_timeout: Duration,
    pub overall_timeout: Option<Duration>,
}

impl CrawlConfig {
    pub fn new(
        base_domain: impl Into<String>,
        term_specs: &[String],
        mode: MatchMode,
    ) -> Result<Self, ConfigError> {
        let base_domain = base_domain.into();
        Url::parse(&base_domain).map_err(|source| ConfigError::InvalidBaseDomain {
            domain: base_domain.clone(),
            source,
        })?;

        let terms = parse_terms(term_specs)?;

        Ok(Self {
            base_domain,
            terms,
            mode,
            verbosity: 1,
            workers: 1,
            max_pages: None,
            fetch_timeout: Duration::from_secs(10),
            overall_timeout: None,
        })
    }
}

/// Parses a list of `term` / `term:threshold` specs, preserving order.
pub fn parse_terms(specs: &[String]) -> Result<Vec<TermSpec>, ConfigError> {
    if specs.is_empty() {
        return Err(ConfigError::NoTerms);
    }
    specs.iter().map(|spec| parse_term_spec(spec)).collect()
}

/// `term:threshold` with exactly one colon sets a numeric threshold; a
/// non-numeric threshold is fatal. Any other colon count means the whole
/// string is the term with threshold 0, so terms containing colons (for
/// example full URLs) stay usable.
pub fn parse_term_spec(spec: &str) -> Result<TermSpec, ConfigError> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() == 2 {
        let threshold = parts[1]
            .parse()
            .map_err(|source| ConfigError::InvalidThreshold {
                spec: spec.to_string(),
                source,
            })?;
        Ok(TermSpec::new(parts[0], threshold))
    } else {
        Ok(TermSpec::new(spec, 0))
    }
}
