use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::Level;
use vigil_core::config::{ConfigError, CrawlConfig};
use vigil_core::report::{self, ReportFormat};
use vigil_scanner::{Crawler, MatchMode, TermMatcher};

/// Maps `--verbosity-level` to the tracing filter: 1 surfaces fetch
/// failures, 2 adds page progress, 3 adds dedup detail.
pub fn tracing_level_for(verbosity: u8) -> Level {
    match verbosity {
        0 | 1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Assembles the run configuration from parsed CLI arguments.
pub fn config_from_matches(matches: &ArgMatches) -> Result<CrawlConfig, ConfigError> {
    let base_domain = matches
        .get_one::<String>("base-domain")
        .expect("base-domain is required");
    let terms: Vec<String> = matches
        .get_many::<String>("terms")
        .expect("terms are required")
        .cloned()
        .collect();
    let mode = if matches.get_flag("link-lookup") {
        MatchMode::LinkLookup
    } else {
        MatchMode::PlainText
    };

    let mut config = CrawlConfig::new(base_domain, &terms, mode)?;
    config.verbosity = *matches.get_one::<u8>("verbosity-level").unwrap_or(&1);
    config.workers = *matches.get_one::<usize>("workers").unwrap_or(&1);
    config.max_pages = matches.get_one::<usize>("max-pages").copied();
    config.fetch_timeout =
        Duration::from_secs(*matches.get_one::<u64>("fetch-timeout").unwrap_or(&10));
    config.overall_timeout = matches
        .get_one::<u64>("timeout")
        .copied()
        .map(Duration::from_secs);
    Ok(config)
}

pub async fn handle_scan(matches: &ArgMatches, config: &CrawlConfig) -> anyhow::Result<()> {
    let quiet = matches.get_flag("quiet");

    let matcher = TermMatcher::new(config.terms.clone(), config.mode)?;
    let mut crawler = Crawler::with_fetch_timeout(
        &config.base_domain,
        matcher,
        config.fetch_timeout.as_secs(),
    );
    if let Some(cap) = config.max_pages {
        crawler = crawler.with_max_pages(cap);
    }
    if let Some(budget) = config.overall_timeout {
        crawler = crawler.with_deadline(budget);
    }

    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Crawling {}...", config.base_domain));
        Some(pb)
    };

    if let Some(pb) = &spinner {
        let pb_clone = pb.clone();
        let processed = Arc::new(AtomicUsize::new(0));
        crawler = crawler.with_progress_callback(Arc::new(move |_worker_id, _url| {
            let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!("Crawling... {} URLs processed", count));
            pb_clone.tick();
        }));
    }

    let results = crawler
        .crawl(&config.base_domain, config.workers)
        .await
        .context("crawl failed")?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = report::summarize(&results);
    let format = matches
        .get_one::<String>("format")
        .and_then(|s| ReportFormat::from_str(s))
        .unwrap_or(ReportFormat::Text);
    let rendered = match format {
        ReportFormat::Text => report::generate_text_report(&report, &results),
        ReportFormat::Json => report::generate_json_report(&report, &results)
            .context("failed to serialize report")?,
    };

    if let Some(output) = matches.get_one::<PathBuf>("output") {
        report::save_report(&rendered, output)
            .with_context(|| format!("failed to write report to {}", output.display()))?;
        if !quiet {
            println!(
                "{} Report written to {}",
                "✓".green().bold(),
                output.display()
            );
        }
    } else {
        print!("{}", rendered);
    }

    if !quiet && report.pages_flagged > 0 {
        println!(
            "\n{} {} page(s) with terms beyond their threshold",
            "⚠".yellow().bold(),
            report.pages_flagged
        );
    }

    Ok(())
}
