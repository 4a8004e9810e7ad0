//! Report building: partitions the visited set into clear and flagged
//! pages and renders it as text or JSON.

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use vigil_scanner::result::PageResult;

const BAR: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Serialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedPage {
    pub url: String,
    pub excess: usize,
}

/// The derived partition of the visited set. Page order within each
/// partition follows visitation order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub clear: Vec<String>,
    pub flagged: Vec<FlaggedPage>,
    pub pages_checked: usize,
    pub pages_clear: usize,
    pub pages_flagged: usize,
}

/// Pure partition of scored pages into clear and flagged, with totals.
pub fn summarize(results: &[PageResult]) -> Report {
    let mut clear = Vec::new();
    let mut flagged = Vec::new();

    for page in results {
        if page.is_clear() {
            clear.push(page.url.clone());
        } else {
            flagged.push(FlaggedPage {
                url: page.url.clone(),
                excess: page.excess,
            });
        }
    }

    Report {
        pages_checked: results.len(),
        pages_clear: clear.len(),
        pages_flagged: flagged.len(),
        clear,
        flagged,
    }
}

pub fn generate_text_report(report: &Report, results: &[PageResult]) -> String {
    let mut out = String::new();

    out.push_str(BAR);
    out.push_str("\n                         VIGIL SITE AUDIT REPORT\n");
    out.push_str(BAR);
    out.push_str("\n\n");

    out.push_str("PAGES CLEAR\n");
    if report.clear.is_empty() {
        out.push_str("  (none)\n");
    }
    for url in &report.clear {
        out.push_str(url);
        out.push('\n');
    }

    out.push_str("\nPAGES WITH TERMS\n");
    if report.flagged.is_empty() {
        out.push_str("  (none)\n");
    }
    for page in results.iter().filter(|r| !r.is_clear()) {
        out.push_str(&format!("{} : {}\n", page.url, page.excess));
        for finding in page.findings.iter().filter(|f| f.excess > 0) {
            out.push_str(&format!(
                "    \"{}\" : {} found, {} beyond threshold\n",
                finding.term, finding.count, finding.excess
            ));
            for evidence in &finding.evidence {
                out.push_str(&format!("        found {:?}\n", evidence));
            }
        }
    }

    out.push_str("\nTOTALS\n");
    out.push_str(&format!("Pages checked: {}\n", report.pages_checked));
    out.push_str(&format!("Pages cleared: {}\n", report.pages_clear));
    out.push_str(&format!("Pages with terms: {}\n", report.pages_flagged));

    out
}

pub fn generate_json_report(
    report: &Report,
    results: &[PageResult],
) -> Result<String, serde_json::Error> {
    let flagged_pages: Vec<&PageResult> = results.iter().filter(|r| !r.is_clear()).collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "vigil",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
            },
            "summary": {
                "pages_checked": report.pages_checked,
                "pages_clear": report.pages_clear,
                "pages_flagged": report.pages_flagged,
            },
            "pages": {
                "clear": report.clear,
                "flagged": flagged_pages,
            }
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
