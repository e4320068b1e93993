//! Markdown run log
//!
//! One file per run under the run log directory, appended as domains finish
//! so a crash still leaves a readable log.

use crate::output::traits::{DomainReport, OutputResult, RunLogSink};
use crate::output::RunSummary;
use crate::state::DomainStatus;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header facts written when the log is opened
#[derive(Debug, Clone)]
pub struct RunLogHeader {
    pub run_id: String,
    pub total_domains: usize,
    pub workers: u32,
    pub max_records: u64,
}

pub struct MarkdownRunLog {
    path: PathBuf,
    file: File,
}

impl MarkdownRunLog {
    /// Opens `<dir>/scrape_run_<run_id>.md`, appending if it already exists
    pub fn open(dir: &Path, header: &RunLogHeader) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("scrape_run_{}.md", header.run_id));
        let existed = path.exists();

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if existed {
            write!(file, "{}", format_resume_marker(header))?;
        } else {
            write!(file, "{}", format_header(header))?;
        }
        file.flush()?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, content: &str) -> OutputResult<()> {
        self.file.write_all(content.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

impl RunLogSink for MarkdownRunLog {
    fn domain_finished(&mut self, report: &DomainReport) -> OutputResult<()> {
        self.append(&format_domain_entry(report))
    }

    fn run_finished(&mut self, summary: &RunSummary) -> OutputResult<()> {
        self.append(&format_summary(summary))
    }
}

pub fn format_header(header: &RunLogHeader) -> String {
    let started = Utc::now().format("%Y-%m-%d %H:%M:%S");
    let mut md = String::new();
    md.push_str(&format!("# Web Scraping Run - {}\n\n", started));
    md.push_str("## Configuration\n\n");
    md.push_str(&format!("- Run ID: `{}`\n", header.run_id));
    md.push_str(&format!("- Total domains: {}\n", header.total_domains));
    md.push_str(&format!("- Parallel workers: {}\n", header.workers));
    md.push_str(&format!("- Max records per domain: {}\n", header.max_records));
    md.push_str(&format!("- Started: {}\n\n", started));
    md.push_str("## Execution Log\n\n");
    md
}

fn format_resume_marker(header: &RunLogHeader) -> String {
    format!(
        "\n### Resumed {} ({} domains remaining, {} workers)\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        header.total_domains,
        header.workers
    )
}

fn format_duration(ms: u64) -> String {
    let secs = ms as f64 / 1000.0;
    format!("{:.1}s ({:.1}m)", secs, secs / 60.0)
}

pub fn format_domain_entry(report: &DomainReport) -> String {
    let mut lines = Vec::new();
    let badge = match report.status {
        DomainStatus::Completed => "✅ SUCCESS",
        DomainStatus::MarkedForReview => "⚠️ MARKED_FOR_REVIEW",
        DomainStatus::ManualReview => "🔴 MANUAL_REVIEW",
        _ => "❌ FAILED",
    };
    lines.push(format!("#### {} - {}\n", report.domain, badge));

    if report.status == DomainStatus::Completed {
        lines.push(format!("- **Records Extracted**: {}", report.records));
    }
    if let Some(error) = &report.error {
        lines.push(format!("- **Reason**: {}", error));
    }
    lines.push(format!("- **Duration**: {}", format_duration(report.elapsed_ms)));

    if let Some(strategy) = report.strategy {
        if report.status == DomainStatus::ManualReview {
            lines.push(format!("- **Security**: {} (NO STRATEGY AVAILABLE)", strategy));
        } else {
            lines.push(format!("- **Security**: {}", strategy));
        }
    }

    if let Some(quality) = &report.quality {
        lines.push(format!(
            "- **Quality Test**: {:.1}% text ratio ({})",
            quality.ratio * 100.0,
            if quality.passed() { "PASS" } else { "FAIL" }
        ));
    }

    if report.status == DomainStatus::MarkedForReview && !report.sample_urls.is_empty() {
        lines.push(format!(
            "- **Sample URLs**: {} tested",
            report.sample_urls.len()
        ));
        for url in report.sample_urls.iter().take(5) {
            lines.push(format!("  - `{}`", url));
        }
    }

    if let Some(fingerprint) = &report.fingerprint {
        lines.push(String::new());
        lines.push("**Protection Fingerprint**:".to_string());
        lines.push(String::new());
        lines.push(format!("- sha256: `{}`", fingerprint));
    }

    lines.push(String::new());
    lines.push(String::new());
    lines.join("\n")
}

pub fn format_summary(summary: &RunSummary) -> String {
    let secs = summary.duration_seconds().max(0);
    let processed = summary.processed();
    let average = if processed == 0 {
        0.0
    } else {
        secs as f64 / processed as f64
    };

    let mut md = String::new();
    md.push_str("\n## Summary Statistics\n\n");
    md.push_str(&format!("- **Total Processed**: {} domains\n", processed));
    md.push_str(&format!(
        "- **Successful**: {} domains ({} records)\n",
        summary.count(DomainStatus::Completed),
        summary.total_records
    ));
    md.push_str(&format!(
        "- **Marked for Review**: {} domains\n",
        summary.count(DomainStatus::MarkedForReview)
    ));
    md.push_str(&format!(
        "- **Manual Review Required**: {} domains\n",
        summary.count(DomainStatus::ManualReview)
    ));
    md.push_str(&format!(
        "- **Failed**: {} domains\n",
        summary.count(DomainStatus::Failed)
    ));
    if summary.skipped > 0 {
        md.push_str(&format!(
            "- **Skipped (already finished)**: {} domains\n",
            summary.skipped
        ));
    }
    if summary.cancelled {
        md.push_str(&format!(
            "- **Interrupted**: {} domains left pending\n",
            summary.pending
        ));
    }
    md.push_str(&format!(
        "- **Total Duration**: {}h {}m {}s\n",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    ));
    md.push_str(&format!("- **Average per Domain**: {:.1}s\n\n", average));

    md.push_str("## Categorized Domains\n\n");
    for (status, title) in [
        (DomainStatus::Completed, "✅ Successful Domains"),
        (DomainStatus::MarkedForReview, "⚠️ Marked for Review"),
        (DomainStatus::ManualReview, "🔴 Manual Review Required"),
        (DomainStatus::Failed, "❌ Failed"),
    ] {
        let domains: Vec<&str> = summary
            .statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(d, _)| d.as_str())
            .collect();
        md.push_str(&format!("### {} ({})\n\n", title, domains.len()));
        for domain in domains {
            md.push_str(&format!("- {}\n", domain));
        }
        md.push('\n');
    }

    md.push_str(&format!(
        "---\n*Log generated at {}*\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    ));
    md
}
