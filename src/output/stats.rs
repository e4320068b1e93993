//! Operational status report
//!
//! Renders the current checkpoint and every stored security profile, for the
//! `--status` command.

use crate::checkpoint::Checkpoint;
use crate::security::{SecurityProfile, Strategy};
use crate::state::DomainStatus;

/// Formats the status report as plain text
pub fn format_status(checkpoint: Option<&Checkpoint>, profiles: &[SecurityProfile]) -> String {
    let mut out = String::new();
    out.push_str("=== Checkpoint ===\n");

    match checkpoint {
        None => out.push_str("No resumable checkpoint (missing, stale or corrupt)\n"),
        Some(cp) => {
            out.push_str(&format!("Run ID:        {}\n", cp.run_id));
            out.push_str(&format!("Created:       {}\n", cp.created_at.to_rfc3339()));
            out.push_str(&format!("Last updated:  {}\n", cp.updated_at.to_rfc3339()));
            out.push_str(&format!("Domains:       {}\n", cp.domain_count()));
            for status in [
                DomainStatus::Pending,
                DomainStatus::Completed,
                DomainStatus::MarkedForReview,
                DomainStatus::ManualReview,
                DomainStatus::Failed,
            ] {
                out.push_str(&format!("  {:<18} {}\n", status.to_string(), cp.count(status)));
            }
            out.push_str(&format!(
                "Attempted: {}  Succeeded: {}  Records: {}\n",
                cp.stats.attempted, cp.stats.succeeded, cp.stats.records_extracted
            ));

            if !cp.in_flight.is_empty() {
                out.push_str("In flight:\n");
                for (worker, job) in &cp.in_flight {
                    out.push_str(&format!(
                        "  worker {:>2}: {} ({})\n",
                        worker, job.domain, job.stage
                    ));
                }
            }
            if !cp.resume_stages.is_empty() {
                out.push_str("Resume points:\n");
                for (domain, stage) in &cp.resume_stages {
                    out.push_str(&format!("  {} -> {}\n", domain, stage));
                }
            }
        }
    }

    out.push_str("\n=== Security Profiles ===\n");
    if profiles.is_empty() {
        out.push_str("No profiles recorded\n");
    }
    for profile in profiles {
        out.push_str(&format!(
            "{}  escalation={}  last={}\n",
            profile.domain, profile.escalation, profile.strategy
        ));
        for strategy in Strategy::ALL {
            let stats = profile.stats_for(strategy);
            if stats.attempts() == 0 && stats.transient_errors == 0 {
                continue;
            }
            out.push_str(&format!(
                "  {:<20} ok={:<5} blocked={:<5} transient={:<5} rate={:.0}%\n",
                strategy.to_string(),
                stats.successes,
                stats.failures,
                stats.transient_errors,
                stats.success_rate() * 100.0
            ));
        }
    }

    out
}

/// Prints the status report to stdout
pub fn print_status(checkpoint: Option<&Checkpoint>, profiles: &[SecurityProfile]) {
    print!("{}", format_status(checkpoint, profiles));
}
