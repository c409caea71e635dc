//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;
use serde_json::Value;

use portal_sync_core::{HydrationReport, JobOutcome};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// One row of the `keys` listing
#[derive(Debug, Serialize)]
pub struct KeyRow {
    pub name: &'static str,
    pub scope: &'static str,
    pub local_key: String,
    pub remote_key: &'static str,
    pub fallback: Value,
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a resource value
    ///
    /// Quiet mode prints the bare compact JSON for piping.
    pub fn print_value(&self, resource: &str, value: &Value) {
        match self.format {
            OutputFormat::Human => {
                println!("{}:", resource);
                println!("{}", pretty(value));
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    pretty(&serde_json::json!({"resource": resource, "value": value}))
                );
            }
            OutputFormat::Quiet => {
                println!("{}", value);
            }
        }
    }

    /// Print the resource registry
    pub fn print_keys(&self, rows: &[KeyRow]) {
        match self.format {
            OutputFormat::Human => {
                for row in rows {
                    println!(
                        "{:<20} {:<8} {:<32} {:<16} {}",
                        row.name, row.scope, row.local_key, row.remote_key, row.fallback
                    );
                }
                println!("\n{} resource(s)", rows.len());
            }
            OutputFormat::Json => {
                println!("{}", pretty(&serde_json::json!(rows)));
            }
            OutputFormat::Quiet => {
                for row in rows {
                    println!("{}", row.name);
                }
            }
        }
    }

    /// Print the outcome of a hydration batch
    pub fn print_report(&self, report: &HydrationReport) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "{:?} batch: {} applied, {} absent, {} failed",
                    report.scope,
                    report.applied(),
                    report.absent(),
                    report.failed()
                );
                for job in &report.jobs {
                    match &job.outcome {
                        JobOutcome::Applied => println!("  ✓ {}", job.resource),
                        JobOutcome::Absent => println!("  - {} (no remote value)", job.resource),
                        JobOutcome::Failed(e) => println!("  ✗ {}: {}", job.resource, e),
                    }
                }
            }
            OutputFormat::Json => {
                let jobs: Vec<_> = report
                    .jobs
                    .iter()
                    .map(|job| {
                        let (outcome, error) = match &job.outcome {
                            JobOutcome::Applied => ("applied", None),
                            JobOutcome::Absent => ("absent", None),
                            JobOutcome::Failed(e) => ("failed", Some(e.to_string())),
                        };
                        serde_json::json!({
                            "resource": job.resource.to_string(),
                            "outcome": outcome,
                            "error": error,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "scope": format!("{:?}", report.scope).to_lowercase(),
                        "applied": report.applied(),
                        "absent": report.absent(),
                        "failed": report.failed(),
                        "jobs": jobs,
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr unless quiet
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
