use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use driftaudit::{loader, remediation, report, AuditEngine, AuditError, ControlRegistry};

#[derive(Parser, Debug)]
#[command(name = "driftaudit", version, about = "Cloud resource compliance drift auditor")]
struct Cli {
    /// Resource JSON produced by the collector
    #[arg(short, long, default_value = "output/azure.json")]
    input: String,

    /// Audit report output path
    #[arg(short, long, default_value = "drift_report.json")]
    report: String,

    /// Remediation script output path
    #[arg(long, default_value = "remediate.sh")]
    remediation: String,

    /// Skip writing the remediation script
    #[arg(long)]
    no_remediation: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    let level = cli.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(err) = run(&cli) {
        error!(error = %err, "Audit run failed");
        // Exit 2 distinguishes unusable input from everything else.
        let code = match err.downcast_ref::<AuditError>() {
            Some(AuditError::InputNotFound { .. }) | Some(AuditError::InputMalformed(_)) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let entries = loader::load(Path::new(&cli.input))?;

    let engine = AuditEngine::new(ControlRegistry::standard());
    let results = engine.run(&entries);

    fs::write(&cli.report, report::to_json(&results)?)
        .with_context(|| format!("writing audit report to {}", cli.report))?;
    info!(path = %cli.report, rows = results.len(), "Audit report written");

    if !cli.no_remediation {
        let actions = remediation::map_remediation(&results);
        fs::write(&cli.remediation, remediation::render_script(&actions))
            .with_context(|| format!("writing remediation script to {}", cli.remediation))?;
        info!(path = %cli.remediation, actions = actions.len(), "Remediation script written");
    }

    let summary = engine.summary();
    info!(
        resources = summary.total_resources,
        skipped = summary.skipped_resources,
        checks = summary.total_checks,
        failed = summary.failed_checks,
        compliance_pct = format_args!("{:.1}", summary.compliance_pct),
        "Audit complete"
    );
    Ok(())
}
