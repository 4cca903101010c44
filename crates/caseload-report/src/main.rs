mod bootstrap;

use anyhow::{bail, Context, Result};
use caseload_core::settings::{AppConfig, Settings};
use caseload_data::analysis::analyze_exports;
use caseload_data::export::export_all;
use caseload_data::report::build_report;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("caseload-report v{} starting", env!("CARGO_PKG_VERSION"));

    // `--clear` on its own is a maintenance run; with inputs it clears the
    // saved parameters and then reports as usual.
    if settings.clear && settings.time_export.is_none() {
        println!("Saved parameters cleared.");
        return Ok(());
    }

    let Some(time_path) = settings.time_export.as_deref() else {
        bail!("no time export given; pass --time-export <FILE>");
    };

    let config =
        AppConfig::discover(settings.config.as_deref()).context("failed to load configuration")?;
    let filter = settings.filter_spec();

    let result = analyze_exports(
        time_path,
        settings.finance_export.as_deref(),
        &config,
        &filter,
    )?;

    println!(
        "{} time entries and {} revenue lines kept ({} rows rejected).",
        result.time.rows.len(),
        result.revenue.rows.len(),
        result.time.failures.len() + result.revenue.failures.len()
    );

    let written = export_all(&settings.out_dir, &result).with_context(|| {
        format!(
            "failed to write outputs under {}",
            settings.out_dir.display()
        )
    })?;
    println!(
        "Wrote {} files to {}.",
        written.len(),
        settings.out_dir.display()
    );

    if settings.report {
        let report = build_report(&result, &filter);
        let report_path = settings.out_dir.join("report.md");
        std::fs::write(&report_path, report)
            .with_context(|| format!("failed to write {}", report_path.display()))?;
        println!("Report written to {}.", report_path.display());
    }

    Ok(())
}
