use chrono::{Local, NaiveDate};
use clap::Parser;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use sta_promote::bulk::BulkOutputRow;
use sta_promote::{pipeline, sheets, PromoteError, PromotionConfig, PromotionOutput, Result, Workbook};

const DEFAULT_OUTPUT: &str = "final_output.xlsx";
// Exit code when the upload sheet was written but some SKU groups were skipped
const PARTIAL_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(name = "sta-promote")]
#[command(about = "Extract performing Sponsored Products search terms into a bulk-upload sheet")]
#[command(version)]
struct Cli {
    /// Bulk export: the `.xlsx` report, or a directory with one CSV per sheet
    #[arg(long)]
    workbook: PathBuf,

    /// Where to write the bulk-upload sheet (`.xlsx`, or CSV for any other extension)
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Target ACOS in percent (0-100); overrides the config file
    #[arg(long)]
    target_acos: Option<f64>,

    /// JSON config file
    #[arg(long)]
    config: Option<String>,

    /// Date stamped into campaign names (YYYY-MM-DD), defaults to today
    #[arg(long)]
    run_date: Option<NaiveDate>,

    /// Also write the run summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Abort when any SKU group cannot be assigned a portfolio
    #[arg(long)]
    strict: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

fn is_xlsx(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

fn write_output(path: &Path, rows: &[BulkOutputRow]) -> Result<()> {
    if is_xlsx(path) {
        return sheets::write_bulk_workbook(path, rows);
    }
    let file = File::create(path).map_err(|e| PromoteError::io(path.display().to_string(), e))?;
    sheets::write_bulk_sheet(BufWriter::new(file), rows)
}

fn promote(cli: &Cli) -> Result<PromotionOutput> {
    let mut config = match &cli.config {
        Some(path) => PromotionConfig::load(path)?,
        None => PromotionConfig::default(),
    };
    if let Some(target) = cli.target_acos {
        config.target_acos_percent = target;
    }
    if cli.strict {
        config.strict_integrity = true;
    }
    let run_date = cli.run_date.unwrap_or_else(|| Local::now().date_naive());

    let workbook = Workbook::open(&cli.workbook)?;
    let output = pipeline::run(workbook, &config, run_date)?;

    write_output(&cli.output, &output.rows)?;
    tracing::info!(path = %cli.output.display(), rows = output.rows.len(), "bulk upload sheet written");

    if let Some(path) = &cli.summary {
        let json = serde_json::to_string_pretty(&output.summary)?;
        fs::write(path, json).map_err(|e| PromoteError::io(path.display().to_string(), e))?;
    }
    Ok(output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = match promote(&cli) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %e, "promotion run failed");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if output.failures.is_empty() {
        return ExitCode::SUCCESS;
    }
    for failure in &output.failures {
        eprintln!("[SKIPPED] {failure}");
    }
    ExitCode::from(PARTIAL_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_follows_extension() {
        assert!(is_xlsx(Path::new("out/final_output.xlsx")));
        assert!(is_xlsx(Path::new("FINAL.XLSX")));
        assert!(!is_xlsx(Path::new("final_output.csv")));
        assert!(!is_xlsx(Path::new("final_output")));
    }

    #[test]
    fn fatal_errors_render_their_message() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["sta-promote", "--workbook", dir.path().to_str().unwrap()]);
        let err = promote(&cli).unwrap_err();
        assert_eq!(err.to_string(), format!("Missing sheet 'Portfolios' (looked in {})", dir.path().join("Portfolios.csv").display()));
    }
}
