use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Args, Parser, Subcommand};

use coupon_levels::classifier::{BandScheme, PRESET_NAMES};
use coupon_levels::pipeline::{self, PipelineOutput, Session};
use coupon_levels::{config, export, ingest, report};

#[derive(Parser)]
#[command(name = "coupon-levels")]
#[command(about = "Assign loyalty cycles and levels from coupon card counts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scheme_source")
        .args(["scheme", "scheme_file"])
        .multiple(false)
))]
struct SchemeArgs {
    /// Built-in band scheme (canonical, forty)
    #[arg(long)]
    scheme: Option<String>,
    /// JSON file describing a custom band scheme
    #[arg(long)]
    scheme_file: Option<PathBuf>,
}

impl SchemeArgs {
    fn load(&self) -> anyhow::Result<BandScheme> {
        config::load_scheme(self.scheme.as_deref(), self.scheme_file.as_deref())
    }
}

#[derive(Args)]
struct DatasetArgs {
    /// CSV, TSV or spreadsheet with user_id, username, phone_number and coupon_cards columns
    #[arg(long)]
    input: PathBuf,
    /// Field delimiter for text input; inferred from the file extension when omitted
    #[arg(long, value_parser = config::parse_delimiter)]
    delimiter: Option<u8>,
    /// Lowest coupon count to keep (defaults to the dataset minimum)
    #[arg(long)]
    min: Option<u64>,
    /// Highest coupon count to keep (defaults to the dataset maximum)
    #[arg(long)]
    max: Option<u64>,
    /// Keep rows whose username or phone number contains this text
    #[arg(long)]
    search: Option<String>,
    /// Abort on the first row with an invalid coupon count
    #[arg(long)]
    strict: bool,
    #[command(flatten)]
    scheme: SchemeArgs,
}

impl DatasetArgs {
    fn run(&self) -> anyhow::Result<(Session, PipelineOutput)> {
        let scheme = self.scheme.load()?;
        let session = Session::new(scheme)
            .with_range(self.min, self.max)
            .with_search(self.search.clone())
            .strict(self.strict);

        let rows = ingest::read_path(&self.input, self.delimiter)?;
        let output = pipeline::run_pipeline(&session, rows)
            .with_context(|| format!("failed to process {}", self.input.display()))?;
        Ok((session, output))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Classify coupon counts given on the command line
    Classify {
        #[arg(required = true, allow_negative_numbers = true)]
        coupons: Vec<i64>,
        #[command(flatten)]
        scheme: SchemeArgs,
    },
    /// Classify, filter and export a dataset
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[arg(long, default_value = export::DEFAULT_EXPORT_NAME)]
        out: PathBuf,
        /// Also write the results and groupings to an .xlsx workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,
        /// Write groupings, metrics and skipped rows as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
        /// Rows to print to the terminal
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Print the built-in band schemes as JSON
    Schemes,
}

fn print_output(output: &PipelineOutput, limit: usize) {
    println!(
        "{:<24} {:<16} {:>8} {:>6} {:>6}",
        "username", "phone_number", "coupons", "cycle", "level"
    );
    for record in output.records.iter().take(limit) {
        println!(
            "{:<24} {:<16} {:>8} {:>6} {:>6}",
            record.record.username,
            record.record.phone_number,
            record.record.coupon_cards,
            record.cycle.to_string(),
            record.level
        );
    }
    if output.records.len() > limit {
        println!("... {} more rows", output.records.len() - limit);
    }

    println!();
    println!("Users by cycle:");
    for group in &output.by_cycle {
        println!("- {}: {} users", group.key, group.user_count);
    }
    println!("Users by level:");
    for group in &output.by_level {
        println!("- {}: {} users", group.key, group.user_count);
    }

    if !output.issues.is_empty() {
        println!();
        println!("Skipped {} rows with invalid coupon counts:", output.issues.len());
        for issue in &output.issues {
            println!("- row {}: '{}' ({})", issue.row, issue.value, issue.error);
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { coupons, scheme } => {
            let scheme = scheme.load()?;
            let mut failures = 0usize;
            for count in coupons {
                match scheme.classify(count) {
                    Ok((cycle, level)) => println!("{count}: cycle {cycle}, level {level}"),
                    Err(err) => {
                        failures += 1;
                        println!("{count}: {err}");
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} coupon counts could not be classified");
            }
        }
        Commands::Run {
            dataset,
            out,
            xlsx,
            summary_json,
            limit,
        } => {
            let (_, output) = dataset.run()?;
            print_output(&output, limit);

            export::save_csv(&out, &output.records)?;
            println!("Results written to {}.", out.display());

            if let Some(path) = xlsx {
                export::save_workbook(&path, &output)?;
                println!("Workbook written to {}.", path.display());
            }
            if let Some(path) = summary_json {
                let json = serde_json::to_string_pretty(&output)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Summary written to {}.", path.display());
            }
        }
        Commands::Report { dataset, out } => {
            let (session, output) = dataset.run()?;
            let report = report::build_report(
                &dataset.input.display().to_string(),
                Utc::now().date_naive(),
                &session.scheme,
                session.search.as_deref(),
                &output,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Schemes => {
            for name in PRESET_NAMES {
                let scheme = BandScheme::preset(name)?;
                println!("{name}:");
                println!("{}", serde_json::to_string_pretty(&scheme)?);
            }
        }
    }

    Ok(())
}
