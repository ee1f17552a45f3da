//! Benchfig CLI - Turn benchmark result tables into figures
//!
//! # Main Commands
//!
//! ```bash
//! benchfig run figures.json          # Run every job in a job file
//! benchfig example-jobs -o jobs/     # Write the bundled example jobs
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! benchfig parse result.csv          # Load a table and print its rows as JSON
//! benchfig pivot result.csv --row R --column C --value V
//! benchfig validate figures.json     # Schema-check a job file
//! ```

use benchfig::config::{example_jobs, load_jobs};
use benchfig::logs::{LogLevel, LOG_SINK};
use benchfig::parser::{is_spreadsheet, load_delimited, load_spreadsheet, load_table, InputFormat, InputSpec};
use benchfig::transform::{pivot_mean, run_jobs};
use benchfig::validation::validate_job;
use benchfig::SvgRenderer;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "benchfig")]
#[command(about = "Aggregate benchmark result tables and render figures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run figure jobs
    Run {
        /// Job files (one job object or an array of jobs each)
        #[arg(required = true)]
        jobs: Vec<PathBuf>,

        /// Only print errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Load a table and output its rows as JSON
    Parse {
        /// Input CSV or spreadsheet
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Worksheet name (spreadsheets only, default: first)
        #[arg(long)]
        sheet: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pivot a table: mean of VALUE per (ROW, COLUMN)
    Pivot {
        /// Input CSV or spreadsheet
        input: PathBuf,

        #[arg(long)]
        row: String,

        #[arg(long)]
        column: String,

        #[arg(long)]
        value: String,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a job file against the job schema
    Validate {
        /// Job file
        input: PathBuf,
    },

    /// Show the bundled example jobs
    ExampleJobs {
        /// Write one file per job into this directory (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { jobs, quiet } => cmd_run(&jobs, quiet),

        Commands::Parse {
            input,
            delimiter,
            sheet,
            output,
        } => cmd_parse(&input, delimiter, sheet.as_deref(), output.as_deref()),

        Commands::Pivot {
            input,
            row,
            column,
            value,
            delimiter,
            output,
        } => cmd_pivot(&input, &row, &column, &value, delimiter, output.as_deref()),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::ExampleJobs { output } => cmd_example_jobs(output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(paths: &[PathBuf], quiet: bool) -> Result<(), Box<dyn std::error::Error>> {
    LOG_SINK.set_quiet(quiet);

    let mut jobs = Vec::new();
    for path in paths {
        jobs.extend(load_jobs(path)?);
    }

    let results = run_jobs(&jobs, &SvgRenderer);
    let failed: Vec<String> = results
        .iter()
        .filter_map(|(name, r)| r.as_ref().err().map(|e| format!("{} ({} stage)", name, e.stage())))
        .collect();

    if failed.is_empty() {
        let warnings = LOG_SINK
            .entries()
            .iter()
            .filter(|e| e.level == LogLevel::Warning)
            .count();
        if !quiet {
            if warnings > 0 {
                eprintln!("✨ Done with {} warning(s)", warnings);
            } else {
                eprintln!("✨ Done!");
            }
        }
        Ok(())
    } else {
        Err(format!("{} job(s) failed: {}", failed.len(), failed.join(", ")).into())
    }
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    sheet: Option<&str>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = if is_spreadsheet(input) || sheet.is_some() {
        let table = load_spreadsheet(input, sheet)?;
        eprintln!("   Sheet: {}", sheet.unwrap_or("(first)"));
        table
    } else {
        let result = load_delimited(input, delimiter)?;
        eprintln!("   Encoding: {}", result.encoding);
        eprintln!(
            "   Delimiter: '{}'{}",
            format_delimiter(result.delimiter),
            if delimiter.is_none() { " (auto-detected)" } else { "" }
        );
        result.table
    };
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", table.len());

    let json = serde_json::to_string_pretty(&table.rows)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_pivot(
    input: &Path,
    row: &str,
    column: &str,
    value: &str,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Pivoting: {}", input.display());

    let mut spec = InputSpec::new(input);
    if delimiter.is_some() {
        spec = spec.with_format(InputFormat::Delimited { delimiter });
    }
    let table = load_table(&spec)?;
    let pivot = pivot_mean(&table, row, column, value)?;

    let filled = pivot.cells.iter().flatten().filter(|c| c.is_some()).count();
    eprintln!(
        "✅ {} x {} cells, {} with data",
        pivot.rows.len(),
        pivot.columns.len(),
        filled
    );

    let json = serde_json::to_string_pretty(&pivot)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let value: Value = serde_json::from_str(&content)?;
    let jobs = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut invalid = 0;
    for (i, job) in jobs.iter().enumerate() {
        let name = job.get("name").and_then(Value::as_str).unwrap_or("(unnamed)");
        match validate_job(job) {
            Ok(()) => eprintln!("   ✅ Job {} \"{}\" valid", i, name),
            Err(errors) => {
                invalid += 1;
                eprintln!("   ❌ Job {} \"{}\":", i, name);
                for err in errors.iter().take(10) {
                    eprintln!("      - {}", err);
                }
            }
        }
    }

    if invalid > 0 {
        return Err(format!("{} of {} job(s) invalid", invalid, jobs.len()).into());
    }
    eprintln!("✅ All {} job(s) valid!", jobs.len());
    Ok(())
}

fn cmd_example_jobs(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = example_jobs();

    match output {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            for job in &jobs {
                let path = dir.join(format!("{}.json", job.name));
                fs::write(&path, job.to_json()?)?;
                eprintln!("💾 {}", path.display());
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&jobs)?),
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
