//! sheetsift CLI - Query spreadsheets in natural language
//!
//! # Main Commands
//!
//! ```bash
//! sheetsift serve                          # Start HTTP server (port 3000)
//! sheetsift query data.xlsx "C >= 0.06"    # NL query, export matches
//! sheetsift plan list                      # Manage cached query plans
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! sheetsift inspect data.xlsx              # Show flattened columns and preview
//! sheetsift filter data.xlsx -p plan.json  # Apply a saved plan, no AI
//! sheetsift conditions                     # Show the condition grammar
//! sheetsift example-plan                   # Show an example query plan
//! ```

use clap::{Parser, Subcommand};
use sheetsift::{
    analyze_with_plan, conditions_description, load_file, AnalyzeOptions, AnalyzeOutcome,
    ExportFormat, PlanRegistry, QueryPlan, SheetFormat,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetsift")]
#[command(about = "Query spreadsheets in natural language, export in the original layout", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a spreadsheet and show its flattened columns
    Inspect {
        /// Input spreadsheet (.xlsx or delimited text)
        input: PathBuf,

        /// Data rows to preview
        #[arg(short, long, default_value = "5")]
        rows: usize,
    },

    /// Full pipeline: natural-language question -> plan -> export
    Query {
        /// Input spreadsheet (.xlsx or delimited text)
        input: PathBuf,

        /// The question, in natural language
        question: String,

        /// Use an existing plan file instead of AI
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Save the plan that ran to a file
        #[arg(long)]
        save_plan: Option<PathBuf>,

        /// Output file for matching rows (default: <input>_filtered.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format: xlsx or csv (default: input format)
        #[arg(short, long)]
        format: Option<String>,

        /// Don't use cached plans
        #[arg(long)]
        no_cache: bool,

        /// Don't save generated plans to the cache
        #[arg(long)]
        no_save: bool,
    },

    /// Apply a plan file to a spreadsheet (no AI, no cache)
    Filter {
        /// Input spreadsheet
        input: PathBuf,

        /// Plan JSON file
        #[arg(short, long)]
        plan: PathBuf,

        /// Output file for matching rows
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format: xlsx or csv (default: input format)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show an example query plan
    ExamplePlan,

    /// Show the available filter conditions
    Conditions,

    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage cached query plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    /// List all stored plans
    List,

    /// Import a plan JSON file
    Import {
        /// Plan JSON file to import
        file: PathBuf,
        /// Name for the plan
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a stored plan
    Show {
        /// Plan ID
        id: String,
    },

    /// Delete a stored plan
    Delete {
        /// Plan ID
        id: String,
    },

    /// Apply a stored plan to a spreadsheet
    Use {
        /// Plan ID
        id: String,
        /// Input spreadsheet
        input: PathBuf,
        /// Output file for matching rows
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { input, rows } => cmd_inspect(&input, rows),

        Commands::Query {
            input,
            question,
            plan,
            save_plan,
            output,
            format,
            no_cache,
            no_save,
        } => {
            cmd_query(
                &input,
                &question,
                plan.as_deref(),
                save_plan.as_deref(),
                output.as_deref(),
                format.as_deref(),
                no_cache,
                no_save,
            )
            .await
        }

        Commands::Filter {
            input,
            plan,
            output,
            format,
        } => cmd_filter(&input, &plan, output.as_deref(), format.as_deref()),

        Commands::ExamplePlan => cmd_example_plan(),

        Commands::Conditions => cmd_conditions(),

        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Plan { action } => cmd_plan(action),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_inspect(input: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Loading: {}", input.display());

    let sheet = load_file(input)?;

    match &sheet.format {
        SheetFormat::Workbook => eprintln!("   Format: xlsx workbook"),
        SheetFormat::Delimited {
            encoding,
            delimiter,
        } => eprintln!(
            "   Format: delimited (encoding {}, delimiter '{}')",
            encoding,
            format_delimiter(*delimiter)
        ),
    }
    eprintln!(
        "   {} column(s), {} data row(s)",
        sheet.columns.len(),
        sheet.analysis.row_count()
    );

    eprintln!("\nColumns:");
    for (i, name) in sheet.columns.aliased_names().iter().enumerate() {
        let label = if name.is_empty() { "(unnamed)" } else { name };
        eprintln!("  [{:2}] {}", i + 1, label);
    }

    if rows > 0 && sheet.analysis.row_count() > 0 {
        eprintln!("\nFirst {} data row(s):", rows.min(sheet.analysis.row_count()));
        for row in sheet.analysis.rows().iter().take(rows) {
            let fields: Vec<String> = row.iter().map(|c| c.display()).collect();
            println!("{}", fields.join(" | "));
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_query(
    input: &Path,
    question: &str,
    plan_path: Option<&Path>,
    save_plan: Option<&Path>,
    output: Option<&Path>,
    format: Option<&str>,
    no_cache: bool,
    no_save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Processing: {}", input.display());

    let sheet = load_file(input)?;

    let options = AnalyzeOptions {
        plan_path: plan_path.map(|p| p.to_string_lossy().to_string()),
        no_cache,
        no_save,
    };

    let report = sheetsift::analyze_sheet(&sheet, question, &options).await?;

    if let Some(save_path) = save_plan {
        fs::write(save_path, report.plan.to_json()?)?;
        eprintln!("   Plan saved to: {}", save_path.display());
    }

    match report.outcome {
        AnalyzeOutcome::Matches { selection, export } => {
            eprintln!("\n{} matching row(s)", selection.len());

            let format = resolve_format(&sheet.format, format)?;
            let out_path = match output {
                Some(p) => p.to_path_buf(),
                None => default_output(input, format),
            };
            let bytes = sheetsift::to_bytes(&export, format)?;
            fs::write(&out_path, bytes)?;
            eprintln!("Export written to: {}", out_path.display());
        }
        AnalyzeOutcome::NoMatches => {
            eprintln!("\nNo rows matched; nothing exported.");
        }
        AnalyzeOutcome::Chart(chart) => {
            eprintln!(
                "\nChart series ({} point(s), {} skipped):",
                chart.points.len(),
                chart.skipped
            );
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
    }

    Ok(())
}

fn cmd_filter(
    input: &Path,
    plan_path: &Path,
    output: Option<&Path>,
    format: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Processing: {}", input.display());

    let sheet = load_file(input)?;
    let content = fs::read_to_string(plan_path)?;
    let plan = QueryPlan::from_json(&content)?;

    let report = analyze_with_plan(&sheet, plan)?;

    match report.outcome {
        AnalyzeOutcome::Matches { selection, export } => {
            eprintln!("{} matching row(s)", selection.len());

            let format = resolve_format(&sheet.format, format)?;
            let out_path = match output {
                Some(p) => p.to_path_buf(),
                None => default_output(input, format),
            };
            let bytes = sheetsift::to_bytes(&export, format)?;
            fs::write(&out_path, bytes)?;
            eprintln!("Export written to: {}", out_path.display());
        }
        AnalyzeOutcome::NoMatches => {
            eprintln!("No rows matched; nothing exported.");
        }
        AnalyzeOutcome::Chart(chart) => {
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
    }

    Ok(())
}

fn cmd_example_plan() -> Result<(), Box<dyn std::error::Error>> {
    let plan = sheetsift::example_plan();
    println!("{}", plan.to_json()?);
    Ok(())
}

fn cmd_conditions() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", conditions_description());
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    sheetsift::server::start_server(port).await
}

fn cmd_plan(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = PlanRegistry::new();

    match action {
        PlanAction::List => {
            let plans = registry.list();
            if plans.is_empty() {
                eprintln!("No plans stored yet.");
                eprintln!("   Use 'sheetsift plan import <file>' to add one.");
                return Ok(());
            }

            eprintln!("Stored plans ({}):\n", plans.len());
            for p in plans {
                println!("  {} ({})", p.name, p.id);
                println!("     Question: {}", p.question);
                println!("     Columns: {}", p.columns.join(", "));
                println!("     Success rate: {:.0}%", p.success_rate * 100.0);
                println!("     Uses: {}", p.use_count);
                if let Some(ref last) = p.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        PlanAction::Import { file, name } => {
            let plan_name = name.as_deref().unwrap_or_else(|| {
                file.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("imported")
            });

            eprintln!("Importing plan from: {}", file.display());
            let id = registry.import(&file, Some(plan_name))?;
            eprintln!("Plan saved with ID: {}", id);
        }

        PlanAction::Show { id } => match registry.get(&id) {
            Some(p) => {
                println!("Plan: {} ({})\n", p.name, p.id);
                println!("Question: {}", p.question);
                println!("Columns: {}", p.columns.join(", "));
                println!("Created: {}", p.created_at);
                println!("Success rate: {:.0}%", p.success_rate * 100.0);
                println!("Uses: {}", p.use_count);
                println!("\nPlan:");
                println!("{}", p.plan.to_json()?);
            }
            None => {
                return Err(format!("Plan not found: {}", id).into());
            }
        },

        PlanAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("Plan deleted: {}", id);
        }

        PlanAction::Use { id, input, output } => {
            let stored = registry
                .get(&id)
                .ok_or_else(|| format!("Plan not found: {}", id))?
                .clone();

            eprintln!("Using plan: {} ({})", stored.name, stored.id);

            let sheet = load_file(&input)?;
            let report = analyze_with_plan(&sheet, stored.plan)?;

            let success = matches!(
                report.outcome,
                AnalyzeOutcome::Matches { .. } | AnalyzeOutcome::Chart(_)
            );
            registry.update_stats(&id, success);

            match report.outcome {
                AnalyzeOutcome::Matches { selection, export } => {
                    eprintln!("{} matching row(s)", selection.len());
                    let format = resolve_format(&sheet.format, None)?;
                    let out_path = match output {
                        Some(p) => p,
                        None => default_output(&input, format),
                    };
                    let bytes = sheetsift::to_bytes(&export, format)?;
                    fs::write(&out_path, bytes)?;
                    eprintln!("Export written to: {}", out_path.display());
                }
                AnalyzeOutcome::NoMatches => {
                    eprintln!("No rows matched; nothing exported.");
                }
                AnalyzeOutcome::Chart(chart) => {
                    println!("{}", serde_json::to_string_pretty(&chart)?);
                }
            }
        }
    }

    Ok(())
}

/// Pick the export format: explicit flag first, then the input format.
fn resolve_format(
    sheet_format: &SheetFormat,
    requested: Option<&str>,
) -> Result<ExportFormat, Box<dyn std::error::Error>> {
    match requested {
        Some(name) => {
            ExportFormat::from_name(name).ok_or_else(|| format!("Unknown format: {}", name).into())
        }
        None => Ok(match sheet_format {
            SheetFormat::Workbook => ExportFormat::Xlsx,
            SheetFormat::Delimited { .. } => ExportFormat::Csv,
        }),
    }
}

/// `input.xlsx` -> `input_filtered.xlsx` next to the input.
fn default_output(input: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("result");
    input.with_file_name(format!("{}_filtered.{}", stem, format.extension()))
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
