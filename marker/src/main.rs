use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use code_runner::{ExecutionConfig, run_notebook};
use common::logger::init_logging;
use marker::{DirectoryLister, MarkReport, prepare_grader, summarize_results};
use notebook::Notebook;
use notebook::exercise::make_check_exercise;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use util::config::AppConfig;
use util::languages::KernelLanguage;

#[derive(Parser, Debug)]
#[command(name = "nbgrade", version, about = "Grade R Markdown notebooks by their outputs")]
struct Args {
    /// JSON file with kernel timeouts and bridge command (overrides env)
    #[arg(long, global = true)]
    kernel_config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the student exercise from a solution notebook
    Exercise {
        solution: PathBuf,
        total: f64,
        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a grading definition against its reference solution
    Check {
        definition: PathBuf,
        solution: PathBuf,
    },
    /// Grade one submission file or every notebook in a directory
    Grade {
        definition: PathBuf,
        solution: PathBuf,
        submissions: PathBuf,
        /// Skip remaining chunks after the first failing one
        #[arg(long)]
        stop_on_error: bool,
        /// Print one JSON report per line
        #[arg(long)]
        json: bool,
    },
    /// Run a notebook and print the first output of every chunk
    Summary {
        notebook: PathBuf,
        #[arg(long, default_value = "r")]
        language: KernelLanguage,
    },
}

fn print_report(report: &MarkReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging();
    info!(project = %AppConfig::global().project_name, "Starting nbgrade");

    let sessions = match &args.kernel_config {
        Some(path) => ExecutionConfig::load(path)
            .with_context(|| format!("Cannot read kernel config {}", path.display()))?,
        None => ExecutionConfig::from_app_config(),
    };

    match args.command {
        Command::Exercise {
            solution,
            total,
            out,
        } => {
            let text = fs::read_to_string(&solution)
                .with_context(|| format!("Cannot read {}", solution.display()))?;
            let exercise = make_check_exercise(&text, total)?;
            match out {
                Some(path) => fs::write(&path, exercise)
                    .with_context(|| format!("Cannot write {}", path.display()))?,
                None => print!("{exercise}"),
            }
        }
        Command::Check {
            definition,
            solution,
        } => {
            let grader = prepare_grader(&definition, &solution, &sessions).await?;
            let scheme = grader.scheme();
            println!(
                "OK: {} answers award {} marks to {}",
                scheme.answers().len(),
                scheme.total(),
                solution.display()
            );
        }
        Command::Grade {
            definition,
            solution,
            submissions,
            stop_on_error,
            json,
        } => {
            let grader = prepare_grader(&definition, &solution, &sessions)
                .await?
                .stop_on_error(stop_on_error);
            let lister = DirectoryLister::new(&submissions);
            let graded = grader.grade_all(&lister, &sessions).await?;
            let mut failures = 0;
            for submission in &graded {
                match &submission.result {
                    Ok(report) => print_report(report, json)?,
                    Err(err) => {
                        failures += 1;
                        eprintln!("{}: {err}", submission.path.display());
                    }
                }
            }
            if failures > 0 {
                bail!("{failures} of {} submissions could not be graded", graded.len());
            }
        }
        Command::Summary { notebook, language } => {
            let notebook = Notebook::load(&notebook)?;
            let report = run_notebook(&notebook, language, &sessions, false).await?;
            println!("{}", summarize_results(&report));
        }
    }
    Ok(())
}
