//! quiz-set-gen CLI
//!
//! Balanced quiz set generation from a tiered question bank.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quiz_set_gen::{
    allocation_engine::{
        generate_from_table,
        helpers::{stream_rng, BASELINE_STREAM, RESPONSE_STREAM},
        random_baseline,
    },
    bank,
    config::{DistributionConfig, RunConfig},
    export::{build_workbook, evaluation_table, Workbook},
    grading::{score_responses, simulate_responses, AnswerKey, ResponseRates},
    Error, Result, ShortfallPolicy, ShuffleMode,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quiz-set-gen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate quiz sets from a question bank
    Generate {
        /// Question bank (JSON array of rows)
        #[arg(short, long)]
        input: PathBuf,

        /// TOML run configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of sets
        #[arg(short = 'n', long)]
        sets: Option<usize>,

        /// Hard questions per set
        #[arg(long)]
        hard: Option<i64>,

        /// Medium questions per set
        #[arg(long)]
        medium: Option<i64>,

        /// Easy questions per set
        #[arg(long)]
        easy: Option<i64>,

        /// Percent split as HARD,MEDIUM,EASY (switches to percentage mode)
        #[arg(long, value_delimiter = ',')]
        percent: Option<Vec<f64>>,

        /// Questions per set in percentage mode
        #[arg(long)]
        total: Option<usize>,

        /// none, options, questions or both
        #[arg(long)]
        shuffle: Option<ShuffleMode>,

        /// duplicate, truncate or reject
        #[arg(long)]
        shortfall: Option<ShortfallPolicy>,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compare against this many uniform-sampling trials
        #[arg(long)]
        baseline: Option<usize>,
    },

    /// Write a placeholder question bank
    Sample {
        #[arg(short, long, default_value = "sample_question_bank.json")]
        output: PathBuf,

        #[arg(long, default_value = "10")]
        hard: usize,

        #[arg(long, default_value = "25")]
        medium: usize,

        #[arg(long, default_value = "15")]
        easy: usize,
    },

    /// Simulate student responses for generated papers
    Simulate {
        /// Workbook written by `generate`
        #[arg(long)]
        papers: PathBuf,

        /// Number of students (at most one per set)
        #[arg(long)]
        students: usize,

        /// Question columns in the sheet (defaults to the highest keyed number)
        #[arg(long, default_value = "0")]
        bank_size: usize,

        #[arg(long, default_value = "0.7")]
        correct_rate: f64,

        #[arg(long, default_value = "0.2")]
        wrong_rate: f64,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long, default_value = "output/responses.json")]
        output: PathBuf,
    },

    /// Score a responses sheet against the papers' answer key
    Grade {
        #[arg(long)]
        papers: PathBuf,

        #[arg(long)]
        responses: PathBuf,

        /// Pass mark in percent
        #[arg(long, default_value = "40")]
        threshold: f64,

        #[arg(short, long, default_value = "output/scoring_report.json")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Generate {
            input, config, sets, hard, medium, easy, percent, total,
            shuffle, shortfall, seed, output, baseline,
        } => {
            let mut config = match config {
                Some(path) => RunConfig::load(path)?,
                None => RunConfig::default(),
            };
            if let Some(n) = sets { config.sets = n; }
            if let Some(s) = seed { config.seed = Some(s); }
            if let Some(m) = shuffle { config.shuffle = m; }
            if let Some(p) = shortfall { config.shortfall = p; }
            if let Some(dir) = output { config.output = dir; }
            apply_distribution(&mut config, (hard, medium, easy), percent, total)?;

            tracing::info!(
                input = %input.display(),
                sets = config.sets,
                seed = ?config.seed,
                shuffle = %config.shuffle,
                shortfall = %config.shortfall,
                "Generating quiz sets"
            );

            let raw = bank::load_table(&input)?;
            let request = config.to_request();
            let (pool, run) = generate_from_table(&raw, &request)?;

            let path = config.output.join("quiz_sets.json");
            build_workbook(&pool, &run).write_json(&path)?;
            println!("Wrote {} set(s) to {}", run.allocation.table.len(), path.display());
            println!("{}", evaluation_table(&run.report));
            println!("Reuse spread: {}", run.report.reuse_spread);

            if let Some(trials) = baseline {
                let mut rng = stream_rng(config.seed, BASELINE_STREAM);
                let b = random_baseline(&pool, &run.plan, trials, &mut rng);
                println!(
                    "Overall delta {} vs uniform sampling {:.2} (min {}, max {}) over {} trials",
                    run.report.overall_delta(), b.avg_delta, b.min_delta, b.max_delta, b.trials
                );
            }

            for warning in &run.report.warnings {
                tracing::warn!("{warning}");
            }
            for check in &run.report.checks {
                if check.passed {
                    tracing::info!(check = %check.name, "check passed");
                } else {
                    tracing::warn!(check = %check.name, details = ?check.details, "check failed");
                }
            }

            Ok(if run.report.all_passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::Sample { output, hard, medium, easy } => {
            bank::write_table(&bank::sample_table(hard, medium, easy), &output)?;
            println!("Wrote sample bank ({hard}H / {medium}M / {easy}E) to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Simulate { papers, students, bank_size, correct_rate, wrong_rate, seed, output } => {
            let key = AnswerKey::from_workbook(&Workbook::read_json(&papers)?)?;
            let rates = ResponseRates { correct: correct_rate, wrong: wrong_rate };
            let mut rng = stream_rng(seed, RESPONSE_STREAM);
            let sheet = simulate_responses(&key, bank_size, students, rates, &mut rng)?;

            Workbook { sheets: vec![sheet] }.write_json(&output)?;
            println!(
                "Wrote {students} response(s) to {} ({:.0}% correct / {:.0}% wrong / {:.0}% blank)",
                output.display(),
                rates.correct * 100.0,
                rates.wrong * 100.0,
                rates.blank() * 100.0
            );
            Ok(ExitCode::SUCCESS)
        }

        Commands::Grade { papers, responses, threshold, output } => {
            let key = AnswerKey::from_workbook(&Workbook::read_json(&papers)?)?;
            let book = Workbook::read_json(&responses)?;
            let sheet = book
                .sheets
                .first()
                .ok_or_else(|| Error::Input(format!("{} holds no sheets", responses.display())))?;

            let report = score_responses(sheet, &key, threshold)?;
            report.to_workbook().write_json(&output)?;

            println!("Students: {}", report.students.len());
            println!("Average: {:.2}%  Median: {:.2}%", report.average, report.median);
            println!("Passed: {} ({:.2}%)", report.pass_count, report.pass_rate);
            println!("{}", report.console_table());
            let issues = report.validation_issues().count();
            if issues > 0 {
                tracing::warn!(issues, "students answered questions outside their set");
            }
            println!("Report written to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Fold distribution flags into `config`. Percent flags switch to percentage
/// mode; count flags switch to absolute mode, keeping unset tiers.
fn apply_distribution(
    config: &mut RunConfig,
    counts: (Option<i64>, Option<i64>, Option<i64>),
    percent: Option<Vec<f64>>,
    total: Option<usize>,
) -> Result<()> {
    if let Some(p) = percent {
        let [hard, medium, easy] = <[f64; 3]>::try_from(p)
            .map_err(|_| Error::Input("--percent takes exactly three values".into()))?;
        let total = match (&config.distribution, total) {
            (_, Some(t)) => t,
            (DistributionConfig::Percentage { total, .. }, None) => *total,
            (DistributionConfig::Absolute { hard, medium, easy }, None) => {
                let sum = hard + medium + easy;
                usize::try_from(sum).map_err(|_| {
                    Error::Input(format!("cannot derive --total from negative absolute counts (sum {sum})"))
                })?
            }
        };
        config.distribution = DistributionConfig::Percentage { hard, medium, easy, total };
        return Ok(());
    }

    if counts == (None, None, None) {
        if let (Some(t), DistributionConfig::Percentage { total, .. }) = (total, &mut config.distribution) {
            *total = t;
        }
        return Ok(());
    }
    let (h, m, e) = match config.distribution {
        DistributionConfig::Absolute { hard, medium, easy } => (hard, medium, easy),
        DistributionConfig::Percentage { .. } => (4, 6, 5),
    };
    config.distribution = DistributionConfig::Absolute {
        hard: counts.0.unwrap_or(h),
        medium: counts.1.unwrap_or(m),
        easy: counts.2.unwrap_or(e),
    };
    Ok(())
}
