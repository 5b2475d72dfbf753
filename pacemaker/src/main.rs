//! Iteration-budget governor CLI.
//!
//! Computes budgets against the recorded history, reports per-profile
//! statistics, checks vitals for degradation and runs interactive
//! consultations on the terminal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use pacemaker::consult::ConsultationEscalator;
use pacemaker::core::complexity::SessionContext;
use pacemaker::core::degradation::detect;
use pacemaker::core::types::{TaskProfile, VitalsSnapshot};
use pacemaker::exit_codes;
use pacemaker::io::config::{ConfigSnapshot, DEFAULT_CONFIG_PATH};
use pacemaker::io::operator::ConsoleOperator;
use pacemaker::io::performance_log::{DEFAULT_SUCCESS_RATE, PerformanceStore};
use pacemaker::logging;
use pacemaker::session::PacemakerSession;

#[derive(Parser)]
#[command(
    name = "pacemaker",
    version,
    about = "Iteration-budget governor for autonomous agent loops"
)]
struct Cli {
    /// Path to the pacemaker configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
struct VitalsArgs {
    #[arg(long, default_value_t = 0.7)]
    mood: f64,
    #[arg(long, default_value_t = 0.7)]
    focus: f64,
    #[arg(long, default_value_t = 0.7)]
    stamina: f64,
}

impl VitalsArgs {
    fn snapshot(self) -> VitalsSnapshot {
        VitalsSnapshot::new(self.mood, self.focus, self.stamina)
    }
}

#[derive(Args, Debug, Clone, Default)]
struct ContextArgs {
    /// Latest user message (drives the urgency estimate).
    #[arg(long, default_value = "")]
    message: String,
    #[arg(long)]
    files: Option<u32>,
    #[arg(long)]
    turns: Option<u32>,
    #[arg(long)]
    errors: Option<u32>,
    #[arg(long)]
    tool_runs: Option<u32>,
    #[arg(long)]
    refs: Option<u32>,
}

impl From<ContextArgs> for SessionContext {
    fn from(args: ContextArgs) -> Self {
        SessionContext {
            file_count: args.files,
            turn_count: args.turns,
            error_count: args.errors,
            tool_executions: args.tool_runs,
            external_references: args.refs,
            latest_message: args.message,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compute an iteration budget for a task profile.
    Budget {
        #[arg(long)]
        profile: String,
        #[command(flatten)]
        vitals: VitalsArgs,
        #[command(flatten)]
        context: ContextArgs,
        /// Print the full computation as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print per-profile statistics from the performance log.
    Stats {
        #[arg(long)]
        profile: Option<String>,
    },
    /// Check vitals for degradation (exit code 3 when intervention is required).
    Check {
        #[command(flatten)]
        vitals: VitalsArgs,
        #[arg(long, default_value_t = DEFAULT_SUCCESS_RATE)]
        success_rate: f64,
    },
    /// Ask the operator how to continue a degrading session.
    Consult {
        #[command(flatten)]
        vitals: VitalsArgs,
        #[arg(long)]
        iteration: u32,
        #[arg(long)]
        budget: u32,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Budget {
            profile,
            vitals,
            context,
            json,
        } => cmd_budget(&cli.config, &profile, vitals, context, json),
        Command::Stats { profile } => cmd_stats(&cli.config, profile.as_deref()),
        Command::Check {
            vitals,
            success_rate,
        } => cmd_check(vitals, success_rate),
        Command::Consult {
            vitals,
            iteration,
            budget,
        } => cmd_consult(&cli.config, vitals, iteration, budget),
    }
}

fn cmd_budget(
    config: &Path,
    profile: &str,
    vitals: VitalsArgs,
    context: ContextArgs,
    json: bool,
) -> Result<i32> {
    let pacemaker = PacemakerSession::open(config, SessionContext::from(context));
    let profile = TaskProfile::new(profile);
    let computation = pacemaker.compute_budget(&profile, vitals.snapshot());
    if json {
        print_json(&computation)?;
    } else {
        println!("{}", computation.final_budget);
        println!("{}", computation.reasoning);
        if let Some(recommended) = pacemaker.store().recommended_budget(&profile) {
            println!("history recommends {recommended}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_stats(config: &Path, profile: Option<&str>) -> Result<i32> {
    let cfg = ConfigSnapshot::load(config).config_or_default();
    let store = PerformanceStore::open(&cfg.performance_log_path(config));
    for (key, stats) in store.profiles() {
        if profile.is_some_and(|wanted| wanted != key.as_str()) {
            continue;
        }
        let recommended = stats
            .recommended_budget()
            .map_or_else(|| "unknown".to_string(), |b| b.to_string());
        println!(
            "{key}\tsessions={}\tsuccess_rate={:.2}\tavg_loops={:.2}\t\
             avg_efficiency={:.2}\trecommended={recommended}",
            stats.total_sessions,
            stats.success_rate(),
            stats.avg_loops_used.unwrap_or_default(),
            stats.avg_efficiency.unwrap_or_default(),
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_check(vitals: VitalsArgs, success_rate: f64) -> Result<i32> {
    let detection = detect(&vitals.snapshot(), success_rate);
    print_json(&detection)?;
    if detection.required {
        Ok(exit_codes::INTERVENTION_REQUIRED)
    } else {
        Ok(exit_codes::OK)
    }
}

fn cmd_consult(config: &Path, vitals: VitalsArgs, iteration: u32, budget: u32) -> Result<i32> {
    let cfg = ConfigSnapshot::load(config).config_or_default();
    let mut escalator = ConsultationEscalator::new(ConsoleOperator::stdio())
        .with_max_invalid_inputs(cfg.pacemaker.max_invalid_inputs);
    let outcome = escalator.escalate(&vitals.snapshot(), iteration, budget);
    print_json(&outcome)?;
    Ok(exit_codes::OK)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
