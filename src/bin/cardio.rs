//! Cardio CLI - Command-line interface for Synheart Cardio
//!
//! Commands:
//! - run: Score streaming readings from stdin (one session)
//! - validate: Check readings against physiological ranges
//! - project: Trend and risk projection from a score history
//! - whatif: Simulate interventions for a score
//! - doctor: Diagnose configuration and environment

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use synheart_cardio::baseline::Baseline;
use synheart_cardio::projection::{
    calculate_trend, improvement_path, project_recovery_time, project_risk, risk_trajectory,
    simulate_scenario, Behavior, Horizon, DEFAULT_PROJECTION_HOURS, DEFAULT_RECOVERY_INTERVENTION,
    DEFAULT_RECOVERY_TARGET,
};
use synheart_cardio::validation::{RangeValidator, RawReading, SampleValidator};
use synheart_cardio::{
    CardioEngine, EngineConfig, EngineError, Language, ProcessingResult, CARDIO_VERSION,
    PRODUCER_NAME,
};

/// Cardio - session-scoped cardiovascular scoring engine
#[derive(Parser)]
#[command(name = "cardio")]
#[command(author = "Synheart AI Inc")]
#[command(version = CARDIO_VERSION)]
#[command(about = "Score streaming vitals into zones, alerts and projections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score NDJSON readings from stdin, one result per line
    Run {
        /// Engine config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session id (random if omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// User id recorded on the session
        #[arg(long, default_value = "cli")]
        user_id: String,

        /// Message language (english, pidgin, yoruba, igbo, hausa or a short code)
        #[arg(long)]
        language: Option<Language>,

        /// Load a baseline from file and skip calibration
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Save the session baseline to file on exit
        #[arg(long)]
        save_baseline: Option<PathBuf>,

        /// Print a session summary as the final line
        #[arg(long)]
        summary: bool,

        /// Buffer output instead of flushing after each record
        #[arg(long = "no-flush", action = ArgAction::SetFalse)]
        flush: bool,
    },

    /// Validate NDJSON readings without scoring them
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fit a trend to a score history and project it forward
    Project {
        /// Composite scores, oldest first (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        history: Vec<f64>,

        /// Hours to project
        #[arg(long, default_value_t = DEFAULT_PROJECTION_HOURS)]
        hours: u32,

        /// Chart a trajectory under an assumed behaviour (current, positive, negative)
        #[arg(long)]
        behavior: Option<Behavior>,
    },

    /// Simulate interventions for a composite score
    Whatif {
        /// Current composite score
        #[arg(long)]
        score: f64,

        /// Scenario name (e.g. rest_30min, deep_breathing, poor_sleep)
        #[arg(long)]
        scenario: Option<String>,

        /// Horizon: immediate, 1h or 24h
        #[arg(long, default_value = "1h")]
        horizon: Horizon,

        /// List the best interventions for this score
        #[arg(long)]
        improvement_path: bool,

        /// Estimate time to reach --target
        #[arg(long)]
        recovery: bool,

        /// Recovery target score
        #[arg(long, default_value_t = DEFAULT_RECOVERY_TARGET)]
        target: f64,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check an engine config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a baseline file
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CardioCliError> {
    match cli.command {
        Commands::Run {
            config,
            session_id,
            user_id,
            language,
            baseline,
            save_baseline,
            summary,
            flush,
        } => cmd_run(RunOptions {
            config: config.as_deref(),
            session_id,
            user_id: &user_id,
            language,
            baseline: baseline.as_deref(),
            save_baseline: save_baseline.as_deref(),
            summary,
            flush,
        }),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Project {
            history,
            hours,
            behavior,
        } => cmd_project(&history, hours, behavior),

        Commands::Whatif {
            score,
            scenario,
            horizon,
            improvement_path,
            recovery,
            target,
        } => cmd_whatif(score, scenario.as_deref(), horizon, improvement_path, recovery, target),

        Commands::Doctor {
            config,
            baseline,
            json,
        } => cmd_doctor(config.as_deref(), baseline.as_deref(), json),
    }
}

struct RunOptions<'a> {
    config: Option<&'a Path>,
    session_id: Option<String>,
    user_id: &'a str,
    language: Option<Language>,
    baseline: Option<&'a Path>,
    save_baseline: Option<&'a Path>,
    summary: bool,
    flush: bool,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CardioCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_run(opts: RunOptions<'_>) -> Result<(), CardioCliError> {
    let engine = CardioEngine::with_config(load_config(opts.config)?)?;
    let session_id = engine.create_session(opts.user_id, opts.language, opts.session_id)?;

    if let Some(path) = opts.baseline {
        let baseline = Baseline::from_json(&fs::read_to_string(path)?)?;
        engine.set_baseline(&session_id, baseline)?;
    }

    info!(session_id = %session_id, "streaming readings from stdin");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut processed = 0usize;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let result = match parse_reading(trimmed) {
            Ok(reading) => engine.process(&session_id, &reading),
            Err(e) => ProcessingResult::rejected(&session_id, &e),
        };

        writeln!(stdout, "{}", serde_json::to_string(&result)?)?;
        if opts.flush {
            stdout.flush()?;
        }
        processed += 1;
    }

    if opts.summary {
        let summary = engine.session_summary(&session_id)?;
        writeln!(stdout, "{}", serde_json::to_string(&summary)?)?;
    }
    stdout.flush()?;

    if let Some(path) = opts.save_baseline {
        let session = engine.get_session(&session_id)?;
        match session.baseline() {
            Some(baseline) => fs::write(path, baseline.to_json()?)?,
            None => return Err(CardioCliError::NotCalibrated(session_id)),
        }
    }

    debug!(processed, "stream finished");
    Ok(())
}

fn parse_reading(line: &str) -> Result<RawReading, EngineError> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    Ok(RawReading::from_json(&value)?)
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), CardioCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let validator = RangeValidator;
    let mut total = 0usize;
    let mut errors = Vec::new();

    for (index, line) in input_data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        total += 1;

        let outcome = parse_reading(trimmed)
            .and_then(|reading| validator.validate(&reading).map_err(EngineError::from));
        if let Err(e) = outcome {
            errors.push(ValidationErrorDetail {
                line: index + 1,
                reason: e.reason().to_string(),
                error: e.to_string(),
            });
        }
    }

    if total == 0 {
        return Err(CardioCliError::NoReadings);
    }

    let report = ValidationReport {
        total_readings: total,
        valid_readings: total - errors.len(),
        invalid_readings: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total readings:   {}", report.total_readings);
        println!("Valid readings:   {}", report.valid_readings);
        println!("Invalid readings: {}", report.invalid_readings);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {} [{}]: {}", err.line, err.reason, err.error);
            }
        }
    }

    if report.invalid_readings > 0 {
        Err(CardioCliError::ValidationFailed(report.invalid_readings))
    } else {
        Ok(())
    }
}

fn cmd_project(history: &[f64], hours: u32, behavior: Option<Behavior>) -> Result<(), CardioCliError> {
    let Some(&current) = history.last() else {
        return Err(CardioCliError::NoReadings);
    };

    let output = match behavior {
        Some(behavior) => serde_json::to_string_pretty(&risk_trajectory(current, history, behavior, hours))?,
        None => serde_json::to_string_pretty(&ProjectReport {
            trend: calculate_trend(history),
            projection: project_risk(current, history, hours),
        })?,
    };
    println!("{}", output);
    Ok(())
}

fn cmd_whatif(
    score: f64,
    scenario: Option<&str>,
    horizon: Horizon,
    improvement: bool,
    recovery: bool,
    target: f64,
) -> Result<(), CardioCliError> {
    if !(0.0..=100.0).contains(&score) {
        return Err(CardioCliError::InvalidScore(score));
    }

    let output = if improvement {
        serde_json::to_string_pretty(&improvement_path(score))?
    } else if recovery {
        let intervention = scenario.unwrap_or(DEFAULT_RECOVERY_INTERVENTION);
        serde_json::to_string_pretty(&project_recovery_time(score, target, intervention))?
    } else {
        let Some(name) = scenario else {
            return Err(CardioCliError::MissingScenario);
        };
        serde_json::to_string_pretty(&simulate_scenario(name, score, horizon))?
    };
    println!("{}", output);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, baseline: Option<&Path>, json: bool) -> Result<(), CardioCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "cardio_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Cardio version {}", CARDIO_VERSION),
    });

    if let Some(path) = config {
        checks.push(file_check("config", path, |s| {
            EngineConfig::from_json(s)
                .map(|c| format!("Config valid (calibration after {} readings)", c.calibration_samples))
                .map_err(|e| e.to_string())
        }));
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        });
    }

    if let Some(path) = baseline {
        checks.push(file_check("baseline", path, |s| {
            Baseline::from_json(s)
                .map(|b| {
                    format!(
                        "Baseline valid (resting HR {:.0} bpm, HRV {:.0} ms, quality {})",
                        b.resting_heart_rate,
                        b.resting_hrv,
                        b.quality.as_str()
                    )
                })
                .map_err(|e| e.to_string())
        }));
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CARDIO_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Cardio Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CardioCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn file_check(name: &str, path: &Path, parse: impl Fn(&str) -> Result<String, String>) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    let (status, message) = match fs::read_to_string(path) {
        Ok(contents) => match parse(&contents) {
            Ok(message) => (CheckStatus::Ok, message),
            Err(e) => (CheckStatus::Error, format!("Invalid {}: {}", name, e)),
        },
        Err(e) => (CheckStatus::Error, format!("Cannot read {} file: {}", name, e)),
    };
    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

// Error types

#[derive(Debug)]
enum CardioCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoReadings,
    NotCalibrated(String),
    ValidationFailed(usize),
    InvalidScore(f64),
    MissingScenario,
    DoctorFailed,
}

impl From<io::Error> for CardioCliError {
    fn from(e: io::Error) -> Self {
        CardioCliError::Io(e)
    }
}

impl From<EngineError> for CardioCliError {
    fn from(e: EngineError) -> Self {
        CardioCliError::Engine(e)
    }
}

impl From<serde_json::Error> for CardioCliError {
    fn from(e: serde_json::Error) -> Self {
        CardioCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CardioCliError> for CliError {
    fn from(e: CardioCliError) -> Self {
        match e {
            CardioCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CardioCliError::Engine(e) => CliError {
                code: e.reason().to_uppercase(),
                message: e.to_string(),
                hint: Some("Run 'cardio doctor' to check your configuration".to_string()),
            },
            CardioCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CardioCliError::NoReadings => CliError {
                code: "NO_READINGS".to_string(),
                message: "No readings found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            CardioCliError::NotCalibrated(id) => CliError {
                code: "NOT_CALIBRATED".to_string(),
                message: format!("Session {} finished without a baseline", id),
                hint: Some("Send at least the configured number of calibration readings".to_string()),
            },
            CardioCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} readings failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            CardioCliError::InvalidScore(score) => CliError {
                code: "INVALID_SCORE".to_string(),
                message: format!("Score {} is outside 0-100", score),
                hint: None,
            },
            CardioCliError::MissingScenario => CliError {
                code: "MISSING_SCENARIO".to_string(),
                message: "No scenario given".to_string(),
                hint: Some("Pass --scenario, --improvement-path or --recovery".to_string()),
            },
            CardioCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ProjectReport {
    trend: synheart_cardio::TrendAnalysis,
    projection: synheart_cardio::projection::RiskProjection,
}

#[derive(Serialize)]
struct ValidationReport {
    total_readings: usize,
    valid_readings: usize,
    invalid_readings: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    line: usize,
    reason: String,
    error: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
