//! popp - Spectral-Poisson rate models
//!
//! The main entry point for popp, handling:
//! - Learning per-region event rates from an observation feed
//! - Showing one cycle of rate estimates for a region
//! - Validating the resolved configuration

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use popp_common::error::{format_batch_human, format_error_human};
use popp_common::{BatchResult, Error, OutputFormat, RegionId, StructuredError};
use popp_config::{ModelKind, CONFIG_SCHEMA_VERSION};
use popp_core::config::{load_config, ConfigError, ResolvedConfig};
use popp_core::exit_codes::ExitCode;
use popp_core::feed::JsonObservationFeed;
use popp_core::log_event;
use popp_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use popp_core::model::{Estimator, RateModel};
use popp_core::RegionRegistry;

/// Version of the JSON documents printed on stdout.
const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

/// popp - Bayesian event rates per region with periodic and spectral smoothing
#[derive(Parser)]
#[command(name = "popp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to config.json
    #[arg(long, global = true, env = "POPP_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed observations into every region's model and persist it
    Learn(LearnArgs),

    /// Print one cycle of rate estimates for a region
    Show(ShowArgs),

    /// Validate configuration and print where it came from
    Check,
}

#[derive(Args, Debug)]
struct LearnArgs {
    /// JSON observation document ({"<region>": {"<epoch>": count}})
    #[arg(long)]
    observations: PathBuf,

    /// Start of the window, inclusive (epoch seconds or RFC 3339)
    #[arg(long, value_parser = parse_time)]
    start: i64,

    /// End of the window, exclusive (epoch seconds or RFC 3339)
    #[arg(long, value_parser = parse_time)]
    end: i64,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Region to show
    #[arg(long)]
    region: String,

    /// Posterior mean instead of the mode
    #[arg(long)]
    mean: bool,

    /// 95th percentile
    #[arg(long)]
    upper: bool,

    /// 5th percentile
    #[arg(long)]
    lower: bool,
}

/// Parse epoch seconds or an RFC 3339 timestamp.
fn parse_time(s: &str) -> Result<i64, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .map_err(|e| format!("expected epoch seconds or RFC 3339 time, got '{}': {}", s, e))
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id());
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_STARTED,
        Stage::Init,
        "popp starting",
        version = env!("CARGO_PKG_VERSION")
    );

    let exit_code = match &cli.command {
        Commands::Learn(args) => run_learn(&cli.global, &ctx, args),
        Commands::Show(args) => run_show(&cli.global, &ctx, args),
        Commands::Check => run_check(&cli.global, &ctx),
    };

    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Init,
        "popp finished",
        exit_code = exit_code.as_i32(),
        elapsed_ms = ctx.elapsed_ms()
    );
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_learn(global: &GlobalOpts, ctx: &LogContext, args: &LearnArgs) -> ExitCode {
    if args.end < args.start {
        return output_error(
            global,
            ctx,
            &Error::Feed(format!("window end {} is before start {}", args.end, args.start)),
            ExitCode::ArgsError,
        );
    }

    let resolved = match load_resolved(global, ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let mut registry = match open_registry(global, ctx, &resolved) {
        Ok(registry) => registry,
        Err(code) => return code,
    };

    let feed = match JsonObservationFeed::from_file(&args.observations) {
        Ok(feed) => feed,
        Err(e) => return output_error(global, ctx, &e, ExitCode::for_error(&e)),
    };

    // Never learn on top of a store that could not be read back
    let loaded = registry.load_all(ctx);
    if !loaded.failed.is_empty() {
        let code = batch_exit(&loaded, registry.len());
        emit_batch(global, ctx, "load", &loaded, serde_json::json!({}));
        return code;
    }

    let learned = registry.learn(ctx, &feed, args.start, args.end);
    let code = batch_exit(&learned, learned.summary.total);
    emit_batch(
        global,
        ctx,
        "learn",
        &learned,
        serde_json::json!({
            "start": args.start,
            "end": args.end,
            "restored": loaded.succeeded,
        }),
    );
    code
}

fn run_show(global: &GlobalOpts, ctx: &LogContext, args: &ShowArgs) -> ExitCode {
    let region = match RegionId::new(args.region.clone()) {
        Ok(region) => region,
        Err(e) => return output_error(global, ctx, &e, ExitCode::ArgsError),
    };
    let estimator = Estimator::from_flags(args.mean, args.upper, args.lower);

    let resolved = match load_resolved(global, ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let mut registry = match open_registry(global, ctx, &resolved) {
        Ok(registry) => registry,
        Err(code) => return code,
    };

    let model = match registry.get_mut(&region) {
        Ok(model) => model,
        Err(e) => return output_error(global, ctx, &e, ExitCode::for_error(&e)),
    };
    let restored = match model.load() {
        Ok(restored) => restored,
        Err(e) => return output_error(global, ctx, &e, ExitCode::for_error(&e)),
    };

    let model = match registry.get(&region) {
        Ok(model) => model,
        Err(e) => return output_error(global, ctx, &e, ExitCode::for_error(&e)),
    };
    let estimates = model.retrieve_full_cycle(estimator);
    log_event!(
        ctx,
        INFO,
        event_names::RETRIEVE_CYCLE,
        Stage::Retrieve,
        "cycle retrieved",
        region = %region,
        estimator = %estimator,
        buckets = estimates.len()
    );

    match global.format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = estimates
                .iter()
                .map(|(t, value)| serde_json::json!({ "t": t, "value": value }))
                .collect();
            let response = serde_json::json!({
                "schema_version": OUTPUT_SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "command": "show",
                "status": "ok",
                "region": region,
                "model": model.kind(),
                "technique": model.technique(),
                "estimator": estimator,
                "increment": model.increment(),
                "periodic_cycle": model.periodic_cycle(),
                "pivot": model.pivot(),
                "restored": restored,
                "estimates": rows,
            });
            print_json(&response);
        }
        OutputFormat::Human => {
            println!(
                "# {} ({} model, {} per {}s bucket)",
                region,
                model.kind(),
                estimator,
                model.increment()
            );
            if !restored {
                println!("(no records found, showing the prior)");
            }
            for (t, value) in &estimates {
                println!("{:>12}  {:.6}", t, value);
            }
        }
    }
    ExitCode::Clean
}

fn run_check(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let resolved = match load_resolved(global, ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let config = &resolved.config;

    let stores: Vec<serde_json::Value> = match config.region_ids() {
        Ok(ids) => ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "region": id,
                    "location": config.store_location(id).display().to_string(),
                })
            })
            .collect(),
        Err(e) => return output_config_error(global, ctx, &ConfigError::Validation(e)),
    };

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": OUTPUT_SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "command": "check",
                "status": "ok",
                "config": {
                    "source": resolved.source.to_string(),
                    "path": resolved.path.as_ref().map(|p| p.display().to_string()),
                    "using_defaults": resolved.path.is_none(),
                    "schema_version": CONFIG_SCHEMA_VERSION,
                },
                "model": config,
                "buckets_per_cycle": config.buckets_per_cycle(),
                "stores": stores,
            });
            print_json(&response);
        }
        OutputFormat::Human => {
            let source = match &resolved.path {
                Some(path) => format!("{} ({})", path.display(), resolved.source),
                None => resolved.source.to_string(),
            };
            println!("Config: {}", source);
            println!(
                "Model: {} ({}s buckets, {}s cycle, {} buckets per cycle)",
                config.model,
                config.increment,
                config.periodic_cycle,
                config.buckets_per_cycle()
            );
            if config.model == ModelKind::Spectral {
                println!("Technique: {}", config.technique);
            }
            for store in &stores {
                println!(
                    "  {} -> {}",
                    store["region"].as_str().unwrap_or_default(),
                    store["location"].as_str().unwrap_or_default()
                );
            }
        }
    }
    ExitCode::Clean
}

// ============================================================================
// Shared helpers
// ============================================================================

fn load_resolved(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, ExitCode> {
    match load_config(global.config.as_deref()) {
        Ok(resolved) => {
            match &resolved.path {
                Some(path) => log_event!(
                    ctx,
                    INFO,
                    event_names::CONFIG_LOADED,
                    Stage::Init,
                    "config loaded",
                    path = %path.display(),
                    source = %resolved.source
                ),
                None => log_event!(
                    ctx,
                    INFO,
                    event_names::CONFIG_DEFAULT_USED,
                    Stage::Init,
                    "no config file found, using defaults"
                ),
            }
            Ok(resolved)
        }
        Err(e) => Err(output_config_error(global, ctx, &e)),
    }
}

fn open_registry(
    global: &GlobalOpts,
    ctx: &LogContext,
    resolved: &ResolvedConfig,
) -> Result<RegionRegistry, ExitCode> {
    let regions = match resolved.config.region_ids() {
        Ok(regions) => regions,
        Err(e) => return Err(output_config_error(global, ctx, &ConfigError::Validation(e))),
    };
    RegionRegistry::open(&resolved.config, &regions)
        .map_err(|e| output_error(global, ctx, &e, ExitCode::ConfigError))
}

fn batch_exit<T>(result: &BatchResult<T>, total: usize) -> ExitCode {
    let all_failed = result
        .failed
        .first()
        .map(|f| ExitCode::for_category(f.error.category))
        .unwrap_or(ExitCode::InternalError
                );
    ExitCode::for_batch(total, result.failed.len(), all_failed)
}

fn emit_batch(
    global: &GlobalOpts,
    ctx: &LogContext,
    command: &str,
    result: &BatchResult<impl serde::Serialize + std::fmt::Display>,
    extra: serde_json::Value,
) {
    match global.format {
        OutputFormat::Json => {
            let status = if result.summary.all_succeeded {
                "ok"
            } else if result.summary.any_succeeded {
                "partial"
            } else {
                "error"
            };
            let response = serde_json::json!({
                "schema_version": OUTPUT_SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "command": command,
                "status": status,
                "details": extra,
                "result": result,
            });
            print_json(&response);
        }
        OutputFormat::Human => {
            print!("{}", format_batch_human(result, use_color(global)));
        }
    }
}

fn output_config_error(global: &GlobalOpts, ctx: &LogContext, error: &ConfigError) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::CONFIG_ERROR,
        Stage::Init,
        "configuration rejected",
        error = %error
    );

    let response = serde_json::json!({
        "schema_version": OUTPUT_SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "status": "error",
        "error": {
            "code": error.code(),
            "message": error.to_string(),
        }
    });

    match global.format {
        OutputFormat::Json => eprint_json(&response),
        OutputFormat::Human => {
            eprintln!("# Configuration Error");
            eprintln!();
            eprintln!("Error: {}", error);
        }
    }

    ExitCode::ConfigError
}

fn output_error(global: &GlobalOpts, ctx: &LogContext, error: &Error, code: ExitCode) -> ExitCode {
    if code.is_internal_error() {
        log_event!(
            ctx,
            ERROR,
            event_names::INTERNAL_ERROR,
            Stage::Init,
            "command failed",
            error = %error
        );
    }

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": OUTPUT_SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "exit_code": code.code_name(),
                "error": StructuredError::from(error),
            });
            eprint_json(&response);
        }
        OutputFormat::Human => {
            eprint!("{}", format_error_human(error, use_color(global)));
        }
    }
    code
}

fn use_color(global: &GlobalOpts) -> bool {
    !global.no_color && std::io::stdout().is_terminal()
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn eprint_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_epoch_and_rfc3339() {
        assert_eq!(parse_time("1700000000"), Ok(1_700_000_000));
        assert_eq!(parse_time("-60"), Ok(-60));
        assert_eq!(parse_time("1970-01-01T00:01:00Z"), Ok(60));
        assert_eq!(parse_time("1970-01-01T01:00:00+01:00"), Ok(0));
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn cli_parses_learn() {
        let cli = Cli::try_parse_from([
            "popp",
            "learn",
            "--observations",
            "obs.json",
            "--start",
            "0",
            "--end",
            "1970-01-01T00:10:00Z",
        ])
        .unwrap();
        match cli.command {
            Commands::Learn(args) => {
                assert_eq!(args.start, 0);
                assert_eq!(args.end, 600);
            }
            _ => panic!("expected learn"),
        }
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "popp",
            "show",
            "--region",
            "kitchen",
            "--upper",
            "--format",
            "human",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.global.format, OutputFormat::Human);
        assert_eq!(cli.global.log_level, Some(LogLevel::Debug));
    }
}
