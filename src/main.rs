use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use clap::Parser;
use log::{debug, info};
use mutator::core::config::{CliOverrides, ResolvedConfig, load_config, resolve};
use mutator::payload::parse_field;
use mutator::{Action, Envelope, FormData, Mutation, MutationOptions, ResponseCheck, action_fn, normalize};
use serde_json::{Value, json};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};

#[derive(Parser)]
#[command(name = "mutator", about = "Run a simulated action through a mutation controller")]
struct Args {
    /// Payload field as key=value (repeatable)
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Number of sequential runs
    #[arg(short, long, default_value_t = 3)]
    runs: u32,

    /// Simulated action latency in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Fail every N-th run (0 never fails)
    #[arg(long)]
    fail_every: Option<u32>,

    /// What counts as a successful response
    #[arg(long, value_enum)]
    response_check: Option<ResponseCheck>,

    /// Log level filter (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = load_config()?;
    let config = resolve(
        &file_config,
        &CliOverrides {
            response_check: args.response_check,
            log_level: args.log_level.clone(),
            delay_ms: args.delay_ms,
            fail_every: args.fail_every,
        },
    );
    init_logging(&config);

    info!(
        "Mutator starting: {} run(s), response check {}",
        args.runs, config.response_check
    );

    let payload: FormData = args.fields.into_iter().collect();
    let options = MutationOptions::new()
        .on_success(|envelope: &Envelope<Value>| {
            let response = envelope.response().map(Value::to_string).unwrap_or_default();
            println!("success: {response}");
        })
        .on_error(|_, message| println!("error: {message}"))
        .response_check(config.response_check);

    let action = simulated_action(Duration::from_millis(config.delay_ms), config.fail_every);
    let mut mutation = Mutation::new(action, options);
    let trigger = mutation.trigger();

    for run in 1..=args.runs {
        trigger.call(payload.clone());
        for notification in mutation.settle().await {
            debug!("Run {run}: {notification:?}");
        }
    }

    println!("{}", serde_json::to_string_pretty(&mutation.data())?);
    Ok(())
}

/// Echoes the payload back after `delay`, failing every `fail_every`-th run.
fn simulated_action(delay: Duration, fail_every: Option<u32>) -> impl Action<Value, FormData> {
    let runs = Arc::new(AtomicU32::new(0));
    action_fn(move |_previous: Option<Envelope<Value>>, form: FormData| {
        let runs = Arc::clone(&runs);
        async move {
            let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
            let envelope = normalize(|| async move {
                tokio::time::sleep(delay).await;
                if fail_every.is_some_and(|n| run % n == 0) {
                    return Err(std::io::Error::other(format!("simulated failure on run {run}")));
                }
                Ok(json!({ "run": run, "fields": form }))
            })
            .await;
            Some(envelope)
        }
    })
}

fn init_logging(config: &ResolvedConfig) {
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    match &config.log_file {
        Some(path) => match File::create(path) {
            Ok(log_file) => {
                let _ = WriteLogger::init(config.log_level, log_config, log_file);
            }
            Err(e) => eprintln!("Failed to open log file {}: {e}", path.display()),
        },
        None => {
            let _ = TermLogger::init(
                config.log_level,
                log_config,
                TerminalMode::Stderr,
                ColorChoice::Auto,
            );
        }
    }
}
