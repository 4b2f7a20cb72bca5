//! chatvoice main entry point
//!
//! Reads chat events as JSON lines on stdin (one object per line, as pushed
//! by the chat session client) and speaks them through the playback queue.
//! EOF drains the queue before exiting; Ctrl+C stops speech immediately.

use anyhow::{bail, Context};
use chatvoice::config::Config;
use chatvoice::events::ChatEvent;
use chatvoice::speech::{open_engine, RetryingSpeaker, SpeechEngine, UnavailableEngine};
use chatvoice::text::TextProcessor;
use chatvoice::{ChatRelay, DriverState, QueueDriver};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Parsed command line
struct Args {
    debug: bool,
    config: Option<PathBuf>,
    test: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        debug: false,
        config: None,
        test: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" | "-d" => args.debug = true,
            "--test" | "-t" => args.test = true,
            "--config" | "-c" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--version" | "-V" => {
                println!("{} {}", chatvoice::APP_NAME, chatvoice::VERSION);
                process::exit(0);
            }
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        // Debug mode: write to chatvoice.log
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("chatvoice.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open chatvoice.log for debug logging: {}", e);
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .init();
            }
        }
        info!(
            "chatvoice version {} starting (debug mode, logging to chatvoice.log)",
            chatvoice::VERSION
        );
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Warn)
            .parse_default_env()
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: chatvoice [--debug] [--test] [--config <path>] < events.jsonl");
            process::exit(2);
        }
    };

    init_logging(args.debug);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    info!("Configuration loaded from {:?}", config.path());

    let voice = config.voice_settings();
    let (engine, unavailable) = match open_engine(voice).await {
        Ok(engine) => {
            info!("Speech engine: {}", engine.name());
            (engine, None)
        }
        Err(e) => {
            let reason = e.to_string();
            (
                Box::new(UnavailableEngine::new(reason.clone())) as Box<dyn SpeechEngine>,
                Some(reason),
            )
        }
    };

    let speaker = RetryingSpeaker::new(engine, config.speaker_policy());
    let driver = QueueDriver::spawn(speaker, config.driver_policy());
    if let Some(reason) = unavailable {
        driver.mark_unavailable(&reason);
        eprintln!("Voice unavailable: chat will not be read aloud");
    }

    let watcher = spawn_status_logger(&driver);
    let relay = ChatRelay::new(
        driver.clone(),
        config.relay_settings(),
        TextProcessor::new(config.text_settings()),
    );

    if args.test {
        relay.handle_event(ChatEvent::TestMessage {
            user: None,
            message: None,
        });
    }

    info!("chatvoice ready - reading events from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if let Err(e) = relay.handle_line(&line) {
                            warn!("Skipping malformed event: {}", e);
                        }
                    }
                    None => {
                        debug!("stdin closed; draining queue");
                        drain(&driver).await;
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping speech");
                break;
            }
        }
    }

    driver.shutdown().await;
    watcher.abort();
    info!("chatvoice stopped");
    Ok(())
}

/// Wait until nothing is speaking or waiting
async fn drain(driver: &QueueDriver) {
    let mut status = driver.subscribe();
    let _ = status
        .wait_for(|s| s.state == DriverState::Idle && !s.active && s.depth == 0)
        .await;
}

/// Log status transitions for display
fn spawn_status_logger(driver: &QueueDriver) -> tokio::task::JoinHandle<()> {
    let mut status = driver.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if !current.available {
                info!("Status: voice unavailable");
            } else {
                debug!(
                    "Status: {:?}, waiting {}, enabled {}",
                    current.state, current.depth, current.enabled
                );
            }
        }
    })
}
