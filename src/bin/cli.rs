//! CLI binary for eleonor.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eleonor::avatar::AvatarControlClient;
use eleonor::config::AvatarConfig;
use eleonor::detached::join_detached;
use eleonor::{ChatSession, EleonorConfig, TurnOutcome, TurnStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Eleonor: streaming assistant chat with avatar expressions.
#[derive(Parser)]
#[command(name = "eleonor", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not play audio clips from the stream.
    #[arg(long)]
    no_audio: bool,

    /// Do not drive the avatar.
    #[arg(long)]
    no_avatar: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat (default).
    Chat,

    /// Send a single prompt and wait for its audio and expression to finish.
    Say {
        /// Prompt text.
        text: Vec<String>,
    },

    /// Request an authentication token from the avatar control server.
    Token,

    /// List the expressions of the loaded avatar model.
    Expressions,

    /// Show one expression for the configured dwell time.
    Express {
        /// Expression name, e.g. `Feliz`.
        name: String,
    },

    /// List audio output devices usable as `audio.output_device`.
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the assistant's replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eleonor=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        EleonorConfig::from_file(path)?
    } else {
        let path = EleonorConfig::default_config_path();
        if path.exists() {
            EleonorConfig::from_file(&path)?
        } else {
            EleonorConfig::default()
        }
    };
    if cli.no_audio {
        config.audio.enabled = false;
    }
    if cli.no_avatar {
        config.avatar.enabled = false;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::Say { text } => run_say(config, &text.join(" ")).await,
        Command::Token => request_token(config).await,
        Command::Expressions => list_expressions(config).await,
        Command::Express { name } => express(config, &name).await,
        Command::Devices => list_devices(),
    }
}

async fn run_chat(config: EleonorConfig) -> anyhow::Result<()> {
    println!("Eleonor v{}", env!("CARGO_PKG_VERSION"));
    println!("Endpoint: {}", config.chat.endpoint);
    println!("Commands: /audio on|off, /clear, /quit. Ctrl+C cancels a reply.\n");

    let mut session = ChatSession::from_config(&config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut avatar_tasks: Vec<JoinHandle<()>> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history();
                println!("(history cleared)");
                continue;
            }
            "/audio on" => {
                session.set_audio_enabled(true).await;
                println!("(audio on)");
                continue;
            }
            "/audio off" => {
                session.set_audio_enabled(false).await;
                println!("(audio off)");
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("received Ctrl+C, cancelling reply");
                    cancel.cancel();
                }
            })
        };
        let outcome = stream_turn(&mut session, line, cancel).await;
        ctrl_c.abort();
        print_status(&outcome);

        avatar_tasks.retain(|task| !task.is_finished());
        avatar_tasks.extend(outcome.avatar_task);
    }

    join_detached(avatar_tasks, avatar_drain_bound(&config.avatar)).await;
    Ok(())
}

/// How long an in-flight expression run may take to wind down on exit.
fn avatar_drain_bound(avatar: &AvatarConfig) -> Duration {
    // Connect, authenticate and close each wait up to one response timeout.
    avatar.dwell() + avatar.response_timeout() * 3
}

async fn run_say(config: EleonorConfig, text: &str) -> anyhow::Result<()> {
    let mut session = ChatSession::from_config(&config)?;
    let outcome = stream_turn(&mut session, text, CancellationToken::new()).await;
    print_status(&outcome);

    session.audio().wait_idle().await;
    join_detached(
        outcome.avatar_task.into_iter().collect(),
        avatar_drain_bound(&config.avatar),
    )
    .await;
    Ok(())
}

/// Run one turn, echoing partial content as it streams.
async fn stream_turn(session: &mut ChatSession, prompt: &str, cancel: CancellationToken) -> TurnOutcome {
    let stop = CancellationToken::new();
    let printer = spawn_printer(session.live_view(), stop.clone());
    let outcome = session.send(prompt, cancel).await;
    stop.cancel();
    let printed = printer.await.unwrap_or_default();

    if printed != outcome.message.content {
        // Markers were stripped after streaming: show the final form.
        println!("\n{}", outcome.message.content);
    } else {
        println!();
    }
    outcome
}

fn spawn_printer(
    mut live: tokio::sync::watch::Receiver<String>,
    stop: CancellationToken,
) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut printed = String::new();
        loop {
            let stopped = tokio::select! {
                changed = live.changed() => changed.is_err(),
                _ = stop.cancelled() => true,
            };
            let content = live.borrow_and_update().clone();
            if let Some(delta) = content.strip_prefix(printed.as_str()) {
                print!("{delta}");
                let _ = std::io::stdout().flush();
                printed = content;
            }
            if stopped {
                return printed;
            }
        }
    })
}

fn print_status(outcome: &TurnOutcome) {
    match &outcome.status {
        TurnStatus::Completed => {
            if let Some(ref name) = outcome.directive {
                info!(expression = %name, "expression requested");
            }
        }
        TurnStatus::Failed(reason) => eprintln!("(turn failed: {reason})"),
        TurnStatus::Cancelled => println!("(cancelled)"),
    }
}

async fn request_token(config: EleonorConfig) -> anyhow::Result<()> {
    println!(
        "Approve the \"{}\" plugin in the avatar application...",
        config.avatar.plugin_name
    );
    let client = AvatarControlClient::new(config.avatar);
    client.request_token().await?;
    println!("Token saved to {}", client.token_store().path().display());
    Ok(())
}

async fn list_expressions(config: EleonorConfig) -> anyhow::Result<()> {
    let client = AvatarControlClient::new(config.avatar);
    let expressions = client.list_expressions().await?;
    if expressions.is_empty() {
        println!("No expressions found on the loaded model.");
        return Ok(());
    }
    for expr in expressions {
        let marker = if expr.active { "*" } else { " " };
        println!("{marker} {:<20} {}", expr.name, expr.file);
    }
    Ok(())
}

#[cfg(feature = "speaker")]
fn list_devices() -> anyhow::Result<()> {
    let devices = eleonor::audio::playback::CpalSink::list_output_devices()?;
    if devices.is_empty() {
        println!("No audio output devices found.");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}

#[cfg(not(feature = "speaker"))]
fn list_devices() -> anyhow::Result<()> {
    anyhow::bail!("built without the `speaker` feature; no audio devices available")
}

async fn express(config: EleonorConfig, name: &str) -> anyhow::Result<()> {
    let client = AvatarControlClient::new(config.avatar);
    let report = client.run_expression(name).await?;
    println!(
        "{} ({}) shown; session states: {:?}",
        report.expression, report.expression_file, report.states
    );
    Ok(())
}
