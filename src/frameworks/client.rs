use crate::domain::session::{AccessStatus, SESSION_TTL_MS};
use crate::frameworks::config::{Config, TRIGGER_CHANNEL_CAPACITY};
use crate::frameworks::watcher::{run_expiry_watcher, Trigger};
use crate::interface_adapters::handlers;
use crate::interface_adapters::protocol::{Command, CommandParseError, Reply};
use crate::interface_adapters::state::{AppState, GateSettings};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout carries command replies; logs go to stderr.
    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

// Builds state on disk, or in memory when the data dir is unusable.
pub async fn build_state(config: &Config) -> AppState {
    let settings = GateSettings {
        session_ttl_ms: SESSION_TTL_MS,
        share_base_url: config.share_base_url.clone(),
    };

    match tokio::fs::create_dir_all(&config.data_dir).await {
        Ok(()) => AppState::new(&config.data_dir, settings),
        Err(e) => {
            tracing::warn!(
                data_dir = %config.data_dir.display(),
                error = %e,
                "data dir unavailable; state will not survive restart"
            );
            AppState::in_memory(settings)
        }
    }
}

async fn write_line<W>(out: &mut W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(text.as_bytes()).await?;
    if !text.ends_with('\n') {
        out.write_all(b"\n").await?;
    }
    out.flush().await
}

/// Handles one input line. Returns `false` once the user asked to quit.
pub async fn dispatch_line<W>(
    state: &AppState,
    triggers: &mpsc::Sender<Trigger>,
    line: &str,
    out: &mut W,
) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let command = match line.parse::<Command>() {
        Ok(command) => command,
        Err(CommandParseError::Empty) => return Ok(true),
        Err(e) => {
            write_line(out, &Reply::error(e.to_string()).to_string()).await?;
            return Ok(true);
        }
    };

    match command {
        Command::Quit => return Ok(false),
        Command::Resume => {
            // The watcher is the component that reacts to visibility changes.
            if triggers.try_send(Trigger::VisibilityRegained).is_err() {
                tracing::debug!("visibility trigger dropped; watcher busy or gone");
            }
        }
        _ => {}
    }

    let reply = handlers::handle(state, command).await;
    write_line(out, &reply.to_string()).await?;
    Ok(true)
}

pub async fn run() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::load().await;
    let state = build_state(&config).await;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        session_ttl_ms = SESSION_TTL_MS,
        poll_interval_ms = config.poll_interval_ms,
        records = handlers::content_len(&state).await,
        "profile gate ready"
    );

    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(TRIGGER_CHANNEL_CAPACITY);
    // Starts locked; the watcher's first tick performs the initial check.
    let (status_tx, mut status_rx) = watch::channel(AccessStatus::NoGrant);
    let watcher = tokio::spawn(run_expiry_watcher(
        state.clone(),
        config.poll_interval(),
        trigger_rx,
        status_tx,
    ));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_status = AccessStatus::NoGrant;

    if let Err(e) = write_line(&mut stdout, "locked. type `help` for commands.").await {
        tracing::error!(error = %e, "failed to write to stdout");
        return;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read stdin");
                        break;
                    }
                };
                match dispatch_line(&state, &trigger_tx, &line, &mut stdout).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to write to stdout");
                        break;
                    }
                }
            }
            Ok(()) = status_rx.changed() => {
                let status = *status_rx.borrow_and_update();
                let closed = matches!(last_status, AccessStatus::Granted { .. })
                    && status == AccessStatus::NoGrant;
                last_status = status;
                if closed {
                    let _ = write_line(&mut stdout, "access closed; unlock with a new PIN").await;
                }
            }
        }
    }

    // Dropping the sender stops the watcher loop.
    drop(trigger_tx);
    if let Err(e) = watcher.await {
        tracing::error!(error = %e, "expiry watcher failed");
    }
}
