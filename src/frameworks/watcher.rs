use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domain::session::{AccessStatus, SessionGuard};
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::use_cases::check_access::CheckAccessUseCase;

// Events that ask for an immediate re-check outside the polling cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    VisibilityRegained,
}

async fn observe(state: &AppState) -> AccessStatus {
    let use_case = CheckAccessUseCase {
        clock: SystemClock,
        guard: SessionGuard::new(state.settings.session_ttl_ms),
        grant_store: state.grant.clone(),
    };

    match use_case.execute().await {
        Ok(granted) => AccessStatus::Granted {
            expires_at: granted.expires_at,
        },
        Err(_) => AccessStatus::NoGrant,
    }
}

/// Re-evaluates the grant on every tick and on every trigger.
///
/// This is the only place expiry is observed without user input, so the gap
/// between logical and observed expiry is at most one `poll_interval`. Runs
/// until the trigger sender is dropped.
pub async fn run_expiry_watcher(
    state: AppState,
    poll_interval: Duration,
    mut triggers: mpsc::Receiver<Trigger>,
    status_tx: watch::Sender<AccessStatus>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let source = tokio::select! {
            _ = ticker.tick() => "poll",
            trigger = triggers.recv() => match trigger {
                Some(Trigger::VisibilityRegained) => "visibility",
                None => break,
            },
        };

        let status = observe(&state).await;
        status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            if status == AccessStatus::NoGrant {
                info!(source, "access closed");
            } else {
                debug!(source, "access observed");
            }
            *current = status;
            true
        });
    }

    debug!("expiry watcher stopped");
}
