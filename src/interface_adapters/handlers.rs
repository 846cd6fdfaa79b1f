use crate::domain::entities::{ContentRecord, PinRecord, SessionGrant};
use crate::domain::errors::AccessError;
use crate::domain::pin::PinAuthority;
use crate::domain::ports::Slot;
use crate::domain::session::SessionGuard;
use crate::interface_adapters::protocol::{Command, Reply};
use crate::interface_adapters::state::{
    AppState, FallbackSlot, InMemorySlot, RandomPinSource, SystemClock,
};
use crate::use_cases::check_access::CheckAccessUseCase;
use crate::use_cases::content::{
    ExportContentUseCase, ImportContentUseCase, PublishContentUseCase, ViewFeedUseCase,
};
use crate::use_cases::redeem_pin::RedeemPinUseCase;
use crate::use_cases::revoke_session::RevokeSessionUseCase;
use crate::use_cases::rotate_pin::{
    CurrentPinUseCase, RequestPinUseCase, RotatePinUseCase, RotationReason, ShareLinkUseCase,
};
use serde_json::json;
use tracing::warn;

// Wrong and already-used PINs share one message so neither case can be probed.
const PIN_REJECTED: &str = "invalid or already-used PIN";
// Expired and never-granted sessions look the same to the caller.
const NO_ACCESS: &str = "no access; unlock with a PIN first";
const STORAGE_UNAVAILABLE: &str = "storage unavailable; try again";

// Routes a parsed command to its handler. Quit is handled by the caller.
pub async fn handle(state: &AppState, command: Command) -> Reply {
    match command {
        Command::Unlock { pin } => unlock(state, &pin).await,
        Command::Status | Command::Resume => status(state).await,
        Command::Lock => lock(state).await,
        Command::Pin => current_pin(state).await,
        Command::Rotate => rotate(state).await,
        Command::Share => share(state).await,
        Command::Request { message } => request_pin(state, &message).await,
        Command::Feed => feed(state).await,
        Command::Post { text } => post(state, &text).await,
        Command::Export => export(state).await,
        Command::Import { json } => import(state, &json).await,
        Command::Help | Command::Quit => Reply::Help,
    }
}

fn guard(state: &AppState) -> SessionGuard {
    SessionGuard::new(state.settings.session_ttl_ms)
}

fn access_check(state: &AppState) -> CheckAccessUseCase<SystemClock, InMemorySlot<SessionGrant>> {
    CheckAccessUseCase {
        clock: SystemClock,
        guard: guard(state),
        grant_store: state.grant.clone(),
    }
}

fn rotate_use_case(state: &AppState) -> RotatePinUseCase<RandomPinSource, FallbackSlot<PinRecord>> {
    RotatePinUseCase {
        pins: PinAuthority::new(RandomPinSource),
        pin_store: state.pin_record.clone(),
    }
}

// Handler for redeeming a PIN.
pub async fn unlock(state: &AppState, candidate: &str) -> Reply {
    // Validate and consume must not interleave with another redeem or rotation.
    let _gate = state.gate.lock().await;

    let use_case = RedeemPinUseCase {
        clock: SystemClock,
        pins: PinAuthority::new(RandomPinSource),
        guard: guard(state),
        pin_store: state.pin_record.clone(),
        grant_store: state.grant.clone(),
    };

    match use_case.execute(candidate).await {
        Ok(result) => Reply::Unlocked {
            expires_at: result.expires_at,
            ttl_ms: state.settings.session_ttl_ms,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Unlock),
    }
}

// Handler for checking the current grant.
pub async fn status(state: &AppState) -> Reply {
    match access_check(state).execute().await {
        Ok(granted) => Reply::Granted {
            remaining_ms: granted.remaining_ms,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Access),
    }
}

// Handler for ending the session.
pub async fn lock(state: &AppState) -> Reply {
    let use_case = RevokeSessionUseCase {
        grant_store: state.grant.clone(),
    };

    match use_case.execute().await {
        Ok(result) => Reply::Locked {
            was_active: result.revoked,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Owner),
    }
}

// Handler for showing the active PIN.
pub async fn current_pin(state: &AppState) -> Reply {
    let _gate = state.gate.lock().await;
    let use_case = CurrentPinUseCase {
        pins: PinAuthority::new(RandomPinSource),
        pin_store: state.pin_record.clone(),
    };

    match use_case.execute().await {
        Ok(result) => Reply::ActivePin {
            pin: result.active_pin,
            redeemed_count: result.redeemed_count,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Owner),
    }
}

// Handler for manual PIN rotation.
pub async fn rotate(state: &AppState) -> Reply {
    let _gate = state.gate.lock().await;

    match rotate_use_case(state).execute(RotationReason::Manual).await {
        Ok(result) => Reply::Rotated {
            pin: result.active_pin,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Owner),
    }
}

// Handler for sharing the profile link.
pub async fn share(state: &AppState) -> Reply {
    let _gate = state.gate.lock().await;
    let use_case = ShareLinkUseCase {
        rotate: rotate_use_case(state),
        share_base_url: state.settings.share_base_url.clone(),
    };

    match use_case.execute().await {
        Ok(result) => Reply::Shared {
            link: result.link,
            pin: result.active_pin,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Owner),
    }
}

// Handler for the request-a-PIN stub.
pub async fn request_pin(state: &AppState, message: &str) -> Reply {
    let _gate = state.gate.lock().await;
    let use_case = RequestPinUseCase {
        rotate: rotate_use_case(state),
    };

    match use_case.execute(message).await {
        Ok(_) => Reply::Requested,
        Err(err) => map_access_error(err, AccessErrorContext::Owner),
    }
}

// Handler for listing the feed.
pub async fn feed(state: &AppState) -> Reply {
    let use_case = ViewFeedUseCase {
        access: access_check(state),
        content_store: state.content.clone(),
    };

    match use_case.execute().await {
        Ok(records) => Reply::Feed { records },
        Err(err) => map_access_error(err, AccessErrorContext::Access),
    }
}

// Handler for adding a text entry.
pub async fn post(state: &AppState, text: &str) -> Reply {
    let use_case = PublishContentUseCase {
        clock: SystemClock,
        content_store: state.content.clone(),
    };

    match use_case.execute(json!({ "text": text })).await {
        Ok(record) => Reply::Published { id: record.id },
        Err(err) => map_access_error(err, AccessErrorContext::Owner),
    }
}

// Handler for exporting the feed.
pub async fn export(state: &AppState) -> Reply {
    let use_case = ExportContentUseCase {
        access: access_check(state),
        content_store: state.content.clone(),
    };

    let snapshot = match use_case.execute().await {
        Ok(snapshot) => snapshot,
        Err(err) => return map_access_error(err, AccessErrorContext::Access),
    };

    // Single line so the output can be pasted straight back into `import`.
    match serde_json::to_string(&snapshot) {
        Ok(json) => Reply::Exported { json },
        Err(err) => {
            warn!(error = %err, "failed to encode export");
            Reply::error("export failed")
        }
    }
}

// Handler for importing a feed snapshot.
pub async fn import(state: &AppState, raw: &str) -> Reply {
    let use_case = ImportContentUseCase {
        content_store: state.content.clone(),
    };

    match use_case.execute(raw).await {
        Ok(result) => Reply::Imported {
            count: result.imported,
        },
        Err(err) => map_access_error(err, AccessErrorContext::Import),
    }
}

// Current feed size, for startup logs.
pub async fn content_len(state: &AppState) -> usize {
    let records: Option<Vec<ContentRecord>> = state.content.get().await.unwrap_or_default();
    records.map(|records| records.len()).unwrap_or_default()
}

// Maps domain errors to replies by command context.
enum AccessErrorContext {
    Unlock,
    Access,
    Owner,
    Import,
}

fn map_access_error(err: AccessError, context: AccessErrorContext) -> Reply {
    if err == AccessError::StorageFailure {
        warn!(error = %err, "storage failure while handling command");
    }

    match context {
        AccessErrorContext::Unlock => match err {
            AccessError::StorageFailure => Reply::error(STORAGE_UNAVAILABLE),
            AccessError::InvalidPin
            | AccessError::ReusedPin
            | AccessError::ExpiredSession
            | AccessError::MissingGrant
            | AccessError::InvalidImport(_) => Reply::error(PIN_REJECTED),
        },
        // Fails closed: a storage problem reads as no access.
        AccessErrorContext::Access => Reply::error(NO_ACCESS),
        AccessErrorContext::Owner => match err {
            AccessError::StorageFailure => Reply::error(STORAGE_UNAVAILABLE),
            AccessError::InvalidPin
            | AccessError::ReusedPin
            | AccessError::ExpiredSession
            | AccessError::MissingGrant
            | AccessError::InvalidImport(_) => Reply::error("request failed"),
        },
        AccessErrorContext::Import => match err {
            AccessError::InvalidImport(reason) => Reply::error(format!("import rejected: {reason}")),
            AccessError::StorageFailure => Reply::error(STORAGE_UNAVAILABLE),
            AccessError::InvalidPin
            | AccessError::ReusedPin
            | AccessError::ExpiredSession
            | AccessError::MissingGrant => Reply::error("import rejected"),
        },
    }
}
