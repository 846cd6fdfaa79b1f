use tracing::{info, warn};

use crate::domain::entities::SessionGrant;
use crate::domain::errors::AccessError;
use crate::domain::ports::{Clock, Slot};
use crate::domain::session::SessionGuard;

// Response returned by the access check use case.
#[derive(Debug, PartialEq, Eq)]
pub struct AccessGranted {
    pub expires_at: u64,
    pub remaining_ms: u64,
}

// Access check use case with injected dependencies.
pub struct CheckAccessUseCase<C, S> {
    pub clock: C,
    pub guard: SessionGuard,
    pub grant_store: S,
}

impl<C, S> CheckAccessUseCase<C, S>
where
    C: Clock,
    S: Slot<SessionGrant>,
{
    pub async fn execute(&self) -> Result<AccessGranted, AccessError> {
        let stored = self
            .grant_store
            .get()
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        let had_grant = stored.is_some();
        let mut grant = stored.unwrap_or_default();

        let now = self.clock.now_epoch_millis();
        match self.guard.evaluate(&mut grant, now) {
            Ok(expires_at) => Ok(AccessGranted {
                expires_at,
                remaining_ms: expires_at - now,
            }),
            Err(err) => {
                if had_grant {
                    // Best-effort cleanup; the decision is already "no access".
                    if let Err(store_err) = self.grant_store.clear().await {
                        warn!(error = %store_err, "failed to clear session grant");
                    }
                    if err == AccessError::ExpiredSession {
                        info!("session expired");
                    }
                }
                Err(err)
            }
        }
    }
}
