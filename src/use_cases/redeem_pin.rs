use tracing::{debug, info};

use crate::domain::entities::{PinRecord, SessionGrant};
use crate::domain::errors::AccessError;
use crate::domain::pin::PinAuthority;
use crate::domain::ports::{Clock, PinSource, Slot};
use crate::domain::session::SessionGuard;
use crate::use_cases::rotate_pin::load_or_init_record;

// Response returned by the redeem pin use case.
pub struct RedeemPinResponse {
    pub expires_at: u64,
}

// Redeem pin use case: validate, open a grant, consume the PIN.
// Callers serialize execute() so validate and consume act as one step.
pub struct RedeemPinUseCase<C, G, P, S> {
    pub clock: C,
    pub pins: PinAuthority<G>,
    pub guard: SessionGuard,
    pub pin_store: P,
    pub grant_store: S,
}

impl<C, G, P, S> RedeemPinUseCase<C, G, P, S>
where
    C: Clock,
    G: PinSource,
    P: Slot<PinRecord>,
    S: Slot<SessionGrant>,
{
    pub async fn execute(&self, candidate: &str) -> Result<RedeemPinResponse, AccessError> {
        let record = load_or_init_record(&self.pins, &self.pin_store).await?;

        if !self.pins.validate(&record, candidate) {
            let cause = self
                .pins
                .classify(&record, candidate)
                .err()
                .unwrap_or(AccessError::InvalidPin);
            debug!(cause = %cause, "pin rejected");
            return Err(cause);
        }

        let grant = self.guard.start(self.clock.now_epoch_millis());
        let expires_at = grant.expires_at.unwrap_or_default();
        let next = self.pins.consume(&record, candidate);

        // The consumed PIN is persisted before the grant so a failed write never
        // leaves a redeemable PIN behind an open session.
        self.pin_store
            .set(next)
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        self.grant_store
            .set(grant)
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        info!(expires_at, "session granted");

        Ok(RedeemPinResponse { expires_at })
    }
}
