use tracing::{info, warn};

use crate::domain::entities::PinRecord;
use crate::domain::errors::AccessError;
use crate::domain::pin::{is_well_formed, PinAuthority};
use crate::domain::ports::{PinSource, Slot};

// Why the active PIN was replaced without a redemption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationReason {
    Manual,
    ShareLink,
    Requested,
}

impl RotationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationReason::Manual => "manual",
            RotationReason::ShareLink => "share_link",
            RotationReason::Requested => "requested",
        }
    }
}

// Loads the PIN record, issuing and persisting a fresh one on first use.
// A stored PIN that lost its `NNN-NNN` shape is replaced; the history is kept.
pub(crate) async fn load_or_init_record<G, P>(
    pins: &PinAuthority<G>,
    store: &P,
) -> Result<PinRecord, AccessError>
where
    G: PinSource,
    P: Slot<PinRecord>,
{
    let existing = store.get().await.map_err(|_| AccessError::StorageFailure)?;
    let record = match existing {
        Some(record) if is_well_formed(&record.active_pin) => return Ok(record),
        Some(record) => {
            warn!("stored pin is malformed; rotating");
            pins.rotate(&record)
        }
        None => {
            info!("issued initial pin");
            pins.initial_record()
        }
    };

    store
        .set(record.clone())
        .await
        .map_err(|_| AccessError::StorageFailure)?;

    Ok(record)
}

// Response returned by the current pin use case.
pub struct CurrentPinResponse {
    pub active_pin: String,
    pub redeemed_count: usize,
}

// Owner view of the active PIN.
pub struct CurrentPinUseCase<G, P> {
    pub pins: PinAuthority<G>,
    pub pin_store: P,
}

impl<G, P> CurrentPinUseCase<G, P>
where
    G: PinSource,
    P: Slot<PinRecord>,
{
    pub async fn execute(&self) -> Result<CurrentPinResponse, AccessError> {
        let record = load_or_init_record(&self.pins, &self.pin_store).await?;

        Ok(CurrentPinResponse {
            active_pin: record.active_pin,
            redeemed_count: record.used_pins.len(),
        })
    }
}

// Response returned by the rotate pin use case.
pub struct RotatePinResponse {
    pub active_pin: String,
}

// Rotate pin use case with injected dependencies.
pub struct RotatePinUseCase<G, P> {
    pub pins: PinAuthority<G>,
    pub pin_store: P,
}

impl<G, P> RotatePinUseCase<G, P>
where
    G: PinSource,
    P: Slot<PinRecord>,
{
    pub async fn execute(&self, reason: RotationReason) -> Result<RotatePinResponse, AccessError> {
        let record = load_or_init_record(&self.pins, &self.pin_store).await?;
        let next = self.pins.rotate(&record);
        let active_pin = next.active_pin.clone();

        self.pin_store
            .set(next)
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        info!(reason = reason.as_str(), "pin rotated");

        Ok(RotatePinResponse { active_pin })
    }
}

// Response returned by the share link use case.
pub struct ShareLinkResponse {
    pub link: String,
    pub active_pin: String,
}

// Hands out the profile link and invalidates the PIN that was active before sharing.
pub struct ShareLinkUseCase<G, P> {
    pub rotate: RotatePinUseCase<G, P>,
    pub share_base_url: String,
}

impl<G, P> ShareLinkUseCase<G, P>
where
    G: PinSource,
    P: Slot<PinRecord>,
{
    pub async fn execute(&self) -> Result<ShareLinkResponse, AccessError> {
        let rotated = self.rotate.execute(RotationReason::ShareLink).await?;

        Ok(ShareLinkResponse {
            link: self.share_base_url.clone(),
            active_pin: rotated.active_pin,
        })
    }
}

// Response returned by the request pin use case.
pub struct RequestPinResponse {
    pub issued: bool,
}

// Stub for "message the owner for a PIN". Nothing is delivered; a PIN is rotated
// as if one had been issued to the requester.
pub struct RequestPinUseCase<G, P> {
    pub rotate: RotatePinUseCase<G, P>,
}

impl<G, P> RequestPinUseCase<G, P>
where
    G: PinSource,
    P: Slot<PinRecord>,
{
    pub async fn execute(&self, message: &str) -> Result<RequestPinResponse, AccessError> {
        info!(message_len = message.chars().count(), "pin requested");
        self.rotate.execute(RotationReason::Requested).await?;

        Ok(RequestPinResponse { issued: true })
    }
}
