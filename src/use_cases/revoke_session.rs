use crate::domain::entities::SessionGrant;
use crate::domain::errors::AccessError;
use crate::domain::ports::Slot;

// Response returned by the revoke use case.
pub struct RevokeSessionResponse {
    pub revoked: bool,
}

// Revoke use case with injected dependencies.
pub struct RevokeSessionUseCase<S> {
    pub grant_store: S,
}

impl<S> RevokeSessionUseCase<S>
where
    S: Slot<SessionGrant>,
{
    pub async fn execute(&self) -> Result<RevokeSessionResponse, AccessError> {
        let existing = self
            .grant_store
            .get()
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        self.grant_store
            .clear()
            .await
            .map_err(|_| AccessError::StorageFailure)?;

        Ok(RevokeSessionResponse {
            revoked: existing.is_some_and(|grant| grant.started),
        })
    }
}
