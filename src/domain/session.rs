use crate::domain::entities::SessionGrant;
use crate::domain::errors::AccessError;

/// Fixed grant lifetime: five minutes.
pub const SESSION_TTL_MS: u64 = 5 * 60 * 1000;

// Grant state as last observed by the expiry watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessStatus {
    NoGrant,
    Granted { expires_at: u64 },
}

/// Time-bounded access grant policy.
///
/// Expiry is lazy: nothing fires at `expires_at`; the next [`SessionGuard::check`]
/// after that instant observes the expiry and clears the grant. Checking never
/// extends the window.
#[derive(Clone, Copy, Debug)]
pub struct SessionGuard {
    ttl_ms: u64,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new(SESSION_TTL_MS)
    }
}

impl SessionGuard {
    pub fn new(ttl_ms: u64) -> Self {
        Self { ttl_ms }
    }

    /// Opens a fresh window, replacing any existing grant.
    pub fn start(&self, now_ms: u64) -> SessionGrant {
        SessionGrant {
            started: true,
            expires_at: Some(now_ms.saturating_add(self.ttl_ms)),
        }
    }

    /// Returns the expiry of a valid grant, or clears it and reports why it is gone.
    pub fn evaluate(&self, grant: &mut SessionGrant, now_ms: u64) -> Result<u64, AccessError> {
        match grant.expires_at {
            Some(expires_at) if grant.is_valid_at(now_ms) => Ok(expires_at),
            Some(_) if grant.started => {
                Self::revoke(grant);
                Err(AccessError::ExpiredSession)
            }
            _ => {
                Self::revoke(grant);
                Err(AccessError::MissingGrant)
            }
        }
    }

    pub fn check(&self, grant: &mut SessionGrant, now_ms: u64) -> bool {
        self.evaluate(grant, now_ms).is_ok()
    }

    pub fn revoke(grant: &mut SessionGrant) {
        *grant = SessionGrant::none();
    }
}
