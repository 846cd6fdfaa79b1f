use std::fmt;

// Domain-level errors for access workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    InvalidPin,
    ReusedPin,
    ExpiredSession,
    MissingGrant,
    StorageFailure,
    InvalidImport(String),
}

// Internal description only. User-facing text is chosen by the adapter layer.
impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::InvalidPin => write!(f, "pin does not match the active pin"),
            AccessError::ReusedPin => write!(f, "pin was already redeemed"),
            AccessError::ExpiredSession => write!(f, "session grant expired"),
            AccessError::MissingGrant => write!(f, "no session grant"),
            AccessError::StorageFailure => write!(f, "storage failure"),
            AccessError::InvalidImport(reason) => write!(f, "invalid import: {reason}"),
        }
    }
}

impl std::error::Error for AccessError {}
