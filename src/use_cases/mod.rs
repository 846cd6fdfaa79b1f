pub mod check_access;
pub mod content;
pub mod redeem_pin;
pub mod revoke_session;
pub mod rotate_pin;

#[cfg(test)]
pub(crate) mod test_support;
