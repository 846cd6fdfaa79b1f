pub mod entities;
pub mod errors;
pub mod pin;
pub mod ports;
pub mod session;
