//! Callback trigger surface used by a checkout front end.

pub mod checkout_screen;
pub mod throttle;
