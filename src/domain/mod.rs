//! Domain layer: checkout value types and the ports to the outside world.

pub mod email;
pub mod payment;
pub mod ports;
pub mod terminal;
