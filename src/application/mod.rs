//! Application layer containing the checkout orchestration.
//!
//! `CheckoutOrchestrator` runs the fixed create/collect/process and
//! update/retrieve/capture sequences against the domain ports, one step at a
//! time, and cancels superseded attempts through `tokio-util` cancellation
//! tokens.

pub mod checkout;
