use crate::domain::ports::TerminalListener;
use crate::domain::terminal::{ConnectionStatus, PaymentStatus, Reader};
use tracing::{info, warn};

/// Forwards terminal events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTerminalListener;

impl TerminalListener for LoggingTerminalListener {
    fn on_unexpected_reader_disconnect(&self, reader: &Reader) {
        warn!(serial_number = %reader.serial_number, "reader disconnected unexpectedly");
    }

    fn on_connection_status_change(&self, status: ConnectionStatus) {
        info!(?status, "connection status changed");
    }

    fn on_payment_status_change(&self, status: PaymentStatus) {
        info!(?status, "payment status changed");
    }
}
