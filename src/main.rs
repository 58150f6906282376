use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use std::time::Duration;
use terminal_checkout::application::checkout::CheckoutOrchestrator;
use terminal_checkout::config::{BackendConfig, CheckoutConfig};
use terminal_checkout::domain::payment::PaymentCreationRequest;
use terminal_checkout::domain::terminal::{CollectConfiguration, Reader};
use terminal_checkout::infrastructure::backend_from_config;
use terminal_checkout::infrastructure::listener::LoggingTerminalListener;
use terminal_checkout::infrastructure::simulated::{IntentLedger, SimulatedTerminal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the merchant backend. Uses an in-memory backend when absent.
    #[arg(long, env = "CHECKOUT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Backend request timeout in seconds
    #[arg(long, env = "CHECKOUT_BACKEND_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Do not prompt the customer for a tip on the reader
    #[arg(long)]
    skip_tipping: bool,

    /// Serial number reported by the simulated reader
    #[arg(long, default_value = "SIM-0001")]
    reader: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a payment intent and take the payment on the reader
    Pay {
        /// Amount in minor currency units (e.g. cents)
        #[arg(long)]
        amount: u64,

        #[arg(long, default_value = "usd")]
        currency: String,

        #[arg(long)]
        description: Option<String>,

        /// Extra metadata as key=value, may be repeated
        #[arg(long = "metadata", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,

        /// Email a receipt and capture the payment afterwards
        #[arg(long)]
        receipt_email: Option<String>,
    },
    /// Email a receipt for a processed payment intent and capture it.
    /// Requires --backend-url.
    Receipt {
        #[arg(long)]
        payment_intent: String,

        #[arg(long)]
        email: String,
    },
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", s))?;
    if key.trim().is_empty() {
        return Err(format!("metadata key is empty in {:?}", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terminal_checkout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let backend = cli
        .backend_url
        .as_deref()
        .map(|url| BackendConfig::new(url, Duration::from_secs(cli.timeout_secs)))
        .transpose()
        .into_diagnostic()?;
    let config = CheckoutConfig {
        backend,
        collect: CollectConfiguration::new(cli.skip_tipping),
    };

    let ledger = IntentLedger::new();
    let backend = backend_from_config(&config, &ledger).into_diagnostic()?;
    let terminal = Arc::new(SimulatedTerminal::new(ledger));
    terminal.set_listener(Arc::new(LoggingTerminalListener));
    terminal.connect_reader(Reader::new(cli.reader));

    let orchestrator =
        CheckoutOrchestrator::with_collect_configuration(backend, terminal, config.collect);

    match cli.command {
        Command::Pay {
            amount,
            currency,
            description,
            metadata,
            receipt_email,
        } => {
            let mut request = PaymentCreationRequest::new(amount, &currency).into_diagnostic()?;
            if let Some(description) = description {
                request = request.with_description(description);
            }
            for (key, value) in metadata {
                request = request.with_metadata(key, value);
            }

            let id = orchestrator.create_payment(request).await.into_diagnostic()?;
            println!("payment_intent: {}", id);

            if let Some(email) = receipt_email {
                orchestrator
                    .send_receipt(id.as_str(), &email)
                    .await
                    .into_diagnostic()?;
                println!("receipt: {}", email.trim());
            }
        }
        Command::Receipt {
            payment_intent,
            email,
        } => {
            // The in-memory backend starts empty on every run.
            if config.backend.is_none() {
                miette::bail!(
                    "the receipt command needs a backend: pass --backend-url or set \
                     CHECKOUT_BACKEND_URL"
                );
            }
            orchestrator
                .send_receipt(&payment_intent, &email)
                .await
                .into_diagnostic()?;
            println!("receipt: {}", email.trim());
        }
    }

    Ok(())
}
