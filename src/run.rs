use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use x402_client::config::{ClientConfig, ConnectionArgs};
use x402_client::telemetry::Telemetry;
use x402_client::x402_types::codec;
use x402_client::x402_types::proto::PaymentPayload;
use x402_client::x402_types::sanitize::JsonSafe;

/// CLI arguments for the x402 client.
#[derive(Parser, Debug)]
#[command(name = "x402-client")]
#[command(about = "x402 payment payload codec and facilitator client")]
struct CliArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a payment payload JSON document as base64
    Encode {
        /// JSON file, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Decode and validate a base64 payment payload
    Decode {
        /// Encoded payload, as sent in the `X-PAYMENT` header
        payload: String,
    },
    /// Print the JSON-safe form of a payment requirements document
    Sanitize {
        /// JSON file, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Verify a payment with the facilitator
    Verify(PaymentArgs),
    /// Settle a payment with the facilitator
    Settle(PaymentArgs),
    /// List the payment kinds the facilitator accepts
    Supported,
}

#[derive(clap::Args, Debug)]
struct PaymentArgs {
    /// Encoded payment payload
    #[arg(long)]
    payload: String,
    /// Payment requirements JSON file, or `-` for stdin
    #[arg(long, default_value = "-")]
    requirements: PathBuf,
}

/// Runs one subcommand and prints its result as JSON on stdout.
///
/// - Loads `.env` variables.
/// - Initializes logging to stderr.
/// - Builds the facilitator client only for commands that talk to it.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    Telemetry::new().register();

    let cli_args = CliArgs::parse();

    match cli_args.command {
        Command::Encode { input } => {
            let payload: PaymentPayload = serde_json::from_str(&read_input(&input)?)?;
            println!("{}", codec::encode(&payload)?);
        }
        Command::Decode { payload } => {
            let payload = codec::decode(payload.trim())?;
            print_json(&payload)?;
        }
        Command::Sanitize { input } => {
            let document: serde_json::Value = serde_json::from_str(&read_input(&input)?)?;
            print_json(&document.to_json_safe()?)?;
        }
        Command::Verify(args) => {
            let (payload, requirements) = args.load()?;
            let facilitator = ClientConfig::load(&cli_args.connection)?.facilitator_client()?;
            tracing::info!(url = %facilitator.verify_url(), "Verifying payment");
            let response = facilitator.verify_payment(&payload, &requirements).await?;
            if !response.is_valid {
                tracing::warn!(reason = ?response.error_message, "Payment is invalid");
            }
            print_json(&response)?;
        }
        Command::Settle(args) => {
            let (payload, requirements) = args.load()?;
            let facilitator = ClientConfig::load(&cli_args.connection)?.facilitator_client()?;
            tracing::info!(url = %facilitator.settle_url(), "Settling payment");
            let response = facilitator.settle_payment(&payload, &requirements).await?;
            print_json(&response)?;
        }
        Command::Supported => {
            let facilitator = ClientConfig::load(&cli_args.connection)?.facilitator_client()?;
            let response = facilitator.supported().await?;
            print_json(&response)?;
        }
    }

    Ok(())
}

impl PaymentArgs {
    /// Decodes the payload locally so a malformed one never reaches the facilitator.
    fn load(&self) -> Result<(PaymentPayload, serde_json::Value), Box<dyn std::error::Error>> {
        let payload = codec::decode(self.payload.trim())?;
        let requirements = serde_json::from_str(&read_input(&self.requirements)?)?;
        Ok((payload, requirements))
    }
}

fn read_input(path: &Path) -> std::io::Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(path)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
