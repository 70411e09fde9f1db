//! x402 client command line entrypoint.
//!
//! Subcommands:
//! - `encode` – Encode a payment payload JSON document as base64
//! - `decode` – Decode and validate a base64 payment payload
//! - `sanitize` – Convert a payment requirements document to its JSON-safe form
//! - `verify` – Ask the facilitator to verify a payment
//! - `settle` – Ask the facilitator to settle a payment
//! - `supported` – List the payment kinds the facilitator accepts
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `FACILITATOR_URL`, `FACILITATOR_TIMEOUT_SECS`, `CONFIG` select the facilitator
//! - `RUST_LOG` controls log verbosity

mod run;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
