//! Client side of the x402 payment protocol.
//!
//! - [`client`] - HTTP client of a remote facilitator (`/verify`, `/settle`, `/supported`)
//! - [`config`] - Facilitator connection settings from file, flags and environment
//! - [`telemetry`] - Logging setup for the command line tool
//!
//! Payload encoding and requirement sanitizing live in [`x402_types`], re-exported here.
//!
//! ```no_run
//! use serde_json::json;
//! use x402_client::client::FacilitatorClient;
//! use x402_client::x402_types::codec;
//!
//! # async fn run(header: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let payload = codec::decode(header)?;
//! let requirements = json!({ "scheme": "exact", "network": "base-sepolia" });
//! let facilitator = FacilitatorClient::try_from("https://x402.org/facilitator")?;
//! let verification = facilitator.verify_payment(&payload, &requirements).await?;
//! if verification.is_valid {
//!     facilitator.settle_payment(&payload, &requirements).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod telemetry;

pub use x402_types;
