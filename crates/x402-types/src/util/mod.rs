//! Utility types for x402.
//!
//! - [`b64`] - Base64 transport primitive
//! - [`token_amount`] - 256-bit integers carried as decimal strings

pub mod b64;
pub mod token_amount;

pub use b64::*;
pub use token_amount::*;
