#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for x402 payment clients.
//!
//! A client of the x402 protocol answers an HTTP 402 response by signing a
//! payment authorization, encoding it as a base64 payload and handing it,
//! together with the server's payment requirements, to a facilitator that
//! verifies and settles it.
//!
//! # Modules
//!
//! - [`codec`] - Base64 payload codec with lossless 256-bit amounts
//! - [`config`] - Environment variable resolution for configuration values
//! - [`facilitator`] - Trait for payment verification and settlement
//! - [`proto`] - Wire types for payloads and facilitator messages
//! - [`sanitize`] - Conversion of arbitrary object graphs to JSON-safe values
//! - [`util`] - Base64 bytes and token amounts
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation of the codec

pub mod codec;
pub mod config;
pub mod facilitator;
pub mod proto;
pub mod sanitize;
pub mod util;
