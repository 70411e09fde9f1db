//! The signed payment payload a payer hands to a facilitator.
//!
//! ```json
//! {
//!   "x402Version": 1,
//!   "scheme": "exact",
//!   "network": "base-sepolia",
//!   "payload": {
//!     "type": "authorizationEip3009",
//!     "authorization": {
//!       "from": "0x857b06519E91e3A54538791bDbb0E22373e36b66",
//!       "to": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!       "value": "10000",
//!       "validAfter": "1740672089",
//!       "validBefore": "1740672154",
//!       "nonce": "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480",
//!       "version": "2"
//!     },
//!     "signature": "0x2d6a7588d6acca505cbf0d9a4a227e0c52c6c34008c8e8986a1283259764173608a2ce6496642e377d6da8dbbf5836e9bd15092f9ecab05ded3d6293af148b571c"
//!   }
//! }
//! ```
//!
//! Only the payload variants and the authorization fields listed on
//! [`Authorization`] carry types. Everything else is kept as JSON and
//! round-trips untouched.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::util::TokenAmount;

/// Top-level payment envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version, passed through as received.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub x402_version: Value,
    pub payload: SchemePayload,
    /// `scheme`, `network` and any other routing fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The scheme-specific part of a [`PaymentPayload`], discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SchemePayload {
    Authorization(SignedAuthorization),
    AuthorizationEip3009(SignedAuthorization),
}

/// Wire tags of the [`SchemePayload`] variants.
pub mod payload_type {
    pub const AUTHORIZATION: &str = "authorization";
    pub const AUTHORIZATION_EIP3009: &str = "authorizationEip3009";
}

impl SchemePayload {
    /// The `type` tag this variant is written with.
    pub fn type_tag(&self) -> &'static str {
        match self {
            SchemePayload::Authorization(_) => payload_type::AUTHORIZATION,
            SchemePayload::AuthorizationEip3009(_) => payload_type::AUTHORIZATION_EIP3009,
        }
    }

    pub fn signed_authorization(&self) -> &SignedAuthorization {
        match self {
            SchemePayload::Authorization(signed) | SchemePayload::AuthorizationEip3009(signed) => {
                signed
            }
        }
    }
}

/// An authorization record together with its signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    pub authorization: Authorization,
    /// Hex signature, `0x`-prefixed.
    pub signature: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Time-bounded permission to transfer `value` tokens.
///
/// `from`, `to` and any other fields are kept in [`Authorization::extra`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub value: TokenAmount,
    pub valid_after: TokenAmount,
    pub valid_before: TokenAmount,
    pub nonce: String,
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Authorization {
    /// Field names with a fixed type in the authorization record.
    pub const VALUE: &'static str = "value";
    pub const VALID_AFTER: &'static str = "validAfter";
    pub const VALID_BEFORE: &'static str = "validBefore";
    pub const NONCE: &'static str = "nonce";
    pub const VERSION: &'static str = "version";
}

impl PaymentPayload {
    /// Shorthand for the `scheme` routing field, when it is a string.
    pub fn scheme(&self) -> Option<&str> {
        self.extra.get("scheme").and_then(Value::as_str)
    }

    /// Shorthand for the `network` routing field, when it is a string.
    pub fn network(&self) -> Option<&str> {
        self.extra.get("network").and_then(Value::as_str)
    }
}
