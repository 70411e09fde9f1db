//! Wire types exchanged with an x402 facilitator.
//!
//! - [`payload`] - the payment payload a client signs and transports
//! - [`VerifyRequest`] / [`VerifyResponse`] - body and result of `POST /verify`
//! - [`SettleRequest`] / [`SettleResponse`] - body and result of `POST /settle`
//! - [`SupportedResponse`] - result of `GET /supported`
//!
//! All types serialize to JSON using camelCase field names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;

use crate::codec::{self, CodecError};
use crate::sanitize::{JsonSafe, SanitizeError};

pub mod payload;

pub use payload::*;

/// Describes a payment method supported by a facilitator.
///
/// ```json
/// { "x402Version": 1, "scheme": "exact", "network": "base-sepolia" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Response from a facilitator's `/supported` endpoint.
///
/// Kinds the client cannot parse are skipped rather than failing the whole response.
#[serde_as]
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Signer addresses keyed by network.
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestBuildError {
    #[error(transparent)]
    Payload(#[from] CodecError),
    #[error(transparent)]
    Requirements(#[from] SanitizeError),
}

/// Body of `POST /verify`: the encoded payment payload and the
/// JSON-safe payment requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub payload: String,
    pub payment_requirements: Value,
}

/// Body of `POST /settle`. Identical to [`VerifyRequest`].
pub type SettleRequest = VerifyRequest;

impl VerifyRequest {
    /// Encodes `payload` and sanitizes `requirements`.
    pub fn new<R>(payload: &PaymentPayload, requirements: &R) -> Result<Self, RequestBuildError>
    where
        R: JsonSafe + ?Sized,
    {
        Ok(Self {
            payload: codec::encode(payload)?,
            payment_requirements: requirements.to_json_safe()?,
        })
    }
}

/// Result of a verification.
///
/// Fields beyond `isValid` and `errorMessage` are kept as sent by the facilitator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerifyResponse {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: None,
            extra: Map::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
            extra: Map::new(),
        }
    }
}

/// Settlement result, passed through as sent by the facilitator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettleResponse(pub Value);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> PaymentPayload {
        codec::decode(&crate::util::Base64Bytes::encode(
            json!({
                "x402Version": 1,
                "scheme": "exact",
                "network": "base-sepolia",
                "payload": {
                    "type": "authorization",
                    "signature": "0xabcdef",
                    "authorization": {
                        "value": "1000",
                        "validAfter": "0",
                        "validBefore": "1893456000",
                        "nonce": "0x01",
                        "version": "2"
                    }
                }
            })
            .to_string(),
        )
        .to_string())
        .unwrap()
    }

    #[test]
    fn test_verify_request_wire_shape() {
        let payload = payload();
        let requirements = json!({"scheme": "exact", "description": null});
        let request = VerifyRequest::new(&payload, &requirements).unwrap();
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["paymentRequirements"], json!({"scheme": "exact"}));
        assert_eq!(wire["payload"], json!(codec::encode(&payload).unwrap()));
    }

    #[test]
    fn test_verify_request_rejects_primitive_requirements() {
        let err = VerifyRequest::new(&payload(), &json!(42)).unwrap_err();
        assert!(matches!(
            err,
            RequestBuildError::Requirements(SanitizeError::InputType("number"))
        ));
    }

    #[test]
    fn test_verify_response_keeps_extra_fields() {
        let response: VerifyResponse =
            serde_json::from_value(json!({"isValid": true, "payer": "0xabc"})).unwrap();
        assert!(response.is_valid);
        assert_eq!(response.error_message, None);
        assert_eq!(response.extra["payer"], json!("0xabc"));
        assert_eq!(
            serde_json::to_value(VerifyResponse::valid()).unwrap(),
            json!({"isValid": true})
        );
        assert_eq!(
            serde_json::to_value(VerifyResponse::invalid("expired")).unwrap(),
            json!({"isValid": false, "errorMessage": "expired"})
        );
    }

    #[test]
    fn test_supported_response_skips_unknown_kinds() {
        let response: SupportedResponse = serde_json::from_value(json!({
            "kinds": [
                {"x402Version": 1, "scheme": "exact", "network": "base"},
                {"x402Version": "one", "scheme": "exact"}
            ]
        }))
        .unwrap();
        assert_eq!(response.kinds.len(), 1);
        assert!(response.signers.is_empty());
    }
}
