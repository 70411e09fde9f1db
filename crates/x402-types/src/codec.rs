//! Payment-payload codec.
//!
//! Converts a [`PaymentPayload`] to and from the opaque base64 string carried
//! in HTTP headers and bodies. Authorization amounts and validity bounds are
//! 256-bit integers; they are written as decimal strings so they survive the
//! JSON step without precision loss.
//!
//! Decoding is a three-step pipeline, and each step only sees the output of
//! the previous one:
//!
//! 1. base64 and JSON parsing;
//! 2. [`UncheckedPayload::reconstruct`], which turns the decimal strings of
//!    the authorization variants back into integers;
//! 3. [`validate`], which checks the envelope shape and every typed field,
//!    reporting all violations at once.
//!
//! A failure at any step discards the partially decoded value.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

use crate::proto::payload::{
    Authorization, PaymentPayload, SchemePayload, SignedAuthorization, payload_type,
};
use crate::util::{Base64Bytes, Base64TextError, TokenAmount, TokenAmountParseError};

/// Literal prefix every signature must start with.
pub const SIGNATURE_PREFIX: &str = "0x";

/// Errors produced while encoding or decoding a payment payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload could not be written as JSON.
    #[error("failed to encode payment payload: {0}")]
    Encoding(#[source] serde_json::Error),
    /// The input was not valid base64.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes were not UTF-8.
    #[error("utf-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The decoded text was not JSON.
    #[error("json parse error: {0}")]
    Json(#[source] serde_json::Error),
    /// An authorization amount was a string but not a base-10 integer.
    #[error("authorization field `{field}` is not an integer: {source}")]
    InvalidInteger {
        field: &'static str,
        #[source]
        source: TokenAmountParseError,
    },
    /// The reconstructed payload failed validation.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl From<Base64TextError> for CodecError {
    fn from(value: Base64TextError) -> Self {
        match value {
            Base64TextError::Base64(e) => CodecError::Base64(e),
            Base64TextError::Utf8(e) => CodecError::Utf8(e),
        }
    }
}

/// Validation failures of a reconstructed payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed payment payload: {0}")]
    Structure(#[from] StructureError),
    #[error("invalid authorization: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("unknown payload type: {0}")]
    UnknownPayloadType(String),
}

/// The envelope does not have the shape of a payment payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(FieldKind),
    #[error("`payload` is missing or not an object")]
    MissingPayload,
    #[error("`payload.type` is missing")]
    MissingType,
}

/// Every field of an authorization payload that failed its type check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    pub violations: Vec<AuthorizationViolation>,
}

impl AuthorizationError {
    /// Whether a violation was recorded against the named field.
    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field() == field)
    }
}

impl Display for AuthorizationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AuthorizationError {}

/// A single failed check inside an authorization payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationViolation {
    /// `payload.authorization` is absent or not an object.
    MissingAuthorization { found: FieldKind },
    /// One of the amount fields is not an integer after reconstruction.
    NotAnInteger { field: &'static str, found: FieldKind },
    /// A field that must be a string is not one.
    NotAString { field: &'static str, found: FieldKind },
    /// `payload.signature` is a string without the `0x` prefix.
    SignaturePrefix,
}

impl AuthorizationViolation {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            AuthorizationViolation::MissingAuthorization { .. } => "authorization",
            AuthorizationViolation::NotAnInteger { field, .. } => field,
            AuthorizationViolation::NotAString { field, .. } => field,
            AuthorizationViolation::SignaturePrefix => "signature",
        }
    }
}

impl Display for AuthorizationViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationViolation::MissingAuthorization { found } => {
                write!(f, "`authorization` must be an object, found {found}")
            }
            AuthorizationViolation::NotAnInteger { field, found } => {
                write!(f, "`{field}` must be an integer, found {found}")
            }
            AuthorizationViolation::NotAString { field, found } => {
                write!(f, "`{field}` must be a string, found {found}")
            }
            AuthorizationViolation::SignaturePrefix => {
                write!(f, "`signature` must start with {SIGNATURE_PREFIX}")
            }
        }
    }
}

/// The JSON type found in place of an expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Absent,
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl FieldKind {
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None => FieldKind::Absent,
            Some(Value::Null) => FieldKind::Null,
            Some(Value::Bool(_)) => FieldKind::Boolean,
            Some(Value::Number(_)) => FieldKind::Number,
            Some(Value::String(_)) => FieldKind::String,
            Some(Value::Array(_)) => FieldKind::Array,
            Some(Value::Object(_)) => FieldKind::Object,
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Absent => "nothing",
            FieldKind::Null => "null",
            FieldKind::Boolean => "a boolean",
            FieldKind::Number => "a number",
            FieldKind::String => "a string",
            FieldKind::Array => "an array",
            FieldKind::Object => "an object",
        };
        f.write_str(name)
    }
}

/// Encodes a payload as base64 JSON.
///
/// The payload is trusted and not re-validated.
pub fn encode(payload: &PaymentPayload) -> Result<String, CodecError> {
    let json = serde_json::to_vec(payload).map_err(CodecError::Encoding)?;
    Ok(Base64Bytes::encode(json).into_string())
}

/// Decodes and validates a base64 JSON payload.
#[cfg_attr(feature = "telemetry", tracing::instrument(name = "x402.codec.decode", skip_all, err))]
pub fn decode(encoded: &str) -> Result<PaymentPayload, CodecError> {
    let text = Base64Bytes::from(encoded).decode_utf8()?;
    let document: Value = serde_json::from_str(&text).map_err(CodecError::Json)?;
    PaymentPayload::from_json(document)
}

impl PaymentPayload {
    /// Reconstructs and validates a payload from an already parsed JSON document.
    pub fn from_json(document: Value) -> Result<Self, CodecError> {
        let unchecked = UncheckedPayload::reconstruct(document)?;
        Ok(validate(unchecked)?)
    }
}

impl TryFrom<Base64Bytes<'_>> for PaymentPayload {
    type Error = CodecError;

    fn try_from(value: Base64Bytes<'_>) -> Result<Self, Self::Error> {
        let text = value.decode_utf8()?;
        let document: Value = serde_json::from_str(&text).map_err(CodecError::Json)?;
        PaymentPayload::from_json(document)
    }
}

impl<'de> Deserialize<'de> for PaymentPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let document = Value::deserialize(deserializer)?;
        PaymentPayload::from_json(document).map_err(serde::de::Error::custom)
    }
}

/// A parsed payload whose authorization amounts have been converted back to
/// integers, but whose shape has not been checked yet.
#[derive(Debug, Clone)]
pub struct UncheckedPayload {
    document: Value,
    /// Present exactly when the document has an authorization tag and an
    /// authorization record.
    amounts: Option<Amounts>,
}

#[derive(Debug, Clone)]
struct Amounts {
    value: Amount,
    valid_after: Amount,
    valid_before: Amount,
}

#[derive(Debug, Clone)]
enum Amount {
    Integer(TokenAmount),
    Other(FieldKind),
}

impl UncheckedPayload {
    /// Converts the decimal-string amounts of an authorization payload to integers.
    ///
    /// Documents of any other shape are kept as they are for [`validate`] to reject.
    /// A string amount that is not a base-10 integer fails here.
    pub fn reconstruct(mut document: Value) -> Result<Self, CodecError> {
        let record = document
            .get_mut("payload")
            .filter(|payload| is_authorization_tag(payload.get("type")))
            .and_then(|payload| payload.get_mut("authorization"))
            .and_then(Value::as_object_mut);
        let amounts = match record {
            Some(record) => Some(Amounts {
                value: take_amount(record, Authorization::VALUE)?,
                valid_after: take_amount(record, Authorization::VALID_AFTER)?,
                valid_before: take_amount(record, Authorization::VALID_BEFORE)?,
            }),
            None => None,
        };
        Ok(Self { document, amounts })
    }
}

fn is_authorization_tag(tag: Option<&Value>) -> bool {
    matches!(
        tag.and_then(Value::as_str),
        Some(payload_type::AUTHORIZATION | payload_type::AUTHORIZATION_EIP3009)
    )
}

fn take_amount(record: &mut Map<String, Value>, field: &'static str) -> Result<Amount, CodecError> {
    match record.remove(field) {
        Some(Value::String(s)) => s
            .parse()
            .map(Amount::Integer)
            .map_err(|source| CodecError::InvalidInteger { field, source }),
        other => Ok(Amount::Other(FieldKind::of(other.as_ref()))),
    }
}

/// Checks a reconstructed payload and returns it as a typed [`PaymentPayload`].
///
/// No value is altered: every field lands in the typed payload as it was
/// reconstructed, untyped fields included.
pub fn validate(unchecked: UncheckedPayload) -> Result<PaymentPayload, PayloadError> {
    let UncheckedPayload { document, amounts } = unchecked;
    let mut envelope = match document {
        Value::Object(envelope) => envelope,
        other => return Err(StructureError::NotAnObject(FieldKind::of(Some(&other))).into()),
    };
    let mut payload = match envelope.remove("payload") {
        Some(Value::Object(payload)) => payload,
        _ => return Err(StructureError::MissingPayload.into()),
    };
    let tag = match payload.remove("type") {
        None | Some(Value::Null) => return Err(StructureError::MissingType.into()),
        Some(tag) => tag,
    };
    let variant: fn(SignedAuthorization) -> SchemePayload = match tag.as_str() {
        Some(payload_type::AUTHORIZATION) => SchemePayload::Authorization,
        Some(payload_type::AUTHORIZATION_EIP3009) => SchemePayload::AuthorizationEip3009,
        Some(other) => return Err(PayloadError::UnknownPayloadType(other.to_string())),
        None => return Err(PayloadError::UnknownPayloadType(tag.to_string())),
    };
    let signed = check_signed_authorization(payload, amounts)?;
    let x402_version = envelope.remove("x402Version").unwrap_or(Value::Null);
    Ok(PaymentPayload {
        x402_version,
        payload: variant(signed),
        extra: envelope,
    })
}

fn check_signed_authorization(
    mut payload: Map<String, Value>,
    amounts: Option<Amounts>,
) -> Result<SignedAuthorization, AuthorizationError> {
    let mut violations = Vec::new();
    let authorization = match (payload.remove("authorization"), amounts) {
        (Some(Value::Object(record)), Some(amounts)) => {
            check_authorization(record, amounts, &mut violations)
        }
        (other, _) => {
            violations.push(AuthorizationViolation::MissingAuthorization {
                found: FieldKind::of(other.as_ref()),
            });
            None
        }
    };
    let signature = match payload.remove("signature") {
        Some(Value::String(signature)) if signature.starts_with(SIGNATURE_PREFIX) => {
            Some(signature)
        }
        Some(Value::String(_)) => {
            violations.push(AuthorizationViolation::SignaturePrefix);
            None
        }
        other => {
            violations.push(AuthorizationViolation::NotAString {
                field: "signature",
                found: FieldKind::of(other.as_ref()),
            });
            None
        }
    };
    match (authorization, signature) {
        (Some(authorization), Some(signature)) if violations.is_empty() => {
            Ok(SignedAuthorization {
                authorization,
                signature,
                extra: payload,
            })
        }
        _ => Err(AuthorizationError { violations }),
    }
}

fn check_authorization(
    mut record: Map<String, Value>,
    amounts: Amounts,
    violations: &mut Vec<AuthorizationViolation>,
) -> Option<Authorization> {
    let value = expect_integer(Authorization::VALUE, amounts.value, violations);
    let valid_after = expect_integer(Authorization::VALID_AFTER, amounts.valid_after, violations);
    let valid_before =
        expect_integer(Authorization::VALID_BEFORE, amounts.valid_before, violations);
    let nonce = expect_string(Authorization::NONCE, record.remove(Authorization::NONCE), violations);
    let version = expect_string(
        Authorization::VERSION,
        record.remove(Authorization::VERSION),
        violations,
    );
    Some(Authorization {
        value: value?,
        valid_after: valid_after?,
        valid_before: valid_before?,
        nonce: nonce?,
        version: version?,
        extra: record,
    })
}

fn expect_integer(
    field: &'static str,
    amount: Amount,
    violations: &mut Vec<AuthorizationViolation>,
) -> Option<TokenAmount> {
    match amount {
        Amount::Integer(integer) => Some(integer),
        Amount::Other(found) => {
            violations.push(AuthorizationViolation::NotAnInteger { field, found });
            None
        }
    }
}

fn expect_string(
    field: &'static str,
    value: Option<Value>,
    violations: &mut Vec<AuthorizationViolation>,
) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        other => {
            violations.push(AuthorizationViolation::NotAString {
                field,
                found: FieldKind::of(other.as_ref()),
            });
            None
        }
    }
}
