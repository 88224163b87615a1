//! compact and detached signed envelopes.
//!
//! both shapes are three dot-joined base64url segments
//! (`header.payload.signature`); the signature always covers the first two
//! segments as ascii bytes.
//!
//! - **compact**: the payload is carried inline as base64url json. used for
//!   capability capsules and issued licenses, distinguished by the `typ`
//!   header which the verifier must check.
//! - **detached**: the middle segment encodes caller-supplied body bytes.
//!   the verifier additionally requires the exact original bytes and
//!   compares them against the embedded segment, so a signature cannot be
//!   replayed against a different request body.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::Error;

/// the only signature algorithm latchkey accepts.
pub const ENVELOPE_ALG: &str = "EdDSA";

/// the kind of compact envelope, carried in the `typ` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeType {
    /// a capability capsule.
    Capsule,
    /// an issued license.
    License,
}

impl EnvelopeType {
    /// the `typ` header value for this envelope type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capsule => "cac",
            Self::License => "license",
        }
    }
}

/// envelope header fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// signature algorithm tag.
    pub alg: String,

    /// envelope type (compact) or container tag (detached).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// key id selecting the verification key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// purpose string for detached envelopes (e.g. "activate").
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

fn b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

fn unb64(data: &str) -> Result<Vec<u8>, Error> {
    Ok(URL_SAFE_NO_PAD.decode(data)?)
}

fn ensure_algorithm(alg: &str) -> Result<(), Error> {
    if alg != ENVELOPE_ALG {
        return Err(Error::UnsupportedAlgorithm(alg.to_string()));
    }
    Ok(())
}

fn split_segments(envelope: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = envelope.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => Ok((h, p, s)),
        _ => Err(Error::InvalidFormat),
    }
}

fn verify_signing_input(
    key: &VerifyingKey,
    header_b64: &str,
    payload_b64: &str,
    signature_b64: &str,
) -> Result<(), Error> {
    let sig_bytes = unb64(signature_b64)?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(|_| Error::InvalidSignature)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    key.verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)
}

/// decode an envelope header without verifying anything.
///
/// used to discover which key (`kid`) a compact envelope claims before the
/// caller resolves it; nothing read from the result is trusted until
/// verification succeeds.
pub fn decode_header(envelope: &str) -> Result<EnvelopeHeader, Error> {
    let (header_b64, _, _) = split_segments(envelope)?;
    let header: EnvelopeHeader = serde_json::from_slice(&unb64(header_b64)?)?;
    Ok(header)
}

/// sign a json payload as a compact envelope.
pub fn sign_compact<T: Serialize>(
    payload: &T,
    key: &SigningKey,
    kid: &str,
    typ: EnvelopeType,
) -> Result<String, Error> {
    let header = EnvelopeHeader {
        alg: ENVELOPE_ALG.to_string(),
        typ: Some(typ.as_str().to_string()),
        kid: Some(kid.to_string()),
        purpose: None,
    };
    let header_b64 = b64(&serde_json::to_vec(&header)?);
    let payload_b64 = b64(&serde_json::to_vec(payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!("{signing_input}.{}", b64(&signature.to_bytes())))
}

/// verify a compact envelope and deserialize its payload.
///
/// fails closed on a missing or mismatched `typ` header: a capsule must
/// never verify where a license is expected and vice versa.
pub fn verify_compact<T: DeserializeOwned>(
    envelope: &str,
    key: &VerifyingKey,
    expected: EnvelopeType,
) -> Result<(EnvelopeHeader, T), Error> {
    let (header_b64, payload_b64, signature_b64) = split_segments(envelope)?;

    let header: EnvelopeHeader = serde_json::from_slice(&unb64(header_b64)?)?;
    ensure_algorithm(&header.alg)?;

    verify_signing_input(key, header_b64, payload_b64, signature_b64)?;

    match header.typ.as_deref() {
        Some(typ) if typ == expected.as_str() => {}
        other => {
            return Err(Error::TypeMismatch {
                expected: expected.as_str(),
                got: other.unwrap_or_default().to_string(),
            });
        }
    }

    let payload: T = serde_json::from_slice(&unb64(payload_b64)?)?;
    Ok((header, payload))
}

/// sign arbitrary body bytes as a detached envelope.
pub fn sign_detached(
    body: &[u8],
    key: &SigningKey,
    kid: &str,
    purpose: &str,
) -> Result<String, Error> {
    let header = EnvelopeHeader {
        alg: ENVELOPE_ALG.to_string(),
        typ: Some("JOSE".to_string()),
        kid: Some(kid.to_string()),
        purpose: Some(purpose.to_string()),
    };
    let header_b64 = b64(&serde_json::to_vec(&header)?);
    let payload_b64 = b64(body);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!("{signing_input}.{}", b64(&signature.to_bytes())))
}

/// verify a detached envelope against the exact original body bytes.
///
/// the embedded segment must decode to `body` byte-for-byte, which binds
/// the signature to *this* request. an absent `use` header is accepted; a
/// present one must equal `expected_use`.
pub fn verify_detached(
    envelope: &str,
    body: &[u8],
    key: &VerifyingKey,
    expected_use: &str,
) -> Result<EnvelopeHeader, Error> {
    let (header_b64, payload_b64, signature_b64) = split_segments(envelope)?;

    let header: EnvelopeHeader = serde_json::from_slice(&unb64(header_b64)?)?;
    ensure_algorithm(&header.alg)?;

    if let Some(purpose) = header.purpose.as_deref()
        && purpose != expected_use
    {
        return Err(Error::UseMismatch);
    }

    verify_signing_input(key, header_b64, payload_b64, signature_b64)?;

    if unb64(payload_b64)? != body {
        return Err(Error::PayloadMismatch);
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Claims {
        sub: String,
        n: u64,
    }

    fn keypair() -> (SigningKey, VerifyingKey) {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let public = key.verifying_key();
        (key, public)
    }

    fn claims() -> Claims {
        Claims {
            sub: "cap-1".to_string(),
            n: 7,
        }
    }

    #[test]
    fn compact_roundtrip() {
        let (key, public) = keypair();
        let envelope = sign_compact(&claims(), &key, "k1", EnvelopeType::Capsule).unwrap();

        let (header, payload): (EnvelopeHeader, Claims) =
            verify_compact(&envelope, &public, EnvelopeType::Capsule).unwrap();
        assert_eq!(header.alg, "EdDSA");
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(payload, claims());
    }

    #[test]
    fn compact_rejects_wrong_key() {
        let (key, _) = keypair();
        let (_, other_public) = keypair();
        let envelope = sign_compact(&claims(), &key, "k1", EnvelopeType::Capsule).unwrap();

        let result: Result<(_, Claims), _> =
            verify_compact(&envelope, &other_public, EnvelopeType::Capsule);
        assert!(matches!(result, Err(Error::InvalidSignature)));
    }

    #[test]
    fn compact_rejects_tampered_payload() {
        let (key, public) = keypair();
        let envelope = sign_compact(&claims(), &key, "k1", EnvelopeType::Capsule).unwrap();

        // flip one byte inside the payload segment
        let mut parts: Vec<String> = envelope.split('.').map(String::from).collect();
        let mut payload = URL_SAFE_NO_PAD.decode(&parts[1]).unwrap();
        payload[0] ^= 0xff;
        parts[1] = URL_SAFE_NO_PAD.encode(&payload);
        let tampered = parts.join(".");

        let result: Result<(_, Claims), _> =
            verify_compact(&tampered, &public, EnvelopeType::Capsule);
        assert!(result.is_err());
    }

    #[test]
    fn compact_rejects_tampered_signature() {
        let (key, public) = keypair();
        let envelope = sign_compact(&claims(), &key, "k1", EnvelopeType::Capsule).unwrap();

        let mut parts: Vec<String> = envelope.split('.').map(String::from).collect();
        let mut sig = URL_SAFE_NO_PAD.decode(&parts[2]).unwrap();
        sig[0] ^= 0x01;
        parts[2] = URL_SAFE_NO_PAD.encode(&sig);
        let tampered = parts.join(".");

        let result: Result<(_, Claims), _> =
            verify_compact(&tampered, &public, EnvelopeType::Capsule);
        assert!(matches!(result, Err(Error::InvalidSignature)));
    }

    #[test]
    fn compact_rejects_type_mismatch() {
        let (key, public) = keypair();
        let envelope = sign_compact(&claims(), &key, "k1", EnvelopeType::Capsule).unwrap();

        let result: Result<(_, Claims), _> =
            verify_compact(&envelope, &public, EnvelopeType::License);
        assert!(matches!(
            result,
            Err(Error::TypeMismatch {
                expected: "license",
                ..
            })
        ));
    }

    #[test]
    fn compact_rejects_missing_typ() {
        let (key, public) = keypair();

        // hand-build an envelope whose header has no typ field
        let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","kid":"k1"}"#);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims()).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = key.sign(signing_input.as_bytes());
        let envelope = format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        );

        let result: Result<(_, Claims), _> =
            verify_compact(&envelope, &public, EnvelopeType::Capsule);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn compact_rejects_unsupported_alg() {
        let (key, public) = keypair();

        let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","typ":"cac"}"#);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims()).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = key.sign(signing_input.as_bytes());
        let envelope = format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        );

        let result: Result<(_, Claims), _> =
            verify_compact(&envelope, &public, EnvelopeType::Capsule);
        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn compact_rejects_malformed() {
        let (_, public) = keypair();
        let result: Result<(_, Claims), _> =
            verify_compact("only.two", &public, EnvelopeType::Capsule);
        assert!(matches!(result, Err(Error::InvalidFormat)));
    }

    #[test]
    fn detached_roundtrip() {
        let (key, public) = keypair();
        let body = br#"{"sn":"SN-001","nonce":"abcdefgh"}"#;

        let envelope = sign_detached(body, &key, "k1", "activate").unwrap();
        let header = verify_detached(&envelope, body, &public, "activate").unwrap();
        assert_eq!(header.purpose.as_deref(), Some("activate"));
    }

    #[test]
    fn detached_rejects_different_body() {
        let (key, public) = keypair();
        let body = br#"{"sn":"SN-001"}"#;
        let other_body = br#"{"sn":"SN-002"}"#;

        let envelope = sign_detached(body, &key, "k1", "activate").unwrap();
        // other_body is independently well-formed json but not the signed bytes
        let result = verify_detached(&envelope, other_body, &public, "activate");
        assert!(result.is_err());
    }

    #[test]
    fn detached_rejects_use_mismatch() {
        let (key, public) = keypair();
        let body = b"body";

        let envelope = sign_detached(body, &key, "k1", "deactivate").unwrap();
        let result = verify_detached(&envelope, body, &public, "activate");
        assert!(matches!(result, Err(Error::UseMismatch)));
    }

    #[test]
    fn detached_accepts_absent_use() {
        let (key, public) = keypair();
        let body = b"body";

        let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA"}"#);
        let payload_b64 = URL_SAFE_NO_PAD.encode(body);
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = key.sign(signing_input.as_bytes());
        let envelope = format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        );

        assert!(verify_detached(&envelope, body, &public, "activate").is_ok());
    }

    #[test]
    fn decode_header_reads_kid_without_verifying() {
        let (key, _) = keypair();
        let envelope = sign_compact(&claims(), &key, "k2", EnvelopeType::Capsule).unwrap();
        let header = decode_header(&envelope).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k2"));
        assert_eq!(header.typ.as_deref(), Some("cac"));
    }
}
