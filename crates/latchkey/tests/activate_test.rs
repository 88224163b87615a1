//! tests for the /api/v1/activate endpoint: authentication, freshness and
//! replay behavior.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{assert_error_code, Harness, CHANNEL_CODE, KID, SUBACCOUNT};
use latchkey_db::Database;
use latchkey_seal::{verify_compact, EnvelopeType, PlatformKeys};
use latchkey_types::{AuditDecision, ChannelStatus, LicenseClaims};

#[tokio::test]
async fn test_first_activation_succeeds_and_repeat_is_replay() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-1", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");

    // first attempt: http 200 with a license for this serial and the
    // capsule fully consumed
    let (status, resp) = h.activate(&body).await;
    assert_eq!(status, StatusCode::OK, "body: {resp}");
    assert_eq!(resp["code"], 0);
    assert_eq!(resp["data"]["quota_remaining"], 0);

    let license_jws = resp["data"]["license_jws"].as_str().unwrap();
    let (_, claims): (_, LicenseClaims) =
        verify_compact(license_jws, &h.platform_public, EnvelopeType::License).unwrap();
    assert_eq!(claims.sn, "SN-001");
    assert_eq!(claims.channel, CHANNEL_CODE);
    assert_eq!(claims.subaccount, SUBACCOUNT);
    assert_eq!(claims.cac_jti, "cap-1");
    assert_eq!(claims.license_id, resp["data"]["license_id"].as_str().unwrap());
    assert_eq!(claims.exp, resp["data"]["expires_at"].as_i64().unwrap());

    // a byte-for-byte repeat of the same request is a nonce replay
    let (status, resp) = h.activate(&body).await;
    assert_error_code(status, &resp, "NONCE_REPLAY");
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_license_expiry_defaults_to_one_year() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-exp", 1);
    let body = h.body(&cac, "SN-EXP", "nonce-000exp");

    let before = Utc::now().timestamp();
    let (status, resp) = h.activate(&body).await;
    assert_eq!(status, StatusCode::OK);

    let expires_at = resp["data"]["expires_at"].as_i64().unwrap();
    let expected = before + 365 * 86_400;
    assert!((expires_at - expected).abs() < 10, "expiry {expires_at} not ~1y out");
}

#[tokio::test]
async fn test_same_code_twice_with_different_nonces_is_totp_reuse() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-2", 5);

    // both requests carry the same (valid) code, different nonces
    let first = h.body(&cac, "SN-A01", "nonce-aaaaaa");
    let code = first["totp_code"].as_str().unwrap().to_string();
    let mut second = h.body(&cac, "SN-A02", "nonce-bbbbbb");
    second["totp_code"] = serde_json::Value::String(code);

    let (status, resp) = h.activate(&first).await;
    assert_eq!(status, StatusCode::OK, "body: {resp}");

    let (status, resp) = h.activate(&second).await;
    assert_error_code(status, &resp, "TOTP_REUSED");
}

#[tokio::test]
async fn test_tampered_body_fails_signature() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-3", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");

    // sign the real body, then send a modified one
    let bytes = serde_json::to_vec(&body).unwrap();
    let signature = h.sign_body(&bytes);

    let mut tampered = body.clone();
    tampered["sn"] = serde_json::Value::String("SN-EVIL".to_string());
    let tampered_bytes = serde_json::to_vec(&tampered).unwrap();

    let (status, resp) = h
        .send(tampered_bytes, Some(CHANNEL_CODE), Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "SIGNATURE_INVALID");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signature_from_unregistered_key_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-4", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");
    let bytes = serde_json::to_vec(&body).unwrap();

    // a valid detached envelope, but from a keypair the channel never
    // registered
    let rogue = PlatformKeys::generate();
    let signature =
        latchkey_seal::sign_detached(&bytes, rogue.signing_key(), KID, "activate").unwrap();

    let (status, resp) = h
        .send(bytes, Some(CHANNEL_CODE), Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "SIGNATURE_INVALID");
}

#[tokio::test]
async fn test_missing_headers_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-5", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");
    let bytes = serde_json::to_vec(&body).unwrap();
    let signature = h.sign_body(&bytes);

    let (status, resp) = h
        .send(bytes.clone(), None, Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "MISSING_HEADER");
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, resp) = h
        .send(bytes.clone(), Some(CHANNEL_CODE), None, Some(&signature))
        .await;
    assert_error_code(status, &resp, "MISSING_HEADER");

    let (status, resp) = h.send(bytes, Some(CHANNEL_CODE), Some(KID), None).await;
    assert_error_code(status, &resp, "MISSING_HEADER");
}

#[tokio::test]
async fn test_empty_and_malformed_bodies_rejected() {
    let h = Harness::new().await;

    let signature = h.sign_body(b"");
    let (status, resp) = h
        .send(Vec::new(), Some(CHANNEL_CODE), Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "EMPTY_BODY");

    let garbage = b"{not json".to_vec();
    let signature = h.sign_body(&garbage);
    let (status, resp) = h
        .send(garbage, Some(CHANNEL_CODE), Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "INVALID_JSON");

    // well-formed json missing required fields
    let partial = serde_json::to_vec(&serde_json::json!({"sn": "SN-001"})).unwrap();
    let signature = h.sign_body(&partial);
    let (status, resp) = h
        .send(partial, Some(CHANNEL_CODE), Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "INVALID_PAYLOAD");
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_body_channel_must_match_header() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-6", 1);
    let mut body = h.body(&cac, "SN-001", "nonce-000001");
    body["channel_id"] = serde_json::Value::String("CH9".to_string());

    let (status, resp) = h.activate(&body).await;
    assert_error_code(status, &resp, "CHANNEL_MISMATCH");
}

#[tokio::test]
async fn test_short_nonce_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-7", 1);
    let body = h.body(&cac, "SN-001", "short");

    let (status, resp) = h.activate(&body).await;
    assert_error_code(status, &resp, "NONCE_TOO_SHORT");
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-8", 1);
    let mut body = h.body(&cac, "SN-001", "nonce-000001");
    // well past the 120s default skew
    body["iat"] = serde_json::Value::from(Utc::now().timestamp() - 3600);

    let (status, resp) = h.activate(&body).await;
    assert_error_code(status, &resp, "TIMESTAMP_OUT_OF_RANGE");
}

#[tokio::test]
async fn test_disabled_channel_rejected() {
    let h = Harness::new().await;
    h.db.set_channel_status(h.channel.id, ChannelStatus::Disabled)
        .await
        .unwrap();

    let cac = h.capsule("cap-9", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");
    let (status, resp) = h.activate(&body).await;
    assert_error_code(status, &resp, "CHANNEL_DISABLED");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_channel_reported_as_disabled() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-10", 1);
    let mut body = h.body(&cac, "SN-001", "nonce-000001");
    body["channel_id"] = serde_json::Value::String("NOPE".to_string());

    let bytes = serde_json::to_vec(&body).unwrap();
    let signature = h.sign_body(&bytes);
    let (status, resp) = h
        .send(bytes, Some("NOPE"), Some(KID), Some(&signature))
        .await;
    assert_error_code(status, &resp, "CHANNEL_DISABLED");
}

#[tokio::test]
async fn test_unknown_kid_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-11", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");
    let bytes = serde_json::to_vec(&body).unwrap();
    let signature =
        latchkey_seal::sign_detached(&bytes, h.channel_keys.signing_key(), "k9", "activate")
            .unwrap();

    let (status, resp) = h
        .send(bytes, Some(CHANNEL_CODE), Some("k9"), Some(&signature))
        .await;
    assert_error_code(status, &resp, "CHANNEL_KEY_MISSING");
}

#[tokio::test]
async fn test_unknown_subaccount_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-12", 1);
    let mut body = h.body(&cac, "SN-001", "nonce-000001");
    body["subaccount"] = serde_json::Value::String("ghost".to_string());

    let (status, resp) = h.activate(&body).await;
    assert_error_code(status, &resp, "SUBACCOUNT_INVALID");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_totp_code_rejected() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-13", 1);
    let mut body = h.body(&cac, "SN-001", "nonce-000001");

    // a code from an unrelated secret is (all but certainly) invalid here
    let other_secret = latchkey_seal::generate_totp_secret();
    let wrong = h.totp_now(&other_secret);
    if wrong != h.totp_now(&h.totp_secret) {
        body["totp_code"] = serde_json::Value::String(wrong);
        let (status, resp) = h.activate(&body).await;
        assert_error_code(status, &resp, "TOTP_FAILED");
    }
}

#[tokio::test]
async fn test_denied_attempt_leaves_audit_row() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-14", 1);
    let body = h.body(&cac, "SN-001", "short");

    let (_, _) = h.activate(&body).await;

    let audits = h.db.list_audits(10).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].decision, AuditDecision::Denied);
    assert_eq!(audits[0].error_code.as_deref(), Some("NONCE_TOO_SHORT"));
    assert_eq!(audits[0].channel_code, CHANNEL_CODE);
    // the raw device key is never stored, only its hash
    assert!(audits[0].device_pubkey_hash.is_some());
}

#[tokio::test]
async fn test_approved_attempt_leaves_audit_row() {
    let h = Harness::new().await;
    let cac = h.capsule("cap-15", 1);
    let body = h.body(&cac, "SN-001", "nonce-000001");

    let (status, resp) = h.activate(&body).await;
    assert_eq!(status, StatusCode::OK);

    let audits = h.db.list_audits(10).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].decision, AuditDecision::Approved);
    assert_eq!(
        audits[0].detail.as_deref(),
        resp["data"]["license_id"].as_str()
    );
}
