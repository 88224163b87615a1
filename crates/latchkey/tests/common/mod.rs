//! shared harness for activation endpoint tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use tower::ServiceExt;

use latchkey::create_app;
use latchkey_db::{Database, LatchkeyDb};
use latchkey_seal::{
    generate_totp_secret, sign_compact, sign_detached, totp_code_at_slot, EnvelopeType,
    PlatformKeys,
};
use latchkey_types::{
    CapsulePayload, CapsuleQuota, CapsuleScope, Channel, ChannelId, ChannelKey, Config,
    SubAccount,
};

/// the default test channel code.
pub const CHANNEL_CODE: &str = "CH1";
/// the default test key id.
pub const KID: &str = "k1";
/// the default test sub-account.
pub const SUBACCOUNT: &str = "ops1";

/// a fully provisioned test server.
pub struct Harness {
    pub app: Router,
    pub db: LatchkeyDb,
    pub config: Config,
    pub channel: Channel,
    /// the channel's signing keypair (registered under [`KID`]).
    pub channel_keys: PlatformKeys,
    /// the platform's verification key, for checking issued licenses.
    pub platform_public: VerifyingKey,
    /// totp secret of [`SUBACCOUNT`].
    pub totp_secret: String,
}

impl Harness {
    /// set up an in-memory server with channel CH1, key k1 and
    /// sub-account ops1.
    pub async fn new() -> Self {
        let db = LatchkeyDb::new_in_memory().await.unwrap();
        let config = Config::default();

        let channel = db
            .create_channel(&Channel::new(
                ChannelId(0),
                CHANNEL_CODE.to_string(),
                "Test Channel".to_string(),
            ))
            .await
            .unwrap();

        // any ed25519 keypair works as a channel keypair
        let channel_keys = PlatformKeys::generate();
        db.upsert_channel_key(&ChannelKey::new(
            channel.id,
            KID.to_string(),
            channel_keys.public_key_pem().unwrap(),
        ))
        .await
        .unwrap();

        let totp_secret = generate_totp_secret();
        db.create_subaccount(&SubAccount::new(
            channel.id,
            SUBACCOUNT.to_string(),
            totp_secret.clone(),
        ))
        .await
        .unwrap();

        let platform = PlatformKeys::generate();
        let platform_public = platform.verifying_key();
        let app = create_app(db.clone(), config.clone(), platform);

        Self {
            app,
            db,
            config,
            channel,
            channel_keys,
            platform_public,
            totp_secret,
        }
    }

    /// provision another sub-account; returns its totp secret.
    pub async fn add_subaccount(&self, name: &str) -> String {
        let secret = generate_totp_secret();
        self.db
            .create_subaccount(&SubAccount::new(
                self.channel.id,
                name.to_string(),
                secret.clone(),
            ))
            .await
            .unwrap();
        secret
    }

    /// sign a capsule payload with the channel key.
    pub fn sign_capsule(&self, payload: &CapsulePayload) -> String {
        sign_compact(
            payload,
            self.channel_keys.signing_key(),
            KID,
            EnvelopeType::Capsule,
        )
        .unwrap()
    }

    /// build and sign a minimal capsule with the given quota.
    pub fn capsule(&self, jti: &str, max_activations: i64) -> String {
        self.sign_capsule(&capsule_payload(jti, max_activations))
    }

    /// the currently valid totp code for a secret.
    pub fn totp_now(&self, secret: &str) -> String {
        let slot = Utc::now().timestamp() / self.config.activation.totp_step_secs as i64;
        totp_code_at_slot(secret, slot).unwrap()
    }

    /// a request body with sane defaults, ready for overrides.
    pub fn body(&self, cac_token: &str, sn: &str, nonce: &str) -> serde_json::Value {
        serde_json::json!({
            "channel_id": CHANNEL_CODE,
            "subaccount": SUBACCOUNT,
            "totp_code": self.totp_now(&self.totp_secret),
            "cac_token": cac_token,
            "sn": sn,
            "model": "M100",
            "fw_hash": "fw-abc123",
            "device_pubkey": "device-pk-0001",
            "nonce": nonce,
            "iat": Utc::now().timestamp(),
        })
    }

    /// sign body bytes with the channel key as a detached activate envelope.
    pub fn sign_body(&self, body: &[u8]) -> String {
        sign_detached(body, self.channel_keys.signing_key(), KID, "activate").unwrap()
    }

    /// post a body with a correct signature and default headers.
    pub async fn activate(&self, body: &serde_json::Value) -> (StatusCode, serde_json::Value) {
        let bytes = serde_json::to_vec(body).unwrap();
        let signature = self.sign_body(&bytes);
        self.send(bytes, Some(CHANNEL_CODE), Some(KID), Some(&signature))
            .await
    }

    /// post raw bytes with explicit headers (None omits the header).
    pub async fn send(
        &self,
        body: Vec<u8>,
        channel_id: Option<&str>,
        kid: Option<&str>,
        signature: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/activate")
            .header("content-type", "application/json");
        if let Some(v) = channel_id {
            builder = builder.header("X-Channel-Id", v);
        }
        if let Some(v) = kid {
            builder = builder.header("X-Channel-Kid", v);
        }
        if let Some(v) = signature {
            builder = builder.header("X-Channel-Signature", v);
        }

        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

/// a minimal capsule payload for [`CHANNEL_CODE`].
pub fn capsule_payload(jti: &str, max_activations: i64) -> CapsulePayload {
    CapsulePayload {
        jti: jti.to_string(),
        channel_id: CHANNEL_CODE.to_string(),
        quota: CapsuleQuota {
            max_activations,
            valid_from: None,
            valid_to: None,
        },
        scope: CapsuleScope::default(),
        policy: None,
    }
}

/// assert an error response carries the expected symbolic code.
pub fn assert_error_code(status: StatusCode, body: &serde_json::Value, code: &str) {
    assert!(
        status.is_client_error() || status.is_server_error(),
        "expected error status, got {status}: {body}"
    );
    assert_eq!(
        body["code"].as_str(),
        Some(code),
        "expected code {code}, got body {body}"
    );
}
