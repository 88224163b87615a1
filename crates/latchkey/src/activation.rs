//! the activation orchestrator.
//!
//! sequences one activation attempt through a fixed pipeline of typed
//! validation steps:
//!
//! `AuthenticatingChannel -> AuthenticatingOperator -> ValidatingCapsule ->
//! CheckingReplay -> CheckingScope -> Issuing -> Committed`
//!
//! every step is fail-closed and terminal for the request; nothing is
//! written until the commit unit, which applies all five writes of a
//! successful activation in one transaction. protocol rejections are safe
//! to retry with a fresh nonce; a failed commit is a server fault and is
//! reported as such because a retry with the same nonce and code would
//! then look replayed.

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use latchkey_db::{
    ActivationWrites, CommitError, Database, NewLicense, ReplayKind,
};
use latchkey_seal::{
    channel_key_from_pem, decode_header, sign_compact, verify_compact, verify_detached,
    verify_totp, EnvelopeType, TotpMatch,
};
use latchkey_types::{
    ActivationAudit, CapsulePayload, CapsuleRecord, Channel, LicenseClaims, Nonce, SubAccount,
    LICENSE_SCHEMA_VERSION,
};

use crate::AppState;

/// prefix of generated license identifiers.
const LICENSE_ID_PREFIX: &str = "LIC";

/// upper bound on the transactional commit. a timeout is an infrastructure
/// fault, not a protocol rejection.
const COMMIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// terminal failure of an activation attempt.
///
/// every variant maps to exactly one symbolic wire code via
/// [`ActivationError::code`]. none are retried by the server.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// a required request header was absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// the request body was empty.
    #[error("request body is empty")]
    EmptyBody,

    /// the request body was not syntactically valid json.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// the request body was json but not a valid activation request.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// body channel_id and x-channel-id header disagree.
    #[error("body channel_id does not match X-Channel-Id header")]
    ChannelMismatch,

    /// request `iat` outside the accepted clock-skew window.
    #[error("request timestamp outside accepted window")]
    TimestampOutOfRange,

    /// nonce shorter than the minimum length.
    #[error("nonce too short")]
    NonceTooShort,

    /// channel unknown or not active.
    #[error("channel unknown or disabled")]
    ChannelDisabled,

    /// no usable key registered under the requested kid.
    #[error("no active channel key for kid")]
    ChannelKeyMissing,

    /// registered key material could not be parsed.
    #[error("channel key could not be loaded")]
    KeyLoadFailed,

    /// the detached envelope failed verification.
    #[error("request signature invalid")]
    SignatureInvalid,

    /// the nonce was already used within the suppression window.
    #[error("nonce already used")]
    NonceReplay,

    /// the one-time code was already used for its time slot.
    #[error("one-time code already used")]
    TotpReused,

    /// sub-account unknown, disabled, or unusable.
    #[error("sub-account unknown or disabled")]
    SubaccountInvalid,

    /// the submitted one-time code did not validate.
    #[error("one-time code invalid")]
    TotpFailed,

    /// the capsule failed signature or structural validation.
    #[error("capsule invalid: {0}")]
    CacInvalid(String),

    /// the capsule names a different channel than the request.
    #[error("capsule issued for a different channel")]
    CacChannelMismatch,

    /// the capsule validity window has not opened yet.
    #[error("capsule not yet valid")]
    CacNotYetValid,

    /// the capsule validity window has closed.
    #[error("capsule expired")]
    CacExpired,

    /// no quota left on the capsule.
    #[error("capsule quota exhausted")]
    QuotaExhausted,

    /// requested model not in the capsule's allow-list.
    #[error("device model not permitted by capsule scope")]
    ScopeViolation,

    /// per-serial license cap already reached.
    #[error("serial already holds the maximum number of licenses")]
    AlreadyActivated,

    /// infrastructure fault; the request may have been rolled back
    /// mid-commit and must not be retried with the same nonce.
    #[error("internal server error")]
    Server(String),
}

impl ActivationError {
    /// the symbolic wire code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader(_) => "MISSING_HEADER",
            Self::EmptyBody => "EMPTY_BODY",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::ChannelMismatch => "CHANNEL_MISMATCH",
            Self::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            Self::NonceTooShort => "NONCE_TOO_SHORT",
            Self::ChannelDisabled => "CHANNEL_DISABLED",
            Self::ChannelKeyMissing => "CHANNEL_KEY_MISSING",
            Self::KeyLoadFailed => "KEY_LOAD_FAILED",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::NonceReplay => "NONCE_REPLAY",
            Self::TotpReused => "TOTP_REUSED",
            Self::SubaccountInvalid => "SUBACCOUNT_INVALID",
            Self::TotpFailed => "TOTP_FAILED",
            Self::CacInvalid(_) => "CAC_INVALID",
            Self::CacChannelMismatch => "CAC_CHANNEL_MISMATCH",
            Self::CacNotYetValid => "CAC_NOT_YET_VALID",
            Self::CacExpired => "CAC_EXPIRED",
            Self::QuotaExhausted => "QUOTA_EXHAUSTED",
            Self::ScopeViolation => "SCOPE_VIOLATION",
            Self::AlreadyActivated => "ALREADY_ACTIVATED",
            Self::Server(_) => "SERVER_ERROR",
        }
    }
}

/// the activation request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    /// channel code; must equal the x-channel-id header.
    pub channel_id: String,
    /// operator sub-account name.
    pub subaccount: String,
    /// submitted one-time code.
    pub totp_code: String,
    /// capability capsule, compact envelope string.
    pub cac_token: String,
    /// device serial number.
    pub sn: String,
    /// declared device model.
    pub model: String,
    /// declared firmware hash.
    pub fw_hash: String,
    /// device public key.
    pub device_pubkey: String,
    /// caller-chosen once-only token.
    pub nonce: String,
    /// issue time claimed by the caller, unix seconds.
    pub iat: i64,
    /// opaque client metadata, recorded but not interpreted.
    #[serde(default)]
    pub client_meta: Option<serde_json::Value>,
    /// optional region tag, recorded but not interpreted.
    #[serde(default)]
    pub region: Option<String>,
}

/// a committed activation, ready to be serialized into the response.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    /// generated license identifier.
    pub license_id: String,
    /// full signed license envelope.
    pub license_jws: String,
    /// license expiry, unix seconds.
    pub expires_at: i64,
    /// quota left on the capsule after this activation.
    pub quota_remaining: i64,
}

/// the authentication headers of an activation request.
#[derive(Debug, Clone, Copy)]
pub struct RequestAuth<'a> {
    /// x-channel-id
    pub channel_id: Option<&'a str>,
    /// x-channel-kid
    pub kid: Option<&'a str>,
    /// x-channel-signature (detached envelope)
    pub signature: Option<&'a str>,
}

/// sha-256 hex of a device public key, for audit correlation without key
/// disclosure.
pub fn device_pubkey_hash(device_pubkey: &str) -> String {
    hex::encode(Sha256::digest(device_pubkey.as_bytes()))
}

/// derive the replay-suppression hash for an accepted totp slot.
///
/// the hash is bound to the exact slot index, not the code string: codes
/// are six digits and would collide cheaply across unrelated requests.
fn slot_request_hash(channel_code: &str, subaccount: &str, slot: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(channel_code.as_bytes());
    hasher.update(b"|");
    hasher.update(subaccount.as_bytes());
    hasher.update(b"|");
    hasher.update(slot.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// generate a fresh, human-traceable license identifier.
fn generate_license_id(now: DateTime<Utc>) -> String {
    let serial: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}-{}-{:06}", LICENSE_ID_PREFIX, now.format("%y%m%d"), serial)
}

/// run one activation attempt to completion and record its audit trail.
///
/// approvals write their audit row inside the commit unit; denials are
/// recorded best-effort afterwards (a denial writes no protocol state, so
/// it sits outside the atomicity invariant).
pub async fn process(
    state: &AppState,
    auth: RequestAuth<'_>,
    body: &[u8],
) -> Result<ActivationOutcome, ActivationError> {
    let result = run_pipeline(state, auth, body).await;

    if let Err(err) = &result {
        let mut audit = ActivationAudit::denied(
            auth.channel_id.unwrap_or_default().to_string(),
            err.code().to_string(),
        );
        if let Ok(req) = serde_json::from_slice::<ActivateRequest>(body) {
            audit.subaccount = Some(req.subaccount);
            audit.sn = Some(req.sn);
            audit.model = Some(req.model);
            audit.device_pubkey_hash = Some(device_pubkey_hash(&req.device_pubkey));
        }
        if let Err(db_err) = state.db.record_audit(&audit).await {
            tracing::warn!(error = %db_err, "failed to record denial audit");
        }
    }

    result
}

async fn run_pipeline(
    state: &AppState,
    auth: RequestAuth<'_>,
    body: &[u8],
) -> Result<ActivationOutcome, ActivationError> {
    let now = Utc::now();
    let cfg = &state.config.activation;

    let (req, nonce) = parse_request(auth, body, now.timestamp(), cfg.clock_skew_secs)?;

    // AuthenticatingChannel
    let channel = authenticate_channel(state, auth, body).await?;

    // AuthenticatingOperator
    let (subaccount, matched) = authenticate_operator(state, &channel, &req, now).await?;

    // ValidatingCapsule
    let capsule = validate_capsule(state, auth, &channel, &req, now).await?;

    // CheckingReplay
    let slot_hash = slot_request_hash(&channel.code, &subaccount.name, matched.slot);
    check_replay(state, &channel, &nonce, &slot_hash, now).await?;

    // CheckingScope
    check_scope(state, &capsule, &req).await?;

    // Issuing
    let expires_at = license_expiry(&capsule, now, cfg.default_license_days, cfg.expiry_fallback_secs);
    let license_id = generate_license_id(now);
    let claims = LicenseClaims {
        license_id: license_id.clone(),
        sn: req.sn.clone(),
        channel: channel.code.clone(),
        subaccount: subaccount.name.clone(),
        device_pubkey: req.device_pubkey.clone(),
        model: req.model.clone(),
        fw_hash: req.fw_hash.clone(),
        cac_jti: capsule.jti.clone(),
        iat: now.timestamp(),
        exp: expires_at,
        version: LICENSE_SCHEMA_VERSION,
    };
    let claims_json =
        serde_json::to_string(&claims).map_err(|e| ActivationError::Server(e.to_string()))?;
    let envelope = sign_compact(
        &claims,
        state.keys.signing_key(),
        &state.config.platform_kid,
        EnvelopeType::License,
    )
    .map_err(|e| ActivationError::Server(e.to_string()))?;

    // Issuing -> Committed: the only transition that writes
    let mut audit = ActivationAudit::approved(
        channel.code.clone(),
        subaccount.name.clone(),
        req.sn.clone(),
    );
    audit.model = Some(req.model.clone());
    audit.device_pubkey_hash = Some(device_pubkey_hash(&req.device_pubkey));
    audit.detail = Some(license_id.clone());

    let writes = ActivationWrites {
        channel_id: channel.id,
        subaccount_id: subaccount.id,
        subaccount: subaccount.name.clone(),
        nonce: nonce.into_inner(),
        iat: req.iat,
        totp_slot_hash: slot_hash,
        replay_expires_at: now + chrono::Duration::seconds(cfg.nonce_ttl_secs),
        jti: capsule.jti.clone(),
        license: NewLicense {
            license_id: license_id.clone(),
            sn: req.sn.clone(),
            cac_jti: capsule.jti.clone(),
            claims: claims_json,
            envelope: envelope.clone(),
            issued_at: now,
            expires_at: Utc
                .timestamp_opt(expires_at, 0)
                .single()
                .unwrap_or_else(|| now + chrono::Duration::seconds(cfg.expiry_fallback_secs)),
        },
        audit,
    };

    let committed = tokio::time::timeout(COMMIT_TIMEOUT, state.db.commit_activation(writes))
        .await
        .map_err(|_| ActivationError::Server("commit timed out".to_string()))?;
    let commit = match committed {
        Ok(commit) => commit,
        Err(CommitError::NonceReplay) => return Err(ActivationError::NonceReplay),
        Err(CommitError::TotpReused) => return Err(ActivationError::TotpReused),
        Err(CommitError::QuotaExhausted) => return Err(ActivationError::QuotaExhausted),
        Err(CommitError::Db(e)) => return Err(ActivationError::Server(e.to_string())),
    };

    tracing::info!(
        channel = %channel.code,
        sn = %req.sn,
        license_id = %license_id,
        quota_remaining = commit.quota_remaining(),
        "activation committed"
    );

    Ok(ActivationOutcome {
        license_id,
        license_jws: envelope,
        expires_at,
        quota_remaining: commit.quota_remaining(),
    })
}

/// parse and structurally validate the request.
fn parse_request(
    auth: RequestAuth<'_>,
    body: &[u8],
    now_unix: i64,
    clock_skew_secs: i64,
) -> Result<(ActivateRequest, Nonce), ActivationError> {
    let header_channel = auth
        .channel_id
        .ok_or(ActivationError::MissingHeader("X-Channel-Id"))?;
    auth.kid
        .ok_or(ActivationError::MissingHeader("X-Channel-Kid"))?;
    auth.signature
        .ok_or(ActivationError::MissingHeader("X-Channel-Signature"))?;

    if body.is_empty() {
        return Err(ActivationError::EmptyBody);
    }

    let req: ActivateRequest = serde_json::from_slice(body).map_err(|e| {
        if e.is_data() {
            ActivationError::InvalidPayload(e.to_string())
        } else {
            ActivationError::InvalidJson(e.to_string())
        }
    })?;

    if req.channel_id != header_channel {
        return Err(ActivationError::ChannelMismatch);
    }

    if (now_unix - req.iat).abs() > clock_skew_secs {
        return Err(ActivationError::TimestampOutOfRange);
    }

    let nonce = Nonce::new(req.nonce.clone()).map_err(|_| ActivationError::NonceTooShort)?;

    Ok((req, nonce))
}

/// authenticate the channel: status, registered key, detached signature
/// over the exact request bytes.
async fn authenticate_channel(
    state: &AppState,
    auth: RequestAuth<'_>,
    body: &[u8],
) -> Result<Channel, ActivationError> {
    // parse_request guarantees the headers are present
    let header_channel = auth.channel_id.unwrap_or_default();
    let kid = auth.kid.unwrap_or_default();
    let signature = auth.signature.unwrap_or_default();

    let channel = state
        .db
        .get_channel_by_code(header_channel)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?
        .filter(Channel::is_active)
        .ok_or(ActivationError::ChannelDisabled)?;

    let key = state
        .db
        .get_channel_key(channel.id, kid)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?
        .filter(|k| k.is_usable())
        .ok_or(ActivationError::ChannelKeyMissing)?;

    let verifying =
        channel_key_from_pem(&key.public_key).map_err(|_| ActivationError::KeyLoadFailed)?;

    verify_detached(signature, body, &verifying, "activate")
        .map_err(|_| ActivationError::SignatureInvalid)?;

    Ok(channel)
}

/// authenticate the operator: sub-account status and totp code.
async fn authenticate_operator(
    state: &AppState,
    channel: &Channel,
    req: &ActivateRequest,
    now: DateTime<Utc>,
) -> Result<(SubAccount, TotpMatch), ActivationError> {
    let cfg = &state.config.activation;

    let subaccount = state
        .db
        .get_subaccount(channel.id, &req.subaccount)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?
        .filter(SubAccount::is_active)
        .ok_or(ActivationError::SubaccountInvalid)?;

    let matched = verify_totp(
        &subaccount.totp_secret,
        &req.totp_code,
        now.timestamp(),
        cfg.totp_step_secs,
        cfg.totp_drift_steps,
    )
    .map_err(|_| ActivationError::SubaccountInvalid)?
    .ok_or(ActivationError::TotpFailed)?;

    Ok((subaccount, matched))
}

/// validate the capability capsule and register it on first sight.
///
/// the capsule is trust-rooted in the *issuing channel's* key, never the
/// platform key: the capsule header's kid selects among the channel's
/// registered keys, falling back to the key that signed the request.
async fn validate_capsule(
    state: &AppState,
    auth: RequestAuth<'_>,
    channel: &Channel,
    req: &ActivateRequest,
    now: DateTime<Utc>,
) -> Result<CapsuleRecord, ActivationError> {
    let capsule_header = decode_header(&req.cac_token)
        .map_err(|e| ActivationError::CacInvalid(e.to_string()))?;

    let kid = capsule_header
        .kid
        .as_deref()
        .or(auth.kid)
        .ok_or_else(|| ActivationError::CacInvalid("no key id for capsule".to_string()))?;

    let key = state
        .db
        .get_channel_key(channel.id, kid)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?
        .filter(|k| k.is_usable())
        .ok_or_else(|| ActivationError::CacInvalid(format!("unknown capsule key: {kid}")))?;
    let verifying = channel_key_from_pem(&key.public_key)
        .map_err(|_| ActivationError::KeyLoadFailed)?;

    let (_, payload): (_, CapsulePayload) =
        verify_compact(&req.cac_token, &verifying, EnvelopeType::Capsule)
            .map_err(|e| ActivationError::CacInvalid(e.to_string()))?;
    payload
        .validate()
        .map_err(|e| ActivationError::CacInvalid(e.to_string()))?;

    if payload.channel_id != channel.code {
        return Err(ActivationError::CacChannelMismatch);
    }

    // first-sight registration; an existing ledger row wins for all
    // mutable state, so a replayed capsule can never reset quota_used
    let fresh = CapsuleRecord::from_payload(channel.id, &payload)
        .map_err(|e| ActivationError::CacInvalid(e.to_string()))?;
    let seen = state
        .db
        .get_or_create_capsule(&fresh)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?;
    let record = seen.record().clone();

    if record.status != latchkey_types::CapsuleStatus::Active {
        return Err(ActivationError::CacInvalid("capsule revoked".to_string()));
    }

    let now_unix = now.timestamp();
    if let Some(valid_from) = record.valid_from
        && now_unix < valid_from
    {
        return Err(ActivationError::CacNotYetValid);
    }
    if let Some(valid_to) = record.valid_to
        && now_unix > valid_to
    {
        return Err(ActivationError::CacExpired);
    }

    Ok(record)
}

/// both suppression axes must be clear before issuing.
async fn check_replay(
    state: &AppState,
    channel: &Channel,
    nonce: &Nonce,
    slot_hash: &str,
    now: DateTime<Utc>,
) -> Result<(), ActivationError> {
    if state
        .db
        .replay_seen(channel.id, ReplayKind::Nonce, nonce.as_str(), now)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?
    {
        return Err(ActivationError::NonceReplay);
    }

    if state
        .db
        .replay_seen(channel.id, ReplayKind::TotpSlot, slot_hash, now)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?
    {
        return Err(ActivationError::TotpReused);
    }

    Ok(())
}

/// quota, model allow-list and per-serial cap, all read from the ledger
/// record (replay suppression has already passed, so an exhausted capsule
/// is reported as such only for genuinely fresh requests).
async fn check_scope(
    state: &AppState,
    capsule: &CapsuleRecord,
    req: &ActivateRequest,
) -> Result<(), ActivationError> {
    if capsule.quota_used >= capsule.quota_max {
        return Err(ActivationError::QuotaExhausted);
    }

    if !capsule.scope.permits_model(&req.model) {
        return Err(ActivationError::ScopeViolation);
    }

    let issued = state
        .db
        .count_unrevoked_licenses(&req.sn)
        .await
        .map_err(|e| ActivationError::Server(e.to_string()))?;
    if issued as i64 >= capsule.scope.effective_max_per_sn() {
        return Err(ActivationError::AlreadyActivated);
    }

    Ok(())
}

/// compute the license expiry: capsule `valid_to` wins, else the default
/// validity; a capsule expiring mid-request gets the short fallback
/// instead of an already-expired license.
fn license_expiry(
    capsule: &CapsuleRecord,
    now: DateTime<Utc>,
    default_days: i64,
    fallback_secs: i64,
) -> i64 {
    let now_unix = now.timestamp();
    let expiry = capsule
        .valid_to
        .unwrap_or(now_unix + default_days * 86_400);
    if expiry <= now_unix {
        now_unix + fallback_secs
    } else {
        expiry
    }
}
