//! database layer for latchkey.
//!
//! this crate provides persistent storage for:
//! - Channels, channel signing keys and sub-accounts
//! - Capability capsule (CAC) ledger records
//! - Replay-suppression rows
//! - Issued licenses
//! - Activation audit records
//!
//! it also owns the activation commit unit: the five logically related
//! writes of a successful activation (both replay rows, the sub-account
//! touch, the license insert, the quota increment and the audit insert)
//! are applied in one transaction - all of them or none.

#![warn(missing_docs)]

mod entity;
mod error;
mod migration;

pub use error::{CommitError, Error};

use std::future::Future;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Database as SeaOrmDatabase,
    DatabaseConnection, DatabaseTransaction, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use latchkey_types::{
    ActivationAudit, CapsuleRecord, CapsuleStatus, Channel, ChannelId, ChannelKey,
    DatabaseConfig, LicenseRecord, SubAccount, SubAccountId,
};

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// which replay-suppression axis a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayKind {
    /// the caller-chosen request nonce.
    Nonce,
    /// the hash derived from the accepted totp slot.
    TotpSlot,
}

impl ReplayKind {
    /// string form as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nonce => "nonce",
            Self::TotpSlot => "totp",
        }
    }

    fn replay_error(&self) -> CommitError {
        match self {
            Self::Nonce => CommitError::NonceReplay,
            Self::TotpSlot => CommitError::TotpReused,
        }
    }
}

/// outcome of capsule first-sight registration.
///
/// the distinction matters: for mutable fields (quota state, status) an
/// existing ledger row is authoritative over a freshly parsed payload.
#[derive(Debug, Clone)]
pub enum CapsuleSeen {
    /// a ledger row already existed; it wins over the parsed payload.
    Existing(CapsuleRecord),
    /// the verified payload was registered as a new ledger row.
    Created(CapsuleRecord),
}

impl CapsuleSeen {
    /// the authoritative ledger record either way.
    pub fn record(&self) -> &CapsuleRecord {
        match self {
            Self::Existing(record) | Self::Created(record) => record,
        }
    }
}

/// a license to be inserted by the commit unit.
#[derive(Debug, Clone)]
pub struct NewLicense {
    /// generated license identifier.
    pub license_id: String,
    /// device serial number.
    pub sn: String,
    /// capsule that authorized this license.
    pub cac_jti: String,
    /// serialized claim set.
    pub claims: String,
    /// full signed envelope string.
    pub envelope: String,
    /// issuance time.
    pub issued_at: DateTime<Utc>,
    /// expiry time.
    pub expires_at: DateTime<Utc>,
}

/// everything the commit unit writes for one successful activation.
#[derive(Debug, Clone)]
pub struct ActivationWrites {
    /// the authenticated channel.
    pub channel_id: ChannelId,
    /// the authenticated sub-account.
    pub subaccount_id: SubAccountId,
    /// sub-account name, recorded on the totp replay row.
    pub subaccount: String,
    /// the request nonce.
    pub nonce: String,
    /// the issue time claimed by the request.
    pub iat: i64,
    /// hash derived from the accepted totp slot.
    pub totp_slot_hash: String,
    /// when both replay rows stop suppressing.
    pub replay_expires_at: DateTime<Utc>,
    /// capsule whose quota is consumed.
    pub jti: String,
    /// the license to insert.
    pub license: NewLicense,
    /// the approval audit record.
    pub audit: ActivationAudit,
}

/// what a committed activation consumed.
#[derive(Debug, Clone, Copy)]
pub struct ActivationCommit {
    /// quota consumed after this activation.
    pub quota_used: i64,
    /// quota maximum of the capsule.
    pub quota_max: i64,
}

impl ActivationCommit {
    /// quota left on the capsule.
    pub fn quota_remaining(&self) -> i64 {
        (self.quota_max - self.quota_used).max(0)
    }
}

/// database trait for latchkey storage operations.
///
/// this trait abstracts over different database backends (sqlite,
/// postgresql). the activation flow only ever reads through it, except for
/// [`Database::commit_activation`] and [`Database::record_audit`].
pub trait Database: Send + Sync {
    // ─── Health Check ─────────────────────────────────────────────────────────

    /// ping the database to verify connectivity.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    // ─── Channel Operations ──────────────────────────────────────────────────

    /// create a new channel. returns the created channel with its assigned id.
    fn create_channel(&self, channel: &Channel) -> impl Future<Output = Result<Channel>> + Send;

    /// get a channel by its stable code.
    fn get_channel_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Channel>>> + Send;

    /// list all channels.
    fn list_channels(&self) -> impl Future<Output = Result<Vec<Channel>>> + Send;

    /// update a channel's status.
    fn set_channel_status(
        &self,
        id: ChannelId,
        status: latchkey_types::ChannelStatus,
    ) -> impl Future<Output = Result<()>> + Send;

    // ─── Channel Key Operations ──────────────────────────────────────────────

    /// register or replace a channel key identified by (channel, kid).
    ///
    /// replacing an existing key stamps `rotated_at`.
    fn upsert_channel_key(
        &self,
        key: &ChannelKey,
    ) -> impl Future<Output = Result<ChannelKey>> + Send;

    /// get a channel key by key id.
    fn get_channel_key(
        &self,
        channel_id: ChannelId,
        kid: &str,
    ) -> impl Future<Output = Result<Option<ChannelKey>>> + Send;

    /// list all keys registered for a channel.
    fn list_channel_keys(
        &self,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<Vec<ChannelKey>>> + Send;

    // ─── Sub-Account Operations ──────────────────────────────────────────────

    /// create a new sub-account. returns it with its assigned id.
    fn create_subaccount(
        &self,
        sub: &SubAccount,
    ) -> impl Future<Output = Result<SubAccount>> + Send;

    /// get a sub-account by name under a channel.
    fn get_subaccount(
        &self,
        channel_id: ChannelId,
        name: &str,
    ) -> impl Future<Output = Result<Option<SubAccount>>> + Send;

    /// list all sub-accounts under a channel.
    fn list_subaccounts(
        &self,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<Vec<SubAccount>>> + Send;

    // ─── Capsule Ledger Operations ───────────────────────────────────────────

    /// get a capsule ledger record by capsule identity.
    fn get_capsule(&self, jti: &str)
    -> impl Future<Output = Result<Option<CapsuleRecord>>> + Send;

    /// first-sight registration: return the existing ledger row for this
    /// capsule, or create one from the verified payload.
    fn get_or_create_capsule(
        &self,
        record: &CapsuleRecord,
    ) -> impl Future<Output = Result<CapsuleSeen>> + Send;

    /// list all capsules registered for a channel.
    fn list_capsules(
        &self,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<Vec<CapsuleRecord>>> + Send;

    /// flip a capsule's status (revocation is out-of-band administration).
    fn set_capsule_status(
        &self,
        jti: &str,
        status: CapsuleStatus,
    ) -> impl Future<Output = Result<()>> + Send;

    // ─── Replay Guard Reads ──────────────────────────────────────────────────

    /// whether a still-valid suppression row exists for (channel, kind, token).
    fn replay_seen(
        &self,
        channel_id: ChannelId,
        kind: ReplayKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    // ─── License Operations ──────────────────────────────────────────────────

    /// count non-revoked licenses for a device serial.
    fn count_unrevoked_licenses(&self, sn: &str) -> impl Future<Output = Result<u64>> + Send;

    /// get an issued license by its license identifier.
    fn get_license(
        &self,
        license_id: &str,
    ) -> impl Future<Output = Result<Option<LicenseRecord>>> + Send;

    // ─── Audit Operations ────────────────────────────────────────────────────

    /// append an audit record (used for denials; approvals go through the
    /// commit unit).
    fn record_audit(&self, audit: &ActivationAudit) -> impl Future<Output = Result<()>> + Send;

    /// list recent audit records, newest first.
    fn list_audits(&self, limit: u64)
    -> impl Future<Output = Result<Vec<ActivationAudit>>> + Send;

    // ─── The Commit Unit ─────────────────────────────────────────────────────

    /// apply all writes of a successful activation atomically.
    ///
    /// both replay axes are re-checked inside the transaction and the quota
    /// increment is a compare-and-swap, so a race lost between validation
    /// and commit surfaces as the corresponding protocol rejection with
    /// nothing written.
    fn commit_activation(
        &self,
        writes: ActivationWrites,
    ) -> impl Future<Output = std::result::Result<ActivationCommit, CommitError>> + Send;
}

/// the main database implementation using sea-orm.
#[derive(Clone)]
pub struct LatchkeyDb {
    conn: DatabaseConnection,
}

impl LatchkeyDb {
    /// create a new database connection from config.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = Self::build_connection_url(config)?;
        let conn: DatabaseConnection = SeaOrmDatabase::connect(&url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };

        // enable WAL mode for sqlite if configured
        if config.db_type == "sqlite" && config.write_ahead_log {
            db.enable_wal_mode().await?;
        }

        db.migrate().await?;
        Ok(db)
    }

    /// create an in-memory sqlite database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn: DatabaseConnection = SeaOrmDatabase::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        Ok(())
    }

    /// enable write-ahead logging mode for sqlite.
    ///
    /// WAL mode allows concurrent reads during writes. must be called
    /// before any writes.
    async fn enable_wal_mode(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("PRAGMA journal_mode=WAL")
            .await
            .map_err(|e| Error::Connection(format!("failed to enable WAL mode: {}", e)))?;
        tracing::info!("sqlite WAL mode enabled");
        Ok(())
    }

    /// build a sea-orm compatible connection url from config.
    fn build_connection_url(config: &DatabaseConfig) -> Result<String> {
        match config.db_type.as_str() {
            "sqlite" => {
                let path = if config.connection_string.starts_with("sqlite:") {
                    config.connection_string.clone()
                } else {
                    format!("sqlite:{}", config.connection_string)
                };
                // add ?mode=rwc to create the file if it doesn't exist
                if path.contains('?') {
                    Ok(path)
                } else {
                    Ok(format!("{}?mode=rwc", path))
                }
            }
            "postgres" | "postgresql" => Ok(config.connection_string.clone()),
            other => Err(Error::InvalidData(format!(
                "unsupported database type: {}",
                other
            ))),
        }
    }

    /// re-check one suppression axis inside the commit transaction and
    /// write its row. an expired row is replaced in place; a still-valid
    /// one aborts the transaction with the axis' protocol rejection.
    async fn write_replay_row(
        txn: &DatabaseTransaction,
        writes: &ActivationWrites,
        kind: ReplayKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), CommitError> {
        let existing = entity::activation_request::Entity::find()
            .filter(entity::activation_request::Column::ChannelId.eq(writes.channel_id.0 as i64))
            .filter(entity::activation_request::Column::Kind.eq(kind.as_str()))
            .filter(entity::activation_request::Column::Token.eq(token))
            .one(txn)
            .await?;

        let subaccount = match kind {
            ReplayKind::Nonce => None,
            ReplayKind::TotpSlot => Some(writes.subaccount.clone()),
        };

        match existing {
            Some(row) if row.expires_at > now => Err(kind.replay_error()),
            Some(row) => {
                // the old window has lapsed; the token may be used again
                let mut model = row.into_active_model();
                model.iat = Set(writes.iat);
                model.expires_at = Set(writes.replay_expires_at);
                model.created_at = Set(now);
                model.update(txn).await?;
                Ok(())
            }
            None => {
                let model = entity::activation_request::ActiveModel {
                    id: NotSet,
                    channel_id: Set(writes.channel_id.0 as i64),
                    kind: Set(kind.as_str().to_string()),
                    token: Set(token.to_string()),
                    subaccount: Set(subaccount),
                    iat: Set(writes.iat),
                    expires_at: Set(writes.replay_expires_at),
                    created_at: Set(now),
                };
                model.insert(txn).await?;
                Ok(())
            }
        }
    }
}

impl Database for LatchkeyDb {
    // health check

    async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    // channel operations

    async fn create_channel(&self, channel: &Channel) -> Result<Channel> {
        let model: entity::channel::ActiveModel = channel.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_channel_by_code(&self, code: &str) -> Result<Option<Channel>> {
        let result = entity::channel::Entity::find()
            .filter(entity::channel::Column::Code.eq(code))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let results = entity::channel::Entity::find().all(&self.conn).await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn set_channel_status(
        &self,
        id: ChannelId,
        status: latchkey_types::ChannelStatus,
    ) -> Result<()> {
        entity::channel::Entity::update_many()
            .col_expr(
                entity::channel::Column::Status,
                sea_orm::sea_query::Expr::value(status.as_str()),
            )
            .filter(entity::channel::Column::Id.eq(id.0 as i64))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    // channel key operations

    async fn upsert_channel_key(&self, key: &ChannelKey) -> Result<ChannelKey> {
        let existing = entity::channel_key::Entity::find()
            .filter(entity::channel_key::Column::ChannelId.eq(key.channel_id.0 as i64))
            .filter(entity::channel_key::Column::Kid.eq(&key.kid))
            .one(&self.conn)
            .await?;

        let result = match existing {
            Some(row) => {
                let mut model = row.into_active_model();
                model.algorithm = Set(key.algorithm.as_str().to_string());
                model.public_key = Set(key.public_key.clone());
                model.status = Set(key.status.as_str().to_string());
                model.rotated_at = Set(Some(Utc::now()));
                model.update(&self.conn).await?
            }
            None => {
                let model: entity::channel_key::ActiveModel = key.into();
                model.insert(&self.conn).await?
            }
        };
        Ok(result.into())
    }

    async fn get_channel_key(
        &self,
        channel_id: ChannelId,
        kid: &str,
    ) -> Result<Option<ChannelKey>> {
        let result = entity::channel_key::Entity::find()
            .filter(entity::channel_key::Column::ChannelId.eq(channel_id.0 as i64))
            .filter(entity::channel_key::Column::Kid.eq(kid))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn list_channel_keys(&self, channel_id: ChannelId) -> Result<Vec<ChannelKey>> {
        let results = entity::channel_key::Entity::find()
            .filter(entity::channel_key::Column::ChannelId.eq(channel_id.0 as i64))
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    // sub-account operations

    async fn create_subaccount(&self, sub: &SubAccount) -> Result<SubAccount> {
        let model: entity::subaccount::ActiveModel = sub.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_subaccount(
        &self,
        channel_id: ChannelId,
        name: &str,
    ) -> Result<Option<SubAccount>> {
        let result = entity::subaccount::Entity::find()
            .filter(entity::subaccount::Column::ChannelId.eq(channel_id.0 as i64))
            .filter(entity::subaccount::Column::Name.eq(name))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn list_subaccounts(&self, channel_id: ChannelId) -> Result<Vec<SubAccount>> {
        let results = entity::subaccount::Entity::find()
            .filter(entity::subaccount::Column::ChannelId.eq(channel_id.0 as i64))
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    // capsule ledger operations

    async fn get_capsule(&self, jti: &str) -> Result<Option<CapsuleRecord>> {
        let result = entity::cac_token::Entity::find()
            .filter(entity::cac_token::Column::Jti.eq(jti))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn get_or_create_capsule(&self, record: &CapsuleRecord) -> Result<CapsuleSeen> {
        if let Some(existing) = self.get_capsule(&record.jti).await? {
            return Ok(CapsuleSeen::Existing(existing));
        }

        let model: entity::cac_token::ActiveModel = record.into();
        match model.insert(&self.conn).await {
            Ok(inserted) => Ok(CapsuleSeen::Created(inserted.into())),
            Err(err) if matches!(err.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) => {
                // lost a first-sight race; the row that won is authoritative
                let existing = self.get_capsule(&record.jti).await?.ok_or_else(|| {
                    Error::InvalidData(format!("capsule {} vanished after insert race", record.jti))
                })?;
                Ok(CapsuleSeen::Existing(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_capsules(&self, channel_id: ChannelId) -> Result<Vec<CapsuleRecord>> {
        let results = entity::cac_token::Entity::find()
            .filter(entity::cac_token::Column::ChannelId.eq(channel_id.0 as i64))
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn set_capsule_status(&self, jti: &str, status: CapsuleStatus) -> Result<()> {
        entity::cac_token::Entity::update_many()
            .col_expr(
                entity::cac_token::Column::Status,
                sea_orm::sea_query::Expr::value(status.as_str()),
            )
            .col_expr(
                entity::cac_token::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(entity::cac_token::Column::Jti.eq(jti))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    // replay guard reads

    async fn replay_seen(
        &self,
        channel_id: ChannelId,
        kind: ReplayKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let row = entity::activation_request::Entity::find()
            .filter(entity::activation_request::Column::ChannelId.eq(channel_id.0 as i64))
            .filter(entity::activation_request::Column::Kind.eq(kind.as_str()))
            .filter(entity::activation_request::Column::Token.eq(token))
            .one(&self.conn)
            .await?;
        Ok(row.map(|r| r.expires_at > now).unwrap_or(false))
    }

    // license operations

    async fn count_unrevoked_licenses(&self, sn: &str) -> Result<u64> {
        let count = entity::license::Entity::find()
            .filter(entity::license::Column::Sn.eq(sn))
            .filter(entity::license::Column::RevokedAt.is_null())
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    async fn get_license(&self, license_id: &str) -> Result<Option<LicenseRecord>> {
        let result = entity::license::Entity::find()
            .filter(entity::license::Column::LicenseId.eq(license_id))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    // audit operations

    async fn record_audit(&self, audit: &ActivationAudit) -> Result<()> {
        let model: entity::activation_audit::ActiveModel = audit.into();
        model.insert(&self.conn).await?;
        Ok(())
    }

    async fn list_audits(&self, limit: u64) -> Result<Vec<ActivationAudit>> {
        let results = entity::activation_audit::Entity::find()
            .order_by_desc(entity::activation_audit::Column::Id)
            .paginate(&self.conn, limit)
            .fetch_page(0)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    // the commit unit

    async fn commit_activation(
        &self,
        writes: ActivationWrites,
    ) -> std::result::Result<ActivationCommit, CommitError> {
        let now = Utc::now();
        let txn = self.conn.begin().await?;

        // 1 + 2: both replay axes, re-checked under the transaction
        Self::write_replay_row(&txn, &writes, ReplayKind::Nonce, &writes.nonce, now).await?;
        Self::write_replay_row(
            &txn,
            &writes,
            ReplayKind::TotpSlot,
            &writes.totp_slot_hash,
            now,
        )
        .await?;

        // 3: sub-account last-used touch
        entity::subaccount::Entity::update_many()
            .col_expr(
                entity::subaccount::Column::LastUsedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(entity::subaccount::Column::Id.eq(writes.subaccount_id.0 as i64))
            .exec(&txn)
            .await?;

        // 4: license insert
        let license_model = entity::license::ActiveModel {
            id: NotSet,
            license_id: Set(writes.license.license_id.clone()),
            sn: Set(writes.license.sn.clone()),
            channel_id: Set(writes.channel_id.0 as i64),
            cac_jti: Set(writes.license.cac_jti.clone()),
            claims: Set(writes.license.claims.clone()),
            envelope: Set(writes.license.envelope.clone()),
            issued_at: Set(writes.license.issued_at),
            expires_at: Set(writes.license.expires_at),
            revoked_at: Set(None),
        };
        license_model.insert(&txn).await?;

        // 5: quota compare-and-swap
        let capsule = entity::cac_token::Entity::find()
            .filter(entity::cac_token::Column::Jti.eq(&writes.jti))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                CommitError::Db(Error::InvalidData(format!(
                    "capsule {} missing at commit",
                    writes.jti
                )))
            })?;

        if capsule.status != CapsuleStatus::Active.as_str()
            || capsule.quota_used >= capsule.quota_max
        {
            return Err(CommitError::QuotaExhausted);
        }

        let updated = entity::cac_token::Entity::update_many()
            .col_expr(
                entity::cac_token::Column::QuotaUsed,
                sea_orm::sea_query::Expr::value(capsule.quota_used + 1),
            )
            .col_expr(
                entity::cac_token::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(entity::cac_token::Column::Id.eq(capsule.id))
            .filter(entity::cac_token::Column::QuotaUsed.eq(capsule.quota_used))
            .filter(entity::cac_token::Column::Status.eq(CapsuleStatus::Active.as_str()))
            .exec(&txn)
            .await?;

        if updated.rows_affected != 1 {
            // another writer touched the row between our read and swap
            return Err(CommitError::Db(Error::InvalidData(format!(
                "concurrent quota update for capsule {}",
                writes.jti
            ))));
        }

        // 6: approval audit
        let audit_model: entity::activation_audit::ActiveModel = (&writes.audit).into();
        audit_model.insert(&txn).await?;

        txn.commit().await?;

        Ok(ActivationCommit {
            quota_used: capsule.quota_used + 1,
            quota_max: capsule.quota_max,
        })
    }
}
