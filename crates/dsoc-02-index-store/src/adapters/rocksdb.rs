//! # RocksDB Index Adapter
//!
//! Durable `IndexStore` backed by RocksDB, one column family per table.
//! Values are bincode-encoded. Ids are stored big-endian so iteration order
//! is id order.
//!
//! ## Column Families
//!
//! - `tickets` - ticket snapshots by ticket id
//! - `stake_tokens` - stake tokens by token id
//! - `reward_tokens` - reward tokens by token id
//! - `owner_index` - `owner ++ token_id` -> empty
//! - `users` - user records by address
//! - `pending` - pending-reconciliation entries
//!
//! Conditional writes read the stored version and commit one `WriteBatch`
//! while holding the writer lock, so the compare and the set cannot
//! interleave with another writer.

use crate::domain::{
    version_admits, PendingKey, PendingReconciliation, Projection, WriteOutcome,
};
use crate::error::{IndexError, IndexResult};
use crate::ports::outbound::IndexStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{
    Address, Balances, RewardToken, Role, StakeToken, SystemTimeSource, TicketId,
    TicketSnapshot, TicketStatus, TimeSource, TokenId, UserRecord,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const CF_TICKETS: &str = "tickets";
pub const CF_STAKE_TOKENS: &str = "stake_tokens";
pub const CF_REWARD_TOKENS: &str = "reward_tokens";
pub const CF_OWNER_INDEX: &str = "owner_index";
pub const CF_USERS: &str = "users";
pub const CF_PENDING: &str = "pending";

pub const COLUMN_FAMILIES: &[&str] = &[
    CF_TICKETS,
    CF_STAKE_TOKENS,
    CF_REWARD_TOKENS,
    CF_OWNER_INDEX,
    CF_USERS,
    CF_PENDING,
];

/// RocksDB index configuration
#[derive(Debug, Clone)]
pub struct RocksDbIndexConfig {
    /// Path to the database directory
    pub path: String,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write batch
    pub sync_writes: bool,
}

impl Default for RocksDbIndexConfig {
    fn default() -> Self {
        Self {
            path: "./data/index".to_string(),
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbIndexConfig {
    /// Small buffers, no sync
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

fn storage_err(context: &str, err: rocksdb::Error) -> IndexError {
    IndexError::Storage {
        reason: format!("{context}: {err}"),
    }
}

fn encode<T: Serialize>(value: &T) -> IndexResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> IndexResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn owner_key(owner: &Address, token_id: TokenId) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(&token_id.to_be_bytes());
    key
}

/// Token id suffix of an `owner_index` key.
fn owned_token_id(key: &[u8], prefix_len: usize) -> IndexResult<TokenId> {
    key.get(prefix_len..)
        .and_then(|suffix| <[u8; 8]>::try_from(suffix).ok())
        .map(TokenId::from_be_bytes)
        .ok_or_else(|| IndexError::Storage {
            reason: format!("malformed owner index key of {} bytes", key.len()),
        })
}

fn newest_first(mut tickets: Vec<TicketSnapshot>) -> Vec<TicketSnapshot> {
    tickets.sort_by(|a, b| b.ticket_id().cmp(&a.ticket_id()));
    tickets
}

/// RocksDB-backed `IndexStore`.
pub struct RocksDbIndexStore {
    db: DB,
    writer: Mutex<()>,
    config: RocksDbIndexConfig,
    clock: Arc<dyn TimeSource>,
}

impl RocksDbIndexStore {
    pub fn open(config: RocksDbIndexConfig) -> IndexResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemTimeSource))
    }

    pub fn open_with_clock(
        config: RocksDbIndexConfig,
        clock: Arc<dyn TimeSource>,
    ) -> IndexResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| IndexError::Unavailable {
                reason: format!("failed to open index at {}: {e}", config.path),
            })?;
        info!("[dsoc-02] opened RocksDB index at {}", config.path);

        Ok(Self {
            db,
            writer: Mutex::new(()),
            config,
            clock,
        })
    }

    fn cf(&self, name: &str) -> IndexResult<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| IndexError::Storage {
            reason: format!("missing column family {name}"),
        })
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> IndexResult<Option<T>> {
        let bytes = self
            .db
            .get_cf(self.cf(cf)?, key)
            .map_err(|e| storage_err("get", e))?;
        bytes.map(|b| decode(&b)).transpose()
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> IndexResult<Vec<T>> {
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| storage_err("scan", e))?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn owned_ids(&self, owner: &Address) -> IndexResult<Vec<TokenId>> {
        let prefix = owner.as_bytes();
        let mode = IteratorMode::From(prefix, Direction::Forward);
        let mut ids = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_OWNER_INDEX)?, mode) {
            let (key, _) = item.map_err(|e| storage_err("owner scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            ids.push(owned_token_id(&key, prefix.len())?);
        }
        Ok(ids)
    }

    fn owned<T: DeserializeOwned>(&self, cf: &str, owner: &Address) -> IndexResult<Vec<T>> {
        let mut out = Vec::new();
        for id in self.owned_ids(owner)? {
            if let Some(token) = self.get(cf, &id.to_be_bytes())? {
                out.push(token);
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: WriteBatch) -> IndexResult<()> {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| storage_err("batch write", e))
    }

    /// Stage a ticket snapshot if its version is admitted. Caller holds the writer lock.
    fn stage_ticket(
        &self,
        batch: &mut WriteBatch,
        snapshot: &TicketSnapshot,
        stored: Option<&TicketSnapshot>,
    ) -> IndexResult<WriteOutcome> {
        let stored_version = stored.map(|s| s.version());
        if !version_admits(stored_version, snapshot.version()) {
            debug!(
                "[dsoc-02] discarding stale write for ticket {} (v{})",
                snapshot.ticket_id(),
                snapshot.version()
            );
            return Ok(WriteOutcome::Stale {
                stored_version: stored_version.unwrap_or_default(),
            });
        }
        batch.put_cf(
            self.cf(CF_TICKETS)?,
            snapshot.ticket_id().to_be_bytes(),
            encode(snapshot)?,
        );
        Ok(WriteOutcome::Applied)
    }
}

#[async_trait]
impl IndexStore for RocksDbIndexStore {
    async fn upsert_ticket(&self, snapshot: TicketSnapshot) -> IndexResult<WriteOutcome> {
        let _writer = self.writer.lock();
        let stored: Option<TicketSnapshot> =
            self.get(CF_TICKETS, &snapshot.ticket_id().to_be_bytes())?;
        let mut batch = WriteBatch::default();
        let outcome = self.stage_ticket(&mut batch, &snapshot, stored.as_ref())?;
        if outcome == WriteOutcome::Applied {
            self.commit(batch)?;
        }
        Ok(outcome)
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> IndexResult<Option<TicketSnapshot>> {
        self.get(CF_TICKETS, &ticket_id.to_be_bytes())
    }

    async fn query_tickets_by_role(
        &self,
        address: Address,
        role: Role,
    ) -> IndexResult<Vec<TicketSnapshot>> {
        let tickets: Vec<TicketSnapshot> = self.scan(CF_TICKETS)?;
        Ok(newest_first(
            tickets
                .into_iter()
                .filter(|t| t.involves(&address, role))
                .collect(),
        ))
    }

    async fn tickets_by_status(&self, status: TicketStatus) -> IndexResult<Vec<TicketSnapshot>> {
        let tickets: Vec<TicketSnapshot> = self.scan(CF_TICKETS)?;
        Ok(newest_first(
            tickets.into_iter().filter(|t| t.status() == status).collect(),
        ))
    }

    async fn list_tickets(&self) -> IndexResult<Vec<TicketSnapshot>> {
        Ok(newest_first(self.scan(CF_TICKETS)?))
    }

    async fn apply_projection(&self, projection: Projection) -> IndexResult<WriteOutcome> {
        let now = self.clock.now();
        let _writer = self.writer.lock();
        let mut batch = WriteBatch::default();

        let outcome = match projection.ticket {
            Some(ticket) => {
                let stored: Option<TicketSnapshot> =
                    self.get(CF_TICKETS, &ticket.ticket.ticket_id.to_be_bytes())?;
                let snapshot = ticket.into_snapshot(stored.as_ref(), now);
                self.stage_ticket(&mut batch, &snapshot, stored.as_ref())?
            }
            None => WriteOutcome::Applied,
        };

        for token in &projection.stake_tokens {
            let key = token.token_id.to_be_bytes();
            let stored: Option<StakeToken> = self.get(CF_STAKE_TOKENS, &key)?;
            if version_admits(stored.map(|t| t.version), token.version) {
                batch.put_cf(self.cf(CF_STAKE_TOKENS)?, key, encode(token)?);
                batch.put_cf(
                    self.cf(CF_OWNER_INDEX)?,
                    owner_key(&token.owner, token.token_id),
                    b"",
                );
            }
        }
        for token in &projection.rewards {
            let key = token.token_id.to_be_bytes();
            let stored: Option<RewardToken> = self.get(CF_REWARD_TOKENS, &key)?;
            if stored.is_none() {
                batch.put_cf(self.cf(CF_REWARD_TOKENS)?, key, encode(token)?);
                batch.put_cf(
                    self.cf(CF_OWNER_INDEX)?,
                    owner_key(&token.owner, token.token_id),
                    b"",
                );
            }
        }

        self.commit(batch)?;
        Ok(outcome)
    }

    async fn stake_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<StakeToken>> {
        self.owned(CF_STAKE_TOKENS, &owner)
    }

    async fn reward_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<RewardToken>> {
        self.owned(CF_REWARD_TOKENS, &owner)
    }

    async fn register_user(&self, address: Address, role: Role) -> IndexResult<UserRecord> {
        let _writer = self.writer.lock();
        if let Some(existing) = self.get(CF_USERS, address.as_bytes())? {
            return Ok(existing);
        }
        let record = UserRecord {
            address,
            role,
            registered_at: self.clock.now(),
        };
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_USERS)?, address.as_bytes(), encode(&record)?);
        self.commit(batch)?;
        debug!("[dsoc-02] registered {} as {}", address.short(), role);
        Ok(record)
    }

    async fn get_user(&self, address: Address) -> IndexResult<Option<UserRecord>> {
        self.get(CF_USERS, address.as_bytes())
    }

    async fn balances(&self, address: Address) -> IndexResult<Balances> {
        let stakes: Vec<StakeToken> = self.owned(CF_STAKE_TOKENS, &address)?;
        let rewards: Vec<RewardToken> = self.owned(CF_REWARD_TOKENS, &address)?;
        Ok(Balances::from_tokens(&stakes, &rewards))
    }

    async fn record_reconciliation_pending(
        &self,
        mut entry: PendingReconciliation,
    ) -> IndexResult<()> {
        let key = encode(&entry.key)?;
        let _writer = self.writer.lock();
        let merged = match self.get::<PendingReconciliation>(CF_PENDING, &key)? {
            Some(mut existing) => {
                existing.merge(entry);
                existing
            }
            None => {
                entry.recorded_at = self.clock.now();
                entry
            }
        };
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_PENDING)?, key, encode(&merged)?);
        self.commit(batch)
    }

    async fn clear_reconciliation_pending(&self, key: PendingKey) -> IndexResult<()> {
        let key = encode(&key)?;
        let _writer = self.writer.lock();
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_PENDING)?, key);
        self.commit(batch)
    }

    async fn clear_reconciliation_pending_if(
        &self,
        expected: &PendingReconciliation,
    ) -> IndexResult<bool> {
        let key = encode(&expected.key)?;
        let _writer = self.writer.lock();
        match self.get::<PendingReconciliation>(CF_PENDING, &key)? {
            Some(stored) if stored.same_divergence(expected) => {
                let mut batch = WriteBatch::default();
                batch.delete_cf(self.cf(CF_PENDING)?, key);
                self.commit(batch)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_reconciliations(&self) -> IndexResult<Vec<PendingReconciliation>> {
        self.scan(CF_PENDING)
    }
}
