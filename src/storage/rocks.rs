//! Persistent round store on RocksDB
//!
//! Key layout:
//! - `round:{game}:{bucket:020}`            round record (JSON)
//! - `pending:{game}:{bucket:020}`          index of unsettled rounds (empty value)
//! - `totals:{game}:{bucket:020}:{choice}`  u64 counter, big-endian, merge-added
//! - `play:{game}:{bucket:020}:{ts:020}:{id}` play record (JSON)
//!
//! Totals use a merge operator so concurrent increments never read-modify-write.
//! Round creation and settlement are compare-and-set under the write side of
//! `gate`; increments take the read side so they run concurrently with each
//! other but never interleave with a settle. All I/O runs on tokio's
//! blocking pool.

use super::RoundRepository;
use crate::{
    errors::{FairroundResult, StorageError},
    rounds::{Play, Round, RoundKey, Settlement, Totals},
};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, MergeOperands, Options, WriteBatch, DB};
use std::{
    path::Path,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

const ROUND_PREFIX: &str = "round:";
const PENDING_PREFIX: &str = "pending:";
const TOTALS_PREFIX: &str = "totals:";
const PLAY_PREFIX: &str = "play:";
const ADD_U64_OPERATOR: &str = "fairround_add_u64";

fn round_key(key: &RoundKey) -> Vec<u8> {
    format!("{}{}:{:020}", ROUND_PREFIX, key.game_id, key.bucket_start).into_bytes()
}

fn game_rounds_prefix(game_id: &str) -> Vec<u8> {
    format!("{}{}:", ROUND_PREFIX, game_id).into_bytes()
}

fn pending_key(key: &RoundKey) -> Vec<u8> {
    format!("{}{}:{:020}", PENDING_PREFIX, key.game_id, key.bucket_start).into_bytes()
}

fn totals_prefix(key: &RoundKey) -> Vec<u8> {
    format!("{}{}:{:020}:", TOTALS_PREFIX, key.game_id, key.bucket_start).into_bytes()
}

fn totals_key(key: &RoundKey, choice: &str) -> Vec<u8> {
    let mut out = totals_prefix(key);
    out.extend_from_slice(choice.as_bytes());
    out
}

fn plays_prefix(key: &RoundKey) -> Vec<u8> {
    format!("{}{}:{:020}:", PLAY_PREFIX, key.game_id, key.bucket_start).into_bytes()
}

fn play_key(play: &Play) -> Vec<u8> {
    let mut out = plays_prefix(&play.round_key());
    out.extend_from_slice(format!("{:020}:{}", play.timestamp_ms, play.play_id).as_bytes());
    out
}

fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

fn add_u64_merge(_key: &[u8], existing: Option<&[u8]>, operands: &MergeOperands) -> Option<Vec<u8>> {
    let mut total = existing.and_then(decode_u64).unwrap_or(0);
    for op in operands {
        total = total.saturating_add(decode_u64(op).unwrap_or(0));
    }
    Some(total.to_be_bytes().to_vec())
}

fn parse_pending_key(raw: &[u8]) -> Option<RoundKey> {
    let text = std::str::from_utf8(raw).ok()?;
    let rest = text.strip_prefix(PENDING_PREFIX)?;
    let (game_id, bucket) = rest.rsplit_once(':')?;
    Some(RoundKey::new(game_id, bucket.parse().ok()?))
}

#[derive(Clone)]
pub struct RocksRoundStore {
    db: Arc<DB>,
    gate: Arc<RwLock<()>>,
}

impl RocksRoundStore {
    pub fn open<P: AsRef<Path>>(path: P) -> FairroundResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_merge_operator_associative(ADD_U64_OPERATOR, add_u64_merge);

        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            StorageError::DatabaseOpenFailed(format!("{}: {}", path.as_ref().display(), e))
        })?;
        tracing::info!(path = %path.as_ref().display(), "Opened RocksDB round store");

        Ok(Self {
            db: Arc::new(db),
            gate: Arc::new(RwLock::new(())),
        })
    }

    /// Run a store operation on the blocking pool; RocksDB I/O and the gate
    /// must not stall async workers.
    async fn blocking<T, F>(&self, op: F) -> FairroundResult<T>
    where
        F: FnOnce(&RocksRoundStore) -> FairroundResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StorageError::ReadFailed(format!("Storage task failed: {}", e)))?
    }

    fn read_gate(&self) -> FairroundResult<RwLockReadGuard<'_, ()>> {
        self.gate
            .read()
            .map_err(|_| StorageError::ReadFailed("round store gate poisoned".to_string()).into())
    }

    fn write_gate(&self) -> FairroundResult<RwLockWriteGuard<'_, ()>> {
        self.gate
            .write()
            .map_err(|_| StorageError::WriteFailed("round store gate poisoned".to_string()).into())
    }

    /// Stored record without counter overlay
    fn load_record(&self, key: &RoundKey) -> FairroundResult<Option<Round>> {
        match self.db.get(round_key(key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_totals(&self, key: &RoundKey) -> FairroundResult<Totals> {
        let prefix = totals_prefix(key);
        let mut totals = Totals::new();
        for (raw_key, value) in self.scan_forward(&prefix)? {
            let choice = String::from_utf8_lossy(&raw_key[prefix.len()..]).into_owned();
            let amount = decode_u64(&value).ok_or_else(|| {
                StorageError::CorruptedData(format!("Invalid total for choice {}", choice))
            })?;
            totals.insert(choice, amount);
        }
        Ok(totals)
    }

    fn scan_forward(&self, prefix: &[u8]) -> FairroundResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    fn find_round_sync(&self, key: &RoundKey) -> FairroundResult<Option<Round>> {
        let Some(mut round) = self.load_record(key)? else {
            return Ok(None);
        };
        if !round.is_settled() {
            round.totals = self.load_totals(key)?;
        }
        Ok(Some(round))
    }

    fn insert_sync(&self, round: &Round) -> FairroundResult<bool> {
        let key = round.key();
        let _gate = self.write_gate()?;
        if self.db.get(round_key(&key))?.is_some() {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.put(round_key(&key), serde_json::to_vec(round)?);
        batch.put(pending_key(&key), b"");
        self.db.write(batch)?;
        Ok(true)
    }

    fn increment_sync(&self, play: &Play) -> FairroundResult<bool> {
        let key = play.round_key();
        let _gate = self.read_gate()?;
        match self.load_record(&key)? {
            Some(round) if !round.is_settled() => {}
            _ => return Ok(false),
        }

        let mut batch = WriteBatch::default();
        batch.put(play_key(play), serde_json::to_vec(play)?);
        batch.merge(totals_key(&key, &play.choice), play.bet_amount.to_be_bytes());
        self.db.write(batch)?;
        Ok(true)
    }

    fn settle_sync(&self, key: &RoundKey, settlement: &Settlement) -> FairroundResult<bool> {
        let _gate = self.write_gate()?;
        let Some(mut round) = self.load_record(key)? else {
            return Ok(false);
        };
        if round.is_settled() {
            return Ok(false);
        }

        round.totals = self.load_totals(key)?;
        round.settle_with(settlement);

        let mut batch = WriteBatch::default();
        batch.put(round_key(key), serde_json::to_vec(&round)?);
        batch.delete(pending_key(key));
        self.db.write(batch)?;
        Ok(true)
    }

    fn plays_sync(&self, key: &RoundKey) -> FairroundResult<Vec<Play>> {
        self.scan_forward(&plays_prefix(key))?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(Into::into))
            .collect()
    }

    fn settled_sync(&self, game_id: &str, limit: usize) -> FairroundResult<Vec<Round>> {
        let prefix = game_rounds_prefix(game_id);
        let mut upper = prefix.clone();
        upper.push(0xff);

        let mut rounds = Vec::with_capacity(limit);
        for item in self.db.iterator(IteratorMode::From(&upper, Direction::Reverse)) {
            if rounds.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let round: Round = serde_json::from_slice(&value)?;
            if round.is_settled() {
                rounds.push(round);
            }
        }
        Ok(rounds)
    }

    fn pending_sync(&self, game_id: Option<&str>) -> FairroundResult<Vec<RoundKey>> {
        let prefix = match game_id {
            Some(id) => format!("{}{}:", PENDING_PREFIX, id).into_bytes(),
            None => PENDING_PREFIX.as_bytes().to_vec(),
        };
        let mut keys = Vec::new();
        for (raw, _) in self.scan_forward(&prefix)? {
            match parse_pending_key(&raw) {
                Some(key) => keys.push(key),
                None => tracing::warn!(key = %String::from_utf8_lossy(&raw), "Skipping malformed pending index entry"),
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl RoundRepository for RocksRoundStore {
    async fn find_round(&self, key: &RoundKey) -> FairroundResult<Option<Round>> {
        let key = key.clone();
        self.blocking(move |store| store.find_round_sync(&key)).await
    }

    async fn insert_round_if_absent(&self, round: &Round) -> FairroundResult<bool> {
        let round = round.clone();
        self.blocking(move |store| store.insert_sync(&round)).await
    }

    async fn increment_totals(&self, play: &Play) -> FairroundResult<bool> {
        let play = play.clone();
        self.blocking(move |store| store.increment_sync(&play)).await
    }

    async fn try_settle(&self, key: &RoundKey, settlement: &Settlement) -> FairroundResult<bool> {
        let key = key.clone();
        let settlement = settlement.clone();
        self.blocking(move |store| store.settle_sync(&key, &settlement)).await
    }

    async fn plays_for_round(&self, key: &RoundKey) -> FairroundResult<Vec<Play>> {
        let key = key.clone();
        self.blocking(move |store| store.plays_sync(&key)).await
    }

    async fn settled_rounds(&self, game_id: &str, limit: usize) -> FairroundResult<Vec<Round>> {
        let game_id = game_id.to_string();
        self.blocking(move |store| store.settled_sync(&game_id, limit)).await
    }

    async fn pending_rounds(&self, game_id: Option<&str>) -> FairroundResult<Vec<RoundKey>> {
        let game_id = game_id.map(str::to_string);
        self.blocking(move |store| store.pending_sync(game_id.as_deref())).await
    }
}
