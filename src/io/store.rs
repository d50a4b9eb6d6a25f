//! Transaction store - sync targets and persisted transactions
//!
//! `FileStore` keeps the store list in `stores.json` (a JSON array) and
//! appends transactions to `transactions.jsonl`, one JSON object per line.
//! Watermark updates rewrite `stores.json` through a temp file + rename.
//!
//! At most one transaction is kept per order id. The ids already on disk are
//! indexed at `open`, so a batch re-fetched after an abandoned run does not
//! append a second transaction for orders persisted the first time.

use crate::domain::transaction::{Store, Transaction};
use crate::infra::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STORES_FILE: &str = "stores.json";
const TRANSACTIONS_FILE: &str = "transactions.jsonl";

/// Outbound side of the sync: where transactions and watermarks land
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// All sync targets
    async fn find_stores(&self) -> StoreResult<Vec<Store>>;

    /// Persist a transaction unless its order already has one.
    ///
    /// Returns `false` when an earlier transaction for the same `order_id`
    /// exists and nothing was written.
    async fn create(&self, transaction: &Transaction) -> StoreResult<bool>;

    /// Replace a store's watermark
    async fn update_watermark(&self, store_id: &str, watermark: &str) -> StoreResult<()>;
}

/// Only the field needed to index existing transactions
#[derive(Deserialize)]
struct PersistedOrder {
    order_id: String,
}

pub struct FileStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles on the store list
    write_lock: Mutex<()>,
    /// Order ids with a persisted transaction; also serializes appends
    persisted: Mutex<HashSet<String>>,
}

impl FileStore {
    /// Open a data directory; fails if the store list is missing or unreadable
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let mut store = Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            persisted: Mutex::new(HashSet::new()),
        };
        let stores = store.read_stores()?;
        let persisted = store.read_persisted_orders()?;
        info!(
            dir = %store.dir.display(),
            stores = %stores.len(),
            transactions = %persisted.len(),
            "file_store_opened"
        );
        store.persisted = Mutex::new(persisted);
        Ok(store)
    }

    fn stores_path(&self) -> PathBuf {
        self.dir.join(STORES_FILE)
    }

    fn transactions_path(&self) -> PathBuf {
        self.dir.join(TRANSACTIONS_FILE)
    }

    fn read_stores(&self) -> StoreResult<Vec<Store>> {
        let content = fs::read_to_string(self.stores_path())?;
        Ok(serde_json::from_str(&content)?)
    }

    fn read_persisted_orders(&self) -> StoreResult<HashSet<String>> {
        let content = match fs::read_to_string(self.transactions_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = HashSet::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let record: PersistedOrder = serde_json::from_str(line)?;
            ids.insert(record.order_id);
        }
        Ok(ids)
    }

    fn write_stores(&self, stores: &[Store]) -> StoreResult<()> {
        let path = self.stores_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(stores)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn append_transaction(&self, transaction: &Transaction) -> StoreResult<bool> {
        let line = serde_json::to_string(transaction)?;
        let mut persisted = self.persisted.lock();
        if persisted.contains(&transaction.order_id) {
            debug!(order_id = %transaction.order_id, "transaction_exists");
            return Ok(false);
        }

        let mut file =
            OpenOptions::new().create(true).append(true).open(self.transactions_path())?;
        writeln!(file, "{}", line)?;
        persisted.insert(transaction.order_id.clone());
        debug!(order_id = %transaction.order_id, bytes = %line.len(), "transaction_written");
        Ok(true)
    }

    fn set_watermark(&self, store_id: &str, watermark: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock();

        let mut stores = self.read_stores()?;
        let store = stores
            .iter_mut()
            .find(|s| s.id == store_id)
            .ok_or_else(|| StoreError::UnknownStore(store_id.to_string()))?;
        store.last_sync_time = watermark.to_string();
        self.write_stores(&stores)
    }
}

#[async_trait]
impl TransactionStore for FileStore {
    async fn find_stores(&self) -> StoreResult<Vec<Store>> {
        self.read_stores()
    }

    async fn create(&self, transaction: &Transaction) -> StoreResult<bool> {
        self.append_transaction(transaction)
    }

    async fn update_watermark(&self, store_id: &str, watermark: &str) -> StoreResult<()> {
        self.set_watermark(store_id, watermark)
    }
}
