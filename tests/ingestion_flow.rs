//! End-to-end ingestion tests against a real SQLite store.
//!
//! The chain is replaced by a scripted [`LogSource`] so block heights and log
//! contents are fully controlled; everything below the source (decoding,
//! deduplication, storage, the background loop and its shutdown) is the
//! production code path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::hex;
use alloy::primitives::{address, Address, Bytes, B256, U256};
use async_trait::async_trait;
use token_transfer_indexer::{
    db::{create_pool, Repository, TransferStore},
    error::IndexerResult,
    events::{LogPayload, RawLogEntry, TRANSFER_TOPIC},
    ingester::{CycleOutcome, Ingester, IngesterSettings},
    lifecycle::Lifecycle,
    rpc::LogSource,
};

const TOKEN: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
const ALICE: Address = address!("1111111111111111111111111111111111111111");
const BOB: Address = address!("2222222222222222222222222222222222222222");

#[derive(Default)]
struct ScriptedChain {
    head: AtomicU64,
    logs: Mutex<Vec<RawLogEntry>>,
}

impl ScriptedChain {
    fn new(head: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.head.store(head, Ordering::SeqCst);
        Arc::new(chain)
    }

    fn mine(&self, head: u64, logs: Vec<RawLogEntry>) {
        self.logs.lock().unwrap().extend(logs);
        self.head.store(head, Ordering::SeqCst);
    }
}

#[async_trait]
impl LogSource for ScriptedChain {
    async fn block_number(&self) -> IndexerResult<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic: B256,
    ) -> IndexerResult<Vec<RawLogEntry>> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| address == TOKEN && e.topics.first() == Some(&topic))
            .filter(|e| {
                e.block_number
                    .is_some_and(|b| (from_block..=to_block).contains(&b))
            })
            .cloned()
            .collect())
    }
}

fn tx(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

fn transfer_log(tx_hash: B256, block: u64, value: U256) -> RawLogEntry {
    RawLogEntry {
        tx_hash: Some(tx_hash),
        block_number: Some(block),
        topics: vec![
            TRANSFER_TOPIC,
            B256::left_padding_from(ALICE.as_slice()),
            B256::left_padding_from(BOB.as_slice()),
        ],
        data: LogPayload::Bytes(Bytes::from(value.to_be_bytes::<32>().to_vec())),
    }
}

async fn sqlite_store() -> Arc<Repository> {
    Arc::new(Repository::new(create_pool("sqlite::memory:").await.unwrap()))
}

async fn wait_for_count(store: &Repository, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.count().await.unwrap() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("transfers were not stored in time");
}

#[tokio::test]
async fn test_first_cycle_covers_only_the_head_block() {
    let chain = ScriptedChain::new(100);
    chain.mine(
        100,
        vec![
            transfer_log(tx(1), 99, U256::from(5)),
            transfer_log(tx(2), 100, U256::from(7)),
        ],
    );
    let store = sqlite_store().await;

    let mut ingester = Ingester::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        IngesterSettings::new(TOKEN, Duration::from_secs(1)),
    );
    assert_eq!(ingester.initialize().await.unwrap(), 99);

    let outcome = ingester.poll_once().await.unwrap();
    let CycleOutcome::Processed(report) = outcome else {
        panic!("expected a processed range, got {outcome:?}");
    };
    assert_eq!((report.from_block, report.to_block), (100, 100));
    assert_eq!(report.inserted, 1);

    let stored = store.find_by_tx_hash(&hex::encode_prefixed(tx(2))).await.unwrap().unwrap();
    assert_eq!(stored.block_number, 100);
    assert_eq!(stored.from_address, hex::encode_prefixed(ALICE));
    assert!(store.find_by_tx_hash(&hex::encode_prefixed(tx(1))).await.unwrap().is_none());
}

#[tokio::test]
async fn test_background_loop_follows_the_head_and_stops() {
    let chain = ScriptedChain::new(100);
    chain.mine(100, vec![transfer_log(tx(1), 100, U256::from(1))]);
    let store = sqlite_store().await;

    let mut ingester = Ingester::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        IngesterSettings::new(TOKEN, Duration::from_millis(20)),
    );
    ingester.initialize().await.unwrap();

    let lifecycle = Lifecycle::start(ingester);
    wait_for_count(&store, 1).await;

    let big = U256::MAX - U256::from(1);
    chain.mine(
        105,
        vec![
            transfer_log(tx(2), 103, U256::from(10)),
            transfer_log(tx(3), 105, big),
        ],
    );
    wait_for_count(&store, 3).await;
    assert!(!lifecycle.is_finished());

    lifecycle.request_stop();
    lifecycle.request_stop();
    lifecycle.shutdown().await.unwrap();

    let stored = store.find_by_tx_hash(&hex::encode_prefixed(tx(3))).await.unwrap().unwrap();
    assert_eq!(stored.value_u256().unwrap(), big);
    assert_eq!(store.recent_transfers(1).await.unwrap()[0].block_number, 105);
}

#[tokio::test]
async fn test_redelivered_transaction_is_stored_once() {
    let chain = ScriptedChain::new(10);
    let store = sqlite_store().await;

    let mut ingester = Ingester::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        IngesterSettings::new(TOKEN, Duration::from_secs(1)),
    );
    ingester.initialize().await.unwrap();

    chain.mine(11, vec![transfer_log(tx(42), 11, U256::from(3))]);
    ingester.poll_once().await.unwrap();

    // Same transaction hash reported again in a later block.
    chain.mine(12, vec![transfer_log(tx(42), 12, U256::from(3))]);
    let outcome = ingester.poll_once().await.unwrap();

    let CycleOutcome::Processed(report) = outcome else {
        panic!("expected a processed range, got {outcome:?}");
    };
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.inserted, 0);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_checkpoint_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("transfers.db").display());
    let chain = ScriptedChain::new(50);

    let mut settings = IngesterSettings::new(TOKEN, Duration::from_secs(1));
    settings.resume_from_checkpoint = true;

    {
        let store = Arc::new(Repository::new(create_pool(&url).await.unwrap()));
        let mut ingester = Ingester::new(Arc::clone(&chain), store, settings.clone());
        ingester.initialize().await.unwrap();
        chain.mine(52, vec![transfer_log(tx(1), 51, U256::from(1))]);
        ingester.poll_once().await.unwrap();
        assert_eq!(ingester.pointer(), Some(52));
    }

    chain.mine(60, vec![transfer_log(tx(2), 53, U256::from(2))]);

    let store = Arc::new(Repository::new(create_pool(&url).await.unwrap()));
    let mut ingester = Ingester::new(Arc::clone(&chain), Arc::clone(&store), settings);
    assert_eq!(ingester.initialize().await.unwrap(), 52);

    ingester.poll_once().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.load_checkpoint().await.unwrap(), Some(60));
}
