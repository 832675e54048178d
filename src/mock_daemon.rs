//! In-memory daemon for deterministic testing.
//!
//! Serves a chain held in memory. Blocks a test inserts are returned as
//! given, every other height up to the tip is an empty block whose hash is
//! the Keccak hash of its height.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::daemon::{Daemon, DaemonConnectionInfo, DaemonError, DaemonEvent, DaemonType};
use crate::primitives::cn_fast_hash;
use crate::types::Block;

const EVENT_CAPACITY: usize = 64;
const DEFAULT_BLOCK_TIMESTAMP: u64 = 1_600_000_000;
const BLOCK_TIME: u64 = 30;

struct MockChain {
    info: DaemonConnectionInfo,
    /// Handshake results applied on `init`.
    detected_ssl: bool,
    detected_type: DaemonType,
    initialised: bool,
    reachable: bool,
    failures_remaining: usize,
    blocks: BTreeMap<u64, Block>,
    tip: u64,
    local_height: u64,
    network_height: u64,
    node_fee: (String, u64),
    reported_fee: (String, u64),
    block_requests: usize,
}

/// Mock daemon. Clones share the same chain.
#[derive(Clone)]
pub struct MockDaemon {
    chain: Arc<Mutex<MockChain>>,
    events: broadcast::Sender<DaemonEvent>,
}

impl MockDaemon {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            chain: Arc::new(Mutex::new(MockChain {
                info: DaemonConnectionInfo::new(host, port),
                detected_ssl: false,
                detected_type: DaemonType::ConventionalDaemon,
                initialised: false,
                reachable: true,
                failures_remaining: 0,
                blocks: BTreeMap::new(),
                tip: 0,
                local_height: 0,
                network_height: 0,
                node_fee: (String::new(), 0),
                reported_fee: (String::new(), 0),
                block_requests: 0,
            })),
            events,
        }
    }

    /// Loads a JSON array of blocks recorded from a real daemon.
    pub fn from_file(host: impl Into<String>, port: u16, path: impl AsRef<Path>) -> Result<Self, DaemonError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DaemonError::InvalidResponse(format!("failed to read recording: {}", e)))?;
        let blocks: Vec<Block> = serde_json::from_str(&content)
            .map_err(|e| DaemonError::InvalidResponse(format!("failed to parse recording: {}", e)))?;

        let daemon = Self::new(host, port);
        for block in blocks {
            daemon.add_block(block);
        }
        Ok(daemon)
    }

    fn lock(&self) -> MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// What `init` will determine about ssl and daemon type.
    pub fn with_detection(self, ssl: bool, daemon_type: DaemonType) -> Self {
        {
            let mut chain = self.lock();
            chain.detected_ssl = ssl;
            chain.detected_type = daemon_type;
        }
        self
    }

    /// The fee the daemon reports once contacted.
    pub fn with_node_fee(self, address: impl Into<String>, amount: u64) -> Self {
        self.lock().node_fee = (address.into(), amount);
        self
    }

    /// Taking the daemon down emits `Disconnect` and forgets detection results.
    pub fn set_reachable(&self, reachable: bool) {
        let mut chain = self.lock();
        if chain.reachable && !reachable {
            chain.info.reset_detection();
            let _ = self.events.send(DaemonEvent::Disconnect);
        }
        chain.reachable = reachable;
    }

    /// Inserts a block and extends the tip to cover it.
    pub fn add_block(&self, block: Block) {
        let mut chain = self.lock();
        chain.tip = chain.tip.max(block.block_height);
        chain.blocks.insert(block.block_height, block);
    }

    /// Moves the tip. Heights below it without an inserted block are empty.
    pub fn set_tip(&self, height: u64) {
        self.lock().tip = height;
    }

    /// The next `count` requests fail as if the connection dropped.
    pub fn fail_next_requests(&self, count: usize) {
        self.lock().failures_remaining = count;
    }

    /// Number of `get_blocks` calls served so far.
    pub fn block_requests(&self) -> usize {
        self.lock().block_requests
    }

    fn check_available(&self, chain: &mut MockChain) -> Result<(), DaemonError> {
        if !chain.reachable {
            return Err(DaemonError::Unreachable {
                host: chain.info.host.clone(),
                port: chain.info.port,
            });
        }
        if chain.failures_remaining > 0 {
            chain.failures_remaining -= 1;
            return Err(DaemonError::InvalidResponse("connection reset".to_string()));
        }
        Ok(())
    }

    fn refresh(chain: &mut MockChain) {
        chain.local_height = chain.tip;
        chain.network_height = chain.tip;
        chain.reported_fee = chain.node_fee.clone();
    }
}

fn empty_block(height: u64) -> Block {
    Block {
        block_hash: cn_fast_hash(&height.to_le_bytes()),
        block_height: height,
        block_timestamp: DEFAULT_BLOCK_TIMESTAMP + height * BLOCK_TIME,
        coinbase_transaction: None,
        transactions: Vec::new(),
    }
}

#[async_trait]
impl Daemon for MockDaemon {
    async fn init(&self) -> Result<(), DaemonError> {
        let mut chain = self.lock();
        if let Err(e) = self.check_available(&mut chain) {
            let _ = self.events.send(DaemonEvent::Disconnect);
            return Err(e);
        }

        chain.info.ssl = chain.detected_ssl;
        chain.info.daemon_type = chain.detected_type;
        chain.info.ssl_determined = true;
        chain.info.daemon_type_determined = true;
        chain.initialised = true;
        Self::refresh(&mut chain);

        let _ = self.events.send(DaemonEvent::Connect);
        Ok(())
    }

    async fn update_daemon_info(&self) -> Result<(), DaemonError> {
        let mut chain = self.lock();
        if !chain.initialised {
            return Err(DaemonError::NotInitialised);
        }
        self.check_available(&mut chain)?;
        Self::refresh(&mut chain);
        Ok(())
    }

    async fn get_blocks(&self, start_height: u64, count: u64) -> Result<Vec<Block>, DaemonError> {
        let mut chain = self.lock();
        self.check_available(&mut chain)?;
        chain.block_requests += 1;

        if start_height > chain.tip || count == 0 {
            return Ok(Vec::new());
        }

        let end = chain.tip.min(start_height.saturating_add(count - 1));
        Ok((start_height..=end)
            .map(|height| {
                chain
                    .blocks
                    .get(&height)
                    .cloned()
                    .unwrap_or_else(|| empty_block(height))
            })
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.events.subscribe()
    }

    fn connection_info(&self) -> DaemonConnectionInfo {
        self.lock().info.clone()
    }

    fn node_fee(&self) -> (String, u64) {
        self.lock().reported_fee.clone()
    }

    fn local_height(&self) -> u64 {
        self.lock().local_height
    }

    fn network_height(&self) -> u64 {
        self.lock().network_height
    }
}
