//! The wallet facade: lifecycle, background synchronisation and queries.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::address::validate_address;
use crate::config::Config;
use crate::daemon::{Daemon, DaemonConnectionInfo, DaemonError, DaemonEvent};
use crate::keys::{is_deterministic, WalletKeys};
use crate::mnemonic::private_key_to_mnemonic;
use crate::primitives::{key_from_hex, PublicKey};
use crate::subwallets::SubWallets;
use crate::synchronizer::WalletSynchronizer;
use crate::types::{SyncStatus, Transaction};
use crate::utils::adjusted_creation_timestamp;
use crate::wallet_state::WalletState;
use crate::WalletError;

const EVENT_CAPACITY: usize = 256;

/// Notifications from the background synchroniser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// A transaction touching the wallet was found.
    Transaction(Transaction),
    HeightChange {
        wallet_height: u64,
        local_height: u64,
        network_height: u64,
    },
    /// The wallet caught up with the network.
    Sync {
        wallet_height: u64,
        network_height: u64,
    },
    /// The wallet fell behind after having been in sync.
    Desync {
        wallet_height: u64,
        network_height: u64,
    },
}

struct SyncTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Shared handles the background task works through.
#[derive(Clone)]
struct SyncContext {
    state: Arc<Mutex<WalletState>>,
    daemon: Arc<RwLock<Arc<dyn Daemon>>>,
    daemon_generation: Arc<AtomicU64>,
    tick_lock: Arc<tokio::sync::Mutex<()>>,
    events: broadcast::Sender<WalletEvent>,
}

impl SyncContext {
    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn daemon(&self) -> Arc<dyn Daemon> {
        self.daemon
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn emit(&self, event: WalletEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

pub struct WalletBackend {
    ctx: SyncContext,
    sync_task: Option<SyncTask>,
}

impl std::fmt::Debug for WalletBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletBackend")
            .field("primary_address", &self.get_primary_address())
            .field("wallet_count", &self.get_wallet_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for WalletBackend {
    fn drop(&mut self) {
        if let Some(task) = self.sync_task.take() {
            task.handle.abort();
        }
    }
}

impl WalletBackend {
    fn from_state(daemon: Arc<dyn Daemon>, state: WalletState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            ctx: SyncContext {
                state: Arc::new(Mutex::new(state)),
                daemon: Arc::new(RwLock::new(daemon)),
                daemon_generation: Arc::new(AtomicU64::new(0)),
                tick_lock: Arc::new(tokio::sync::Mutex::new(())),
                events,
            },
            sync_task: None,
        }
    }

    fn from_keys(
        daemon: Arc<dyn Daemon>,
        keys: &WalletKeys,
        scan_height: u64,
        scan_timestamp: u64,
        config: Config,
    ) -> Self {
        let sub_wallets = SubWallets::new(keys, scan_height, scan_timestamp, &config);
        let synchronizer =
            WalletSynchronizer::new(scan_height, scan_timestamp, keys.view.private_key);
        Self::from_state(daemon, WalletState::new(sub_wallets, synchronizer, config))
    }

    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// A new wallet with fresh keys, scanning from a little before now.
    pub fn create_wallet(daemon: Arc<dyn Daemon>, config: Config) -> Self {
        let keys = WalletKeys::generate();
        let timestamp = adjusted_creation_timestamp(&config);
        info!("created new wallet");
        Self::from_keys(daemon, &keys, 0, timestamp, config)
    }

    pub fn import_wallet_from_seed(
        daemon: Arc<dyn Daemon>,
        scan_height: u64,
        mnemonic_seed: &str,
        config: Config,
    ) -> Result<Self, WalletError> {
        let keys = WalletKeys::from_mnemonic(mnemonic_seed)?;
        info!(scan_height, "imported wallet from seed");
        Ok(Self::from_keys(daemon, &keys, scan_height, 0, config))
    }

    /// Keys are 64-char hex. The view key comes first.
    pub fn import_wallet_from_keys(
        daemon: Arc<dyn Daemon>,
        scan_height: u64,
        private_view_key: &str,
        private_spend_key: &str,
        config: Config,
    ) -> Result<Self, WalletError> {
        let private_view_key = zeroize::Zeroizing::new(key_from_hex(private_view_key)?);
        let private_spend_key = zeroize::Zeroizing::new(key_from_hex(private_spend_key)?);
        let keys = WalletKeys::from_private_keys(&private_spend_key, &private_view_key)?;
        info!(scan_height, "imported wallet from keys");
        Ok(Self::from_keys(daemon, &keys, scan_height, 0, config))
    }

    /// A wallet that can see incoming funds to `address` but not spend them.
    pub fn import_view_wallet(
        daemon: Arc<dyn Daemon>,
        scan_height: u64,
        private_view_key: &str,
        address: &str,
        config: Config,
    ) -> Result<Self, WalletError> {
        let private_view_key = zeroize::Zeroizing::new(key_from_hex(private_view_key)?);
        let sub_wallets =
            SubWallets::new_view_wallet(&private_view_key, address, scan_height, 0, &config)?;
        let synchronizer = WalletSynchronizer::new(scan_height, 0, *private_view_key);
        info!(scan_height, address, "imported view wallet");
        Ok(Self::from_state(
            daemon,
            WalletState::new(sub_wallets, synchronizer, config),
        ))
    }

    pub fn load_wallet_from_json(
        daemon: Arc<dyn Daemon>,
        json: &str,
        config: Option<Config>,
    ) -> Result<Self, WalletError> {
        Ok(Self::from_state(daemon, WalletState::from_json(json, config)?))
    }

    pub fn open_wallet_from_file<P: AsRef<Path>>(
        daemon: Arc<dyn Daemon>,
        path: P,
        password: &str,
        config: Option<Config>,
    ) -> Result<Self, WalletError> {
        Ok(Self::from_state(
            daemon,
            WalletState::load_from_file(path, password, config)?,
        ))
    }

    pub fn open_wallet_from_encrypted_string(
        daemon: Arc<dyn Daemon>,
        data: &str,
        password: &str,
        config: Option<Config>,
    ) -> Result<Self, WalletError> {
        Ok(Self::from_state(
            daemon,
            WalletState::from_encrypted_string(data, password, config)?,
        ))
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    pub fn save_wallet_to_file<P: AsRef<Path>>(&self, path: P, password: &str) -> Result<(), WalletError> {
        let state = self.ctx.state().clone();
        state.save_to_file(path, password)
    }

    pub fn encrypt_wallet_to_string(&self, password: &str) -> Result<String, WalletError> {
        let state = self.ctx.state().clone();
        state.to_encrypted_string(password)
    }

    pub fn to_json_string(&self) -> Result<String, WalletError> {
        self.ctx.state().to_json_string()
    }

    // ========================================================================
    // SYNCHRONISATION
    // ========================================================================

    /// Starts the background synchroniser. Does nothing if it is running.
    pub async fn start(&mut self) {
        if self
            .sync_task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
        {
            return;
        }

        let daemon = self.ctx.daemon();
        if let Err(e) = daemon.init().await {
            warn!(error = %e, "daemon init failed, will retry in the background");
        }

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sync_loop(self.ctx.clone(), stop_rx));
        self.sync_task = Some(SyncTask { stop, handle });
        info!("wallet synchronisation started");
    }

    /// Stops the synchroniser and waits for an in-flight tick to finish.
    /// Does nothing if it is not running.
    pub async fn stop(&mut self) {
        if let Some(task) = self.sync_task.take() {
            let _ = task.stop.send(true);
            if let Err(e) = task.handle.await {
                warn!(error = %e, "sync task ended abnormally");
            }
            info!("wallet synchronisation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.sync_task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Discards everything above `height`. Waits for an in-flight tick first.
    pub async fn rewind(&self, height: u64) {
        let _tick = self.ctx.tick_lock.lock().await;
        self.ctx.state().rewind(height);
    }

    /// Discards all transactions and inputs and rescans from the given point.
    pub async fn reset(&self, scan_height: u64, scan_timestamp: u64) {
        let _tick = self.ctx.tick_lock.lock().await;
        self.ctx.state().reset(scan_height, scan_timestamp);
    }

    /// Moves the wallet to a different daemon. Sync progress is kept.
    pub async fn swap_node(&self, daemon: Arc<dyn Daemon>) {
        if let Err(e) = daemon.init().await {
            warn!(error = %e, "new daemon init failed, will retry in the background");
        }
        let info = daemon.connection_info();

        let _tick = self.ctx.tick_lock.lock().await;
        *self.ctx.daemon.write().unwrap_or_else(PoisonError::into_inner) = daemon;
        self.ctx.daemon_generation.fetch_add(1, Ordering::SeqCst);
        info!(host = %info.host, port = info.port, "swapped daemon");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.ctx.events.subscribe()
    }

    pub fn get_sync_status(&self) -> SyncStatus {
        let daemon = self.ctx.daemon();
        SyncStatus {
            wallet_block_count: self.ctx.state().synchronizer.height(),
            local_daemon_block_count: daemon.local_height(),
            network_block_count: daemon.network_height(),
        }
    }

    pub fn get_node_fee(&self) -> (String, u64) {
        self.ctx.daemon().node_fee()
    }

    pub fn get_daemon_connection_info(&self) -> DaemonConnectionInfo {
        self.ctx.daemon().connection_info()
    }

    // ========================================================================
    // BALANCE AND TRANSACTIONS
    // ========================================================================

    /// (unlocked, locked) over the given addresses, or the whole wallet.
    pub fn get_balance(&self, sub_wallets_to_take_from: Option<&[&str]>) -> Result<(u64, u64), WalletError> {
        let current_height = self.ctx.daemon().network_height();
        let state = self.ctx.state();

        let keys = match sub_wallets_to_take_from {
            Some(addresses) => Some(
                addresses
                    .iter()
                    .map(|address| {
                        state
                            .sub_wallets
                            .find_by_address(address, &state.config)
                            .map(|w| *w.public_spend_key())
                    })
                    .collect::<Result<Vec<PublicKey>, _>>()?,
            ),
            None => None,
        };

        Ok(state.sub_wallets.balance(keys.as_deref(), current_height))
    }

    pub fn get_num_transactions(&self) -> usize {
        self.ctx.state().sub_wallets.transactions().len()
    }

    /// Newest first.
    pub fn get_transactions(&self, start_index: Option<usize>, count: Option<usize>) -> Vec<Transaction> {
        self.ctx
            .state()
            .sub_wallets
            .transactions()
            .iter()
            .rev()
            .skip(start_index.unwrap_or(0))
            .take(count.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn get_transaction(&self, hash: &str) -> Option<Transaction> {
        let hash = key_from_hex(hash).ok()?;
        self.ctx.state().sub_wallets.transaction(&hash).cloned()
    }

    // ========================================================================
    // SUBWALLETS
    // ========================================================================

    /// Adds a random subwallet born at the current network height.
    pub fn add_sub_wallet(&self) -> Result<String, WalletError> {
        let scan_height = self.ctx.daemon().network_height();
        let mut state = self.ctx.state();
        let state = &mut *state;
        let address = state.sub_wallets.add_sub_wallet(scan_height, 0, &state.config)?;
        info!(address = %address, scan_height, "added subwallet");
        Ok(address)
    }

    /// Imports a spend key. Blocks from `scan_height` (default: the network
    /// height) onwards are rescanned if the wallet is already past it.
    pub async fn import_sub_wallet(
        &self,
        private_spend_key: &str,
        scan_height: Option<u64>,
    ) -> Result<String, WalletError> {
        let private_spend_key = zeroize::Zeroizing::new(key_from_hex(private_spend_key)?);
        let scan_height = scan_height.unwrap_or_else(|| self.ctx.daemon().network_height());

        let _tick = self.ctx.tick_lock.lock().await;
        let mut state = self.ctx.state();
        let state = &mut *state;
        let address =
            state
                .sub_wallets
                .import_sub_wallet(&private_spend_key, scan_height, 0, &state.config)?;
        state.rescan_from(scan_height);
        info!(address = %address, scan_height, "imported subwallet");
        Ok(address)
    }

    /// View wallets only: watches another public spend key.
    pub async fn import_view_sub_wallet(
        &self,
        public_spend_key: &str,
        scan_height: Option<u64>,
    ) -> Result<String, WalletError> {
        let public_spend_key = key_from_hex(public_spend_key)?;
        let scan_height = scan_height.unwrap_or_else(|| self.ctx.daemon().network_height());

        let _tick = self.ctx.tick_lock.lock().await;
        let mut state = self.ctx.state();
        let state = &mut *state;
        let address = state.sub_wallets.import_view_sub_wallet(
            &public_spend_key,
            scan_height,
            0,
            &state.config,
        )?;
        state.rescan_from(scan_height);
        info!(address = %address, scan_height, "imported view subwallet");
        Ok(address)
    }

    pub fn delete_sub_wallet(&self, address: &str) -> Result<(), WalletError> {
        let mut state = self.ctx.state();
        let state = &mut *state;
        state.sub_wallets.delete_sub_wallet(address, &state.config)?;
        info!(address, "deleted subwallet");
        Ok(())
    }

    pub fn set_sub_wallet_label(&self, address: &str, label: Option<String>) -> Result<(), WalletError> {
        let mut state = self.ctx.state();
        let state = &mut *state;
        state.sub_wallets.set_label(address, label, &state.config)
    }

    pub fn get_wallet_count(&self) -> usize {
        self.ctx.state().sub_wallets.count()
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.ctx.state().sub_wallets.addresses()
    }

    pub fn get_primary_address(&self) -> String {
        self.ctx
            .state()
            .sub_wallets
            .primary()
            .map(|w| w.address().to_string())
            .unwrap_or_default()
    }

    pub fn is_view_wallet(&self) -> bool {
        self.ctx.state().sub_wallets.is_view_wallet()
    }

    pub fn get_config(&self) -> Config {
        self.ctx.state().config.clone()
    }

    // ========================================================================
    // KEYS
    // ========================================================================

    pub fn get_private_view_key(&self) -> String {
        hex::encode(self.ctx.state().sub_wallets.private_view_key())
    }

    /// (public spend key, private spend key) of `address`, as hex.
    pub fn get_spend_keys(&self, address: &str) -> Result<(String, String), WalletError> {
        let state = self.ctx.state();
        let sub_wallet = state.sub_wallets.find_by_address(address, &state.config)?;
        let private = sub_wallet
            .private_spend_key()
            .ok_or(WalletError::IllegalViewWalletOperation)?;
        Ok((hex::encode(sub_wallet.public_spend_key()), hex::encode(private)))
    }

    /// (private spend key, private view key) of the primary address. A view
    /// wallet reports a spend key of 64 zeros.
    pub fn get_primary_address_private_keys(&self) -> (String, String) {
        let state = self.ctx.state();
        let spend = state
            .sub_wallets
            .primary()
            .and_then(|w| w.private_spend_key().copied())
            .unwrap_or([0u8; 32]);
        (
            hex::encode(spend),
            hex::encode(state.sub_wallets.private_view_key()),
        )
    }

    pub fn get_mnemonic_seed(&self) -> Result<String, WalletError> {
        let address = self.get_primary_address();
        self.get_mnemonic_seed_for_address(&address)
    }

    /// # Errors
    ///
    /// Address errors come first, then `IllegalViewWalletOperation`, then
    /// `KeysNotDeterministic`.
    pub fn get_mnemonic_seed_for_address(&self, address: &str) -> Result<String, WalletError> {
        let state = self.ctx.state();
        let sub_wallet = state.sub_wallets.find_by_address(address, &state.config)?;
        let private_spend_key = sub_wallet
            .private_spend_key()
            .ok_or(WalletError::IllegalViewWalletOperation)?;

        if !is_deterministic(private_spend_key, state.sub_wallets.private_view_key()) {
            return Err(WalletError::KeysNotDeterministic);
        }
        Ok(private_key_to_mnemonic(private_spend_key))
    }

    /// Validates `address` against this wallet's currency.
    pub fn validate_address(&self, address: &str, integrated_allowed: bool) -> Result<(), WalletError> {
        let config = self.get_config();
        validate_address(address, integrated_allowed, &config).map(|_| ())
    }
}

// ============================================================================
// BACKGROUND LOOP
// ============================================================================

/// Outcome of one tick.
enum Tick {
    /// There may be more blocks; go again soon.
    Busy,
    /// Nothing new, or the daemon failed; wait longer.
    Idle,
}

struct LoopState {
    generation: u64,
    daemon_events: broadcast::Receiver<DaemonEvent>,
    last_daemon_update: Option<Instant>,
    synced: bool,
}

async fn sync_loop(ctx: SyncContext, mut stop: watch::Receiver<bool>) {
    let mut loop_state = LoopState {
        generation: ctx.daemon_generation.load(Ordering::SeqCst),
        daemon_events: ctx.daemon().subscribe(),
        last_daemon_update: None,
        synced: false,
    };

    loop {
        if *stop.borrow() {
            break;
        }

        let tick = {
            let _tick = ctx.tick_lock.lock().await;
            run_tick(&ctx, &mut loop_state).await
        };

        let delay = match tick {
            Tick::Busy => ctx.state().config.sync_thread_interval,
            Tick::Idle => ctx.state().config.idle_interval,
        };

        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn refresh_daemon(daemon: &dyn Daemon) {
    let result = match daemon.update_daemon_info().await {
        Err(DaemonError::NotInitialised) => daemon.init().await,
        other => other,
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to update daemon info");
    }
}

fn drain_daemon_events(ctx: &SyncContext, loop_state: &mut LoopState, daemon: &dyn Daemon) {
    let generation = ctx.daemon_generation.load(Ordering::SeqCst);
    if generation != loop_state.generation {
        loop_state.generation = generation;
        loop_state.daemon_events = daemon.subscribe();
    }

    loop {
        match loop_state.daemon_events.try_recv() {
            Ok(DaemonEvent::Connect) => info!("daemon connected"),
            Ok(DaemonEvent::Disconnect) => warn!("daemon disconnected"),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

async fn run_tick(ctx: &SyncContext, loop_state: &mut LoopState) -> Tick {
    let daemon = ctx.daemon();
    drain_daemon_events(ctx, loop_state, daemon.as_ref());

    let (start_height, count, update_interval) = {
        let state = ctx.state();
        (
            state.synchronizer.next_height(),
            state.config.blocks_per_daemon_request,
            state.config.daemon_update_interval,
        )
    };

    let update_due = loop_state
        .last_daemon_update
        .map_or(true, |last| last.elapsed() >= update_interval);
    if update_due {
        refresh_daemon(daemon.as_ref()).await;
        loop_state.last_daemon_update = Some(Instant::now());
    }

    debug!(start_height, count, "requesting blocks");
    let blocks = match daemon.get_blocks(start_height, count).await {
        Ok(blocks) => blocks,
        Err(e) => {
            warn!(error = %e, start_height, "failed to fetch blocks");
            return Tick::Idle;
        }
    };

    let network_height = daemon.network_height();

    if blocks.is_empty() {
        // The daemon's heights may be stale; fetch them on the next tick.
        loop_state.last_daemon_update = None;
        let wallet_height = ctx.state().synchronizer.height();
        update_sync_flag(ctx, loop_state, wallet_height, network_height);
        return Tick::Idle;
    }

    let (found, wallet_height) = {
        let mut state = ctx.state();
        let found = state.apply_blocks(&blocks);
        (found, state.synchronizer.height())
    };

    debug!(wallet_height, found = found.len(), "processed blocks");
    for tx in found {
        ctx.emit(WalletEvent::Transaction(tx));
    }
    ctx.emit(WalletEvent::HeightChange {
        wallet_height,
        local_height: daemon.local_height(),
        network_height,
    });
    update_sync_flag(ctx, loop_state, wallet_height, network_height);

    Tick::Busy
}

fn update_sync_flag(ctx: &SyncContext, loop_state: &mut LoopState, wallet_height: u64, network_height: u64) {
    let synced = wallet_height >= network_height;
    if synced == loop_state.synced {
        return;
    }
    loop_state.synced = synced;

    if synced {
        info!(wallet_height, network_height, "wallet is synced");
        ctx.emit(WalletEvent::Sync {
            wallet_height,
            network_height,
        });
    } else {
        info!(wallet_height, network_height, "wallet fell behind");
        ctx.emit(WalletEvent::Desync {
            wallet_height,
            network_height,
        });
    }
}
