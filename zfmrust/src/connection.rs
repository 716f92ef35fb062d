//! Connection management
//!
//! A supervisor task owns the connection lifecycle: open the port, run the
//! address+password handshake, hand the link to callers, and re-establish
//! the session whenever the link drops. There is no terminal error state;
//! the supervisor retries forever on a backoff until `stop()`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zfmrust_core::Command;
use zfmrust_transport::Transport;
use zfmrust_types::params::{baud_to_int, packet_size_to_int};

use crate::config::SensorConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link
    Disconnected,

    /// Opening the port
    Connecting,

    /// Verifying password (and assigning the address when configured)
    Handshaking,

    /// Authenticated and accepting operations
    Ready,

    /// Shut down; no further reconnection attempts
    Stopped,
}

/// Future returned by a ready listener
pub type ReadyFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub(crate) type ReadyListener = Arc<dyn Fn() -> ReadyFuture + Send + Sync>;

/// Produces a fresh transport for each connection attempt
pub type TransportFactory = Box<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// State shared between the facade and the supervisor task
pub(crate) struct Shared {
    pub config: SensorConfig,

    /// The single exchange region: one packet exchange in flight at a time
    pub link: Mutex<Option<Dispatcher>>,

    pub state_tx: watch::Sender<LinkState>,
    pub listeners: parking_lot::Mutex<Vec<ReadyListener>>,
    pub cancel: CancellationToken,

    /// Highest link epoch that reported loss
    lost_tx: watch::Sender<u64>,

    /// Epoch of the current link
    epoch: AtomicU64,

    // Live session values; seeded from the config, updated by set
    // operations so reconnects keep working after the device changed
    pub address: AtomicU32,
    pub password: AtomicU32,
    pub baud_rate: AtomicU32,
    pub packet_size: AtomicUsize,
}

impl Shared {
    pub fn new(config: SensorConfig) -> Self {
        let address = config.address;
        let password = config.password;
        let baud_rate = baud_to_int(config.baud_rate);
        let packet_size = packet_size_to_int(config.packet_size) as usize;

        Self {
            config,
            link: Mutex::new(None),
            state_tx: watch::channel(LinkState::Disconnected).0,
            listeners: parking_lot::Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            lost_tx: watch::channel(0).0,
            epoch: AtomicU64::new(0),
            address: AtomicU32::new(address),
            password: AtomicU32::new(password),
            baud_rate: AtomicU32::new(baud_rate),
            packet_size: AtomicUsize::new(packet_size),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    pub fn set_state(&self, state: LinkState) {
        self.state_tx.send_replace(state);
    }

    /// Flag the link of `epoch` as lost; reports from older links are
    /// ignored so a stale failure cannot tear down a fresh session
    pub fn report_lost(&self, epoch: u64) {
        self.lost_tx.send_if_modified(|current| {
            if epoch > *current {
                *current = epoch;
                true
            } else {
                false
            }
        });
    }
}

pub(crate) fn spawn(shared: Arc<Shared>, factory: TransportFactory) -> JoinHandle<()> {
    tokio::spawn(supervise(shared, factory))
}

async fn supervise(shared: Arc<Shared>, factory: TransportFactory) {
    let mut lost_rx = shared.lost_tx.subscribe();

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        shared.set_state(LinkState::Connecting);
        let mut transport = factory();
        if let Err(e) = transport.connect().await {
            warn!(error = %e, "failed to open the port");
            shared.set_state(LinkState::Disconnected);
            if !backoff(&shared).await {
                break;
            }
            continue;
        }

        shared.set_state(LinkState::Handshaking);
        let epoch = shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let mut dispatcher = Dispatcher::new(
            transport,
            shared.address.load(Ordering::Acquire),
            shared.packet_size.load(Ordering::Acquire),
            shared.config.retries,
            shared.config.ack_timeout,
            shared.cancel.clone(),
            epoch,
        );

        if let Err(e) = handshake(&mut dispatcher, &shared).await {
            warn!(error = %e, "handshake failed");
            dispatcher.shutdown().await;
            shared.set_state(LinkState::Disconnected);
            if !backoff(&shared).await {
                break;
            }
            continue;
        }

        *shared.link.lock().await = Some(dispatcher);
        shared.set_state(LinkState::Ready);
        info!(port = %shared.config.port, "sensor ready");

        // Every subscriber runs exactly once, in registration order, on
        // each transition into Ready; the supervision loop resumes only
        // after they return
        let listeners: Vec<ReadyListener> = shared.listeners.lock().clone();
        debug!(count = listeners.len(), "invoking ready listeners");
        for listener in listeners {
            listener().await;
        }

        if shared.cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            // Map the watch::Ref (not Send) to an owned `()` inside the branch
            // future so nothing non-Send lives across the awaits below and the
            // supervisor future stays Send.
            result = async { lost_rx.wait_for(|reported| *reported >= epoch).await.map(|_| ()) } => {
                if result.is_err() {
                    break;
                }
                warn!("link lost, reconnecting");
                if let Some(mut old) = shared.link.lock().await.take() {
                    old.shutdown().await;
                }
                shared.set_state(LinkState::Disconnected);
                if !backoff(&shared).await {
                    break;
                }
            }
        }
    }

    if let Some(mut old) = shared.link.lock().await.take() {
        old.shutdown().await;
    }
    shared.listeners.lock().clear();
    shared.set_state(LinkState::Stopped);
    debug!("supervisor stopped");
}

/// Sleep out the reconnect backoff; false when shutdown interrupted it
async fn backoff(shared: &Shared) -> bool {
    tokio::select! {
        _ = shared.cancel.cancelled() => false,
        _ = tokio::time::sleep(shared.config.reconnect_backoff) => true,
    }
}

/// Password verification, plus the address-set exchange when configured
async fn handshake(dispatcher: &mut Dispatcher, shared: &Shared) -> Result<()> {
    let password = shared.password.load(Ordering::Acquire);
    let ack = dispatcher
        .command(Command::PasswordVerify, &password.to_be_bytes())
        .await?;
    if !ack.code.is_success() {
        return Err(Error::AuthenticationFailed(ack.code));
    }

    if let Some(address) = shared.config.assign_address {
        let ack = dispatcher
            .command(Command::AddressSet, &address.to_be_bytes())
            .await?;
        if !ack.code.is_success() {
            return Err(Error::AuthenticationFailed(ack.code));
        }
        dispatcher.set_address(address);
        shared.address.store(address, Ordering::Release);
    }

    Ok(())
}
