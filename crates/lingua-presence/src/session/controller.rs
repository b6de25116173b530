//! Presence session controller — ties one channel session to the signed-in identity.
//!
//! All work happens on a single spawned loop: identity changes, channel
//! events, activity updates, refresh ticks and teardown are handled one at
//! a time, so the session state needs no locking. Consumers observe the
//! result through a [`PresenceView`] watch channel.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lingua_core::config::PresenceConfig;
use lingua_core::types::ControllerId;

use super::refresh;
use super::state::SessionState;
use crate::channel::RealtimeClient;
use crate::channel::adapter::PresenceChannel;
use crate::channel::types::{ChannelEvent, ChannelEvents, ChannelStatus};
use crate::metrics::{MetricsSnapshot, PresenceMetrics};
use crate::presence::record::{Identity, PresenceRecord};
use crate::presence::reducer::PresenceReducer;

/// What consumers see of a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    /// Online list derived from the latest sync.
    pub online_users: Vec<PresenceRecord>,
    /// Whether this client's own track has succeeded.
    pub is_tracking: bool,
    /// Lifecycle state.
    pub state: SessionState,
}

impl PresenceView {
    /// Number of entries in the online list.
    pub fn online_count(&self) -> usize {
        self.online_users.len()
    }
}

#[derive(Debug)]
enum Command {
    UpdateActivity {
        activity: String,
        done: oneshot::Sender<()>,
    },
}

/// Handle to a running presence session loop.
///
/// Dropping the handle tears the session down as well; [`shutdown`]
/// additionally waits for the unsubscribe to finish.
///
/// [`shutdown`]: PresenceController::shutdown
pub struct PresenceController {
    id: ControllerId,
    identity: watch::Sender<Option<Identity>>,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<PresenceView>,
    metrics: Arc<PresenceMetrics>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PresenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceController")
            .field("id", &self.id)
            .field("state", &self.view.borrow().state)
            .finish()
    }
}

impl PresenceController {
    /// Starts a controller for `identity` on the current tokio runtime.
    pub fn spawn(
        client: Arc<dyn RealtimeClient>,
        config: PresenceConfig,
        identity: Option<Identity>,
    ) -> Self {
        let id = ControllerId::new();
        let (identity_tx, identity_rx) = watch::channel(identity);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(PresenceView::default());
        let metrics = Arc::new(PresenceMetrics::new());
        let cancel = CancellationToken::new();

        let session = Session {
            id,
            client,
            reducer: PresenceReducer::from_config(&config),
            refresh: refresh::ticker(config.refresh_interval()),
            activity: config.default_activity.clone(),
            config,
            metrics: metrics.clone(),
            view: view_tx,
            identity: None,
            channel: None,
            events: None,
            state: SessionState::Idle,
            is_tracking: false,
        };

        let task = tokio::spawn(session.run(identity_rx, commands_rx, cancel.clone()));
        info!(controller_id = %id, "Presence controller started");

        Self {
            id,
            identity: identity_tx,
            commands: commands_tx,
            view: view_rx,
            metrics,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Controller ID.
    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Replaces the identity. `None` signs the client out of presence.
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.identity.send_replace(identity);
    }

    /// Identity most recently supplied.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// Re-publishes this client's record with a new activity.
    ///
    /// Returns once the publish attempt is over. Does nothing when signed
    /// out or not yet tracking, and never reports an error.
    pub async fn update_activity(&self, activity: impl Into<String>) {
        let (done, finished) = oneshot::channel();
        let command = Command::UpdateActivity {
            activity: activity.into(),
            done,
        };
        if self.commands.send(command).is_err() {
            return;
        }
        let _ = finished.await;
    }

    /// Current view.
    pub fn view(&self) -> PresenceView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every view change.
    pub fn watch_view(&self) -> watch::Receiver<PresenceView> {
        self.view.clone()
    }

    /// Online list derived from the latest sync.
    pub fn online_users(&self) -> Vec<PresenceRecord> {
        self.view.borrow().online_users.clone()
    }

    /// Number of entries in the online list.
    pub fn online_count(&self) -> usize {
        self.view.borrow().online_count()
    }

    /// Whether this client's own track has succeeded.
    pub fn is_tracking(&self) -> bool {
        self.view.borrow().is_tracking
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.view.borrow().state
    }

    /// Metrics of this controller and its channels.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Tears the session down and waits for the loop to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(controller_id = %self.id, error = %e, "Presence loop ended abnormally");
            }
        }
    }
}

impl Drop for PresenceController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the controller loop.
struct Session {
    id: ControllerId,
    client: Arc<dyn RealtimeClient>,
    config: PresenceConfig,
    metrics: Arc<PresenceMetrics>,
    reducer: PresenceReducer,
    view: watch::Sender<PresenceView>,
    identity: Option<Identity>,
    channel: Option<PresenceChannel>,
    events: Option<ChannelEvents>,
    refresh: Option<Interval>,
    state: SessionState,
    is_tracking: bool,
    activity: String,
}

impl Session {
    async fn run(
        mut self,
        mut identity_rx: watch::Receiver<Option<Identity>>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        let initial = identity_rx.borrow_and_update().clone();
        self.apply_identity(initial).await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let identity = identity_rx.borrow_and_update().clone();
                    self.apply_identity(identity).await;
                }

                event = next_event(&mut self.events) => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!(controller_id = %self.id, "Presence event stream ended");
                        self.events = None;
                    }
                },

                command = commands.recv() => match command {
                    Some(Command::UpdateActivity { activity, done }) => {
                        self.update_activity(activity).await;
                        let _ = done.send(());
                    }
                    None => break,
                },

                _ = refresh::next_tick(&mut self.refresh) => self.refresh_liveness().await,
            }
        }

        self.close().await;
        info!(controller_id = %self.id, "Presence controller stopped");
    }

    async fn apply_identity(&mut self, identity: Option<Identity>) {
        if identity == self.identity {
            return;
        }
        if self.state.has_channel() {
            self.close().await;
        }
        self.identity = identity;
        if self.identity.is_some() {
            self.open();
        }
        self.publish_view();
    }

    /// Opens a brand-new channel instance and subscribes it.
    fn open(&mut self) {
        let channel = PresenceChannel::open(
            self.client.as_ref(),
            &self.config.topic,
            self.metrics.clone(),
        );
        self.events = match channel.subscribe() {
            Ok(events) => Some(events),
            Err(e) => {
                warn!(controller_id = %self.id, error = %e, "Presence subscribe failed");
                None
            }
        };
        self.channel = Some(channel);
        self.activity = self.config.default_activity.clone();
        self.state = SessionState::Subscribing;
        info!(controller_id = %self.id, topic = %self.config.topic, "Presence subscribing");
    }

    async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Status(ChannelStatus::Subscribed) => {
                if self.state != SessionState::Subscribing {
                    return;
                }
                self.state = SessionState::Tracking;
                info!(controller_id = %self.id, "Presence subscribed");
                self.track().await;
            }
            ChannelEvent::Status(status) => {
                warn!(
                    controller_id = %self.id,
                    status = status.as_str(),
                    state = %self.state,
                    "Presence channel not subscribed"
                );
            }
            ChannelEvent::Sync => {
                PresenceMetrics::inc(&self.metrics.syncs_received);
                if let Some(channel) = &self.channel {
                    let snapshot = channel.snapshot();
                    let online = self.reducer.apply_sync(&snapshot).len();
                    debug!(controller_id = %self.id, online, "Presence sync");
                }
            }
            ChannelEvent::Join { key } => {
                PresenceMetrics::inc(&self.metrics.joins_received);
                debug!(controller_id = %self.id, key = %key, "Presence join");
            }
            ChannelEvent::Leave { key } => {
                PresenceMetrics::inc(&self.metrics.leaves_received);
                debug!(controller_id = %self.id, key = %key, "Presence leave");
            }
        }
        self.publish_view();
    }

    async fn update_activity(&mut self, activity: String) {
        if self.identity.is_none() || !self.is_tracking {
            debug!(controller_id = %self.id, activity = %activity, "Not tracking, activity update ignored");
            return;
        }
        self.activity = activity;
        self.track().await;
        self.publish_view();
    }

    async fn refresh_liveness(&mut self) {
        if self.is_tracking {
            self.track().await;
        }
    }

    async fn track(&mut self) {
        let (Some(identity), Some(channel)) = (&self.identity, self.channel.as_mut()) else {
            return;
        };
        match channel.track(identity, &self.activity).await {
            Ok(_) => self.is_tracking = true,
            Err(e) => warn!(controller_id = %self.id, error = %e, "Presence track failed"),
        }
    }

    /// Unsubscribes and forgets everything derived from the channel.
    async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
        self.events = None;
        self.reducer.clear();
        self.is_tracking = false;
        self.state = SessionState::Closed;
        info!(controller_id = %self.id, "Presence closed");
        self.publish_view();
    }

    fn publish_view(&self) {
        self.view.send_replace(PresenceView {
            online_users: self.reducer.online_users().to_vec(),
            is_tracking: self.is_tracking,
            state: self.state,
        });
    }
}

async fn next_event(events: &mut Option<ChannelEvents>) -> Option<ChannelEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
