//! Controller behaviour against a channel whose events the test drives by hand.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use lingua_core::AppResult;
use lingua_core::config::PresenceConfig;
use lingua_presence::{
    ChannelEvent, ChannelEvents, ChannelStatus, Identity, PresenceController, PresenceSnapshot,
    PresenceView, RealtimeChannel, RealtimeClient, SessionState,
};

#[derive(Debug, Default)]
struct ScriptedState {
    /// Event sender of every subscribed instance, in creation order.
    senders: Mutex<Vec<mpsc::UnboundedSender<ChannelEvent>>>,
    /// Presence state every instance reports.
    presence: Mutex<PresenceSnapshot>,
    /// Instance index and payload of every track.
    tracks: Mutex<Vec<(usize, Value)>>,
    channels: AtomicUsize,
    unsubscribes: AtomicUsize,
}

/// Hands out channels that never emit anything on their own.
#[derive(Debug, Clone, Default)]
struct ScriptedClient {
    state: Arc<ScriptedState>,
}

impl ScriptedClient {
    fn send(&self, instance: usize, event: ChannelEvent) {
        let senders = self.state.senders.lock().unwrap();
        // A torn-down instance has dropped its receiver.
        let _ = senders[instance].send(event);
    }

    fn set_presence(&self, presence: PresenceSnapshot) {
        *self.state.presence.lock().unwrap() = presence;
    }

    fn subscribed(&self) -> usize {
        self.state.senders.lock().unwrap().len()
    }

    fn tracks(&self) -> Vec<(usize, Value)> {
        self.state.tracks.lock().unwrap().clone()
    }

    fn unsubscribes(&self) -> usize {
        self.state.unsubscribes.load(Ordering::SeqCst)
    }
}

impl RealtimeClient for ScriptedClient {
    fn channel(&self, topic: &str) -> Arc<dyn RealtimeChannel> {
        let index = self.state.channels.fetch_add(1, Ordering::SeqCst);
        Arc::new(ScriptedChannel {
            topic: topic.to_string(),
            index,
            state: self.state.clone(),
        })
    }
}

#[derive(Debug)]
struct ScriptedChannel {
    topic: String,
    index: usize,
    state: Arc<ScriptedState>,
}

#[async_trait]
impl RealtimeChannel for ScriptedChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn subscribe(&self) -> AppResult<ChannelEvents> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.senders.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn track(&self, payload: Value) -> AppResult<()> {
        self.state.tracks.lock().unwrap().push((self.index, payload));
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.state.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }

    fn presence_state(&self) -> PresenceSnapshot {
        self.state.presence.lock().unwrap().clone()
    }
}

fn ana() -> Identity {
    Identity::new("user-ana", "ana@example.com")
}

fn ben() -> Identity {
    Identity::new("user-ben", "ben@example.com")
}

fn blob(user_id: &str) -> Value {
    json!({
        "user_id": user_id,
        "email": format!("{user_id}@example.com"),
        "activity": "browsing",
        "online_at": "2024-01-01T00:00:00.000Z",
    })
}

fn presence(entries: &[(&str, &str)]) -> PresenceSnapshot {
    entries
        .iter()
        .map(|(key, user_id)| (key.to_string(), vec![blob(user_id)]))
        .collect::<BTreeMap<_, _>>()
}

fn spawn(client: &ScriptedClient, identity: Option<Identity>) -> PresenceController {
    PresenceController::spawn(
        Arc::new(client.clone()),
        PresenceConfig::default(),
        identity,
    )
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_until(
    controller: &PresenceController,
    mut predicate: impl FnMut(&PresenceView) -> bool,
) -> PresenceView {
    let mut rx = controller.watch_view();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|view| predicate(view)))
        .await
        .expect("timed out waiting for presence view")
        .map(|view| view.clone())
        .expect("presence controller stopped")
}

#[tokio::test]
async fn test_join_and_leave_do_not_touch_list_until_sync() {
    let client = ScriptedClient::default();
    let controller = spawn(&client, Some(ana()));
    eventually(|| client.subscribed() == 1).await;

    client.set_presence(presence(&[("k1", "user-ana")]));
    client.send(0, ChannelEvent::Status(ChannelStatus::Subscribed));
    client.send(0, ChannelEvent::Sync);
    wait_until(&controller, |v| v.is_tracking && v.online_count() == 1).await;

    client.set_presence(presence(&[
        ("k2", "user-ben"),
        ("k3", "user-cy"),
        ("k4", "user-dee"),
    ]));
    client.send(0, ChannelEvent::Join { key: "k2".into() });
    client.send(0, ChannelEvent::Leave { key: "k1".into() });
    eventually(|| {
        let metrics = controller.metrics();
        metrics.joins_received == 1 && metrics.leaves_received == 1
    })
    .await;

    assert_eq!(controller.online_count(), 1);
    assert_eq!(controller.online_users()[0].user_id, "user-ana");
    assert_eq!(controller.metrics().syncs_received, 1);

    client.send(0, ChannelEvent::Sync);
    let view = wait_until(&controller, |v| v.online_count() == 3).await;
    let users: Vec<_> = view.online_users.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(users, ["user-ben", "user-cy", "user-dee"]);
    assert_eq!(controller.metrics().syncs_received, 2);

    controller.shutdown().await;
}

#[tokio::test]
async fn test_late_subscribed_after_teardown_is_dropped() {
    let client = ScriptedClient::default();
    let controller = spawn(&client, Some(ana()));
    wait_until(&controller, |v| v.state == SessionState::Subscribing).await;
    assert_eq!(client.subscribed(), 1);

    controller.set_identity(None);
    wait_until(&controller, |v| v.state == SessionState::Closed).await;

    client.set_presence(presence(&[("k1", "user-ana")]));
    client.send(0, ChannelEvent::Status(ChannelStatus::Subscribed));
    client.send(0, ChannelEvent::Sync);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.tracks().is_empty());
    assert_eq!(controller.state(), SessionState::Closed);
    assert!(!controller.is_tracking());
    assert_eq!(controller.online_count(), 0);
    assert_eq!(client.unsubscribes(), 1);

    controller.shutdown().await;
    assert_eq!(client.unsubscribes(), 1);
}

#[tokio::test]
async fn test_identity_swap_mid_subscribe_tracks_only_new_channel() {
    let client = ScriptedClient::default();
    let controller = spawn(&client, Some(ana()));
    eventually(|| client.subscribed() == 1).await;

    controller.set_identity(Some(ben()));
    eventually(|| client.subscribed() == 2).await;
    assert_eq!(client.unsubscribes(), 1);

    client.send(0, ChannelEvent::Status(ChannelStatus::Subscribed));
    client.send(1, ChannelEvent::Status(ChannelStatus::Subscribed));
    wait_until(&controller, |v| v.is_tracking).await;

    let tracks = client.tracks();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].0, 1);
    assert_eq!(tracks[0].1["user_id"], "user-ben");

    controller.shutdown().await;
    assert_eq!(client.unsubscribes(), 2);
}
