//! MessageBus core - subscriptions, delivery, history ring, request/response

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colored::Colorize;
use statestore::now_ms;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::message::{BusMessage, MessageFilter, MessagePriority, MessageType, Recipient};

/// Log line used when a request/response wait times out
pub const NO_RESPONSE_TIMEOUT_LOG: &str = "request timed out without response";

/// Listener callback; a returned error is recorded and swallowed
pub type BusListener = Box<dyn Fn(&BusMessage) -> eyre::Result<()> + Send>;

struct Listener {
    name: String,
    callback: BusListener,
}

#[derive(Default)]
struct BusInner {
    /// Bounded ring of everything ever published (oldest non-critical evicted)
    history: VecDeque<BusMessage>,

    /// Undelivered messages per phase
    inboxes: HashMap<String, Vec<BusMessage>>,

    /// Broadcast interest: phase -> message types
    subscriptions: HashMap<String, BTreeSet<MessageType>>,

    /// In registration order; iterated deterministically on publish
    listeners: Vec<Listener>,

    /// Waiters keyed by request correlation id
    pending_responses: HashMap<String, oneshot::Sender<BusMessage>>,

    /// Listener failures, kept for diagnostics
    error_log: Vec<String>,
}

/// In-process pub/sub bus; cheap to clone, internally serialized
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<Mutex<BusInner>>,
    history_cap: usize,
}

impl MessageBus {
    pub fn new(history_cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner::default())),
            history_cap: history_cap.max(1),
        }
    }

    /// Register broadcast interest; duplicate subscribes are idempotent
    pub fn subscribe(&self, phase: &str, types: &[MessageType]) {
        let mut inner = self.inner.lock().expect("bus poisoned");
        let entry = inner.subscriptions.entry(phase.to_string()).or_default();
        entry.extend(types.iter().copied());
        inner.inboxes.entry(phase.to_string()).or_default();
    }

    /// Attach a listener callback invoked on every publish
    pub fn add_listener(&self, name: impl Into<String>, callback: BusListener) {
        let mut inner = self.inner.lock().expect("bus poisoned");
        inner.listeners.push(Listener {
            name: name.into(),
            callback,
        });
    }

    /// Publish a message; delivery to all matching parties completes before
    /// this returns
    pub fn publish(&self, message: BusMessage) {
        if message.priority == MessagePriority::Critical {
            // Critical traffic is always surfaced on the console, with or
            // without subscribers
            eprintln!("{}", message.summary().red().bold());
        }

        let mut inner = self.inner.lock().expect("bus poisoned");
        let now = now_ms();

        // Responses complete a pending request/response wait instead of
        // landing in an inbox; they never create new requests
        if message.message_type == MessageType::Response
            && let Some(request_id) = &message.request_id
            && let Some(tx) = inner.pending_responses.remove(request_id)
        {
            let _ = tx.send(message.clone());
        }

        // Inbox delivery, at most once per phase per message
        match &message.recipient {
            Recipient::Phase(phase) => {
                inner
                    .inboxes
                    .entry(phase.clone())
                    .or_default()
                    .push(message.clone());
            }
            Recipient::Broadcast => {
                let targets: Vec<String> = inner
                    .subscriptions
                    .iter()
                    .filter(|(_, types)| types.contains(&message.message_type))
                    .map(|(phase, _)| phase.clone())
                    .collect();
                for phase in targets {
                    inner
                        .inboxes
                        .entry(phase)
                        .or_default()
                        .push(message.clone());
                }
            }
        }

        // Listeners, registration order; a failing listener never blocks the rest
        let mut failures = Vec::new();
        for listener in &inner.listeners {
            if let Err(e) = (listener.callback)(&message) {
                failures.push(format!("listener {} failed on {}: {}", listener.name, message.id, e));
            }
        }
        for failure in failures {
            warn!("{}", failure);
            inner.error_log.push(failure);
        }

        // History ring with critical-preferring eviction
        inner.history.push_back(message);
        while inner.history.len() > self.history_cap {
            let victim = inner
                .history
                .iter()
                .position(|m| m.priority != MessagePriority::Critical)
                .unwrap_or(0);
            inner.history.remove(victim);
        }

        // Sweep expired inbox entries opportunistically
        for inbox in inner.inboxes.values_mut() {
            inbox.retain(|m| !m.is_expired(now));
        }
    }

    /// Messages waiting for a phase (direct or subscribed broadcast)
    pub fn get_messages(&self, phase: &str, filter: &MessageFilter) -> Vec<BusMessage> {
        let inner = self.inner.lock().expect("bus poisoned");
        let now = now_ms();
        inner
            .inboxes
            .get(phase)
            .map(|inbox| {
                inbox
                    .iter()
                    .filter(|m| !m.is_expired(now) && filter.matches(m))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop processed entries from a phase's inbox
    pub fn clear(&self, phase: &str, ids: &[String]) {
        let mut inner = self.inner.lock().expect("bus poisoned");
        if let Some(inbox) = inner.inboxes.get_mut(phase) {
            inbox.retain(|m| !ids.contains(&m.id));
        }
    }

    /// Query the full history ring
    pub fn search(&self, filter: &MessageFilter) -> Vec<BusMessage> {
        let inner = self.inner.lock().expect("bus poisoned");
        inner.history.iter().filter(|m| filter.matches(m)).cloned().collect()
    }

    /// Publish a request and wait up to `timeout` for the matching response
    ///
    /// Returns `None` on timeout; never errors out of a missing responder.
    pub async fn request_response(
        &self,
        sender: &str,
        recipient: &str,
        message_type: MessageType,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Option<BusMessage> {
        let request_id = uuid::Uuid::now_v7().to_string();
        let (tx, rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock().expect("bus poisoned");
            inner.pending_responses.insert(request_id.clone(), tx);
        }

        let mut request = BusMessage::to_phase(sender, recipient, message_type).with_payload(payload);
        request.request_id = Some(request_id.clone());
        request.requires_response = true;
        self.publish(request);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Some(response),
            _ => {
                debug!(request_id = %request_id, "{}", NO_RESPONSE_TIMEOUT_LOG);
                let mut inner = self.inner.lock().expect("bus poisoned");
                inner.pending_responses.remove(&request_id);
                None
            }
        }
    }

    /// Reply to a request; copies the correlation id
    pub fn respond(&self, request: &BusMessage, sender: &str, payload: serde_json::Value) {
        let mut response = BusMessage::to_phase(sender, request.sender.clone(), MessageType::Response)
            .with_payload(payload);
        response.request_id = request.request_id.clone();
        response.requires_response = false;
        self.publish(response);
    }

    /// Snapshot of the history ring, oldest first (for persistence)
    pub fn history_snapshot(&self) -> Vec<BusMessage> {
        let inner = self.inner.lock().expect("bus poisoned");
        inner.history.iter().cloned().collect()
    }

    /// Restore a persisted history (startup); does not re-deliver
    pub fn restore_history(&self, messages: Vec<BusMessage>) {
        let mut inner = self.inner.lock().expect("bus poisoned");
        inner.history = messages.into_iter().collect();
        while inner.history.len() > self.history_cap {
            inner.history.pop_front();
        }
    }

    /// Listener failures recorded so far
    pub fn error_log(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("bus poisoned");
        inner.error_log.clone()
    }
}
