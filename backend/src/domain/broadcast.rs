//! In-process broadcast hub for live vote counts.
//!
//! One coordinator task owns the subscriber registry. Callers talk to it
//! through a command channel, so subscribe, unsubscribe and publish are
//! serialised without a lock around the registry.
//!
//! Every subscriber gets a bounded queue. Publishing never waits for a
//! subscriber: when a queue is full the subscriber is disconnected (its
//! sender is dropped, it drains what is buffered and then sees
//! [`SubscriptionClosed`]). Queues whose receiver is gone are pruned.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::VoteUpdate;
use super::ports::{VoteEventPublisher, VoteFeed};

/// Per-subscriber queue length used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const COMMAND_BUFFER: usize = 256;

/// Identifier assigned to each subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The coordinator task is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The coordinator exited, so commands have nowhere to go.
    #[error("broadcast hub has stopped")]
    Stopped,
}

/// The subscription's queue is closed and drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("subscription closed")]
pub struct SubscriptionClosed;

#[derive(Debug)]
enum Command {
    Subscribe {
        id: SubscriberId,
        queue: mpsc::Sender<VoteUpdate>,
        registered: oneshot::Sender<()>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Publish {
        update: VoteUpdate,
    },
    SubscriberCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the broadcast hub. Cheap to clone.
#[derive(Debug, Clone)]
pub struct VoteHub {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl VoteHub {
    /// Spawn the coordinator on the current Tokio runtime.
    ///
    /// A `queue_capacity` of zero is raised to one.
    pub fn spawn(queue_capacity: usize) -> Self {
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(coordinate(inbox));
        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber. Events published after this returns are
    /// delivered to it.
    pub async fn subscribe(&self) -> Result<Subscription, HubError> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, events) = mpsc::channel(self.queue_capacity);
        let (registered, ack) = oneshot::channel();
        self.send(Command::Subscribe {
            id,
            queue,
            registered,
        })
        .await?;
        ack.await.map_err(|_| HubError::Stopped)?;
        Ok(Subscription {
            id,
            events,
            commands: self.commands.clone(),
            registered: true,
        })
    }

    /// Deliver `update` to every registered subscriber.
    pub async fn publish(&self, update: VoteUpdate) -> Result<(), HubError> {
        self.send(Command::Publish { update }).await
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> Result<usize, HubError> {
        let (reply, count) = oneshot::channel();
        self.send(Command::SubscriberCount { reply }).await?;
        count.await.map_err(|_| HubError::Stopped)
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Stopped)
    }
}

#[async_trait]
impl VoteEventPublisher for VoteHub {
    async fn publish(&self, update: VoteUpdate) -> Result<(), HubError> {
        VoteHub::publish(self, update).await
    }
}

#[async_trait]
impl VoteFeed for VoteHub {
    async fn subscribe(&self) -> Result<Subscription, HubError> {
        VoteHub::subscribe(self).await
    }
}

async fn coordinate(mut inbox: mpsc::Receiver<Command>) {
    let mut subscribers: HashMap<SubscriberId, mpsc::Sender<VoteUpdate>> = HashMap::new();
    while let Some(command) = inbox.recv().await {
        match command {
            Command::Subscribe {
                id,
                queue,
                registered,
            } => {
                // The caller may have given up waiting.
                if registered.send(()).is_ok() {
                    subscribers.insert(id, queue);
                    debug!(subscriber = %id, "subscriber registered");
                }
            }
            Command::Unsubscribe { id } => {
                if subscribers.remove(&id).is_some() {
                    debug!(subscriber = %id, "subscriber unregistered");
                }
            }
            Command::Publish { update } => fan_out(&mut subscribers, update),
            Command::SubscriberCount { reply } => {
                let _ = reply.send(subscribers.len());
            }
        }
    }
    debug!("vote hub stopped");
}

fn fan_out(subscribers: &mut HashMap<SubscriberId, mpsc::Sender<VoteUpdate>>, update: VoteUpdate) {
    subscribers.retain(|id, queue| match queue.try_send(update) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(subscriber = %id, "subscriber queue full; disconnecting slow consumer");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(subscriber = %id, "pruning closed subscriber");
            false
        }
    });
}

/// One subscriber's handle. Dropping it deregisters best-effort; call
/// [`Subscription::unsubscribe`] to deregister deterministically.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    events: mpsc::Receiver<VoteUpdate>,
    commands: mpsc::Sender<Command>,
    registered: bool,
}

impl Subscription {
    /// Identifier assigned by the hub.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event in publish order.
    ///
    /// # Errors
    /// [`SubscriptionClosed`] once the queue is closed (unsubscribed,
    /// disconnected as a slow consumer, or hub stopped) and drained.
    pub async fn recv(&mut self) -> Result<VoteUpdate, SubscriptionClosed> {
        self.events.recv().await.ok_or(SubscriptionClosed)
    }

    /// Deregister and close the queue. Already buffered events can still be
    /// drained with [`Subscription::recv`].
    pub async fn unsubscribe(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        self.events.close();
        // A stopped hub holds no registration to remove.
        let _ = self
            .commands
            .send(Command::Unsubscribe { id: self.id })
            .await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registered {
            // Dropping the receiver closes the queue, so a lost command is
            // still pruned on the next publish.
            let _ = self.commands.try_send(Command::Unsubscribe { id: self.id });
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
