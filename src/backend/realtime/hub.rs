/**
 * Connection Hub
 *
 * The hub is the registry of live WebSocket clients, keyed by user id. A
 * single task owns the map; everything else talks to it through a cloneable
 * [`Hub`] handle that sends commands over a bounded channel. Because one
 * loop applies every command in arrival order, register, unregister,
 * broadcast and directed delivery are totally ordered without any locks.
 *
 * # Delivery
 *
 * Every hub -> client send is a non-blocking `try_send` on the client's
 * bounded outbound queue. A full (or already closed) queue means the client
 * is stuck: it is removed from the map, its queue is closed, and the other
 * clients are told it went offline.
 *
 * # Displacement
 *
 * A second registration for the same user replaces the first. The old
 * queue is closed so its pumps unwind, but no `user_offline` is sent since
 * the user is still online through the new connection. Each client carries
 * a [`ClientId`], and an unregister whose id no longer matches the stored
 * client is ignored.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::shared::event::{ClientEvent, Envelope, ServerEvent};
use crate::shared::messaging::OnlineUser;

/// Identity token distinguishing successive connections of one user
pub type ClientId = u64;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Who a connection belongs to, plus its identity token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRef {
    pub id: ClientId,
    pub user_id: String,
    pub nickname: String,
}

impl ClientRef {
    /// Identity for a new connection; every call yields a fresh id.
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            user_id: user_id.into(),
            nickname: nickname.into(),
        }
    }
}

/// A registered connection as held by the hub.
///
/// The hub holds the only sender of the outbound queue, so dropping a
/// `LiveClient` closes the queue and lets the write pump finish.
#[derive(Debug)]
pub struct LiveClient {
    identity: ClientRef,
    outbound: mpsc::Sender<ServerEvent>,
}

impl LiveClient {
    /// Create a client together with the receiving end of its outbound queue.
    pub fn channel(identity: ClientRef, capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (outbound, receiver) = mpsc::channel(capacity);
        (Self { identity, outbound }, receiver)
    }

    pub fn identity(&self) -> &ClientRef {
        &self.identity
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

enum Command {
    Register(LiveClient),
    Unregister(ClientRef),
    Inbound {
        sender: ClientRef,
        envelope: Envelope,
    },
    Reject {
        sender: ClientRef,
        message: String,
    },
    SendToUser {
        user_id: String,
        event: ServerEvent,
        reply: oneshot::Sender<bool>,
    },
    Broadcast {
        event: ServerEvent,
        exclude: Option<String>,
    },
    OnlineUsers {
        reply: oneshot::Sender<Vec<OnlineUser>>,
    },
    Shutdown,
}

/// Handle to the hub loop
#[derive(Clone, Debug)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Register(_) => "Register",
            Self::Unregister(_) => "Unregister",
            Self::Inbound { .. } => "Inbound",
            Self::Reject { .. } => "Reject",
            Self::SendToUser { .. } => "SendToUser",
            Self::Broadcast { .. } => "Broadcast",
            Self::OnlineUsers { .. } => "OnlineUsers",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl Hub {
    /// Spawn the hub loop.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Bound of the command channel
    ///
    /// # Returns
    ///
    /// The handle and the loop's join handle. The loop ends on
    /// [`Hub::shutdown`] or once every handle has been dropped.
    pub fn start(capacity: usize) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(
            HubLoop {
                clients: HashMap::new(),
                commands: receiver,
            }
            .run(),
        );
        (Self { commands }, task)
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands.send(command).await.map_err(|_| HubError::Closed)
    }

    pub async fn register(&self, client: LiveClient) -> Result<(), HubError> {
        self.send(Command::Register(client)).await
    }

    /// Remove `client` if it is still the registered connection of its user.
    pub async fn unregister(&self, client: &ClientRef) -> Result<(), HubError> {
        self.send(Command::Unregister(client.clone())).await
    }

    /// Dispatch an inbound frame from `sender`.
    pub async fn handle_message(&self, sender: &ClientRef, envelope: Envelope) -> Result<(), HubError> {
        self.send(Command::Inbound {
            sender: sender.clone(),
            envelope,
        })
        .await
    }

    /// Answer `sender` with an `error` frame.
    pub async fn reject(&self, sender: &ClientRef, message: impl Into<String>) -> Result<(), HubError> {
        self.send(Command::Reject {
            sender: sender.clone(),
            message: message.into(),
        })
        .await
    }

    /// Enqueue `event` for `user_id` if they are connected.
    ///
    /// Returns whether the frame was queued. This is not an acknowledgement
    /// from the client.
    pub async fn send_to_user(&self, user_id: &str, event: ServerEvent) -> Result<bool, HubError> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::SendToUser {
            user_id: user_id.to_string(),
            event,
            reply,
        })
        .await?;
        answer.await.map_err(|_| HubError::Closed)
    }

    /// Enqueue `event` for every client except `exclude`.
    pub async fn broadcast(&self, event: ServerEvent, exclude: Option<&str>) -> Result<(), HubError> {
        self.send(Command::Broadcast {
            event,
            exclude: exclude.map(str::to_string),
        })
        .await
    }

    /// Snapshot of connected users, sorted by nickname.
    pub async fn online_users(&self) -> Result<Vec<OnlineUser>, HubError> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::OnlineUsers { reply }).await?;
        answer.await.map_err(|_| HubError::Closed)
    }

    pub async fn is_online(&self, user_id: &str) -> Result<bool, HubError> {
        Ok(self
            .online_users()
            .await?
            .iter()
            .any(|user| user.user_id == user_id))
    }

    /// Stop the loop and close every client queue.
    pub async fn shutdown(&self) {
        if self.send(Command::Shutdown).await.is_err() {
            tracing::debug!("[Hub] shutdown requested but the loop already stopped");
        }
    }
}

struct HubLoop {
    clients: HashMap<String, LiveClient>,
    commands: mpsc::Receiver<Command>,
}

impl HubLoop {
    async fn run(mut self) {
        tracing::info!("[Hub] started");

        while let Some(command) = self.commands.recv().await {
            tracing::trace!("[Hub] command {:?}", command);
            match command {
                Command::Register(client) => self.register(client),
                Command::Unregister(client) => self.unregister(&client),
                Command::Inbound { sender, envelope } => self.dispatch(&sender, &envelope),
                Command::Reject { sender, message } => {
                    self.reply(&sender, ServerEvent::error(message));
                }
                Command::SendToUser {
                    user_id,
                    event,
                    reply,
                } => {
                    let delivered = self.deliver(&user_id, event);
                    let _ = reply.send(delivered);
                }
                Command::Broadcast { event, exclude } => self.broadcast(&event, exclude.as_deref()),
                Command::OnlineUsers { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Shutdown => break,
            }
        }

        let remaining = self.clients.len();
        self.clients.clear();
        tracing::info!("[Hub] stopped, closed {} client queue(s)", remaining);
    }

    fn register(&mut self, client: LiveClient) {
        let identity = client.identity.clone();

        if let Some(previous) = self.clients.remove(&identity.user_id) {
            tracing::info!(
                "[Hub] {} reconnected, displacing connection {} with {}",
                identity.nickname,
                previous.identity.id,
                identity.id
            );
        }

        self.clients.insert(identity.user_id.clone(), client);
        tracing::info!(
            "[Hub] registered {} ({}), {} online",
            identity.nickname,
            identity.user_id,
            self.clients.len()
        );

        let event = ServerEvent::user_online(&identity.user_id, &identity.nickname);
        self.broadcast(&event, Some(&identity.user_id));
    }

    fn unregister(&mut self, client: &ClientRef) {
        let is_current = self
            .clients
            .get(&client.user_id)
            .is_some_and(|stored| stored.identity.id == client.id);

        if !is_current {
            tracing::debug!(
                "[Hub] ignoring stale unregister for {} (connection {})",
                client.user_id,
                client.id
            );
            return;
        }

        self.clients.remove(&client.user_id);
        tracing::info!(
            "[Hub] unregistered {} ({}), {} online",
            client.nickname,
            client.user_id,
            self.clients.len()
        );

        let event = ServerEvent::user_offline(&client.user_id, &client.nickname);
        self.broadcast(&event, Some(&client.user_id));
    }

    fn is_current(&self, client: &ClientRef) -> bool {
        self.clients
            .get(&client.user_id)
            .is_some_and(|stored| stored.identity.id == client.id)
    }

    fn dispatch(&mut self, sender: &ClientRef, envelope: &Envelope) {
        if !self.is_current(sender) {
            tracing::debug!("[Hub] dropping frame from displaced connection {}", sender.id);
            return;
        }

        match ClientEvent::decode(envelope) {
            Ok(ClientEvent::TypingStart(indicator)) => {
                self.relay_typing(sender, &indicator.recipient_id, true)
            }
            Ok(ClientEvent::TypingStop(indicator)) => {
                self.relay_typing(sender, &indicator.recipient_id, false)
            }
            Ok(ClientEvent::SendMessage) => self.reply(
                sender,
                ServerEvent::error(
                    "Unsupported event type. Use HTTP POST /api/messages/send to send messages.",
                ),
            ),
            Ok(ClientEvent::Unsupported(name)) => {
                tracing::debug!("[Hub] unsupported event {:?} from {}", name, sender.user_id);
                self.reply(sender, ServerEvent::error(format!("Unsupported event type: {}", name)));
            }
            Err(err) => self.reply(sender, ServerEvent::error(err.reason())),
        }
    }

    fn relay_typing(&mut self, sender: &ClientRef, recipient_id: &str, is_typing: bool) {
        if recipient_id.is_empty() || recipient_id == sender.user_id {
            return;
        }
        let event = ServerEvent::typing(&sender.user_id, &sender.nickname, is_typing);
        // Offline recipients simply miss it.
        self.deliver(recipient_id, event);
    }

    fn reply(&mut self, sender: &ClientRef, event: ServerEvent) {
        if self.is_current(sender) {
            self.deliver(&sender.user_id, event);
        }
    }

    fn deliver(&mut self, user_id: &str, event: ServerEvent) -> bool {
        let Some(client) = self.clients.get(user_id) else {
            return false;
        };

        match client.outbound.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("[Hub] outbound queue full for {}, dropping client", user_id);
                self.evict(vec![user_id.to_string()]);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.evict(vec![user_id.to_string()]);
                false
            }
        }
    }

    fn broadcast(&mut self, event: &ServerEvent, exclude: Option<&str>) {
        let stuck = self.fan_out(event, exclude);
        self.evict(stuck);
    }

    /// Enqueue to everyone but `exclude`; returns the users whose queue refused the frame.
    fn fan_out(&self, event: &ServerEvent, exclude: Option<&str>) -> Vec<String> {
        self.clients
            .iter()
            .filter(|(user_id, _)| Some(user_id.as_str()) != exclude)
            .filter_map(|(user_id, client)| match client.outbound.try_send(event.clone()) {
                Ok(()) => None,
                Err(_) => Some(user_id.clone()),
            })
            .collect()
    }

    /// Drop stuck clients and announce them offline.
    ///
    /// The announcement can overflow further queues, so this works through
    /// a queue of users rather than recursing.
    fn evict(&mut self, mut stuck: Vec<String>) {
        while let Some(user_id) = stuck.pop() {
            let Some(client) = self.clients.remove(&user_id) else {
                continue;
            };
            tracing::warn!(
                "[Hub] dropped {} ({}), {} online",
                client.identity.nickname,
                user_id,
                self.clients.len()
            );
            let event = ServerEvent::user_offline(&user_id, &client.identity.nickname);
            stuck.extend(self.fan_out(&event, Some(&user_id)));
        }
    }

    fn snapshot(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .clients
            .values()
            .map(|client| OnlineUser {
                user_id: client.identity.user_id.clone(),
                nickname: client.identity.nickname.clone(),
            })
            .collect();
        users.sort_by(|a, b| {
            a.nickname
                .to_lowercase()
                .cmp(&b.nickname.to_lowercase())
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users
    }
}
