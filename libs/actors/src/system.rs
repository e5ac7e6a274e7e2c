//! Actor System Core
//!
//! Runs actor behaviors on tokio tasks, owns their lifecycles and applies the
//! supervision directive a behavior returns when handling fails.
//!
//! Each actor has a single unbounded FIFO mailbox: messages enqueued by one
//! sender are handled in the order they were sent, and enqueueing never waits.

use crate::error::{ActorError, Result};
use crate::registry::{ActorId, ActorRegistry, AddressBook};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Restarts allowed per supervision window
const MAX_RESTARTS: u32 = 5;
const RESTART_WINDOW: Duration = Duration::from_secs(60);

/// System-wide metrics
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub messages_failed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
    pub actor_restarts: AtomicU64,
    pub restart_failures: AtomicU64,
}

impl SystemMetrics {
    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_message_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    /// Record actor restart event
    pub fn record_actor_restart(&self, success: bool) {
        self.actor_restarts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.restart_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> SystemStats {
        SystemStats {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            actor_restarts: self.actor_restarts.load(Ordering::Relaxed),
            restart_failures: self.restart_failures.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
        }
    }
}

/// Point-in-time copy of [`SystemMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub actor_restarts: u64,
    pub restart_failures: u64,
    pub avg_processing_time_ns: f64,
}

/// Trait for actor behavior
#[async_trait]
pub trait ActorBehavior: Send + 'static {
    type Message: Send + 'static;

    /// Handle incoming message
    async fn handle(&mut self, msg: Self::Message) -> Result<()>;

    /// Called when actor starts
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before actor stops
    async fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle failure - return supervision directive
    async fn on_error(&mut self, error: &ActorError) -> SupervisorDirective {
        error!("Actor error: {}", error);
        SupervisorDirective::Restart
    }
}

/// Supervision directive for error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorDirective {
    /// Resume processing with the next message
    Resume,
    /// Restart the actor, bounded per supervision window
    Restart,
    /// Stop the actor
    Stop,
}

/// Sending half of an actor mailbox
pub struct Mailbox<M> {
    sender: mpsc::UnboundedSender<M>,
}

/// Receiving half of an actor mailbox
pub struct MailboxReceiver<M> {
    receiver: mpsc::UnboundedReceiver<M>,
}

impl<M: Send + 'static> Mailbox<M> {
    pub fn new() -> (Self, MailboxReceiver<M>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, MailboxReceiver { receiver })
    }

    /// Enqueue without waiting; fails only once the receiver is gone
    pub fn send(&self, msg: M) -> std::result::Result<(), M> {
        self.sender.send(msg).map_err(|mpsc::error::SendError(msg)| msg)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> MailboxReceiver<M> {
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<M> {
        self.receiver.try_recv().ok()
    }
}

/// Cloneable handle for sending to one actor
pub struct ActorRef<M> {
    id: ActorId,
    mailbox: Mailbox<M>,
}

impl<M: Send + 'static> ActorRef<M> {
    pub fn new(id: ActorId, mailbox: Mailbox<M>) -> Self {
        Self { id, mailbox }
    }

    /// Enqueue a message and continue
    pub fn send(&self, msg: M) -> Result<()> {
        self.mailbox.send(msg).map_err(|_| ActorError::MailboxClosed {
            actor: self.id.to_string(),
        })
    }

    /// Get actor ID
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// True once the actor has stopped consuming its mailbox
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}

impl<M> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<M> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef").field("id", &self.id).finish()
    }
}

/// Bookkeeping for a running actor
struct ActorHandle {
    task: JoinHandle<()>,
    started_at: Instant,
    binding: Option<AddressBinding>,
}

/// Registry entry to release when the actor stops
struct AddressBinding {
    address: String,
    book: Arc<dyn AddressBook>,
}

/// Core actor system managing actor lifecycles
#[derive(Clone)]
pub struct ActorSystem {
    actors: Arc<RwLock<HashMap<ActorId, ActorHandle>>>,
    metrics: Arc<SystemMetrics>,
    system_id: String,
}

impl ActorSystem {
    /// Create new actor system
    pub fn new() -> Self {
        let system_id = format!("system-{}", Uuid::new_v4().simple());
        info!("Creating new actor system: {}", system_id);

        Self {
            actors: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(SystemMetrics::default()),
            system_id,
        }
    }

    /// Spawn an anonymous actor
    pub async fn spawn<A>(&self, actor: A) -> ActorRef<A::Message>
    where
        A: ActorBehavior,
    {
        let (actor_ref, task) = self.start(actor);
        self.track(actor_ref.id().clone(), task, None).await;
        actor_ref
    }

    /// Spawn an actor and bind it to `address` in `registry`
    ///
    /// The binding is released again when the actor is stopped through this
    /// system. Fails, without spawning, if a live actor owns the address.
    pub async fn spawn_named<A>(
        &self,
        registry: &ActorRegistry<A::Message>,
        address: impl Into<String>,
        actor: A,
    ) -> Result<ActorRef<A::Message>>
    where
        A: ActorBehavior,
    {
        let address = address.into();
        if let Ok(existing) = registry.lookup(&address).await {
            if !existing.is_closed() {
                return Err(ActorError::AlreadyRegistered { address });
            }
        }

        let (actor_ref, task) = self.start(actor);
        registry.register(address.clone(), actor_ref.clone()).await?;

        let binding = AddressBinding {
            address: address.clone(),
            book: Arc::new(registry.clone()),
        };
        self.track(actor_ref.id().clone(), task, Some(binding)).await;

        info!(
            actor_id = %actor_ref.id(),
            address = %address,
            system_id = %self.system_id,
            "Actor bound to address"
        );
        Ok(actor_ref)
    }

    fn start<A>(&self, actor: A) -> (ActorRef<A::Message>, JoinHandle<()>)
    where
        A: ActorBehavior,
    {
        let actor_id = ActorId::new();
        debug!(
            actor_id = %actor_id,
            system_id = %self.system_id,
            actor_type = std::any::type_name::<A>(),
            "Spawning new actor in system"
        );

        let (mailbox, receiver) = Mailbox::new();
        let actor_task = ActorTask {
            id: actor_id.clone(),
            receiver,
            behavior: actor,
            metrics: Arc::clone(&self.metrics),
            supervision: SupervisionContext::new(MAX_RESTARTS, RESTART_WINDOW),
        };
        let task = tokio::spawn(actor_task.run());
        self.metrics.actors_spawned.fetch_add(1, Ordering::Relaxed);

        (ActorRef::new(actor_id, mailbox), task)
    }

    async fn track(&self, actor_id: ActorId, task: JoinHandle<()>, binding: Option<AddressBinding>) {
        let handle = ActorHandle {
            task,
            started_at: Instant::now(),
            binding,
        };
        self.actors.write().await.insert(actor_id, handle);
    }

    /// Stop an actor, abort its task and release its address
    pub async fn stop(&self, actor_id: &ActorId) -> Result<()> {
        let Some(handle) = self.actors.write().await.remove(actor_id) else {
            warn!("Attempted to stop unknown actor {}", actor_id);
            return Err(ActorError::not_found(actor_id.to_string()));
        };

        handle.task.abort();
        if let Err(e) = handle.task.await {
            if !e.is_cancelled() {
                warn!("Actor {} task finished with error: {}", actor_id, e);
            }
        }

        if let Some(binding) = handle.binding {
            binding.book.release(&binding.address, actor_id).await;
        }

        self.metrics.actors_stopped.fetch_add(1, Ordering::Relaxed);
        info!(
            actor_id = %actor_id,
            uptime_ms = handle.started_at.elapsed().as_millis(),
            "Actor stopped and cleaned up"
        );
        Ok(())
    }

    /// List all tracked actors
    pub async fn list_actors(&self) -> Vec<ActorId> {
        self.actors.read().await.keys().cloned().collect()
    }

    /// Get system metrics
    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop every actor in the system
    pub async fn shutdown(&self) {
        info!("Shutting down actor system {}", self.system_id);

        let actor_ids = self.list_actors().await;
        let stops = actor_ids.iter().map(|id| self.stop(id));
        for (id, result) in actor_ids.iter().zip(futures::future::join_all(stops).await) {
            if let Err(e) = result {
                warn!("Error stopping actor {}: {}", id, e);
            }
        }

        info!("Actor system {} shutdown complete", self.system_id);
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Restart budget for one actor
#[derive(Debug)]
struct SupervisionContext {
    restart_count: AtomicU32,
    max_restarts: u32,
    window: Duration,
    window_start: Mutex<Option<Instant>>,
}

impl SupervisionContext {
    fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            restart_count: AtomicU32::new(0),
            max_restarts,
            window,
            window_start: Mutex::new(None),
        }
    }

    /// Check if actor can be restarted within the current window
    fn should_restart(&self) -> bool {
        let now = Instant::now();
        let mut window_start = self.window_start.lock();

        match *window_start {
            Some(start) if now.duration_since(start) <= self.window => {
                let count = self.restart_count.fetch_add(1, Ordering::Relaxed) + 1;
                count <= self.max_restarts
            }
            _ => {
                *window_start = Some(now);
                self.restart_count.store(1, Ordering::Relaxed);
                self.max_restarts > 0
            }
        }
    }
}

// Field order matters: the mailbox closes before the behavior is dropped
struct ActorTask<A: ActorBehavior> {
    id: ActorId,
    receiver: MailboxReceiver<A::Message>,
    behavior: A,
    metrics: Arc<SystemMetrics>,
    supervision: SupervisionContext,
}

impl<A: ActorBehavior> ActorTask<A> {
    async fn run(mut self) {
        let task_start = Instant::now();

        if let Err(e) = self.behavior.on_start().await {
            error!(
                actor_id = %self.id,
                error = %e,
                "Actor failed to start during initialization"
            );
            return;
        }
        debug!(actor_id = %self.id, "Actor started, entering message loop");

        while let Some(msg) = self.receiver.recv().await {
            let start = Instant::now();

            let e = match self.behavior.handle(msg).await {
                Ok(()) => {
                    self.metrics.record_message_handled(start.elapsed());
                    continue;
                }
                Err(e) => e,
            };

            self.metrics.record_message_failed();
            error!(
                actor_id = %self.id,
                error = %e,
                error_category = e.category(),
                "Actor message processing failed"
            );

            match self.behavior.on_error(&e).await {
                SupervisorDirective::Resume => {
                    debug!(actor_id = %self.id, directive = "Resume", "Actor resumed after error");
                }
                SupervisorDirective::Restart => {
                    if self.supervision.should_restart() {
                        warn!(
                            actor_id = %self.id,
                            directive = "Restart",
                            restart_count = self.supervision.restart_count.load(Ordering::Relaxed),
                            max_restarts = self.supervision.max_restarts,
                            "Restarting actor within restart limits"
                        );
                        self.metrics.record_actor_restart(true);
                        self.restart().await;
                    } else {
                        error!(
                            actor_id = %self.id,
                            max_restarts = self.supervision.max_restarts,
                            "Actor exceeded restart limit, stopping"
                        );
                        self.metrics.record_actor_restart(false);
                        break;
                    }
                }
                SupervisorDirective::Stop => {
                    warn!(actor_id = %self.id, directive = "Stop", "Stopping actor due to error directive");
                    break;
                }
            }
        }

        if let Err(e) = self.behavior.on_stop().await {
            error!(actor_id = %self.id, error = %e, "Actor failed to stop cleanly");
        }

        info!(
            actor_id = %self.id,
            total_runtime_ms = task_start.elapsed().as_millis(),
            "Actor task execution completed"
        );
    }

    async fn restart(&mut self) {
        info!("Restarting actor {}", self.id);
        if let Err(e) = self.behavior.on_stop().await {
            warn!(actor_id = %self.id, error = %e, "on_stop failed during restart");
        }
        if let Err(e) = self.behavior.on_start().await {
            warn!(actor_id = %self.id, error = %e, "on_start failed during restart");
        }
    }
}
