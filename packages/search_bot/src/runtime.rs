//! The bot runtime: one dedicated OS thread driving a current-thread tokio
//! runtime.
//!
//! Ingress workers never enter this runtime. They hand updates over through a
//! bounded channel with `try_send`, and everything after that (routing,
//! storage, outbound replies) runs on the runtime thread.
//!
//! ```text
//! ingress ──try_send──► dispatcher ──► lane(chat A) ──► handler task
//!                                  └─► lane(chat B) ──► handler task
//! ```
//!
//! Lanes keep updates of one chat strictly ordered while different chats
//! proceed concurrently. Each handler runs in its own task so a timeout can
//! abort it and a panic is caught at the join point.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{BotError, BotResult};
use crate::metrics::ServerMetrics;
use crate::models::InboundUpdate;
use crate::router::{Command, CommandRouter};
use crate::telegram::Transport;

const REGISTRATION_ATTEMPTS: u32 = 3;
const REGISTRATION_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RuntimeState {
    Uninitialized = 0,
    Initialized = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl RuntimeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RuntimeState::Uninitialized,
            1 => RuntimeState::Initialized,
            2 => RuntimeState::Running,
            3 => RuntimeState::Stopping,
            _ => RuntimeState::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeState::Uninitialized => "uninitialized",
            RuntimeState::Initialized => "initialized",
            RuntimeState::Running => "running",
            RuntimeState::Stopping => "stopping",
            RuntimeState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to the runtime thread, present between `initialize` and `shutdown`.
struct Worker {
    handle: Handle,
    thread: JoinHandle<()>,
}

/// Shared by the dispatcher and every lane.
struct LaneContext {
    router: Arc<CommandRouter>,
    transport: Arc<dyn Transport>,
    metrics: Arc<ServerMetrics>,
    handler_timeout: Duration,
    lane_idle: Duration,
}

pub struct BotRuntime {
    state: AtomicU8,
    config: RuntimeConfig,
    router: Arc<CommandRouter>,
    transport: Arc<dyn Transport>,
    metrics: Arc<ServerMetrics>,
    sender: RwLock<Option<mpsc::Sender<InboundUpdate>>>,
    worker: Mutex<Option<Worker>>,
    /// Serializes start and shutdown
    lifecycle: tokio::sync::Mutex<()>,
}

impl BotRuntime {
    pub fn new(
        config: RuntimeConfig,
        router: Arc<CommandRouter>,
        transport: Arc<dyn Transport>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            state: AtomicU8::new(RuntimeState::Uninitialized as u8),
            config,
            router,
            transport,
            metrics,
            sender: RwLock::new(None),
            worker: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> RuntimeState {
        RuntimeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == RuntimeState::Running
    }

    fn set_state(&self, state: RuntimeState) {
        debug!("Bot runtime state -> {}", state);
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Spawn the runtime thread and its dispatcher. No-op unless uninitialized.
    pub fn initialize(&self) -> anyhow::Result<()> {
        if self
            .state
            .compare_exchange(
                RuntimeState::Uninitialized as u8,
                RuntimeState::Initialized as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("initialize() called in state {}", self.state());
            return Ok(());
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("bot-runtime")
            .build()
            .map_err(|e| {
                self.set_state(RuntimeState::Uninitialized);
                anyhow::anyhow!("Failed to build bot runtime: {}", e)
            })?;
        let handle = rt.handle().clone();

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let ctx = Arc::new(LaneContext {
            router: self.router.clone(),
            transport: self.transport.clone(),
            metrics: self.metrics.clone(),
            handler_timeout: self.config.handler_timeout,
            lane_idle: self.config.lane_idle,
        });
        let grace = self.config.shutdown_grace;

        let thread = thread::Builder::new()
            .name("bot-runtime".to_string())
            .spawn(move || {
                rt.block_on(dispatch_loop(rx, ctx, grace));
                debug!("Bot runtime thread exiting");
            })
            .map_err(|e| {
                self.set_state(RuntimeState::Uninitialized);
                anyhow::anyhow!("Failed to spawn bot runtime thread: {}", e)
            })?;

        *self.sender.write().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(Worker { handle, thread });

        info!(
            "Bot runtime initialized (queue capacity {}, handler timeout {:?})",
            self.config.queue_capacity, self.config.handler_timeout
        );
        Ok(())
    }

    fn runtime_handle(&self) -> Option<Handle> {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|w| w.handle.clone())
    }

    /// Register the webhook and begin accepting updates.
    ///
    /// Registration runs on the runtime thread. The state only becomes
    /// `Running` once the provider accepted the webhook; calling `start`
    /// again while running does nothing.
    pub async fn start(&self, webhook_url: &str) -> BotResult<()> {
        let _guard = self.lifecycle.lock().await;

        match self.state() {
            RuntimeState::Running => {
                debug!("start() while running, webhook already registered");
                return Ok(());
            }
            RuntimeState::Initialized => {}
            other => return Err(BotError::NotRunning(other)),
        }

        let handle = self
            .runtime_handle()
            .ok_or(BotError::NotRunning(RuntimeState::Uninitialized))?;
        let transport = self.transport.clone();
        let url = webhook_url.to_string();

        handle
            .spawn(async move { register(&*transport, &url).await })
            .await
            .map_err(|e| BotError::Registration(format!("registration task failed: {}", e)))??;

        self.set_state(RuntimeState::Running);
        info!("Bot runtime running, webhook at {}", webhook_url);
        Ok(())
    }

    /// Hand an update to the runtime without waiting for it to be handled.
    pub fn submit(&self, update: InboundUpdate) -> BotResult<()> {
        let state = self.state();
        if state != RuntimeState::Running {
            return Err(BotError::NotRunning(state));
        }

        let sender = self.sender.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sender.as_ref() else {
            return Err(BotError::NotRunning(self.state()));
        };

        sender.try_send(update).map_err(|e| match e {
            TrySendError::Full(_) => BotError::QueueFull,
            TrySendError::Closed(_) => BotError::NotRunning(self.state()),
        })
    }

    /// Stop accepting updates, drain lanes within the grace period and join
    /// the runtime thread.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;

        let previous = self.state();
        if matches!(previous, RuntimeState::Stopped | RuntimeState::Stopping) {
            return;
        }
        self.set_state(RuntimeState::Stopping);
        info!("Bot runtime stopping");

        if previous == RuntimeState::Running {
            if let Some(handle) = self.runtime_handle() {
                let transport = self.transport.clone();
                let unregister = handle.spawn(async move { transport.unregister_webhook().await });
                match timeout(self.config.shutdown_grace, unregister).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(e))) => warn!("Failed to remove webhook: {:#}", e),
                    Ok(Err(e)) => warn!("Webhook removal task failed: {}", e),
                    Err(_) => warn!("Timed out removing webhook"),
                }
            }
        }

        // Dropping the only sender ends the dispatcher loop
        drop(self.sender.write().unwrap_or_else(|e| e.into_inner()).take());

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.thread.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => error!("Bot runtime thread panicked"),
                Err(e) => error!("Failed to join bot runtime thread: {}", e),
            }
        }

        self.set_state(RuntimeState::Stopped);
        info!("Bot runtime stopped");
    }
}

async fn register(transport: &dyn Transport, url: &str) -> BotResult<()> {
    let mut attempt = 1;
    loop {
        match transport.register_webhook(url).await {
            Ok(()) => break,
            Err(e) if attempt < REGISTRATION_ATTEMPTS => {
                warn!(
                    "Webhook registration attempt {}/{} failed: {:#}",
                    attempt, REGISTRATION_ATTEMPTS, e
                );
                sleep(REGISTRATION_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(BotError::Registration(format!(
                    "{:#} (after {} attempts)",
                    e, attempt
                )));
            }
        }
    }

    if let Err(e) = transport.publish_commands(&Command::menu()).await {
        warn!("Failed to publish command menu: {:#}", e);
    }
    Ok(())
}

/// Route queued updates into per-chat lanes until the queue closes, then
/// give the lanes `grace` to finish.
async fn dispatch_loop(
    mut rx: mpsc::Receiver<InboundUpdate>,
    ctx: Arc<LaneContext>,
    grace: Duration,
) {
    let mut lanes: HashMap<i64, mpsc::UnboundedSender<InboundUpdate>> = HashMap::new();
    let mut workers = JoinSet::new();

    while let Some(update) = rx.recv().await {
        let chat_id = update.chat_id;

        let update = match lanes.get(&chat_id) {
            Some(lane) => match lane.send(update) {
                Ok(()) => continue,
                // Lane retired while idle; start a fresh one below
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let (lane_tx, lane_rx) = mpsc::unbounded_channel();
        if lane_tx.send(update).is_ok() {
            workers.spawn(run_lane(chat_id, lane_rx, ctx.clone()));
            lanes.insert(chat_id, lane_tx);
        }

        while let Some(result) = workers.try_join_next() {
            if let Err(e) = result {
                error!("Lane task failed: {}", e);
            }
        }
        lanes.retain(|_, lane| !lane.is_closed());
    }

    debug!("Update queue closed, draining {} lane(s)", lanes.len());
    lanes.clear();

    let drain = async {
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Lane task failed: {}", e);
            }
        }
    };
    if timeout(grace, drain).await.is_err() {
        warn!("Lanes did not drain within {:?}, aborting", grace);
        workers.abort_all();
    }
}

async fn run_lane(
    chat_id: i64,
    mut rx: mpsc::UnboundedReceiver<InboundUpdate>,
    ctx: Arc<LaneContext>,
) {
    debug!("Lane for chat {} started", chat_id);
    loop {
        match timeout(ctx.lane_idle, rx.recv()).await {
            Ok(Some(update)) => process(&ctx, update).await,
            Ok(None) => break,
            // Only the dispatcher sends, on this same thread, so nothing can
            // slip in between the timeout and close()
            Err(_) => rx.close(),
        }
    }
    debug!("Lane for chat {} retired", chat_id);
}

async fn process(ctx: &Arc<LaneContext>, update: InboundUpdate) {
    let chat_id = update.chat_id;
    let message_id = update.message_id;

    let task_ctx = ctx.clone();
    let task = tokio::spawn(async move {
        let Some(reply) = task_ctx.router.dispatch(&update).await else {
            return;
        };
        match task_ctx.transport.send_reply(&reply).await {
            Ok(()) => task_ctx.metrics.reply_sent(),
            Err(e) => {
                task_ctx.metrics.transport_error();
                warn!("Reply to chat {} failed: {:#}", reply.chat_id, e);
            }
        }
    });
    let abort = task.abort_handle();

    match timeout(ctx.handler_timeout, task).await {
        Ok(Ok(())) => ctx.metrics.update_handled(),
        Ok(Err(e)) if e.is_panic() => {
            ctx.metrics.handler_panic();
            error!(
                "Handler panicked for chat {} (message {}): {}",
                chat_id, message_id, e
            );
        }
        Ok(Err(e)) => warn!(
            "Handler cancelled for chat {} (message {}): {}",
            chat_id, message_id, e
        ),
        Err(_) => {
            abort.abort();
            ctx.metrics.handler_timeout();
            warn!(
                "Handler for chat {} (message {}) timed out after {:?}",
                chat_id, message_id, ctx.handler_timeout
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::models::Reply;
    use crate::repository::{ContentRepository, test_helpers};
    use crate::search::SearchEngine;
    use crate::telegram::BotCommand;
    use crate::telegram::testing::RecordingTransport;
    use async_trait::async_trait;

    const GROUP: i64 = -1001918569531;

    /// Stalls, panics or fails when replying to chosen message ids.
    #[derive(Default)]
    struct ScriptedTransport {
        inner: RecordingTransport,
        stall_on: Option<i64>,
        panic_on: Option<i64>,
        fail_on: Option<i64>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn register_webhook(&self, url: &str) -> anyhow::Result<()> {
            self.inner.register_webhook(url).await
        }

        async fn unregister_webhook(&self) -> anyhow::Result<()> {
            self.inner.unregister_webhook().await
        }

        async fn publish_commands(&self, commands: &[BotCommand]) -> anyhow::Result<()> {
            self.inner.publish_commands(commands).await
        }

        async fn send_reply(&self, reply: &Reply) -> anyhow::Result<()> {
            if self.stall_on.is_some() && reply.reply_to_message_id == self.stall_on {
                sleep(Duration::from_secs(30)).await;
            }
            if self.panic_on.is_some() && reply.reply_to_message_id == self.panic_on {
                panic!("transport blew up");
            }
            if self.fail_on.is_some() && reply.reply_to_message_id == self.fail_on {
                anyhow::bail!("sendMessage failed with code 403: bot was kicked");
            }
            self.inner.send_reply(reply).await
        }
    }

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            queue_capacity: 64,
            handler_timeout: Duration::from_millis(300),
            lane_idle: Duration::from_millis(50),
            shutdown_grace: Duration::from_secs(2),
        }
    }

    async fn runtime_with(
        transport: Arc<dyn Transport>,
        metrics: Arc<ServerMetrics>,
    ) -> (BotRuntime, Arc<ContentRepository>) {
        let repo = Arc::new(test_helpers::test_repository().await);
        let engine = SearchEngine::new(repo.clone(), SearchConfig::default());
        let router = Arc::new(CommandRouter::new(
            repo.clone(),
            engine,
            Some(GROUP),
            metrics.clone(),
        ));
        (
            BotRuntime::new(test_config(), router, transport, metrics),
            repo,
        )
    }

    fn command(chat_id: i64, message_id: i64, text: &str) -> InboundUpdate {
        let (command, raw_args) = InboundUpdate::parse_command(text).unwrap();
        InboundUpdate {
            chat_id,
            sender_id: 42,
            message_id,
            command,
            args: raw_args.split_whitespace().map(str::to_string).collect(),
            raw_args,
            reply_to: None,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn rejects_updates_before_start() {
        let transport = Arc::new(RecordingTransport::default());
        let (runtime, _repo) = runtime_with(transport, Arc::new(ServerMetrics::new())).await;

        assert!(matches!(
            runtime.submit(command(GROUP, 1, "/help")),
            Err(BotError::NotRunning(RuntimeState::Uninitialized))
        ));

        runtime.initialize().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Initialized);
        assert!(matches!(
            runtime.submit(command(GROUP, 1, "/help")),
            Err(BotError::NotRunning(RuntimeState::Initialized))
        ));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn start_registers_once_and_handles_updates() {
        let transport = Arc::new(RecordingTransport::default());
        let (runtime, _repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;

        assert!(runtime.start("https://bot.example.com/webhook").await.is_err());

        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();
        assert!(runtime.is_running());
        assert_eq!(transport.webhooks(), vec!["https://bot.example.com/webhook"]);

        runtime.submit(command(GROUP, 7, "/help")).unwrap();
        wait_until(|| transport.replies().len() == 1).await;
        assert_eq!(transport.replies()[0].reply_to_message_id, Some(7));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn rejects_updates_after_shutdown() {
        let transport = Arc::new(RecordingTransport::default());
        let (runtime, _repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        runtime.shutdown().await;

        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert!(matches!(
            runtime.submit(command(GROUP, 1, "/help")),
            Err(BotError::NotRunning(RuntimeState::Stopped))
        ));
        assert_eq!(
            transport
                .unregistered
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );

        // A second shutdown is harmless
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn registration_failure_keeps_runtime_out_of_running() {
        let transport = Arc::new(RecordingTransport::failing_registrations(3));
        let (runtime, _repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;
        runtime.initialize().unwrap();

        let err = runtime
            .start("https://bot.example.com/webhook")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Registration(_)));
        assert_eq!(runtime.state(), RuntimeState::Initialized);
        assert_eq!(transport.webhooks().len(), 3);
        assert!(runtime.submit(command(GROUP, 1, "/help")).is_err());

        runtime.shutdown().await;
        assert_eq!(runtime.state(), RuntimeState::Stopped);
    }

    #[tokio::test]
    async fn registration_is_retried() {
        let transport = Arc::new(RecordingTransport::failing_registrations(2));
        let (runtime, _repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;
        runtime.initialize().unwrap();

        runtime.start("https://bot.example.com/webhook").await.unwrap();
        assert!(runtime.is_running());
        assert_eq!(transport.webhooks().len(), 3);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn updates_of_one_chat_stay_ordered() {
        let transport = Arc::new(RecordingTransport::default());
        let (runtime, repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        for i in 1..=20 {
            runtime
                .submit(command(GROUP, i, &format!("/save item {}", i)))
                .unwrap();
        }
        wait_until(|| transport.replies().len() == 20).await;

        let order: Vec<Option<i64>> = transport
            .replies()
            .iter()
            .map(|r| r.reply_to_message_id)
            .collect();
        let expected: Vec<Option<i64>> = (1..=20).map(Some).collect();
        assert_eq!(order, expected);

        let bodies: Vec<String> = repo
            .list_by_owner(42)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.body)
            .collect();
        assert_eq!(bodies[0], "item 1");
        assert_eq!(bodies[19], "item 20");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn idle_lane_is_recreated_on_demand() {
        let transport = Arc::new(RecordingTransport::default());
        let (runtime, _repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        runtime.submit(command(GROUP, 1, "/help")).unwrap();
        wait_until(|| transport.replies().len() == 1).await;

        // Longer than lane_idle
        sleep(Duration::from_millis(200)).await;

        runtime.submit(command(GROUP, 2, "/help")).unwrap();
        wait_until(|| transport.replies().len() == 2).await;

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn timed_out_handler_does_not_stall_the_lane() {
        let transport = Arc::new(ScriptedTransport {
            stall_on: Some(1),
            ..Default::default()
        });
        let metrics = Arc::new(ServerMetrics::new());
        let (runtime, _repo) = runtime_with(transport.clone(), metrics.clone()).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        runtime.submit(command(GROUP, 1, "/help")).unwrap();
        runtime.submit(command(GROUP, 2, "/help")).unwrap();

        wait_until(|| transport.inner.replies().len() == 1).await;
        assert_eq!(transport.inner.replies()[0].reply_to_message_id, Some(2));
        assert_eq!(metrics.snapshot().errors.timeouts, 1);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let transport = Arc::new(ScriptedTransport {
            panic_on: Some(1),
            ..Default::default()
        });
        let metrics = Arc::new(ServerMetrics::new());
        let (runtime, _repo) = runtime_with(transport.clone(), metrics.clone()).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        runtime.submit(command(GROUP, 1, "/help")).unwrap();
        runtime.submit(command(GROUP, 2, "/help")).unwrap();

        wait_until(|| transport.inner.replies().len() == 1).await;
        assert_eq!(metrics.snapshot().errors.panics, 1);
        assert!(runtime.is_running());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn failed_reply_is_counted_and_lane_continues() {
        let transport = Arc::new(ScriptedTransport {
            fail_on: Some(1),
            ..Default::default()
        });
        let metrics = Arc::new(ServerMetrics::new());
        let (runtime, _repo) = runtime_with(transport.clone(), metrics.clone()).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        runtime.submit(command(GROUP, 1, "/help")).unwrap();
        runtime.submit(command(GROUP, 2, "/help")).unwrap();

        wait_until(|| transport.inner.replies().len() == 1).await;
        assert_eq!(transport.inner.replies()[0].reply_to_message_id, Some(2));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.errors.transport, 1);
        assert_eq!(snapshot.runtime.replies_sent, 1);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_queued_updates() {
        let transport = Arc::new(RecordingTransport::default());
        let (runtime, _repo) =
            runtime_with(transport.clone(), Arc::new(ServerMetrics::new())).await;
        runtime.initialize().unwrap();
        runtime.start("https://bot.example.com/webhook").await.unwrap();

        for i in 1..=5 {
            runtime.submit(command(GROUP, i, "/help")).unwrap();
        }
        runtime.shutdown().await;

        assert_eq!(transport.replies().len(), 5);
    }

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(RuntimeState::Running.to_string(), "running");
        assert_eq!(RuntimeState::from_u8(RuntimeState::Stopping as u8), RuntimeState::Stopping);
    }
}
