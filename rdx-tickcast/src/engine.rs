//! The core engine: owner of the tick counter and the subscriber registry.

use crate::common::{SubscriberId, TickCount};
use crate::components::effects::ChannelSink;
use crate::components::subscriber::{Subject, Subscriber, TickHandle};
use crate::config::TickcastConfig;
use crate::error::Result;
use crate::events::{Effect, SystemEvent};
use crate::time::SystemClock;
use chrono::Utc;
use slotmap::SlotMap;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Registered subscribers, kept in notification order.
#[derive(Default)]
struct Registry {
    entries: SlotMap<SubscriberId, Arc<dyn Subscriber>>,
    order: Vec<SubscriberId>,
}

/// The running periodic driver.
struct Driver {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// The main Tickcast engine.
///
/// It owns the elapsed-seconds counter and broadcasts every tick to the
/// registered subscribers, synchronously and in registration order. The engine
/// is cheap to clone; every clone is a handle to the same instance.
#[derive(Clone)]
pub struct TickEngine {
    config: Arc<TickcastConfig>,
    handle: TickHandle,
    registry: Arc<RwLock<Registry>>,
    driver: Arc<Mutex<Option<Driver>>>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    effect_sender: broadcast::Sender<Effect>,
}

// Core implementation block for internal logic.
impl TickEngine {
    /// Creates an inactive engine at tick 0.
    pub fn new(config: TickcastConfig) -> Result<Self> {
        config.validate()?;
        const CHANNEL_CAPACITY: usize = 256;
        let (system_event_sender, _) = broadcast::channel(64);
        let (effect_sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            handle: TickHandle::new(),
            registry: Arc::new(RwLock::new(Registry::default())),
            driver: Arc::new(Mutex::new(None)),
            system_event_sender,
            effect_sender,
        })
    }

    /// Advances the counter by one and notifies every subscriber.
    ///
    /// Normally called by the periodic driver. A subscriber that returns an
    /// error or panics is reported as [`SystemEvent::SubscriberFailed`] and the
    /// remaining subscribers are still notified.
    pub async fn tick(&self) -> TickCount {
        let registry = self.registry.write().await;
        let tick = self.handle.increment();
        trace!(tick, subscribers = registry.order.len(), "Tick dispatched.");

        for &id in &registry.order {
            let Some(subscriber) = registry.entries.get(id) else {
                continue;
            };
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify(tick, &self.handle)));
            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            warn!(?id, name = subscriber.name(), tick, %reason, "Subscriber failed.");
            self.system_event_sender
                .send(SystemEvent::SubscriberFailed { id, tick, reason })
                .ok();
        }
        tick
    }

    #[doc(hidden)]
    fn remove_at(&self, registry: &mut Registry, index: usize) -> SubscriberId {
        let id = registry.order.remove(index);
        registry.entries.remove(id);
        debug!(?id, "Subscriber detached.");
        self.system_event_sender
            .send(SystemEvent::SubscriberDetached { id })
            .ok();
        id
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// Public API implementation block.
impl TickEngine {
    /// Starts the periodic driver. Does nothing if it is already running.
    ///
    /// The first tick fires one full period after this call.
    pub async fn start(&self) {
        let mut driver = self.driver.lock().await;
        if driver.is_some() {
            debug!("start() ignored: engine is already active.");
            return;
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let clock = SystemClock::new(self.config.tick_period());
        let engine = self.clone();
        let task = tokio::spawn(clock.run(
            move || {
                let engine = engine.clone();
                async move {
                    engine.tick().await;
                }
            },
            shutdown_rx,
        ));

        *driver = Some(Driver { shutdown_tx, task });
        self.handle.set_active(true);
        info!(
            period_ms = self.config.tick_period_ms,
            tick = self.handle.state(),
            "TickEngine started."
        );
        self.system_event_sender
            .send(SystemEvent::ClockStarted { at: Utc::now() })
            .ok();
    }

    /// Stops the periodic driver. Does nothing if it is not running.
    ///
    /// When this returns the driver task has exited, so no tick is in flight
    /// or pending. The counter is left where it was.
    pub async fn stop(&self) {
        let mut driver = self.driver.lock().await;
        let Some(Driver { shutdown_tx, task }) = driver.take() else {
            debug!("stop() ignored: engine is already inactive.");
            return;
        };

        self.handle.set_active(false);
        shutdown_tx.send(()).ok();
        if let Err(err) = task.await {
            error!("Clock driver ended abnormally: {err}");
        }

        let tick = self.handle.state();
        info!(tick, "TickEngine stopped.");
        self.system_event_sender
            .send(SystemEvent::ClockStopped { tick })
            .ok();
    }

    /// Whether the periodic driver is running.
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Starts the engine and runs until Ctrl+C, then stops it.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.start().await;
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received.");
        self.stop().await;
        Ok(())
    }

    /// Registers `subscriber` at the end of the notification order.
    ///
    /// The same subscriber may be attached more than once; each registration
    /// gets its own id and its own notification per tick.
    pub async fn attach(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let mut registry = self.registry.write().await;
        let name = subscriber.name().to_string();
        let id = registry.entries.insert(subscriber);
        registry.order.push(id);
        debug!(?id, %name, "Subscriber attached.");
        self.system_event_sender
            .send(SystemEvent::SubscriberAttached { id })
            .ok();
        id
    }

    /// Removes the earliest registration of `subscriber`.
    ///
    /// Returns `false` if it was not registered.
    pub async fn detach<S: Subscriber + ?Sized>(&self, subscriber: &Arc<S>) -> bool {
        let mut registry = self.registry.write().await;
        let target = Arc::as_ptr(subscriber).cast::<()>();
        let position = registry.order.iter().position(|id| {
            registry
                .entries
                .get(*id)
                .is_some_and(|entry| Arc::as_ptr(entry).cast::<()>() == target)
        });
        match position {
            Some(index) => {
                self.remove_at(&mut registry, index);
                true
            }
            None => false,
        }
    }

    /// Removes the registration identified by `id`.
    ///
    /// Returns `false` if the id is unknown or already removed.
    pub async fn detach_id(&self, id: SubscriberId) -> bool {
        let mut registry = self.registry.write().await;
        match registry.order.iter().position(|entry| *entry == id) {
            Some(index) => {
                self.remove_at(&mut registry, index);
                true
            }
            None => false,
        }
    }

    /// Number of registrations, duplicates included.
    pub async fn subscriber_count(&self) -> usize {
        self.registry.read().await.order.len()
    }

    /// The current tick count.
    pub fn state(&self) -> TickCount {
        self.handle.state()
    }

    /// Overwrites the tick count without notifying anyone.
    pub async fn set_state(&self, tick: TickCount) {
        let _registry = self.registry.write().await;
        self.handle.store(tick);
        debug!(tick, "Tick count overwritten.");
    }

    /// A read-only view of the counter, for binding policies to this engine.
    pub fn subject(&self) -> TickHandle {
        self.handle.clone()
    }

    /// A sink that publishes effects on this engine's effect stream.
    pub fn effect_sink(&self) -> ChannelSink {
        ChannelSink::new(self.effect_sender.clone())
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &TickcastConfig {
        &self.config
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `Effect` stream fed by [`effect_sink`](Self::effect_sink).
    pub fn subscribe_effects(&self) -> broadcast::Receiver<Effect> {
        self.effect_sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Counts notifications and remembers the last tick it saw.
    #[derive(Default)]
    struct Counter {
        calls: AtomicU64,
        last: AtomicU64,
    }

    impl Subscriber for Counter {
        fn notify(&self, tick: TickCount, subject: &dyn Subject) -> anyhow::Result<()> {
            assert_eq!(subject.state(), tick);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last.store(tick, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Subscriber for Failing {
        fn notify(&self, tick: TickCount, _subject: &dyn Subject) -> anyhow::Result<()> {
            anyhow::bail!("refusing tick {tick}")
        }
    }

    struct Panicking;

    impl Subscriber for Panicking {
        fn notify(&self, _tick: TickCount, _subject: &dyn Subject) -> anyhow::Result<()> {
            panic!("boom")
        }
    }

    fn engine() -> TickEngine {
        TickEngine::new(TickcastConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn duplicate_attach_notifies_twice_until_detached_once() {
        let engine = engine();
        let counter = Arc::new(Counter::default());
        engine.attach(counter.clone()).await;
        engine.attach(counter.clone()).await;

        engine.tick().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        assert!(engine.detach(&counter).await);
        assert_eq!(engine.subscriber_count().await, 1);
        engine.tick().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(counter.last.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detach_of_unknown_subscriber_is_a_no_op() {
        let engine = engine();
        let registered = Arc::new(Counter::default());
        let stranger = Arc::new(Counter::default());
        let id = engine.attach(registered.clone()).await;

        assert!(!engine.detach(&stranger).await);
        assert_eq!(engine.subscriber_count().await, 1);

        assert!(engine.detach_id(id).await);
        assert!(!engine.detach_id(id).await);
        assert_eq!(engine.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn failing_subscribers_do_not_block_the_rest() {
        let engine = engine();
        let mut events = engine.subscribe_system_events();
        let failing_id = engine.attach(Arc::new(Failing)).await;
        let panicking_id = engine.attach(Arc::new(Panicking)).await;
        let counter = Arc::new(Counter::default());
        engine.attach(counter.clone()).await;

        engine.tick().await;
        engine.tick().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        let mut failures = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SystemEvent::SubscriberFailed { id, tick, reason } = event {
                failures.push((id, tick, reason));
            }
        }
        assert_eq!(failures.len(), 4);
        assert_eq!(failures[0].0, failing_id);
        assert_eq!(failures[0].2, "refusing tick 1");
        assert_eq!(failures[1].0, panicking_id);
        assert_eq!(failures[1].2, "panicked: boom");
        assert_eq!(failures[3].1, 2);
    }

    #[tokio::test]
    async fn set_state_does_not_notify() {
        let engine = engine();
        let counter = Arc::new(Counter::default());
        engine.attach(counter.clone()).await;

        engine.set_state(41).await;
        assert_eq!(engine.state(), 41);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        assert_eq!(engine.tick().await, 42);
        assert_eq!(counter.last.load(Ordering::SeqCst), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticks_and_keeps_the_count() {
        let engine = engine();
        let counter = Arc::new(Counter::default());
        engine.attach(counter.clone()).await;

        engine.start().await;
        engine.start().await;
        assert!(engine.is_active());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        engine.stop().await;
        assert!(!engine.is_active());
        assert_eq!(engine.state(), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.state(), 3);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);

        engine.stop().await;
        assert_eq!(engine.state(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_begins_a_fresh_period() {
        let engine = engine();
        engine.start().await;
        tokio::time::sleep(Duration::from_millis(1_600)).await;
        engine.stop().await;
        assert_eq!(engine.state(), 1);

        engine.start().await;
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(engine.state(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.state(), 2);
        engine.stop().await;
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let engine = engine();
        let mut events = engine.subscribe_system_events();

        engine.start().await;
        engine.stop().await;

        assert!(matches!(
            events.recv().await.unwrap(),
            SystemEvent::ClockStarted { .. }
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            SystemEvent::ClockStopped { tick: 0 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn driver_survives_a_counter_at_its_limit() {
        let engine = engine();
        let counter = Arc::new(Counter::default());
        engine.attach(counter.clone()).await;
        engine.set_state(TickCount::MAX).await;

        engine.start().await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert!(engine.is_active());
        assert_eq!(engine.state(), TickCount::MAX);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        engine.stop().await;
    }

    /// Logs every notification into one shared, ordered journal.
    struct Journal {
        label: &'static str,
        entries: Arc<std::sync::Mutex<Vec<(&'static str, TickCount)>>>,
    }

    impl Subscriber for Journal {
        fn notify(&self, tick: TickCount, subject: &dyn Subject) -> anyhow::Result<()> {
            anyhow::ensure!(subject.state() == tick, "counter moved during dispatch");
            self.entries.lock().unwrap().push((self.label, tick));
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn foreign_mutation_is_serialized_against_dispatch() {
        let config = TickcastConfig {
            tick_period_ms: 2,
            ..TickcastConfig::default()
        };
        let engine = TickEngine::new(config).unwrap();
        let mut events = engine.subscribe_system_events();
        let entries = Arc::new(std::sync::Mutex::new(Vec::new()));
        let journal = |label| {
            Arc::new(Journal {
                label,
                entries: entries.clone(),
            })
        };
        engine.attach(journal("open")).await;
        engine.attach(journal("close")).await;

        engine.start().await;
        let churn = journal("churn");
        let mutator = {
            let engine = engine.clone();
            tokio::spawn(async move {
                for round in 0..100u64 {
                    engine.attach(churn.clone()).await;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    if round % 10 == 0 {
                        engine.set_state(engine.state() + 1_000).await;
                    }
                    assert!(engine.detach(&churn).await);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };
        mutator.await.unwrap();
        engine.stop().await;

        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SystemEvent::SubscriberFailed { .. }),
                "{event:?}"
            );
        }

        // Each tick must show up as open, close, then at most one churn entry,
        // and ticks must strictly increase from one dispatch to the next.
        let entries = entries.lock().unwrap().clone();
        assert!(!entries.is_empty());
        let mut previous = None;
        let mut index = 0;
        while index < entries.len() {
            let (label, tick) = entries[index];
            assert_eq!(label, "open", "dispatch interleaved at {index}");
            assert!(previous < Some(tick), "tick went backwards at {index}");
            assert_eq!(entries.get(index + 1), Some(&("close", tick)));
            index += 2;
            if entries.get(index) == Some(&("churn", tick)) {
                index += 1;
            }
            previous = Some(tick);
        }
        assert_eq!(engine.subscriber_count().await, 2);
    }

    #[test]
    fn rejects_zero_tick_period() {
        let config = TickcastConfig {
            tick_period_ms: 0,
            ..TickcastConfig::default()
        };
        assert!(TickEngine::new(config).is_err());
    }
}
