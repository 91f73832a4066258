//! Long-lived effect routines (sagas) and the coordinator that supervises them.
//!
//! A saga waits on the store's intent bus for its trigger, reads the state it
//! needs, performs I/O and hands back the terminal intent for its workflow.
//! The [`Coordinator`] runs one routine per saga and recovers a routine whose
//! handler panics. It aborts everything together on teardown.

use crate::{EffectHandle, HealthCheck, HealthReport, Store, StoreError};
use async_trait::async_trait;
use soundwave_core::reducer::Reducer;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::{JoinError, JoinSet};

/// How a routine treats a trigger that arrives while earlier ones are in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TakePolicy {
    /// Fork a handler for every trigger; whichever resolves last wins
    #[default]
    Every,
    /// Abort in-flight handlers when a newer trigger arrives
    Latest,
}

/// Sink for intents produced by routines
///
/// Implemented by [`Store`]. Kept as a trait so routines can be driven by a
/// recording dispatcher in tests.
#[async_trait]
pub trait Dispatcher<A>: Send + Sync {
    /// Reduce and broadcast an intent
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the store is shutting down.
    async fn dispatch(&self, action: A) -> Result<EffectHandle, StoreError>;

    /// Subscribe to the intent bus
    fn subscribe(&self) -> broadcast::Receiver<A>;
}

#[async_trait]
impl<S, A, E, R> Dispatcher<A> for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn dispatch(&self, action: A) -> Result<EffectHandle, StoreError> {
        self.send(action).await
    }

    fn subscribe(&self) -> broadcast::Receiver<A> {
        self.subscribe_actions()
    }
}

/// What a routine handler may touch: a read-only view of state and the dispatcher
pub struct SagaContext<S, A> {
    state: Arc<RwLock<S>>,
    dispatcher: Arc<dyn Dispatcher<A>>,
}

impl<S, A> Clone for SagaContext<S, A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S, A> SagaContext<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Build a context over an arbitrary state lock and dispatcher
    #[must_use]
    pub fn new(state: Arc<RwLock<S>>, dispatcher: Arc<dyn Dispatcher<A>>) -> Self {
        Self { state, dispatcher }
    }

    /// Build a context over a store
    #[must_use]
    pub fn from_store<E, R>(store: &Store<S, A, E, R>) -> Self
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Clone,
        E: Send + Sync + 'static,
    {
        Self {
            state: store.state_lock(),
            dispatcher: Arc::new(store.clone()),
        }
    }

    /// Read the current state through a projection
    pub async fn select<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&*state)
    }

    /// Dispatch an intent, logging instead of failing if the store is gone
    pub async fn put(&self, action: A) {
        if let Err(error) = self.dispatcher.dispatch(action).await {
            tracing::warn!(%error, "Routine could not dispatch intent");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<A> {
        self.dispatcher.subscribe()
    }
}

/// A long-lived effect routine serving one workflow
#[async_trait]
pub trait Saga<S, A>: Send + Sync + 'static {
    /// Routine name used in logs, metrics and health reports
    fn name(&self) -> &'static str;

    /// Overlap policy for this routine
    fn policy(&self) -> TakePolicy {
        TakePolicy::Every
    }

    /// Whether this intent starts the workflow
    fn trigger(&self, action: &A) -> bool;

    /// Serve one trigger and return the terminal intent to dispatch, if any
    async fn handle(&self, action: A, ctx: &SagaContext<S, A>) -> Option<A>;

    /// Intent dispatched when a handler panics, so the workflow does not stay loading
    fn on_crash(&self) -> Option<A> {
        None
    }
}

/// Supervision state of a routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineStatus {
    /// Listening for triggers
    Running {
        /// Times the routine has recovered from a crash
        restarts: u32,
    },
    /// Stopped by shutdown or because the intent bus closed
    Stopped,
    /// Crashed more often than the restart limit allows
    Failed {
        /// Times the routine was restarted before giving up
        restarts: u32,
    },
}

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How many times a crashed routine is restarted before it is marked failed
    pub max_restarts: u32,
    /// Pause before a crashed routine serves new triggers again
    pub restart_backoff: Duration,
}

impl CoordinatorConfig {
    /// Set the restart limit
    #[must_use]
    pub const fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Set the pause before a restart
    #[must_use]
    pub const fn with_restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            restart_backoff: Duration::from_millis(50),
        }
    }
}

type StatusMap = Arc<std::sync::RwLock<HashMap<&'static str, RoutineStatus>>>;

/// Supervisor owning every routine task
///
/// Dropping the coordinator aborts all routines and their in-flight handlers.
pub struct Coordinator {
    tasks: JoinSet<()>,
    statuses: StatusMap,
}

impl Coordinator {
    /// Start one supervised routine per saga against a store
    ///
    /// Every routine is subscribed to the intent bus before this returns, so
    /// an intent sent right afterwards is not missed.
    #[must_use]
    pub fn start<S, A, E, R>(
        store: &Store<S, A, E, R>,
        sagas: Vec<Arc<dyn Saga<S, A>>>,
        config: CoordinatorConfig,
    ) -> Self
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Sync + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        Self::start_with_context(SagaContext::from_store(store), sagas, config)
    }

    /// Start routines over an explicit context
    #[must_use]
    pub fn start_with_context<S, A>(
        ctx: SagaContext<S, A>,
        sagas: Vec<Arc<dyn Saga<S, A>>>,
        config: CoordinatorConfig,
    ) -> Self
    where
        S: Send + Sync + 'static,
        A: Send + Sync + Clone + 'static,
    {
        let statuses: StatusMap = Arc::default();
        let mut tasks = JoinSet::new();

        for saga in sagas {
            let rx = ctx.subscribe();
            let name = saga.name();
            write_status(&statuses, name, RoutineStatus::Running { restarts: 0 });

            tasks.spawn(supervise(
                saga,
                ctx.clone(),
                rx,
                config.clone(),
                Arc::clone(&statuses),
            ));
        }

        tracing::info!(routines = tasks.len(), "Coordinator started");

        Self { tasks, statuses }
    }

    /// Status of one routine
    #[must_use]
    pub fn status(&self, name: &str) -> Option<RoutineStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Number of routines started
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no routines were started
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Health of every routine
    ///
    /// Restarted routines are degraded; failed or stopped ones are unhealthy.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let statuses = self.statuses.read().unwrap_or_else(PoisonError::into_inner);
        let mut checks: Vec<HealthCheck> = statuses
            .iter()
            .map(|(name, status)| match *status {
                RoutineStatus::Running { restarts: 0 } => HealthCheck::healthy(*name),
                RoutineStatus::Running { restarts } => {
                    HealthCheck::degraded(*name, format!("restarted {restarts} time(s)"))
                        .with_metadata("restarts", restarts.to_string())
                },
                RoutineStatus::Stopped => HealthCheck::unhealthy(*name, "stopped"),
                RoutineStatus::Failed { restarts } => {
                    HealthCheck::unhealthy(*name, "crashed past the restart limit")
                        .with_metadata("restarts", restarts.to_string())
                },
            })
            .collect();
        checks.sort_by(|a, b| a.component.cmp(&b.component));

        HealthReport::new(checks)
    }

    /// Abort every routine and wait for the tasks to wind down
    pub async fn shutdown(&mut self) {
        tracing::info!("Coordinator shutting down");
        self.tasks.shutdown().await;

        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        for status in statuses.values_mut() {
            if matches!(status, RoutineStatus::Running { .. }) {
                *status = RoutineStatus::Stopped;
            }
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("routines", &self.len())
            .finish_non_exhaustive()
    }
}

fn write_status(statuses: &StatusMap, name: &'static str, status: RoutineStatus) {
    statuses
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name, status);
}

/// Serve a routine until the bus closes or it crashes past its restart limit
///
/// A panicking handler is replaced by its `on_crash` intent; sibling handlers
/// keep running and the receiver is kept, so triggers sent during the backoff
/// are still served.
async fn supervise<S, A>(
    saga: Arc<dyn Saga<S, A>>,
    ctx: SagaContext<S, A>,
    mut rx: broadcast::Receiver<A>,
    config: CoordinatorConfig,
    statuses: StatusMap,
) where
    S: Send + Sync + 'static,
    A: Send + Sync + Clone + 'static,
{
    let name = saga.name();
    let policy = saga.policy();
    let mut supervisor = Supervisor {
        name,
        restarts: 0,
        config,
        statuses,
    };
    let mut in_flight: JoinSet<()> = JoinSet::new();

    tracing::info!(routine = name, "Routine started");

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(action) => {
                    match panic::catch_unwind(AssertUnwindSafe(|| saga.trigger(&action))) {
                        Ok(true) => {},
                        Ok(false) => continue,
                        Err(_) => {
                            tracing::error!(routine = name, "Routine trigger panicked");
                            if !supervisor.recover().await {
                                drain(&saga, &ctx, &mut in_flight).await;
                                return;
                            }
                            continue;
                        },
                    }

                    if policy == TakePolicy::Latest && !in_flight.is_empty() {
                        tracing::debug!(
                            routine = name,
                            superseded = in_flight.len(),
                            "Superseding in-flight handler, its answer is dropped"
                        );
                        in_flight.abort_all();
                    }

                    tracing::debug!(routine = name, "Routine triggered");
                    metrics::counter!("saga.routine.triggered", "routine" => name).increment(1);

                    let saga = Arc::clone(&saga);
                    let ctx = ctx.clone();
                    in_flight.spawn(async move {
                        if let Some(result) = saga.handle(action, &ctx).await {
                            ctx.put(result).await;
                        }
                    });
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(routine = name, skipped, "Routine lagged behind the intent bus");
                },
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(routine = name, "Routine stopped");
                    write_status(&supervisor.statuses, name, RoutineStatus::Stopped);
                    return;
                },
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if handler_panicked(&saga, &ctx, joined).await && !supervisor.recover().await {
                    drain(&saga, &ctx, &mut in_flight).await;
                    return;
                }
            },
        }
    }
}

/// Restart accounting for one routine
struct Supervisor {
    name: &'static str,
    restarts: u32,
    config: CoordinatorConfig,
    statuses: StatusMap,
}

impl Supervisor {
    /// Count a crash; `false` once the restart limit is exceeded
    async fn recover(&mut self) -> bool {
        let name = self.name;
        metrics::counter!("saga.routine.crashes", "routine" => name).increment(1);

        if self.restarts >= self.config.max_restarts {
            tracing::error!(
                routine = name,
                restarts = self.restarts,
                "Routine crashed past its restart limit, workflow is no longer served"
            );
            write_status(&self.statuses, name, RoutineStatus::Failed { restarts: self.restarts });
            return false;
        }

        self.restarts += 1;
        write_status(&self.statuses, name, RoutineStatus::Running { restarts: self.restarts });
        tracing::error!(routine = name, restarts = self.restarts, "Restarting crashed routine");

        tokio::time::sleep(self.config.restart_backoff).await;
        true
    }
}

/// Dispatch `on_crash` if a finished handler panicked
async fn handler_panicked<S, A>(
    saga: &Arc<dyn Saga<S, A>>,
    ctx: &SagaContext<S, A>,
    joined: Result<(), JoinError>,
) -> bool
where
    S: Send + Sync + 'static,
    A: Send + Sync + Clone + 'static,
{
    match joined {
        Err(error) if error.is_panic() => {
            tracing::error!(routine = saga.name(), "Routine handler panicked");
            if let Some(action) = saga.on_crash() {
                ctx.put(action).await;
            }
            true
        },
        _ => false,
    }
}

/// Let the remaining handlers of a failed routine finish
async fn drain<S, A>(saga: &Arc<dyn Saga<S, A>>, ctx: &SagaContext<S, A>, in_flight: &mut JoinSet<()>)
where
    S: Send + Sync + 'static,
    A: Send + Sync + Clone + 'static,
{
    while let Some(joined) = in_flight.join_next().await {
        handler_panicked(saga, ctx, joined).await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)] // Crash tests panic on purpose
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Intent {
        Ask(u32),
        Answer(u32),
    }

    /// Dispatcher that only records and rebroadcasts
    struct Recorder {
        seen: Mutex<Vec<Intent>>,
        bus: broadcast::Sender<Intent>,
    }

    #[async_trait]
    impl Dispatcher<Intent> for Recorder {
        async fn dispatch(&self, action: Intent) -> Result<EffectHandle, StoreError> {
            self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(action.clone());
            let _ = self.bus.send(action);
            Ok(EffectHandle::completed())
        }

        fn subscribe(&self) -> broadcast::Receiver<Intent> {
            self.bus.subscribe()
        }
    }

    struct Echo {
        policy: TakePolicy,
    }

    #[async_trait]
    impl Saga<(), Intent> for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn policy(&self) -> TakePolicy {
            self.policy
        }

        fn trigger(&self, action: &Intent) -> bool {
            matches!(action, Intent::Ask(_))
        }

        async fn handle(&self, action: Intent, _ctx: &SagaContext<(), Intent>) -> Option<Intent> {
            let Intent::Ask(n) = action else { return None };
            // Earlier asks take longer, so they resolve after later ones
            tokio::time::sleep(Duration::from_millis(u64::from(50 - n * 10))).await;
            Some(Intent::Answer(n))
        }
    }

    fn recorder() -> Arc<Recorder> {
        let (bus, _) = broadcast::channel(16);
        Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            bus,
        })
    }

    fn answers(recorder: &Recorder) -> Vec<Intent> {
        recorder
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|i| matches!(i, Intent::Answer(_)))
            .cloned()
            .collect()
    }

    async fn run(policy: TakePolicy) -> Vec<Intent> {
        let recorder = recorder();
        let ctx = SagaContext::new(Arc::new(RwLock::new(())), Arc::clone(&recorder) as Arc<dyn Dispatcher<Intent>>);
        let coordinator = Coordinator::start_with_context(
            ctx.clone(),
            vec![Arc::new(Echo { policy }) as Arc<dyn Saga<(), Intent>>],
            CoordinatorConfig::default(),
        );

        ctx.put(Intent::Ask(1)).await;
        ctx.put(Intent::Ask(2)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(coordinator.status("echo"), Some(RoutineStatus::Running { restarts: 0 }));
        answers(&recorder)
    }

    #[tokio::test]
    async fn test_every_policy_last_resolved_wins() {
        let answers = run(TakePolicy::Every).await;
        assert_eq!(answers, vec![Intent::Answer(2), Intent::Answer(1)]);
    }

    #[tokio::test]
    async fn test_latest_policy_drops_superseded_handler() {
        let answers = run(TakePolicy::Latest).await;
        assert_eq!(answers, vec![Intent::Answer(2)]);
    }

    /// Panics on `Ask(0)`, answers `Ask(n)` after `n * 10` ms
    struct Flaky;

    #[async_trait]
    impl Saga<(), Intent> for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn trigger(&self, action: &Intent) -> bool {
            matches!(action, Intent::Ask(_))
        }

        async fn handle(&self, action: Intent, _ctx: &SagaContext<(), Intent>) -> Option<Intent> {
            match action {
                Intent::Ask(0) => panic!("handler blew up"),
                Intent::Ask(n) => {
                    tokio::time::sleep(Duration::from_millis(u64::from(n) * 10)).await;
                    Some(Intent::Answer(n))
                },
                Intent::Answer(_) => None,
            }
        }

        fn on_crash(&self) -> Option<Intent> {
            Some(Intent::Answer(0))
        }
    }

    fn start_flaky(
        recorder: &Arc<Recorder>,
        max_restarts: u32,
        backoff: Duration,
    ) -> (SagaContext<(), Intent>, Coordinator) {
        let ctx = SagaContext::new(Arc::new(RwLock::new(())), Arc::clone(recorder) as Arc<dyn Dispatcher<Intent>>);
        let coordinator = Coordinator::start_with_context(
            ctx.clone(),
            vec![Arc::new(Flaky) as Arc<dyn Saga<(), Intent>>],
            CoordinatorConfig::default()
                .with_max_restarts(max_restarts)
                .with_restart_backoff(backoff),
        );
        (ctx, coordinator)
    }

    #[tokio::test]
    async fn test_crashed_routine_restarts_and_keeps_serving() {
        let recorder = recorder();
        let (ctx, coordinator) = start_flaky(&recorder, 3, Duration::from_millis(5));

        ctx.put(Intent::Ask(0)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(coordinator.status("flaky"), Some(RoutineStatus::Running { restarts: 1 }));
        assert_eq!(answers(&recorder), vec![Intent::Answer(0)]);

        ctx.put(Intent::Ask(3)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(answers(&recorder), vec![Intent::Answer(0), Intent::Answer(3)]);
        let health = coordinator.health();
        assert!(health.status.is_degraded());
        assert_eq!(
            health.check("flaky").map(|c| c.metadata.clone()),
            Some(vec![("restarts".to_string(), "1".to_string())])
        );
    }

    #[tokio::test]
    async fn test_crash_spares_siblings_and_queued_triggers() {
        let recorder = recorder();
        let (ctx, coordinator) = start_flaky(&recorder, 3, Duration::from_millis(30));

        // Ask(4) is still running when Ask(0) panics
        ctx.put(Intent::Ask(4)).await;
        ctx.put(Intent::Ask(0)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Arrives while the routine is backing off
        ctx.put(Intent::Ask(1)).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        let answers = answers(&recorder);
        assert_eq!(answers.len(), 3, "got {answers:?}");
        for n in [0, 1, 4] {
            assert!(answers.contains(&Intent::Answer(n)), "missing answer {n} in {answers:?}");
        }
        assert_eq!(coordinator.status("flaky"), Some(RoutineStatus::Running { restarts: 1 }));
    }

    #[tokio::test]
    async fn test_routine_fails_past_restart_limit() {
        let recorder = recorder();
        let (ctx, coordinator) = start_flaky(&recorder, 0, Duration::from_millis(5));

        ctx.put(Intent::Ask(2)).await;
        ctx.put(Intent::Ask(0)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(coordinator.status("flaky"), Some(RoutineStatus::Failed { restarts: 0 }));
        assert!(coordinator.health().is_unhealthy());

        // The handler already running still answers; nobody listens afterwards
        ctx.put(Intent::Ask(4)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(answers(&recorder), vec![Intent::Answer(0), Intent::Answer(2)]);
    }

    #[tokio::test]
    async fn test_shutdown_marks_routines_stopped() {
        let recorder = recorder();
        let ctx = SagaContext::new(Arc::new(RwLock::new(())), recorder as Arc<dyn Dispatcher<Intent>>);
        let mut coordinator = Coordinator::start_with_context(
            ctx,
            vec![Arc::new(Echo { policy: TakePolicy::Every }) as Arc<dyn Saga<(), Intent>>],
            CoordinatorConfig::default(),
        );
        assert!(coordinator.health().is_healthy());

        coordinator.shutdown().await;

        assert_eq!(coordinator.status("echo"), Some(RoutineStatus::Stopped));
        assert!(coordinator.health().is_unhealthy());
    }
}
