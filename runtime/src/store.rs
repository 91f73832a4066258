//! Store runtime for coordinating reducer execution and effect handling.

use crate::{
    AtomicCounterGuard, DecrementGuard, EffectHandle, EffectTracking, HealthCheck, StoreConfig,
    StoreError,
};
use soundwave_core::{effect::Effect, reducer::Reducer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// The Store - runtime coordinator for a reducer
///
/// The Store manages:
/// 1. State (behind `RwLock`, so reducers never observe a partial update)
/// 2. Reducer (pure state transitions)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (with feedback loop)
/// 5. The intent bus: every reduced action is broadcast to subscribers
///
/// Cloning a Store is cheap; clones share state.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: Arc<R>,
    environment: Arc<E>,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    default_shutdown_timeout: Duration,
    /// Intent bus.
    ///
    /// Each action is broadcast right after the reducer has applied it, while
    /// the state lock is still held, so subscribers see actions in exactly the
    /// order they were reduced.
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: Arc::clone(&self.reducer),
            environment: Arc::clone(&self.environment),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            default_shutdown_timeout: self.default_shutdown_timeout,
            action_broadcast: self.action_broadcast.clone(),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment
    ///
    /// Uses [`StoreConfig::default()`].
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a new Store with custom configuration
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = StoreConfig::default().with_broadcast_capacity(256);
    ///
    /// let store = Store::with_config(
    ///     AppState::default(),
    ///     app_reducer(),
    ///     environment,
    ///     config,
    /// );
    /// ```
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer: Arc::new(reducer),
            environment: Arc::new(environment),
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            default_shutdown_timeout: config.default_shutdown_timeout,
            action_broadcast,
        }
    }

    /// Perform a health check on the Store
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let pending = self.pending_effects.load(Ordering::Acquire);

        let check = if self.shutdown.load(Ordering::Acquire) {
            HealthCheck::unhealthy("store", "Store is shutting down")
        } else {
            HealthCheck::healthy("store")
        };

        check
            .with_metadata("pending_effects", pending.to_string())
            .with_metadata("subscribers", self.action_broadcast.receiver_count().to_string())
    }

    /// Initiate graceful shutdown of the store
    ///
    /// Sets the shutdown flag (rejecting new actions) and waits for pending
    /// effects to complete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
    /// pending effects complete.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("Initiating graceful shutdown");
        metrics::counter!("store.shutdown.initiated").increment(1);

        self.shutdown.store(true, Ordering::Release);

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(20);

        loop {
            let pending = self.pending_effects.load(Ordering::Acquire);

            if pending == 0 {
                tracing::info!("All effects completed, shutdown successful");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(pending_effects = pending, "Shutdown timeout: {} effects still running", pending);
                metrics::counter!("store.shutdown.timeout").increment(1);
                return Err(StoreError::ShutdownTimeout(pending));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Shut down using the configured default timeout
    ///
    /// # Errors
    ///
    /// See [`Store::shutdown`].
    pub async fn shutdown_default(&self) -> Result<(), StoreError> {
        self.shutdown(self.default_shutdown_timeout).await
    }

    /// Send an action to the store
    ///
    /// 1. Acquires write lock on state
    /// 2. Calls reducer with (state, action, environment)
    /// 3. Broadcasts the action on the intent bus
    /// 4. Executes returned effects asynchronously
    ///
    /// # Concurrency and Effect Execution
    ///
    /// - The reducer executes synchronously while holding a write lock
    /// - Multiple concurrent `send()` calls serialize at the reducer level
    /// - `send()` returns after starting effect execution, not completion
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            metrics::counter!("store.shutdown.rejected_actions").increment(1);
            return Err(StoreError::ShutdownInProgress);
        }

        tracing::debug!("Processing action");
        metrics::counter!("store.commands.total").increment(1);

        let (handle, tracking) = EffectHandle::new();

        let effects = {
            let mut state = self.state.write().await;
            tracing::trace!("Acquired write lock on state");

            let span = tracing::debug_span!("reducer_execution");
            let _enter = span.enter();

            let start = std::time::Instant::now();
            let effects = self.reducer.reduce(&mut *state, action.clone(), &self.environment);
            metrics::histogram!("store.reducer.duration_seconds").record(start.elapsed().as_secs_f64());

            tracing::trace!("Reducer completed, returned {} effects", effects.len());

            // No subscribers is fine: nothing is listening for this intent
            let _ = self.action_broadcast.send(action);

            effects
        };

        for effect in effects {
            self.execute_effect(effect, tracking.clone());
        }

        Ok(handle)
    }

    /// Send an action and wait for a matching result action
    ///
    /// Designed for request/response flows: subscribe, send the request
    /// intent, then wait for the terminal intent some routine dispatches.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: Timeout expired before matching action received
    /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
    /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = store.send_and_wait_for(
    ///     AppAction::Auth(AuthAction::SignInRequest),
    ///     |a| matches!(a,
    ///         AppAction::Auth(AuthAction::SignInSuccess(_) | AuthAction::SignInFailure(_))
    ///     ),
    ///     Duration::from_secs(10),
    /// ).await?;
    /// ```
    pub async fn send_and_wait_for<F>(&self, action: A, predicate: F, timeout: Duration) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        // Subscribe BEFORE sending to avoid race condition
        let mut rx = self.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Subscribe to every action reduced by this store
    ///
    /// Actions arrive in the order they were reduced. A receiver that falls
    /// more than the broadcast capacity behind gets `RecvError::Lagged`.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let songs = store.state(|s| s.song.lib_songs.len()).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&*state)
    }

    /// Shared handle to the state lock, for read-only views (saga contexts)
    #[must_use]
    pub(crate) fn state_lock(&self) -> Arc<RwLock<S>> {
        Arc::clone(&self.state)
    }

    /// Access the environment the reducer runs with
    #[must_use]
    pub fn environment(&self) -> &E {
        &self.environment
    }

    /// Execute an effect with tracking
    ///
    /// Actions produced by effects are sent back through [`Store::send`] and
    /// therefore reduced and broadcast like any other intent.
    #[tracing::instrument(skip(self, effect, tracking), name = "execute_effect")]
    fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
        match effect {
            Effect::None => {
                tracing::trace!("Executing Effect::None (no-op)");
            },
            Effect::Future(fut) => {
                tracing::trace!("Executing Effect::Future");
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                let guards = self.track(&tracking);
                let store = self.clone();

                tokio::spawn(async move {
                    let _guards = guards;

                    if let Some(action) = fut.await {
                        tracing::trace!("Effect::Future produced an action, sending to store");
                        if let Err(error) = store.send(action).await {
                            tracing::warn!(%error, "Dropped action produced by effect");
                        }
                    }
                });
            },
        }
    }

    /// Register one running effect with both the per-send and global counters
    fn track(&self, tracking: &EffectTracking) -> (DecrementGuard, AtomicCounterGuard) {
        tracking.increment();
        self.pending_effects.fetch_add(1, Ordering::SeqCst);
        (
            DecrementGuard(tracking.clone()),
            AtomicCounterGuard(Arc::clone(&self.pending_effects)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundwave_core::{smallvec, SmallVec};

    #[derive(Debug, Clone, PartialEq)]
    enum TestAction {
        Increment,
        Incremented { value: u32 },
    }

    #[derive(Debug, Clone, Default)]
    struct TestState {
        counter: u32,
        log: Vec<u32>,
    }

    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.counter += 1;
                    let value = state.counter;
                    smallvec![Effect::Future(Box::pin(async move {
                        Some(TestAction::Incremented { value })
                    }))]
                },
                TestAction::Incremented { value } => {
                    state.log.push(value);
                    smallvec![Effect::None]
                },
            }
        }
    }

    fn store() -> Store<TestState, TestAction, (), TestReducer> {
        Store::new(TestState::default(), TestReducer, ())
    }

    #[tokio::test]
    async fn test_send_broadcasts_after_reduction() {
        let store = store();
        let mut rx = store.subscribe_actions();

        let _ = store.send(TestAction::Increment).await;

        assert_eq!(rx.recv().await.ok(), Some(TestAction::Increment));
        assert_eq!(rx.recv().await.ok(), Some(TestAction::Incremented { value: 1 }));
        assert_eq!(store.state(|s| s.log.clone()).await, vec![1]);
    }

    #[tokio::test]
    async fn test_send_and_wait_for_terminal_action() {
        let store = store();

        let result = store
            .send_and_wait_for(
                TestAction::Increment,
                |a| matches!(a, TestAction::Incremented { .. }),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(result, Ok(TestAction::Incremented { value: 1 })));
    }

    #[tokio::test]
    async fn test_send_and_wait_for_times_out() {
        let store = store();

        let result = store
            .send_and_wait_for(
                TestAction::Incremented { value: 9 },
                |a| matches!(a, TestAction::Increment),
                Duration::from_millis(20),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn test_effect_handle_waits_for_feedback() {
        let store = store();

        let mut handle = store.send(TestAction::Increment).await.unwrap_or_else(|_| EffectHandle::completed());
        assert!(handle.wait_with_timeout(Duration::from_secs(1)).await.is_ok());

        assert_eq!(store.state(|s| s.log.clone()).await, vec![1]);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_actions() {
        let store = store();

        assert!(store.shutdown(Duration::from_secs(1)).await.is_ok());
        assert!(matches!(
            store.send(TestAction::Increment).await,
            Err(StoreError::ShutdownInProgress)
        ));
        assert!(store.health().status.is_unhealthy());
    }

    #[tokio::test]
    async fn test_concurrent_sends_serialize() {
        let store = store();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let _ = store.send(TestAction::Increment).await;
                })
            })
            .collect();

        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(store.state(|s| s.counter).await, 10);
    }
}
