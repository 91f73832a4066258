//! Integration tests for the intent bus and routine supervision
//!
//! Covers broadcast ordering under concurrent dispatch, and the coordinator's
//! restart-and-log policy for routines whose handlers panic.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use async_trait::async_trait;
use proptest::prelude::*;
use soundwave_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use soundwave_runtime::{
    Coordinator, CoordinatorConfig, RoutineStatus, Saga, SagaContext, Store, TakePolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    Record(u32),
    Load,
    Loaded(u32),
    LoadFailed,
}

#[derive(Debug, Clone, Default)]
struct TestState {
    log: Vec<u32>,
    loading: bool,
    loaded: Option<u32>,
    failed: bool,
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
            TestAction::Record(n) => state.log.push(n),
            TestAction::Load => {
                state.loading = true;
                state.failed = false;
            },
            TestAction::Loaded(n) => {
                state.loading = false;
                state.loaded = Some(n);
            },
            TestAction::LoadFailed => {
                state.loading = false;
                state.failed = true;
            },
        }
        smallvec![Effect::None]
    }
}

type TestStore = Store<TestState, TestAction, (), TestReducer>;

fn test_store() -> TestStore {
    Store::new(TestState::default(), TestReducer, ())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("soundwave_runtime=debug")
        .with_test_writer()
        .try_init();
}

/// Panics on the first `panics` triggers, then answers with the attempt count
struct FlakyLoader {
    attempts: AtomicU32,
    panics: u32,
}

#[async_trait]
impl Saga<TestState, TestAction> for FlakyLoader {
    fn name(&self) -> &'static str {
        "loader"
    }

    fn policy(&self) -> TakePolicy {
        TakePolicy::Latest
    }

    fn trigger(&self, action: &TestAction) -> bool {
        matches!(action, TestAction::Load)
    }

    async fn handle(
        &self,
        _action: TestAction,
        ctx: &SagaContext<TestState, TestAction>,
    ) -> Option<TestAction> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.panics {
            panic!("loader attempt {attempt} blew up");
        }

        let loading = ctx.select(|s| s.loading).await;
        assert!(loading, "handler runs after the request was reduced");
        Some(TestAction::Loaded(attempt))
    }

    fn on_crash(&self) -> Option<TestAction> {
        Some(TestAction::LoadFailed)
    }
}

fn loader(panics: u32) -> Vec<Arc<dyn Saga<TestState, TestAction>>> {
    vec![Arc::new(FlakyLoader {
        attempts: AtomicU32::new(0),
        panics,
    })]
}

async fn wait_until<F>(store: &TestStore, f: F)
where
    F: Fn(&TestState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !store.state(&f).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state condition not reached in time");
}

// ============================================================================
// Broadcast ordering
// ============================================================================

#[tokio::test]
async fn broadcast_order_matches_reduction_order() {
    let store = test_store();
    let mut rx = store.subscribe_actions();

    let sends = (0..32).map(|n| {
        let store = store.clone();
        async move { store.send(TestAction::Record(n)).await }
    });
    let results = futures::future::join_all(sends).await;
    assert!(results.iter().all(Result::is_ok));

    let mut observed = Vec::new();
    for _ in 0..32 {
        if let TestAction::Record(n) = rx.recv().await.unwrap() {
            observed.push(n);
        }
    }

    assert_eq!(observed, store.state(|s| s.log.clone()).await);
}

proptest! {
    #[test]
    fn sequential_sends_are_broadcast_in_order(values in prop::collection::vec(0u32..1000, 1..40)) {
        let observed = tokio_test::block_on(async {
            let store = test_store();
            let mut rx = store.subscribe_actions();

            for value in &values {
                store.send(TestAction::Record(*value)).await.unwrap();
            }

            let mut observed = Vec::new();
            for _ in 0..values.len() {
                if let Ok(TestAction::Record(n)) = rx.recv().await {
                    observed.push(n);
                }
            }
            observed
        });

        prop_assert_eq!(observed, values);
    }
}

// ============================================================================
// Supervision
// ============================================================================

#[tokio::test]
async fn routine_serves_its_trigger() {
    init_tracing();
    let store = test_store();
    let coordinator = Coordinator::start(&store, loader(0), CoordinatorConfig::default());

    store.send(TestAction::Load).await.unwrap();
    wait_until(&store, |s| s.loaded == Some(1)).await;

    assert!(!store.state(|s| s.loading).await);
    assert!(coordinator.health().is_healthy());
}

#[tokio::test]
async fn crashed_routine_is_restarted_and_keeps_serving() {
    init_tracing();
    let store = test_store();
    let coordinator = Coordinator::start(
        &store,
        loader(1),
        CoordinatorConfig::default().with_restart_backoff(Duration::from_millis(1)),
    );

    store.send(TestAction::Load).await.unwrap();
    wait_until(&store, |s| s.failed && !s.loading).await;

    // Give the supervisor time to resubscribe
    tokio::time::timeout(Duration::from_secs(1), async {
        while coordinator.status("loader") != Some(RoutineStatus::Running { restarts: 1 }) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    store.send(TestAction::Load).await.unwrap();
    wait_until(&store, |s| s.loaded == Some(2)).await;

    let health = coordinator.health();
    assert!(health.status.is_degraded());
    assert_eq!(
        health.check("loader").map(|c| c.metadata.clone()),
        Some(vec![("restarts".to_string(), "1".to_string())])
    );
}

#[tokio::test]
async fn routine_past_restart_limit_is_reported_failed() {
    init_tracing();
    let store = test_store();
    let coordinator = Coordinator::start(
        &store,
        loader(u32::MAX),
        CoordinatorConfig::default()
            .with_max_restarts(0)
            .with_restart_backoff(Duration::from_millis(1)),
    );

    store.send(TestAction::Load).await.unwrap();
    wait_until(&store, |s| s.failed).await;

    tokio::time::timeout(Duration::from_secs(1), async {
        while coordinator.status("loader") != Some(RoutineStatus::Failed { restarts: 0 }) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(coordinator.health().is_unhealthy());
}

#[tokio::test]
async fn dropping_the_coordinator_stops_routines() {
    let store = test_store();
    let coordinator = Coordinator::start(&store, loader(0), CoordinatorConfig::default());
    assert_eq!(coordinator.len(), 1);
    drop(coordinator);

    tokio::time::sleep(Duration::from_millis(10)).await;
    store.send(TestAction::Load).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(store.state(|s| s.loaded).await, None);
}
