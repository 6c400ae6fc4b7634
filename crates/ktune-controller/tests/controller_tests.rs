// K CONTROLLER INTEGRATION TESTS
// Mocked node (mockall) and seeded dynamics model.
//
// Test Categories:
// 1. Stability - a holding provider never touches the node
// 2. Actuation - commit success, commit failure, local application
// 3. Observation - live metrics, failing observations
// 4. Loop control - the run loop honours the stop flag

use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use ktune_controller::{
    ActuationOutcome, ControllerConfig, ControllerPhase, CycleError, Decision, DecisionError,
    DecisionProvider, FixedPolicy, KController, NodeNotifier,
};
use ktune_core::{KAction, Observation};
use ktune_rpc::{
    AgentHealth, DagRpc, DagSnapshot, LinearizedBlock, RpcError, RpcResult, SmartSubmitRequest,
    SmartSubmitResponse, TipInfo, UpdateKAck,
};
use ktune_sim::DagSimulator;

mock! {
    pub Node {}

    #[async_trait]
    impl DagRpc for Node {
        async fn get_tips(&self) -> RpcResult<Vec<TipInfo>>;
        async fn get_health(&self) -> RpcResult<AgentHealth>;
        async fn get_snapshot(&self, n: usize) -> RpcResult<DagSnapshot>;
        async fn update_k(&self, new_k: u64) -> RpcResult<UpdateKAck>;
        async fn smart_submit(&self, request: &SmartSubmitRequest) -> RpcResult<SmartSubmitResponse>;
        async fn get_tip_order(&self) -> RpcResult<Vec<LinearizedBlock>>;
        async fn linearize_range(&self, from_score: u64, to_score: u64) -> RpcResult<Vec<LinearizedBlock>>;
    }
}

/// Provider that always reports an out-of-range action.
struct BrokenProvider;

#[async_trait]
impl DecisionProvider for BrokenProvider {
    fn name(&self) -> &str {
        "broken"
    }

    async fn decide(&self, _observation: &Observation) -> Result<Decision, DecisionError> {
        Decision::from_raw(7, 0.5)
    }
}

fn config() -> ControllerConfig {
    ControllerConfig {
        poll_interval: Duration::from_millis(5),
        ..ControllerConfig::default()
    }
}

fn always(action: KAction) -> Arc<dyn DecisionProvider> {
    Arc::new(FixedPolicy::new(action, 0.9).unwrap())
}

fn health(current_k: u64, total_blocks: u64, red_count: u64) -> AgentHealth {
    AgentHealth {
        current_k,
        rl_confidence: 0.9,
        agent_state: "SYNCED".to_string(),
        tip_blue_score: total_blocks,
        total_blocks,
        blue_count: total_blocks - red_count,
        red_count,
    }
}

fn tips(n: usize) -> Vec<TipInfo> {
    (0..n)
        .map(|i| TipInfo {
            hash: format!("{i:064x}"),
            blue_score: i as u64,
        })
        .collect()
}

fn refused() -> RpcError {
    RpcError::Transport {
        addr: "127.0.0.1:9293".to_string(),
        attempts: 3,
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
    }
}

// ============================================================================
// STABILITY
// ============================================================================

#[tokio::test]
async fn test_hold_provider_leaves_k_over_ten_cycles() {
    let mut node = MockNode::new();
    node.expect_update_k().never();

    let mut controller = KController::simulated(
        config(),
        Arc::new(FixedPolicy::hold()),
        DagSimulator::with_seed(3, 1),
        Some(Arc::new(node)),
        NodeNotifier::disabled(),
    );

    for _ in 0..10 {
        let report = controller.run_cycle().await.unwrap();
        assert_eq!(report.outcome, ActuationOutcome::Unchanged);
        assert_eq!(report.new_k, 3);
    }

    let state = controller.state();
    assert_eq!(state.current_k, 3);
    assert_eq!(state.no_change_cycles, 10);
    assert_eq!(state.cycles, 10);
    assert_eq!(state.phase, ControllerPhase::Idle);
    assert_eq!(controller.confidence().committed_changes, 0);
}

// ============================================================================
// ACTUATION
// ============================================================================

#[tokio::test]
async fn test_failed_commit_keeps_k() {
    let mut node = MockNode::new();
    node.expect_update_k()
        .withf(|k| *k == 5)
        .times(1)
        .returning(|_| Err(refused()));

    let mut controller = KController::simulated(
        config(),
        always(KAction::IncreaseTwo),
        DagSimulator::with_seed(3, 2),
        Some(Arc::new(node)),
        NodeNotifier::disabled(),
    );

    let report = controller.run_cycle().await.unwrap();
    assert!(matches!(report.outcome, ActuationOutcome::CommitFailed(_)));
    assert_eq!(report.previous_k, 3);
    assert_eq!(report.new_k, 3);
    assert_eq!(controller.current_k(), 3);
    assert_eq!(controller.confidence().committed_changes, 0);
}

#[tokio::test]
async fn test_live_commit_adopts_new_k() {
    let mut node = MockNode::new();
    node.expect_get_health()
        .returning(|| Ok(health(3, 100, 5)));
    node.expect_get_tips().returning(|| Ok(tips(4)));
    node.expect_update_k()
        .withf(|k| *k == 4)
        .times(1)
        .returning(|k| Ok(UpdateKAck { updated_k: Some(k) }));

    let mut controller = KController::live(
        config(),
        always(KAction::IncreaseOne),
        Arc::new(node),
        NodeNotifier::disabled(),
    );

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.outcome, ActuationOutcome::Committed);
    assert_eq!(report.new_k, 4);
    assert_eq!(controller.current_k(), 4);
    assert_eq!(controller.state().no_change_cycles, 0);
    assert_eq!(controller.state().last_confidence, Some(0.9));
    assert_eq!(controller.confidence().committed_changes, 1);
}

#[tokio::test]
async fn test_without_node_change_applies_locally() {
    let mut controller = KController::simulated(
        config(),
        always(KAction::IncreaseTwo),
        DagSimulator::with_seed(3, 3),
        None,
        NodeNotifier::disabled(),
    );

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.outcome, ActuationOutcome::AppliedLocally);
    assert_eq!(controller.current_k(), 5);

    // the next batch runs under the new k
    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.metrics.current_k, 5);
    assert_eq!(report.previous_k, 5);
    assert_eq!(report.new_k, 7);
}

#[tokio::test]
async fn test_k_is_clamped_at_bounds() {
    let mut controller = KController::simulated(
        config(),
        always(KAction::DecreaseTwo),
        DagSimulator::with_seed(3, 4),
        None,
        NodeNotifier::disabled(),
    );

    controller.run_cycle().await.unwrap();
    assert_eq!(controller.current_k(), 1);
    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.outcome, ActuationOutcome::Unchanged);
    assert_eq!(controller.current_k(), 1);
}

// ============================================================================
// OBSERVATION
// ============================================================================

#[tokio::test]
async fn test_live_observation_reconciles_k_and_builds_metrics() {
    let mut node = MockNode::new();
    node.expect_get_health()
        .returning(|| Ok(health(6, 200, 50)));
    node.expect_get_tips().returning(|| Ok(tips(9)));
    node.expect_update_k().never();

    let mut controller = KController::live(
        config(),
        Arc::new(FixedPolicy::hold()),
        Arc::new(node),
        NodeNotifier::disabled(),
    );

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(controller.current_k(), 6);
    assert_eq!(report.metrics.current_k, 6);
    assert_eq!(report.metrics.orphan_rate, 0.25);
    assert_eq!(report.metrics.tip_regression_velocity, 0.5);
    // first live cycle has no previous block count
    assert_eq!(report.metrics.tps, 0.0);
    assert_eq!(report.observation.latency_norm, 0.1);
}

#[tokio::test]
async fn test_node_reporting_huge_k_is_pulled_back_to_ceiling() {
    let mut node = MockNode::new();
    node.expect_get_health()
        .returning(|| Ok(health(u64::MAX, 100, 5)));
    node.expect_get_tips().returning(|| Ok(tips(4)));
    node.expect_update_k()
        .withf(|k| *k == 32)
        .times(1)
        .returning(|k| Ok(UpdateKAck { updated_k: Some(k) }));

    let mut controller = KController::live(
        config(),
        always(KAction::IncreaseTwo),
        Arc::new(node),
        NodeNotifier::disabled(),
    );

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.previous_k, u64::MAX);
    assert_eq!(report.new_k, 32);
    assert_eq!(report.observation.k_norm, 1.0);
    assert_eq!(controller.current_k(), 32);
}

#[tokio::test]
async fn test_tip_failure_zeroes_velocity() {
    let mut node = MockNode::new();
    node.expect_get_health()
        .returning(|| Ok(health(3, 10, 0)));
    node.expect_get_tips().returning(|| Err(refused()));

    let mut controller = KController::live(
        config(),
        Arc::new(FixedPolicy::hold()),
        Arc::new(node),
        NodeNotifier::disabled(),
    );

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.metrics.tip_regression_velocity, 0.0);
}

#[tokio::test]
async fn test_health_failure_fails_the_cycle() {
    let mut node = MockNode::new();
    node.expect_get_health().returning(|| Err(refused()));
    node.expect_update_k().never();

    let mut controller = KController::live(
        config(),
        always(KAction::IncreaseTwo),
        Arc::new(node),
        NodeNotifier::disabled(),
    );

    let err = controller.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Observe(_)));
    assert_eq!(controller.current_k(), 3);
    assert_eq!(controller.state().phase, ControllerPhase::Idle);
}

#[tokio::test]
async fn test_malformed_decision_keeps_k() {
    let mut controller = KController::simulated(
        config(),
        Arc::new(BrokenProvider),
        DagSimulator::with_seed(3, 5),
        None,
        NodeNotifier::disabled(),
    );

    let err = controller.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Decision(DecisionError::Malformed(_))));
    assert_eq!(controller.current_k(), 3);
    assert_eq!(controller.state().cycles, 1);
}

// ============================================================================
// LOOP CONTROL
// ============================================================================

#[tokio::test]
async fn test_run_returns_immediately_when_already_stopped() {
    let (_tx, rx) = watch::channel(true);
    let mut controller = KController::simulated(
        config(),
        Arc::new(FixedPolicy::hold()),
        DagSimulator::with_seed(3, 6),
        None,
        NodeNotifier::disabled(),
    );

    controller.run(rx).await;
    assert_eq!(controller.state().cycles, 0);
}

#[tokio::test]
async fn test_run_stops_on_signal() {
    let (tx, rx) = watch::channel(false);
    let mut controller = KController::simulated(
        config(),
        Arc::new(FixedPolicy::hold()),
        DagSimulator::with_seed(3, 7),
        None,
        NodeNotifier::disabled(),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    tokio::time::timeout(Duration::from_secs(5), controller.run(rx))
        .await
        .expect("controller did not stop");
    assert!(controller.state().cycles >= 1);
    assert_eq!(controller.state().current_k, 3);
}
