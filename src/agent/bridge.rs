//! Node status bridge
//!
//! Periodically builds a [`NodeStatusSnapshot`] and pushes it to the callback
//! registered by the orchestrator's node controller.
//!
//! Lifecycle: `Idle` (constructed) → `Running` (started on a cancellation
//! token) → `Stopped` (token cancelled). The bridge owns exactly one ticker,
//! created when the loop starts and dropped when it exits. The callback runs
//! inline on the loop task: a slow callback delays the next tick, nothing is
//! buffered or dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::node::{ConditionStatus, NodeCondition, NodeConditionType, NodeStatusSnapshot};
use super::pressure::{PressureReading, PressureSampler, PressureThresholds};
use super::probe::BackendProbe;
use super::{AgentError, NODE_STATUS_INTERVAL_SECS};

/// Sink for node status snapshots
pub type StatusCallback = Box<dyn FnMut(NodeStatusSnapshot) + Send + 'static>;

/// Configuration for the node status bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Name of the node being reported
    pub node_name: String,

    /// Time between snapshots (default: 10s)
    pub interval: Duration,

    /// Limits for the pressure conditions
    pub thresholds: PressureThresholds,
}

impl BridgeConfig {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            interval: Duration::from_secs(NODE_STATUS_INTERVAL_SECS),
            thresholds: PressureThresholds::default(),
        }
    }

    /// Set the reporting interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the pressure thresholds
    pub fn with_thresholds(mut self, thresholds: PressureThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Running,
    Stopped,
}

pub struct NodeStatusBridge {
    config: BridgeConfig,
    probe: Arc<dyn BackendProbe>,
    sampler: Mutex<Option<Box<dyn PressureSampler>>>,
    state: Arc<watch::Sender<BridgeState>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NodeStatusBridge {
    pub fn new(
        config: BridgeConfig,
        probe: Arc<dyn BackendProbe>,
        sampler: Box<dyn PressureSampler>,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Idle);
        Self {
            config,
            probe,
            sampler: Mutex::new(Some(sampler)),
            state: Arc::new(state),
            task: Mutex::new(None),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    /// Health of the remote backend. An error means the node is unhealthy.
    pub async fn ping(&self) -> Result<(), AgentError> {
        self.probe.ping().await
    }

    /// Start pushing snapshots to `callback` until `parent` is cancelled.
    ///
    /// Must be called from within a tokio runtime. A bridge can only be
    /// started once, and only with a non-zero interval.
    pub fn start(&self, parent: &CancellationToken, callback: StatusCallback) -> Result<(), AgentError> {
        if self.config.interval.is_zero() {
            return Err(AgentError::InvalidInterval(self.config.interval));
        }
        let mut task = lock(&self.task);
        if self.state() != BridgeState::Idle {
            return Err(AgentError::AlreadyStarted);
        }
        let sampler = lock(&self.sampler)
            .take()
            .ok_or(AgentError::AlreadyStarted)?;

        let cancel = parent.child_token();
        let reporter = StatusReporter::new(
            self.config.node_name.clone(),
            self.probe.clone(),
            sampler,
            self.config.thresholds.clone(),
        );

        self.state.send_replace(BridgeState::Running);
        let handle = tokio::spawn(run_status_loop(
            reporter,
            self.config.interval,
            cancel.clone(),
            callback,
            self.state.clone(),
        ));
        *task = Some((cancel, handle));
        Ok(())
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(&self) {
        let task = lock(&self.task).take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Node status task ended abnormally: {}", e);
            }
        }
    }
}

async fn run_status_loop(
    mut reporter: StatusReporter,
    period: Duration,
    cancel: CancellationToken,
    mut callback: StatusCallback,
    state: Arc<watch::Sender<BridgeState>>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Starting node status bridge: node={}, interval={:?}",
        reporter.node_name, period
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    snapshot = reporter.snapshot() => snapshot,
                };
                debug!(
                    "Updating node status: node={}, ready={}",
                    snapshot.node_name,
                    snapshot.is_ready()
                );
                callback(snapshot);
            }
        }
    }

    drop(ticker);
    state.send_replace(BridgeState::Stopped);
    info!("Node status bridge stopped: node={}", reporter.node_name);
}

/// Builds snapshots and keeps condition transition times stable
struct StatusReporter {
    node_name: String,
    probe: Arc<dyn BackendProbe>,
    sampler: Arc<Mutex<Box<dyn PressureSampler>>>,
    thresholds: PressureThresholds,
    transitions: HashMap<NodeConditionType, (ConditionStatus, DateTime<Utc>)>,
}

impl StatusReporter {
    fn new(
        node_name: String,
        probe: Arc<dyn BackendProbe>,
        sampler: Box<dyn PressureSampler>,
        thresholds: PressureThresholds,
    ) -> Self {
        Self {
            node_name,
            probe,
            sampler: Arc::new(Mutex::new(sampler)),
            thresholds,
            transitions: HashMap::new(),
        }
    }

    async fn snapshot(&mut self) -> NodeStatusSnapshot {
        let ping = self.probe.ping().await;
        let reading = self.sample_pressure().await;

        let mut snapshot = build_snapshot(&self.node_name, &ping, &reading, &self.thresholds);
        for condition in &mut snapshot.conditions {
            self.carry_transition(condition);
        }
        snapshot
    }

    /// Sampling refreshes host metrics synchronously, so it runs on the
    /// blocking pool
    async fn sample_pressure(&self) -> PressureReading {
        let sampler = self.sampler.clone();
        match tokio::task::spawn_blocking(move || lock(&*sampler).sample()).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Pressure sampling failed: {}", e);
                PressureReading::default()
            }
        }
    }

    /// Keep the previous transition time while a condition's status is unchanged
    fn carry_transition(&mut self, condition: &mut NodeCondition) {
        match self.transitions.get(&condition.condition_type) {
            Some((status, since)) if *status == condition.status => {
                condition.last_transition_time = *since;
            }
            _ => {
                self.transitions.insert(
                    condition.condition_type,
                    (condition.status, condition.last_transition_time),
                );
            }
        }
    }
}

/// Build a snapshot with all five conditions from a probe result and a
/// pressure reading
pub fn build_snapshot(
    node_name: &str,
    ping: &Result<(), AgentError>,
    reading: &PressureReading,
    thresholds: &PressureThresholds,
) -> NodeStatusSnapshot {
    let (ready, network) = match ping {
        Ok(()) => (
            NodeCondition::ready(true, "KubeletReady", "kubelet is posting ready status"),
            NodeCondition::new(
                NodeConditionType::NetworkUnavailable,
                ConditionStatus::False,
                "BackendReachable",
                "compute backend is reachable",
            ),
        ),
        Err(e) => (
            NodeCondition::ready(false, "BackendUnreachable", &e.to_string()),
            NodeCondition::new(
                NodeConditionType::NetworkUnavailable,
                ConditionStatus::True,
                "BackendUnreachable",
                e.to_string(),
            ),
        ),
    };

    let memory = if reading.memory_pressure(thresholds) {
        NodeCondition::new(
            NodeConditionType::MemoryPressure,
            ConditionStatus::True,
            "KubeletHasInsufficientMemory",
            format!("memory usage at {:.1}%", reading.memory_usage_percent),
        )
    } else {
        NodeCondition::new(
            NodeConditionType::MemoryPressure,
            ConditionStatus::False,
            "KubeletHasSufficientMemory",
            "kubelet has sufficient memory available",
        )
    };

    let disk = if reading.disk_pressure(thresholds) {
        NodeCondition::new(
            NodeConditionType::DiskPressure,
            ConditionStatus::True,
            "KubeletHasDiskPressure",
            format!("disk usage at {:.1}%", reading.disk_usage_percent),
        )
    } else {
        NodeCondition::new(
            NodeConditionType::DiskPressure,
            ConditionStatus::False,
            "KubeletHasNoDiskPressure",
            "kubelet has no disk pressure",
        )
    };

    let pid = if reading.pid_pressure(thresholds) {
        NodeCondition::new(
            NodeConditionType::PIDPressure,
            ConditionStatus::True,
            "KubeletHasInsufficientPID",
            format!("{} processes running", reading.process_count),
        )
    } else {
        NodeCondition::new(
            NodeConditionType::PIDPressure,
            ConditionStatus::False,
            "KubeletHasSufficientPID",
            "kubelet has sufficient PID available",
        )
    };

    NodeStatusSnapshot {
        node_name: node_name.to_string(),
        conditions: vec![ready, disk, memory, pid, network],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::agent::pressure::StaticPressureSampler;
    use crate::agent::probe::NoopProbe;

    struct DownProbe;

    #[async_trait]
    impl BackendProbe for DownProbe {
        async fn ping(&self) -> Result<(), AgentError> {
            Err(AgentError::Connectivity("connection refused".to_string()))
        }
    }

    fn bridge(interval_ms: u64) -> NodeStatusBridge {
        NodeStatusBridge::new(
            BridgeConfig::new("remote-node").with_interval(Duration::from_millis(interval_ms)),
            Arc::new(NoopProbe),
            Box::new(StaticPressureSampler::default()),
        )
    }

    fn counting_callback(count: Arc<AtomicUsize>) -> StatusCallback {
        Box::new(move |_: NodeStatusSnapshot| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_bridge_config_defaults() {
        let config = BridgeConfig::new("node-a");
        assert_eq!(config.interval, Duration::from_secs(NODE_STATUS_INTERVAL_SECS));
        assert_eq!(config.thresholds, PressureThresholds::default());
    }

    #[tokio::test]
    async fn test_emits_snapshots_while_running() {
        let bridge = bridge(20);
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        assert_eq!(bridge.state(), BridgeState::Idle);

        bridge.start(&token, counting_callback(count.clone())).unwrap();
        assert_eq!(bridge.state(), BridgeState::Running);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);

        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[tokio::test]
    async fn test_no_callbacks_after_cancellation() {
        let bridge = bridge(20);
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let mut state = bridge.subscribe();

        bridge.start(&token, counting_callback(count.clone())).unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(count.load(Ordering::SeqCst) >= 1);

        token.cancel();
        state
            .wait_for(|s| *s == BridgeState::Stopped)
            .await
            .unwrap();
        let seen = count.load(Ordering::SeqCst);

        // Two full intervals
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_cannot_start_twice() {
        let bridge = bridge(1000);
        let token = CancellationToken::new();

        bridge.start(&token, Box::new(|_: NodeStatusSnapshot| {})).unwrap();
        let second = bridge.start(&token, Box::new(|_: NodeStatusSnapshot| {}));
        assert!(matches!(second, Err(AgentError::AlreadyStarted)));

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let bridge = bridge(0);
        let token = CancellationToken::new();

        let result = bridge.start(&token, Box::new(|_: NodeStatusSnapshot| {}));
        assert!(matches!(result, Err(AgentError::InvalidInterval(_))));
        assert_eq!(bridge.state(), BridgeState::Idle);

        // Nothing was spawned, so stopping returns immediately
        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Idle);
    }

    #[tokio::test]
    async fn test_snapshot_carries_all_conditions() {
        let bridge = bridge(10);
        let token = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        bridge
            .start(
                &token,
                Box::new(move |snapshot: NodeStatusSnapshot| {
                    let _ = tx.send(snapshot);
                }),
            )
            .unwrap();

        let snapshot = rx.recv().await.unwrap();
        token.cancel();

        assert_eq!(snapshot.node_name, "remote-node");
        assert!(snapshot.is_ready());
        for condition_type in NodeConditionType::ALL {
            assert!(snapshot.condition(condition_type).is_some());
        }
    }

    #[tokio::test]
    async fn test_ping_reports_backend_failure() {
        let healthy = bridge(1000);
        assert!(healthy.ping().await.is_ok());

        let unhealthy = NodeStatusBridge::new(
            BridgeConfig::new("remote-node"),
            Arc::new(DownProbe),
            Box::new(StaticPressureSampler::default()),
        );
        assert!(matches!(
            unhealthy.ping().await,
            Err(AgentError::Connectivity(_))
        ));
    }

    #[test]
    fn test_build_snapshot_unreachable_backend() {
        let ping = Err(AgentError::Connectivity("timeout".to_string()));
        let snapshot = build_snapshot(
            "n",
            &ping,
            &PressureReading::default(),
            &PressureThresholds::default(),
        );

        assert!(!snapshot.is_ready());
        let network = snapshot
            .condition(NodeConditionType::NetworkUnavailable)
            .unwrap();
        assert_eq!(network.status, ConditionStatus::True);
    }

    #[test]
    fn test_build_snapshot_pressure() {
        let reading = PressureReading {
            memory_usage_percent: 95.0,
            disk_usage_percent: 10.0,
            process_count: 50_000,
        };
        let snapshot = build_snapshot("n", &Ok(()), &reading, &PressureThresholds::default());

        let status = |t| snapshot.condition(t).map(|c| c.status);
        assert_eq!(status(NodeConditionType::MemoryPressure), Some(ConditionStatus::True));
        assert_eq!(status(NodeConditionType::DiskPressure), Some(ConditionStatus::False));
        assert_eq!(status(NodeConditionType::PIDPressure), Some(ConditionStatus::True));
    }

    #[tokio::test]
    async fn test_transition_time_is_stable_until_status_changes() {
        let mut reporter = StatusReporter::new(
            "n".to_string(),
            Arc::new(NoopProbe),
            Box::new(StaticPressureSampler::default()),
            PressureThresholds::default(),
        );

        let first = reporter.snapshot().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = reporter.snapshot().await;

        let ready = |s: &NodeStatusSnapshot| s.condition(NodeConditionType::Ready).cloned().unwrap();
        assert_eq!(
            ready(&first).last_transition_time,
            ready(&second).last_transition_time
        );
        assert!(ready(&second).last_heartbeat_time > ready(&first).last_heartbeat_time);

        reporter.probe = Arc::new(DownProbe);
        let third = reporter.snapshot().await;
        assert_eq!(ready(&third).status, ConditionStatus::False);
        assert!(ready(&third).last_transition_time > ready(&second).last_transition_time);
    }
}
