//! Work queue consumer.
//!
//! Every event maps to the same export record, so one worker serializes all
//! reconciliations. Events that pile up while a reconciliation runs are
//! drained and folded into the next run. Retryable failures schedule a
//! `Resync` after a Fibonacci backoff; at most one retry is pending at a time.

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::metrics::ProbeState;
use crate::reconciler::{GatewayEvent, ReconcileOutcome, Reconciler};
use common_area::RemoteCommonAreaRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Serial consumer of Gateway events
pub struct Worker {
    reconciler: Arc<Reconciler>,
    registry: Arc<RemoteCommonAreaRegistry>,
    probe_state: ProbeState,
    backoff: FibonacciBackoff,
    requeue: UnboundedSender<GatewayEvent>,
    pending_retry: Option<JoinHandle<()>>,
}

impl Worker {
    /// `requeue` must feed the receiver later passed to [`Worker::run`].
    pub fn new(
        reconciler: Arc<Reconciler>,
        registry: Arc<RemoteCommonAreaRegistry>,
        probe_state: ProbeState,
        backoff: FibonacciBackoff,
        requeue: UnboundedSender<GatewayEvent>,
    ) -> Self {
        Self {
            reconciler,
            registry,
            probe_state,
            backoff,
            requeue,
            pending_retry: None,
        }
    }

    /// Process events until the queue closes.
    pub async fn run(mut self, mut events: UnboundedReceiver<GatewayEvent>) -> Result<(), ControllerError> {
        info!("Starting reconcile worker");
        while let Some(event) = events.recv().await {
            let mut coalesced = 0usize;
            while events.try_recv().is_ok() {
                coalesced += 1;
            }
            if coalesced > 0 {
                debug!("Coalesced {} queued events into {}", coalesced, event);
            }
            self.process(&event).await;
        }
        Err(ControllerError::Watch("event queue closed".to_string()))
    }

    /// Reconcile once and act on the outcome.
    pub async fn process(&mut self, event: &GatewayEvent) -> ReconcileOutcome {
        // Any run supersedes a scheduled retry
        if let Some(handle) = self.pending_retry.take() {
            handle.abort();
        }

        let started = Instant::now();
        let result = self.reconciler.reconcile(event, &self.registry).await;
        self.probe_state.metrics().observe(&result, started.elapsed());

        let backoff = &mut self.backoff;
        let outcome = ReconcileOutcome::classify(&result, || backoff.next_backoff());
        match (&outcome, &result) {
            (ReconcileOutcome::Success, _) => {
                self.backoff.reset();
                self.probe_state.mark_ready();
            }
            (ReconcileOutcome::RetryAfter(delay), Err(e)) => {
                warn!("Reconciliation of {} failed, retrying in {:?}: {}", event, delay, e);
                self.schedule_retry(*delay);
            }
            (_, Err(e)) => {
                error!("Reconciliation of {} failed, waiting for the next change: {}", event, e);
            }
            (_, Ok(_)) => {}
        }
        outcome
    }

    fn schedule_retry(&mut self, delay: Duration) {
        let requeue = self.requeue.clone();
        self.pending_retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if requeue.send(GatewayEvent::Resync).is_err() {
                debug!("Event queue closed before retry");
            }
        }));
    }

    /// Whether a retry is scheduled and has not fired yet
    #[cfg(test)]
    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_retry.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::test_utils::*;
    use common_area::mock::{MockFailure, MockOperation};
    use tokio::sync::mpsc;

    fn worker(
        reader: &InMemoryGatewayReader,
        registry: Arc<RemoteCommonAreaRegistry>,
    ) -> (Worker, UnboundedReceiver<GatewayEvent>, ProbeState) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe_state = ProbeState::new(Arc::new(Metrics::new().unwrap()));
        let worker = Worker::new(
            Arc::new(create_test_reconciler(reader)),
            registry,
            probe_state.clone(),
            FibonacciBackoff::new(1, 4),
            tx,
        );
        (worker, rx, probe_state)
    }

    #[tokio::test]
    async fn test_success_marks_ready() {
        let reader = InMemoryGatewayReader::new(vec![gateway_fact("node-1", "10.10.10.10", Some(100))]);
        let leader = create_test_leader();
        let registry = Arc::new(RemoteCommonAreaRegistry::new());
        registry.insert(Arc::new(leader.clone()));
        let (mut worker, _rx, probe_state) = worker(&reader, registry);

        let outcome = worker.process(&GatewayEvent::Resync).await;

        assert_eq!(outcome, ReconcileOutcome::Success);
        assert!(probe_state.is_ready());
        assert!(!worker.has_pending_retry());
        assert_eq!(leader.export_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_schedules_resync_with_growing_backoff() {
        let reader = InMemoryGatewayReader::new(vec![gateway_fact("node-1", "10.10.10.10", Some(100))]);
        let leader = create_test_leader();
        let registry = Arc::new(RemoteCommonAreaRegistry::new());
        registry.insert(Arc::new(leader.clone()));
        let (mut worker, mut rx, probe_state) = worker(&reader, registry);

        leader.fail_next(MockOperation::Get, MockFailure::Unavailable("down".to_string()));
        let first = worker.process(&GatewayEvent::Resync).await;
        assert_eq!(first, ReconcileOutcome::RetryAfter(Duration::from_secs(1)));
        assert!(!probe_state.is_ready());
        assert_eq!(rx.recv().await, Some(GatewayEvent::Resync));

        leader.fail_next(MockOperation::Get, MockFailure::Unavailable("down".to_string()));
        let second = worker.process(&GatewayEvent::Resync).await;
        assert_eq!(second, ReconcileOutcome::RetryAfter(Duration::from_secs(1)));

        leader.fail_next(MockOperation::Get, MockFailure::Unavailable("down".to_string()));
        let third = worker.process(&GatewayEvent::Resync).await;
        assert_eq!(third, ReconcileOutcome::RetryAfter(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_event_cancels_pending_retry() {
        let reader = InMemoryGatewayReader::new(vec![gateway_fact("node-1", "10.10.10.10", Some(100))]);
        let leader = create_test_leader();
        let registry = Arc::new(RemoteCommonAreaRegistry::new());
        registry.insert(Arc::new(leader.clone()));
        let (mut worker, mut rx, _probe_state) = worker(&reader, registry);

        leader.fail_next(MockOperation::Get, MockFailure::Timeout);
        worker.process(&GatewayEvent::Resync).await;
        assert!(worker.has_pending_retry());

        let event = GatewayEvent::Updated(crate::reconciler::ObjectKey::new(LOCAL_NAMESPACE, "node-1"));
        assert_eq!(worker.process(&event).await, ReconcileOutcome::Success);
        assert!(!worker.has_pending_retry());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_coalesces_queued_events() {
        let reader = InMemoryGatewayReader::new(vec![gateway_fact("node-1", "10.10.10.10", Some(100))]);
        let leader = create_test_leader();
        let registry = Arc::new(RemoteCommonAreaRegistry::new());
        registry.insert(Arc::new(leader.clone()));

        let (tx, rx) = mpsc::unbounded_channel();
        let probe_state = ProbeState::new(Arc::new(Metrics::new().unwrap()));
        let (requeue, _requeue_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(
            Arc::new(create_test_reconciler(&reader)),
            registry,
            probe_state,
            FibonacciBackoff::default(),
            requeue,
        );

        for name in ["node-1", "node-1", "node-1"] {
            tx.send(GatewayEvent::Updated(crate::reconciler::ObjectKey::new(LOCAL_NAMESPACE, name)))
                .unwrap();
        }
        drop(tx);

        let result = worker.run(rx).await;
        assert!(matches!(result, Err(ControllerError::Watch(_))));
        // Three events, one reconciliation
        assert_eq!(leader.calls().len(), 2);
        assert_eq!(leader.export_count(), 1);
    }
}
