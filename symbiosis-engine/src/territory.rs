//! TerritoryStabilityMonitor - classifies territory stability and watches it.
//!
//! Reads degrade instead of failing: when the store is unreachable the
//! snapshot carries a default healthy reading flagged `degraded`.
//!
//! A watch emits a `Transition` alert on every change of alert state (the
//! first reading counts as a change only if it is critical) and an
//! `Escalation` alert on every escalation tick while the territory stays
//! critical. Degraded readings never change the watched state.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use guardian_core::stability::{classify_with_threshold, gauge_value};
use guardian_core::{AlertState, Territory};

use crate::config::TerritoryConfig;
use crate::polling::PollingTask;
use crate::store::{StoreError, TerritoryRepository};
use crate::types::{AlertKind, EngineError, Result, StabilityAlert, TerritorySnapshot};

/// Health and stability of the default reading used in degraded mode.
pub const DEGRADED_SCORE: f64 = 100.0;

/// Territory health classification.
pub struct TerritoryStabilityMonitor {
    territories: Arc<dyn TerritoryRepository>,
    config: TerritoryConfig,
}

impl TerritoryStabilityMonitor {
    pub fn new(territories: Arc<dyn TerritoryRepository>, config: TerritoryConfig) -> Self {
        Self { territories, config }
    }

    /// `Critical` iff the score is below the configured threshold.
    pub fn classify(&self, stability_score: f64) -> AlertState {
        classify_with_threshold(stability_score, self.config.critical_threshold)
    }

    /// Current reading of a territory.
    pub async fn snapshot(&self, territory_id: &str) -> Result<TerritorySnapshot> {
        let (territory, degraded) = match self.territories.get_territory(territory_id).await {
            Ok(Some(territory)) => (territory, false),
            Ok(None) => return Err(EngineError::not_found("territory", territory_id)),
            Err(StoreError::Unavailable(reason)) => {
                warn!(territory_id = %territory_id, reason = %reason, "Territory fetch failed, using default reading");
                (default_reading(territory_id), true)
            }
            Err(e) => return Err(e.into()),
        };

        Ok(TerritorySnapshot {
            alert: self.classify(territory.stability_score),
            gauge: gauge_value(territory.health_score),
            territory,
            degraded,
        })
    }

    /// Poll a territory and send alerts on `alerts` until the watch is stopped.
    pub fn watch(self: &Arc<Self>, territory_id: &str, alerts: mpsc::Sender<StabilityAlert>) -> TerritoryWatch {
        let state: Arc<Mutex<Option<(AlertState, f64)>>> = Arc::new(Mutex::new(None));

        let poller = {
            let monitor = Arc::clone(self);
            let state = state.clone();
            let alerts = alerts.clone();
            let territory_id = territory_id.to_string();
            PollingTask::start(
                format!("territory-watch:{}", territory_id),
                self.config.poll_interval(),
                move || {
                    let monitor = monitor.clone();
                    let state = state.clone();
                    let alerts = alerts.clone();
                    let territory_id = territory_id.clone();
                    async move {
                        monitor.poll_once(&territory_id, &state, &alerts).await;
                    }
                },
            )
        };

        let escalator = {
            let state = state.clone();
            let territory_id = territory_id.to_string();
            PollingTask::start(
                format!("territory-escalation:{}", territory_id),
                self.config.escalation_interval(),
                move || {
                    let state = state.clone();
                    let alerts = alerts.clone();
                    let territory_id = territory_id.clone();
                    async move {
                        let current = *state.lock().await;
                        if let Some((AlertState::Critical, score)) = current {
                            let alert = alert(&territory_id, AlertKind::Escalation, AlertState::Critical, score);
                            if alerts.send(alert).await.is_err() {
                                debug!(territory_id = %territory_id, "Alert receiver closed");
                            }
                        }
                    }
                },
            )
        };

        info!(territory_id = %territory_id, "Territory watch started");
        TerritoryWatch { poller, escalator }
    }

    async fn poll_once(
        &self,
        territory_id: &str,
        state: &Mutex<Option<(AlertState, f64)>>,
        alerts: &mpsc::Sender<StabilityAlert>,
    ) {
        let snapshot = match self.snapshot(territory_id).await {
            Ok(snapshot) if !snapshot.degraded => snapshot,
            Ok(_) => {
                debug!(territory_id = %territory_id, "Degraded reading ignored by watch");
                return;
            }
            Err(e) => {
                warn!(territory_id = %territory_id, error = %e, "Territory poll failed");
                return;
            }
        };

        let score = snapshot.territory.stability_score;
        // Held until the transition is sent so no escalation overtakes it.
        let mut current = state.lock().await;
        let previous = current.map(|(s, _)| s);
        *current = Some((snapshot.alert, score));

        let changed = match previous {
            Some(previous) => previous != snapshot.alert,
            None => snapshot.alert.is_critical(),
        };
        if changed {
            info!(
                territory_id = %territory_id,
                state = ?snapshot.alert,
                stability = score,
                "Territory alert state changed"
            );
            let alert = alert(territory_id, AlertKind::Transition, snapshot.alert, score);
            if alerts.send(alert).await.is_err() {
                debug!(territory_id = %territory_id, "Alert receiver closed");
            }
        }
    }
}

/// Running poll and escalation tasks of one territory watch.
pub struct TerritoryWatch {
    poller: PollingTask,
    escalator: PollingTask,
}

impl TerritoryWatch {
    pub fn is_running(&self) -> bool {
        self.poller.is_running() || self.escalator.is_running()
    }

    pub async fn stop(&mut self) {
        self.poller.stop().await;
        self.escalator.stop().await;
    }
}

fn default_reading(territory_id: &str) -> Territory {
    Territory {
        id: territory_id.to_string(),
        name: String::new(),
        health_score: DEGRADED_SCORE,
        stability_score: DEGRADED_SCORE,
        active_nodes: 0,
        total_xp: 0,
    }
}

fn alert(territory_id: &str, kind: AlertKind, state: AlertState, stability_score: f64) -> StabilityAlert {
    StabilityAlert {
        territory_id: territory_id.to_string(),
        kind,
        state,
        stability_score,
        at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn monitor(store: Arc<MemoryStore>, config: TerritoryConfig) -> Arc<TerritoryStabilityMonitor> {
        Arc::new(TerritoryStabilityMonitor::new(store, config))
    }

    fn fast_config() -> TerritoryConfig {
        TerritoryConfig {
            poll_interval_ms: 10,
            escalation_interval_ms: 15,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_classify_threshold() {
        let m = monitor(Arc::new(MemoryStore::new()), TerritoryConfig::default());
        assert_eq!(m.classify(29.0), AlertState::Critical);
        assert_eq!(m.classify(30.0), AlertState::Normal);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let store = Arc::new(MemoryStore::seeded());
        store.set_territory_scores("t1", 120.0, 12.0).await.unwrap();
        let m = monitor(store, TerritoryConfig::default());

        let snapshot = m.snapshot("t1").await.unwrap();
        assert_eq!(snapshot.alert, AlertState::Critical);
        assert_eq!(snapshot.gauge, 100.0);
        assert!(!snapshot.degraded);

        assert!(matches!(m.snapshot("t9").await, Err(EngineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_snapshot_degraded() {
        let store = Arc::new(MemoryStore::seeded());
        store.set_available(false);
        let m = monitor(store, TerritoryConfig::default());

        let snapshot = m.snapshot("t1").await.unwrap();
        assert!(snapshot.degraded);
        assert_eq!(snapshot.alert, AlertState::Normal);
        assert_eq!(snapshot.territory.stability_score, DEGRADED_SCORE);
    }

    #[tokio::test]
    async fn test_watch_transitions_and_escalates() {
        let store = Arc::new(MemoryStore::seeded());
        let m = monitor(store.clone(), fast_config());
        let (tx, mut rx) = mpsc::channel(64);
        let mut watch = m.watch("t1", tx);

        // Normal at start: nothing yet.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());

        store.set_territory_scores("t1", 40.0, 20.0).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.kind, AlertKind::Transition);
        assert_eq!(first.state, AlertState::Critical);

        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(second.kind, AlertKind::Escalation);
        assert_eq!(second.stability_score, 20.0);

        store.set_territory_scores("t1", 90.0, 80.0).await.unwrap();
        let recovered = loop {
            let alert = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
            if alert.kind == AlertKind::Transition {
                break alert;
            }
        };
        assert_eq!(recovered.state, AlertState::Normal);

        watch.stop().await;
        assert!(!watch.is_running());
    }

    #[tokio::test]
    async fn test_watch_ignores_degraded_readings() {
        let store = Arc::new(MemoryStore::seeded());
        store.set_territory_scores("t1", 40.0, 10.0).await.unwrap();
        let m = monitor(store.clone(), fast_config());
        let (tx, mut rx) = mpsc::channel(64);
        let mut watch = m.watch("t1", tx);

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.kind, AlertKind::Transition);

        store.set_available(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        watch.stop().await;

        while let Ok(alert) = rx.try_recv() {
            assert_eq!(alert.kind, AlertKind::Escalation);
            assert_eq!(alert.state, AlertState::Critical);
        }
    }
}
