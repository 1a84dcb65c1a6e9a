//! SpatialConnectivityGrapher - spot graph over the persisted spots.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use guardian_core::ConnectivityGraph;

use crate::config::ConnectivityConfig;
use crate::store::{SpotRepository, StoreError};
use crate::types::Result;

pub struct SpatialConnectivityGrapher {
    spots: Arc<dyn SpotRepository>,
    config: ConnectivityConfig,
}

impl SpatialConnectivityGrapher {
    pub fn new(spots: Arc<dyn SpotRepository>, config: ConnectivityConfig) -> Self {
        Self { spots, config }
    }

    /// Graph of a territory (or of every spot) evaluated now.
    pub async fn graph(&self, territory_id: Option<&str>) -> Result<ConnectivityGraph> {
        self.graph_at(territory_id, Utc::now()).await
    }

    /// Graph evaluated at `now`. An unreachable store yields an empty graph.
    pub async fn graph_at(&self, territory_id: Option<&str>, now: DateTime<Utc>) -> Result<ConnectivityGraph> {
        let spots = match self.spots.list_spots(territory_id).await {
            Ok(spots) => spots,
            Err(StoreError::Unavailable(reason)) => {
                warn!(reason = %reason, "Spot fetch failed, returning empty graph");
                return Ok(ConnectivityGraph::default());
            }
            Err(e) => return Err(e.into()),
        };

        let graph = ConnectivityGraph::build(
            &spots,
            now,
            self.config.activity_window_ms,
            self.config.dedupe_links,
        );
        debug!(
            spots = graph.positions.len(),
            links = graph.links.len(),
            active = graph.active_links().count(),
            "Connectivity graph built"
        );
        Ok(graph)
    }
}
