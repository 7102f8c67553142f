// src/backend.rs
//
// Fire-and-forget occupancy reporting to the ingest API. The backend is
// an external collaborator: when it is down we log and move on, and the
// counting path never waits on a POST.

use crate::config::BackendConfig;
use crate::types::OccupancyChange;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
struct DetectionReport {
    lot_id: String,
    camera_id: String,
    timestamp: DateTime<Utc>,
    occupied_count: u32,
    total_capacity: u32,
}

pub struct OccupancyReporter {
    client: reqwest::Client,
    ingest_url: String,
    api_key: String,
    lot_id: String,
    camera_id: String,
    total_capacity: u32,
}

impl OccupancyReporter {
    /// None when no ingest URL is configured — emission disabled.
    pub fn new(config: &BackendConfig, total_capacity: u32) -> Option<Self> {
        if config.ingest_url.is_empty() {
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .ok()?;
        Some(Self {
            client,
            ingest_url: config.ingest_url.clone(),
            api_key: config.api_key.clone(),
            lot_id: config.lot_id.clone(),
            camera_id: config.camera_id.clone(),
            total_capacity,
        })
    }

    /// Spawn the POST and return immediately.
    pub fn report(&self, change: &OccupancyChange) {
        let report = DetectionReport {
            lot_id: self.lot_id.clone(),
            camera_id: self.camera_id.clone(),
            timestamp: change.timestamp,
            occupied_count: change.occupancy_after,
            total_capacity: self.total_capacity,
        };
        let client = self.client.clone();
        let url = self.ingest_url.clone();
        let api_key = self.api_key.clone();

        tokio::spawn(async move {
            let mut request = client.post(&url).json(&report);
            if !api_key.is_empty() {
                request = request.bearer_auth(&api_key);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(occupied = report.occupied_count, "occupancy reported");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "ingest rejected occupancy report");
                }
                Err(error) => {
                    warn!(%error, "ingest unreachable, dropping occupancy report");
                }
            }
        });
    }
}
