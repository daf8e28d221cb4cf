use anyhow::Result;
use segment::key::{DETECTOR_PROJECT_ID, DETECTOR_TOKEN_PATH};
use std::env;
use std::time::Duration;

use crate::sync::SyncConfig;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub poll_interval_ms: u64,
    pub wait_timeout_ms: u64,
    pub output_path: String,
    pub display: bool,
    pub shm_token_path: String,
    pub shm_project_id: i32,
}

impl ViewerConfig {
    pub fn from_env() -> Result<Self> {
        let poll_interval_ms = env::var("VIEWER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let wait_timeout_ms = env::var("VIEWER_WAIT_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .unwrap_or(30000);

        let output_path = env::var("VIEWER_OUTPUT_PATH")
            .unwrap_or_else(|_| "output_detected.mp4".to_string());

        let display = env::var("VIEWER_DISPLAY")
            .map(|value| value != "false" && value != "0")
            .unwrap_or(true);

        let shm_token_path = env::var("VIEWER_SHM_TOKEN_PATH")
            .unwrap_or_else(|_| DETECTOR_TOKEN_PATH.to_string());

        let shm_project_id = env::var("VIEWER_SHM_PROJECT_ID")
            .unwrap_or_else(|_| DETECTOR_PROJECT_ID.to_string())
            .parse()
            .unwrap_or(DETECTOR_PROJECT_ID);

        Ok(Self {
            poll_interval_ms,
            wait_timeout_ms,
            output_path,
            display,
            shm_token_path,
            shm_project_id,
        })
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
        }
    }
}
