use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use common::Result;

use crate::regression::LinearModel;

/// Persisted output of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub slope: f64,
    pub intercept: f64,
    pub trained_at: DateTime<Utc>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_rmse: Option<f64>,
    pub test_r_squared: Option<f64>,
}

impl TrainedModel {
    pub fn line(&self) -> LinearModel {
        LinearModel {
            slope: self.slope,
            intercept: self.intercept,
        }
    }

    pub fn predict(&self, previous_close: f64) -> f64 {
        self.line().predict(previous_close)
    }

    /// Write the artifact, replacing any previous one.
    ///
    /// The JSON is written next to the target and renamed into place, so a
    /// concurrent reader sees either the old artifact or the new one.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let tmp = staging_path(path);
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = %path.display(), slope = self.slope, intercept = self.intercept, "Model saved");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let body = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
