//! # Tracking Store
//! Read-only view over a file-based experiment tracking directory.
//!
//! Layout:
//! ```text
//! <root>/<experiment_id>/meta.json                      {"experiment_id", "name"}
//! <root>/<experiment_id>/<run_id>/meta.json             {"run_id", "status", "start_time", ...}
//! <root>/<experiment_id>/<run_id>/artifacts/<name>/...  logged model files
//! ```
//! Artifact URIs understood by [`TrackingStore::resolve_artifact_uri`]:
//! `runs:/<run_id>/<artifact_path>`, `file://<path>`, or a plain filesystem path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StrategyError};

pub const DEFAULT_TRACKING_URI: &str = "file:./mlruns";

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentMeta {
    pub experiment_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// A run located on disk.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub meta: RunMeta,
    pub experiment_id: String,
    pub dir: PathBuf,
}

impl RunInfo {
    pub fn artifact_dir(&self, artifact_path: &str) -> PathBuf {
        self.dir.join("artifacts").join(artifact_path)
    }
}

#[derive(Debug, Clone)]
pub struct TrackingStore {
    root: PathBuf,
}

impl TrackingStore {
    /// Open a store from a tracking URI. Only local (`file:`) stores are supported.
    pub fn open(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(StrategyError::Configuration("tracking uri is empty".into()));
        }
        let root = match local_path(uri) {
            Some(p) => p,
            None => {
                return Err(StrategyError::Configuration(format!(
                    "unsupported tracking uri scheme: {uri}"
                )))
            }
        };
        if root.exists() && !root.is_dir() {
            return Err(StrategyError::Configuration(format!(
                "tracking root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All experiments with a readable `meta.json`. A missing root is an empty store.
    pub fn experiments(&self) -> Result<Vec<ExperimentMeta>> {
        let mut out = Vec::new();
        for dir in subdirs(&self.root)? {
            if let Some(meta) = read_json::<ExperimentMeta>(&dir.join("meta.json")) {
                out.push(meta);
            }
        }
        Ok(out)
    }

    pub fn find_experiment(&self, name: &str) -> Result<Option<ExperimentMeta>> {
        Ok(self.experiments()?.into_iter().find(|e| e.name == name))
    }

    pub fn runs(&self, experiment_id: &str) -> Result<Vec<RunInfo>> {
        let exp_dir = self.root.join(experiment_id);
        let mut out = Vec::new();
        for dir in subdirs(&exp_dir)? {
            if let Some(meta) = read_json::<RunMeta>(&dir.join("meta.json")) {
                out.push(RunInfo {
                    meta,
                    experiment_id: experiment_id.to_string(),
                    dir,
                });
            }
        }
        Ok(out)
    }

    /// Most recent `FINISHED` run of `experiment` that logged `artifact_path`.
    pub fn latest_finished_run(&self, experiment: &str, artifact_path: &str) -> Result<Option<RunInfo>> {
        let Some(exp) = self.find_experiment(experiment)? else {
            debug!(experiment, "Experiment not found in tracking store");
            return Ok(None);
        };
        let best = self
            .runs(&exp.experiment_id)?
            .into_iter()
            .filter(|r| r.meta.status == RunStatus::Finished)
            .filter(|r| r.artifact_dir(artifact_path).is_dir())
            .max_by_key(|r| r.meta.start_time);
        Ok(best)
    }

    pub fn find_run(&self, run_id: &str) -> Result<Option<RunInfo>> {
        for exp in self.experiments()? {
            if let Some(run) = self
                .runs(&exp.experiment_id)?
                .into_iter()
                .find(|r| r.meta.run_id == run_id)
            {
                return Ok(Some(run));
            }
        }
        Ok(None)
    }

    /// Map an artifact URI to a local path.
    pub fn resolve_artifact_uri(&self, uri: &str) -> Result<PathBuf> {
        if let Some(rest) = uri.strip_prefix("runs:/") {
            let rest = rest.trim_start_matches('/');
            let (run_id, artifact_path) = rest.split_once('/').unwrap_or((rest, ""));
            if run_id.is_empty() || artifact_path.is_empty() {
                return Err(StrategyError::ForecastUnavailable(format!(
                    "malformed run uri: {uri}"
                )));
            }
            let run = self.find_run(run_id)?.ok_or_else(|| {
                StrategyError::ForecastUnavailable(format!("run {run_id} not found in tracking store"))
            })?;
            return Ok(run.artifact_dir(artifact_path));
        }
        local_path(uri).ok_or_else(|| {
            StrategyError::ForecastUnavailable(format!("unsupported artifact uri: {uri}"))
        })
    }
}

/// `file:///abs`, `file:rel`, or a bare path. Anything else with a scheme is not local.
fn local_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if let Some(rest) = uri.strip_prefix("file:") {
        return Some(PathBuf::from(rest));
    }
    match uri.split_once("://") {
        Some(_) => None,
        None if uri.contains(":/") => None,
        None => Some(PathBuf::from(uri)),
    }
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StrategyError::ForecastUnavailable(format!(
                "listing {}: {e}",
                dir.display()
            )))
        }
    };
    let mut out: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    out.sort();
    Ok(out)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let s = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&s) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping unreadable tracking meta");
            None
        }
    }
}
