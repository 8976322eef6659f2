//! Per-segment model store with whole-map publication.
//!
//! Readers take an `Arc` snapshot of the current [`SegmentMap`]; a training
//! run builds a complete new map and swaps it in with [`SegmentModelStore::publish`].
//! A reader therefore never sees a partially updated set of models.
//!
//! On disk the same holds per generation: [`SegmentModelStore::persist`]
//! writes a complete scaler and model set into a sibling staging directory
//! and renames it over the model directory. The model directory is owned by
//! the store; anything else placed in it is replaced with the next persist.

use crate::core::{SegmentKey, Target};
use crate::error::{Result, TelemetryError};
use crate::models::{PersistedModel, TrainedModel};
use crate::preprocess::{load_scaler, save_scaler};
use crate::transform::StandardScaler;
use crate::utils::{ClassificationMetrics, RegressionMetrics};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// File name of the scaler artifact inside the model directory.
pub const SCALER_FILE: &str = "scaler.json";
/// Subdirectory holding one JSON file per segment model.
pub const MODELS_DIR: &str = "models";

const STAGING_SUFFIX: &str = ".staging";
const PREVIOUS_SUFFIX: &str = ".previous";

/// Models of one segment, at most one per target.
#[derive(Debug, Clone, Default)]
pub struct SegmentModels {
    pub signal_strength: Option<Arc<TrainedModel>>,
    pub throughput: Option<Arc<TrainedModel>>,
}

impl SegmentModels {
    pub fn get(&self, target: Target) -> Option<&Arc<TrainedModel>> {
        match target {
            Target::SignalStrength => self.signal_strength.as_ref(),
            Target::Throughput => self.throughput.as_ref(),
        }
    }

    pub fn set(&mut self, target: Target, model: Arc<TrainedModel>) {
        match target {
            Target::SignalStrength => self.signal_strength = Some(model),
            Target::Throughput => self.throughput = Some(model),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signal_strength.is_none() && self.throughput.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TrainedModel>> {
        self.signal_strength.iter().chain(self.throughput.iter())
    }
}

/// An immutable set of trained models and the scaler they share.
#[derive(Debug, Clone, Default)]
pub struct SegmentMap {
    segments: BTreeMap<SegmentKey, SegmentModels>,
    scaler: Option<Arc<StandardScaler>>,
}

impl SegmentMap {
    pub fn new(scaler: Option<Arc<StandardScaler>>) -> Self {
        Self {
            segments: BTreeMap::new(),
            scaler,
        }
    }

    pub fn insert(&mut self, model: Arc<TrainedModel>) {
        self.segments
            .entry(model.key.clone())
            .or_default()
            .set(model.target, model);
    }

    pub fn get(&self, key: &SegmentKey, target: Target) -> Option<&Arc<TrainedModel>> {
        self.segments.get(key).and_then(|m| m.get(target))
    }

    pub fn segment(&self, key: &SegmentKey) -> Option<&SegmentModels> {
        self.segments.get(key)
    }

    pub fn scaler(&self) -> Option<&Arc<StandardScaler>> {
        self.scaler.as_ref()
    }

    /// Number of trained models across all segments.
    pub fn model_count(&self) -> usize {
        self.segments.values().map(|m| m.iter().count()).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model_count() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &SegmentKey> {
        self.segments.keys()
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<TrainedModel>> {
        self.segments.values().flat_map(|m| m.iter())
    }
}

/// Recorded quality of one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetrics {
    pub metrics: RegressionMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationMetrics>,
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub test_samples: usize,
}

impl From<&TrainedModel> for ModelMetrics {
    fn from(model: &TrainedModel) -> Self {
        Self {
            metrics: model.metrics,
            classification: model.classification.clone(),
            trained_at: model.trained_at,
            train_samples: model.train_samples,
            test_samples: model.test_samples,
        }
    }
}

/// Metrics of a segment per target; absent targets have no model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SegmentMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<ModelMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<ModelMetrics>,
}

/// Shared, swappable store of segment models.
#[derive(Debug, Default)]
pub struct SegmentModelStore {
    current: RwLock<Arc<SegmentMap>>,
    populated: AtomicBool,
    /// Serializes directory swaps and loads.
    disk: Mutex<()>,
}

impl SegmentModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published map.
    pub fn snapshot(&self) -> Arc<SegmentMap> {
        Arc::clone(&self.current.read())
    }

    /// Replace the whole map at once.
    pub fn publish(&self, map: SegmentMap) {
        let models = map.model_count();
        let mut current = self.current.write();
        *current = Arc::new(map);
        self.populated.store(true, Ordering::SeqCst);
        drop(current);
        info!(models, "published segment models");
    }

    pub fn get(&self, key: &SegmentKey, target: Target) -> Option<Arc<TrainedModel>> {
        self.current.read().get(key, target).cloned()
    }

    /// Whether a map was loaded or published.
    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::SeqCst)
    }

    /// Recorded metrics of every segment with at least one model.
    pub fn metrics_snapshot(&self) -> BTreeMap<SegmentKey, SegmentMetrics> {
        let snapshot = self.snapshot();
        snapshot
            .segments
            .iter()
            .map(|(key, models)| {
                let metrics = SegmentMetrics {
                    signal_strength: models.signal_strength.as_deref().map(ModelMetrics::from),
                    throughput: models.throughput.as_deref().map(ModelMetrics::from),
                };
                (key.clone(), metrics)
            })
            .collect()
    }

    /// Write the current scaler and models under `dir`.
    ///
    /// The new generation is staged next to `dir` and swapped in by rename,
    /// so a failed write leaves the previous generation in place. Returns
    /// the number of model files written.
    pub fn persist(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let _disk = self.disk.lock();
        let snapshot = self.snapshot();
        let Some(scaler) = snapshot.scaler() else {
            warn!("no scaler in the current store; nothing persisted");
            return Ok(0);
        };

        let staging = sibling(dir, STAGING_SUFFIX)?;
        let previous = sibling(dir, PREVIOUS_SUFFIX)?;
        recover_interrupted_swap(dir, &previous)?;

        if staging.is_dir() {
            fs::remove_dir_all(&staging)?;
        }
        if let Some(parent) = staging.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&staging)?;
        let written = match write_generation(&staging, &snapshot, scaler) {
            Ok(written) => written,
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(path = %staging.display(), error = %cleanup, "staging directory left behind");
                }
                return Err(err);
            }
        };

        if previous.is_dir() {
            fs::remove_dir_all(&previous)?;
        }
        if dir.exists() {
            fs::rename(dir, &previous)?;
        }
        if let Err(err) = fs::rename(&staging, dir) {
            if previous.is_dir() {
                fs::rename(&previous, dir)?;
            }
            return Err(err.into());
        }
        if previous.is_dir() {
            if let Err(err) = fs::remove_dir_all(&previous) {
                warn!(path = %previous.display(), error = %err, "previous model generation left behind");
            }
        }

        info!(dir = %dir.display(), models = written, "persisted segment models");
        Ok(written)
    }

    /// Restore a persisted scaler and models from `dir`.
    ///
    /// A no-op once the store was loaded or published. Missing artifacts
    /// load nothing; unreadable model files are skipped with a warning.
    /// Returns the number of models restored by this call.
    pub fn load(&self, dir: impl AsRef<Path>) -> Result<usize> {
        if self.is_populated() {
            return Ok(0);
        }
        let dir = dir.as_ref();
        let _disk = self.disk.lock();
        if let Ok(previous) = sibling(dir, PREVIOUS_SUFFIX) {
            recover_interrupted_swap(dir, &previous)?;
        }
        let Some(scaler) = load_scaler(dir.join(SCALER_FILE))? else {
            info!(dir = %dir.display(), "no persisted scaler; starting without models");
            return Ok(0);
        };
        let scaler = Arc::new(scaler);

        let models_dir = dir.join(MODELS_DIR);
        let mut map = SegmentMap::new(Some(Arc::clone(&scaler)));
        if models_dir.is_dir() {
            let mut paths: Vec<_> = fs::read_dir(&models_dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            paths.sort();

            for path in paths {
                let restored: Result<TrainedModel> = fs::read_to_string(&path)
                    .map_err(Into::into)
                    .and_then(|json| {
                        serde_json::from_str::<PersistedModel>(&json).map_err(Into::into)
                    })
                    .and_then(|persisted| {
                        TrainedModel::from_persisted(persisted, Arc::clone(&scaler))
                    });
                match restored {
                    Ok(model) => map.insert(Arc::new(model)),
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping model file"),
                }
            }
        }

        let count = map.model_count();
        let mut current = self.current.write();
        // A publish may have raced this load
        if self.populated.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }
        *current = Arc::new(map);
        info!(dir = %dir.display(), models = count, "loaded segment models");
        Ok(count)
    }
}

/// `<parent>/.<name><suffix>` for a model directory `<parent>/<name>`.
fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = dir.file_name().ok_or_else(|| {
        TelemetryError::InvalidParameter(format!(
            "model directory {} has no final component",
            dir.display()
        ))
    })?;
    let mut sibling = OsString::from(".");
    sibling.push(name);
    sibling.push(suffix);
    Ok(dir.with_file_name(sibling))
}

/// Put the previous generation back when a swap stopped between renames.
fn recover_interrupted_swap(dir: &Path, previous: &Path) -> Result<()> {
    if !dir.exists() && previous.is_dir() {
        warn!(dir = %dir.display(), "restoring model generation from an interrupted persist");
        fs::rename(previous, dir)?;
    }
    Ok(())
}

/// Write the scaler and every model of `map` into an empty directory.
fn write_generation(root: &Path, map: &SegmentMap, scaler: &StandardScaler) -> Result<usize> {
    let models_dir = root.join(MODELS_DIR);
    fs::create_dir_all(&models_dir)?;
    save_scaler(scaler, root.join(SCALER_FILE))?;

    let mut written = 0;
    for model in map.models() {
        let path = models_dir.join(format!("{}__{}.json", model.key.file_stem(), model.target));
        let json = serde_json::to_string_pretty(&model.to_persisted(Some(scaler)))?;
        fs::write(&path, json)?;
        written += 1;
    }
    Ok(written)
}
