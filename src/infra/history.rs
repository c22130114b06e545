//! JSON run history on local disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde_json::Error as SerdeError;
use tracing::debug;

use crate::domain::Run;
use crate::util::version::{APP_NAME, APP_ORG, APP_QUALIFIER};

const HISTORY_FILENAME: &str = "runs.json";

/// Durable storage for finished runs.
pub trait RunStore: Send + Sync {
    fn save_run(&self, run: &Run) -> Result<(), PersistSaveError>;
    fn load_runs(&self) -> Result<Vec<Run>, PersistSaveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistSaveError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

/// Every run ever captured, oldest first, as one pretty-printed JSON array.
#[derive(Clone, Debug)]
pub struct JsonRunStore {
    path: PathBuf,
}

impl JsonRunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `runs.json` in the platform data directory.
    pub fn in_data_dir() -> Result<Self, PersistSaveError> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
            .ok_or(PersistSaveError::StorageUnavailable)?;
        Ok(Self::new(dirs.data_dir().join(HISTORY_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, runs: &[Run]) -> Result<(), PersistSaveError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(runs)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl RunStore for JsonRunStore {
    fn save_run(&self, run: &Run) -> Result<(), PersistSaveError> {
        let mut runs = self.load_runs()?;
        runs.push(run.clone());
        self.write_all(&runs)?;
        debug!(path = %self.path.display(), total = runs.len(), "run saved");
        Ok(())
    }

    fn load_runs(&self) -> Result<Vec<Run>, PersistSaveError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        summarize, LootLine, MatchStatus, PriceOrigin, PricingOutcome, ResolvedItem, RunMetadata,
        ShipClass, SiteType, Weather,
    };
    use std::time::Duration;

    fn sample_run() -> Run {
        let unknown = LootLine {
            line_no: 2,
            raw_text: "Unknown Widget".into(),
            item_name: "Unknown Widget".into(),
            quantity: 1,
        };
        let meta = RunMetadata {
            comment: Some("clean run".into()),
            ..RunMetadata::default()
        }
        .with_elapsed(Duration::from_secs(900))
        .with_site(SiteType::new(5, Weather::Dark, ShipClass::Cruiser, 1).unwrap());

        let mut run = summarize(
            vec![
                ResolvedItem {
                    item_id: Some("47956".into()),
                    display_name: "Gravid Core".into(),
                    source_name: "Gravid Core".into(),
                    quantity: 2,
                    unit_price: Some(100.0),
                    buy_price: Some(95.0),
                    price_timestamp: Some(time::macros::datetime!(2025-01-01 12:00 UTC)),
                    match_status: MatchStatus::Exact,
                    match_score: 1.0,
                    price_origin: PriceOrigin::Fetched,
                },
                ResolvedItem::unmatched(&unknown, PriceOrigin::FetchFailed),
            ],
            &meta,
        );
        run.pricing = PricingOutcome::Failed {
            requested: 1,
            reason: "timeout".into(),
        };
        run.discarded_lines = 3;
        run
    }

    #[test]
    fn missing_history_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path().join("runs.json"));
        assert!(store.load_runs().unwrap().is_empty());
    }

    #[test]
    fn saved_runs_keep_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path().join("nested").join("runs.json"));
        let run = sample_run();

        store.save_run(&run).unwrap();
        store.save_run(&sample_run()).unwrap();

        let loaded = store.load_runs().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], run);
        assert_eq!(loaded[0].unmatched_count, 1);
        assert_eq!(loaded[0].buy_value, 190.0);
        assert!(loaded[0].pricing_degraded());
        assert!(!dir.path().join("nested").join("runs.json.tmp").exists());
    }

    #[test]
    fn corrupt_history_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonRunStore::new(path);
        assert!(matches!(store.load_runs(), Err(PersistSaveError::Serde(_))));
        assert!(store.save_run(&sample_run()).is_err());
    }
}
