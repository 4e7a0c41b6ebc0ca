//! Saving and loading evolution state between generations.
//!
//! The generation loop only depends on the [`Persistence`]
//! trait. [`RonDirectory`] stores everything as RON files
//! in a single directory.
use crate::populations::logging::EvolutionLogger;
use crate::populations::GenePool;
use crate::tracking::Tracker;

use ron::ser::PrettyConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage of gene pools, statistics and trackers.
///
/// Only called by the generation loop, at generation
/// boundaries.
pub trait Persistence {
    fn save_gene_pool(&mut self, pool: &GenePool) -> Result<(), PersistenceError>;
    fn load_gene_pool(&self, generation: usize) -> Result<GenePool, PersistenceError>;
    fn save_stats(&mut self, stats: &EvolutionLogger) -> Result<(), PersistenceError>;
    /// Returns `None` if no statistics were saved yet.
    fn load_stats(&self) -> Result<Option<EvolutionLogger>, PersistenceError>;
    fn save_tracker(&mut self, tracker: &Tracker) -> Result<(), PersistenceError>;
    /// Returns `None` if no tracker was saved yet.
    fn load_tracker(&self) -> Result<Option<Tracker>, PersistenceError>;
    /// Highest generation with a saved gene pool.
    fn latest_generation(&self) -> Result<Option<usize>, PersistenceError>;
}

#[derive(Debug)]
pub enum PersistenceError {
    Io { path: PathBuf, source: io::Error },
    Format { path: PathBuf, message: String },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Format { path, message } => {
                write!(f, "{}: malformed contents: {}", path.display(), message)
            }
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Format { .. } => None,
        }
    }
}

const STATS_FILE: &str = "stats.ron";
const TRACKER_FILE: &str = "tracker.ron";

/// A directory holding `gen_<n>.ron` gene pools,
/// `stats.ron` and `tracker.ron`.
///
/// Files are replaced atomically: contents are written
/// to a temporary file which is then renamed over the
/// previous version.
#[derive(Clone, Debug)]
pub struct RonDirectory {
    root: PathBuf,
}

impl RonDirectory {
    /// Opens `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<RonDirectory, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| PersistenceError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(RonDirectory { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the gene pool of `generation`.
    pub fn gene_pool_path(&self, generation: usize) -> PathBuf {
        self.root.join(format!("gen_{}.ron", generation))
    }

    fn load_optional<T: DeserializeOwned>(
        &self,
        file: &str,
    ) -> Result<Option<T>, PersistenceError> {
        let path = self.root.join(file);
        if path.exists() {
            load_ron(&path).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Persistence for RonDirectory {
    fn save_gene_pool(&mut self, pool: &GenePool) -> Result<(), PersistenceError> {
        save_ron(&self.gene_pool_path(pool.generation()), pool)
    }

    fn load_gene_pool(&self, generation: usize) -> Result<GenePool, PersistenceError> {
        load_ron(&self.gene_pool_path(generation))
    }

    fn save_stats(&mut self, stats: &EvolutionLogger) -> Result<(), PersistenceError> {
        save_ron(&self.root.join(STATS_FILE), stats)
    }

    fn load_stats(&self) -> Result<Option<EvolutionLogger>, PersistenceError> {
        self.load_optional(STATS_FILE)
    }

    fn save_tracker(&mut self, tracker: &Tracker) -> Result<(), PersistenceError> {
        save_ron(&self.root.join(TRACKER_FILE), tracker)
    }

    fn load_tracker(&self) -> Result<Option<Tracker>, PersistenceError> {
        self.load_optional(TRACKER_FILE)
    }

    fn latest_generation(&self) -> Result<Option<usize>, PersistenceError> {
        let io_error = |source| PersistenceError::Io {
            path: self.root.clone(),
            source,
        };
        let mut latest = None;
        for entry in fs::read_dir(&self.root).map_err(io_error)? {
            let name = entry.map_err(io_error)?.file_name();
            let generation = name
                .to_str()
                .and_then(|n| n.strip_prefix("gen_"))
                .and_then(|n| n.strip_suffix(".ron"))
                .and_then(|n| n.parse::<usize>().ok());
            latest = latest.max(generation);
        }
        Ok(latest)
    }
}

/// Writes `value` to `path` as pretty RON, atomically.
pub fn save_ron<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let contents = ron::ser::to_string_pretty(value, PrettyConfig::new()).map_err(|e| {
        PersistenceError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");
    let temporary = PathBuf::from(temporary);

    fs::write(&temporary, contents)
        .and_then(|_| fs::rename(&temporary, path))
        .map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), "saved");
    Ok(())
}

/// Reads a RON value from `path`.
pub fn load_ron<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let contents = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|e| PersistenceError::Format {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populations::logging::ReportingLevel;
    use crate::testing::evaluated_pool;
    use crate::tracking::TrackMode;
    use crate::IndividualId;

    #[test]
    fn gene_pools_survive_a_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RonDirectory::new(dir.path().join("run")).unwrap();
        let pool = evaluated_pool(&[Some(0.25), None, Some(1.5)]);
        store.save_gene_pool(&pool).unwrap();

        let loaded = store.load_gene_pool(0).unwrap();
        assert_eq!(ron::to_string(&loaded).unwrap(), ron::to_string(&pool).unwrap());
        assert!(loaded.get(IndividualId(0, 1)).unwrap().failure().is_some());
        assert!(!dir.path().join("run").join("gen_0.ron.tmp").exists());
    }

    #[test]
    fn latest_generation_scans_gene_pools() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RonDirectory::new(dir.path()).unwrap();
        assert_eq!(store.latest_generation().unwrap(), None);

        for generation in [0, 2, 10] {
            store
                .save_gene_pool(&crate::GenePool::seeded(generation, vec![]))
                .unwrap();
        }
        fs::write(dir.path().join("gen_x.ron"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(store.latest_generation().unwrap(), Some(10));
    }

    #[test]
    fn stats_and_tracker_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RonDirectory::new(dir.path()).unwrap();
        assert!(store.load_stats().unwrap().is_none());
        assert!(store.load_tracker().unwrap().is_none());

        let pool = evaluated_pool(&[Some(1.0), Some(2.0)]);
        let mut logger = EvolutionLogger::new(ReportingLevel::Champion);
        logger.log(&pool);
        let mut tracker = Tracker::new(TrackMode::All);
        tracker.record(&pool);
        store.save_stats(&logger).unwrap();
        store.save_tracker(&tracker).unwrap();

        let logger = store.load_stats().unwrap().unwrap();
        assert_eq!(logger.last().unwrap().champion, Some(IndividualId(0, 1)));
        let tracker = store.load_tracker().unwrap().unwrap();
        assert_eq!(tracker.generation(0).unwrap().len(), 2);
    }

    #[test]
    fn malformed_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonDirectory::new(dir.path()).unwrap();
        fs::write(store.gene_pool_path(4), "not ron at all (").unwrap();
        assert!(matches!(
            store.load_gene_pool(4),
            Err(PersistenceError::Format { .. })
        ));
        assert!(matches!(
            store.load_gene_pool(5),
            Err(PersistenceError::Io { .. })
        ));
    }
}
