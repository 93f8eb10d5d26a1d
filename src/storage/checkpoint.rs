//! File-backed checkpoint store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ConvergrError, Result};
use crate::id::is_valid_run_id;
use crate::runner::{Checkpoint, IterationSummary};

/// Stores run snapshots and iteration histories under `<base>/runs/`.
pub struct CheckpointStore {
    runs_dir: PathBuf,
}

impl CheckpointStore {
    /// Open (creating if needed) a store rooted at `base_path`.
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let runs_dir = base_path.as_ref().join("runs");
        fs::create_dir_all(&runs_dir)?;
        Ok(Self { runs_dir })
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    fn snapshot_path(&self, run_id: &str) -> Result<PathBuf> {
        Ok(self.runs_dir.join(format!("{}.json", checked(run_id)?)))
    }

    fn history_path(&self, run_id: &str) -> Result<PathBuf> {
        Ok(self.runs_dir.join(format!("{}.history.jsonl", checked(run_id)?)))
    }

    /// Write the snapshot, replacing any previous one atomically.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.snapshot_path(checkpoint.run_id())?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, checkpoint)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("Saved checkpoint {}", path.display());
        Ok(())
    }

    /// Load a run's snapshot.
    pub fn load(&self, run_id: &str) -> Result<Checkpoint> {
        let path = self.snapshot_path(run_id)?;
        if !path.exists() {
            return Err(ConvergrError::Checkpoint(format!("no checkpoint for run {}", run_id)));
        }
        let file = File::open(&path)?;
        let checkpoint: Checkpoint = serde_json::from_reader(BufReader::new(file))?;
        if checkpoint.run_id() != run_id {
            return Err(ConvergrError::Checkpoint(format!(
                "checkpoint {} holds run {}",
                path.display(),
                checkpoint.run_id()
            )));
        }
        Ok(checkpoint)
    }

    /// Append one iteration summary to the run's history.
    pub fn append_history(&self, run_id: &str, summary: &IterationSummary) -> Result<()> {
        let path = self.history_path(run_id)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(summary)?)?;
        Ok(())
    }

    /// Read a run's history in iteration order.
    pub fn load_history(&self, run_id: &str) -> Result<Vec<IterationSummary>> {
        let path = self.history_path(run_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut history = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                history.push(serde_json::from_str(&line)?);
            }
        }
        Ok(history)
    }

    /// Run ids with a stored snapshot, oldest first.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.runs_dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            match name.strip_suffix(".json") {
                Some(id) if is_valid_run_id(id) => ids.push(id.to_string()),
                _ => {}
            }
        }
        ids.sort_by_key(|id| {
            let timestamp = id.split('-').next().and_then(|t| t.parse::<u64>().ok());
            (timestamp, id.clone())
        });
        Ok(ids)
    }

    /// Remove a run's snapshot and history.
    pub fn delete(&self, run_id: &str) -> Result<()> {
        let snapshot = self.snapshot_path(run_id)?;
        if !snapshot.exists() {
            return Err(ConvergrError::Checkpoint(format!("no checkpoint for run {}", run_id)));
        }
        fs::remove_file(snapshot)?;
        let history = self.history_path(run_id)?;
        if history.exists() {
            fs::remove_file(history)?;
        }
        Ok(())
    }
}

fn checked(run_id: &str) -> Result<&str> {
    if is_valid_run_id(run_id) {
        Ok(run_id)
    } else {
        Err(ConvergrError::Checkpoint(format!("invalid run id: {:?}", run_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{PathNormalizer, Reconciler};
    use crate::runner::LoopState;
    use tempfile::TempDir;

    fn checkpoint(run_id: &str) -> Checkpoint {
        let mut reconciler = Reconciler::new(&["src/a.py", "src/b.py"], PathNormalizer::default()).unwrap();
        reconciler.report_completion("a.py", 1);
        Checkpoint {
            reconciler: reconciler.state(),
            loop_state: LoopState::new(run_id),
            saved_at_ms: 0,
        }
    }

    fn summary(iteration: u32) -> IterationSummary {
        IterationSummary {
            iteration,
            completed_this_round: 0,
            outstanding_after: 1,
            reports: Vec::new(),
            generator_error: None,
            started_at_ms: 10,
            finished_at_ms: 20,
        }
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        let saved = checkpoint("1738300800123-a1b2");
        store.save(&saved)?;

        let loaded = store.load("1738300800123-a1b2")?;
        assert_eq!(loaded, saved);
        Ok(())
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        let mut cp = checkpoint("1738300800123-a1b2");
        store.save(&cp)?;
        cp.loop_state.iteration_index = 7;
        store.save(&cp)?;

        assert_eq!(store.load("1738300800123-a1b2")?.loop_state.iteration_index, 7);
        assert_eq!(store.list()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_load_missing_run() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        let err = store.load("1738300800123-ffff").unwrap_err();
        assert!(matches!(err, ConvergrError::Checkpoint(_)));
        Ok(())
    }

    #[test]
    fn test_rejects_path_like_run_id() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        assert!(matches!(store.load("../secret"), Err(ConvergrError::Checkpoint(_))));
        assert!(store.append_history("a/b", &summary(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_history_append_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        let id = "1738300800123-a1b2";
        assert!(store.load_history(id)?.is_empty());

        store.append_history(id, &summary(1))?;
        store.append_history(id, &summary(2))?;

        let history = store.load_history(id)?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].iteration, 2);
        Ok(())
    }

    #[test]
    fn test_list_orders_by_timestamp() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        store.save(&checkpoint("900-0001"))?;
        store.save(&checkpoint("10000-0002"))?;
        store.append_history("10000-0002", &summary(1))?;
        fs::write(store.runs_dir().join("notes.json"), "{}")?;

        assert_eq!(store.list()?, vec!["900-0001", "10000-0002"]);
        Ok(())
    }

    #[test]
    fn test_delete_removes_snapshot_and_history() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::open(temp_dir.path())?;
        let id = "1738300800123-a1b2";
        store.save(&checkpoint(id))?;
        store.append_history(id, &summary(1))?;

        store.delete(id)?;
        assert!(store.list()?.is_empty());
        assert!(store.load_history(id)?.is_empty());
        assert!(store.delete(id).is_err());
        Ok(())
    }
}
