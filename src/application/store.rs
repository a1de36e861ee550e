use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::errors::StoreError;
use crate::domain::play::{Play, PlayStatus};

/// A filesystem-backed play store. Plays are JSON files, one per partition
/// (lifecycle status); a transition moves the file between partitions via a
/// write-temp-then-rename sequence so a play is never transiently missing.
pub struct PlayStore {
    root: PathBuf,
}

impl PlayStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for status in PlayStatus::ALL {
            let dir = root.join(status.partition_name());
            std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
                play_id: status.partition_name().to_string(),
                source,
            })?;
        }
        Ok(PlayStore { root })
    }

    fn partition_dir(&self, status: PlayStatus) -> PathBuf {
        self.root.join(status.partition_name())
    }

    fn file_path(&self, status: PlayStatus, play_id: &str) -> PathBuf {
        self.partition_dir(status).join(format!("{play_id}.json"))
    }

    pub fn list(&self, status: PlayStatus) -> Result<Vec<Play>, StoreError> {
        let dir = self.partition_dir(status);
        let mut plays = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|source| StoreError::Io {
            play_id: dir.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                play_id: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            plays.push(self.load_path(&path)?);
        }
        Ok(plays)
    }

    pub fn list_all(&self) -> Result<Vec<Play>, StoreError> {
        let mut all = Vec::new();
        for status in PlayStatus::ALL {
            all.extend(self.list(status)?);
        }
        Ok(all)
    }

    fn load_path(&self, path: &Path) -> Result<Play, StoreError> {
        let play_id = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            play_id: play_id.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Serde { play_id, source })
    }

    pub fn load(&self, status: PlayStatus, play_id: &str) -> Result<Play, StoreError> {
        let path = self.file_path(status, play_id);
        if !path.exists() {
            return Err(StoreError::NotFound {
                play_id: play_id.to_string(),
                partition: status.partition_name().to_string(),
            });
        }
        self.load_path(&path)
    }

    /// Writes `play` into its current status's partition via write-temp then
    /// atomic rename within the partition.
    pub fn save(&self, play: &Play) -> Result<(), StoreError> {
        let dir = self.partition_dir(play.status.status);
        let final_path = dir.join(format!("{}.json", play.play_id));
        let tmp_path = dir.join(format!("{}.json.tmp", play.play_id));

        let body = serde_json::to_string_pretty(play).map_err(|source| StoreError::Serde {
            play_id: play.play_id.clone(),
            source,
        })?;
        std::fs::write(&tmp_path, body).map_err(|source| StoreError::Io {
            play_id: play.play_id.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &final_path).map_err(|source| StoreError::Io {
            play_id: play.play_id.clone(),
            source,
        })?;
        debug!(play_id = %play.play_id, status = ?play.status.status, "play saved");
        Ok(())
    }

    /// Moves a play from `from` to `to`: first a same-partition
    /// write-temp-then-rename to commit the updated content in place, then a
    /// single cross-partition rename to relocate it. The second rename is
    /// atomic on a shared filesystem, so the play is discoverable in exactly
    /// one partition at every observable instant, never both and never
    /// neither.
    pub fn transition(&self, mut play: Play, to: PlayStatus) -> Result<Play, StoreError> {
        let from = play.status.status;
        if from == to {
            self.save(&play)?;
            return Ok(play);
        }

        let from_path = self.file_path(from, &play.play_id);
        play.status.status = to;

        let body = serde_json::to_string_pretty(&play).map_err(|source| StoreError::Serde {
            play_id: play.play_id.clone(),
            source,
        })?;
        let from_tmp = self.partition_dir(from).join(format!("{}.json.tmp", play.play_id));
        std::fs::write(&from_tmp, body).map_err(|source| StoreError::Io {
            play_id: play.play_id.clone(),
            source,
        })?;
        std::fs::rename(&from_tmp, &from_path).map_err(|source| StoreError::Io {
            play_id: play.play_id.clone(),
            source,
        })?;

        let to_path = self.file_path(to, &play.play_id);
        std::fs::rename(&from_path, &to_path).map_err(|source| StoreError::Io {
            play_id: play.play_id.clone(),
            source,
        })?;

        info!(play_id = %play.play_id, from = from.partition_name(), to = to.partition_name(), "play transitioned");
        Ok(play)
    }

    pub fn delete(&self, play: &Play) -> Result<(), StoreError> {
        let path = self.file_path(play.status.status, &play.play_id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| StoreError::Io {
                play_id: play.play_id.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
