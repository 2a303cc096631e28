//! File-backed artifact store.
//!
//! One `client_data_{id}.json` file per participant. Every read and write
//! opens its own handle, which is closed when it goes out of scope on every
//! exit path.

use super::ArtifactStore;
use crate::error::{FedError, Result};
use crate::models::{LocalStatistic, ParticipantId};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// Stores each participant's statistic as a JSON file in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir` for artifacts, creating it if needed.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Artifact file name for a participant.
    pub fn file_name(participant: ParticipantId) -> String {
        format!("client_data_{}.json", participant)
    }

    /// Full artifact path for a participant.
    pub fn path_for(&self, participant: ParticipantId) -> PathBuf {
        self.dir.join(Self::file_name(participant))
    }
}

impl ArtifactStore for FileStore {
    fn put(&self, participant: ParticipantId, statistic: &LocalStatistic) -> Result<()> {
        let path = self.path_for(participant);
        let storage_err = |source| FedError::Storage {
            participant,
            source,
        };

        let file = File::create(&path).map_err(storage_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, statistic)?;
        writer.flush().map_err(storage_err)?;

        debug!("Wrote artifact {}", path.display());
        Ok(())
    }

    fn get(&self, participant: ParticipantId) -> Result<Option<LocalStatistic>> {
        let path = self.path_for(participant);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FedError::Storage {
                    participant,
                    source,
                })
            }
        };

        let statistic = serde_json::from_reader(BufReader::new(file))?;
        debug!("Read artifact {}", path.display());
        Ok(Some(statistic))
    }

    fn describe(&self) -> String {
        format!("files in {}", self.dir.display())
    }
}
