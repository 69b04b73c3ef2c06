//! JSON snapshots so an index built once can be queried across runs.
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{DistanceMetric, IndexEntry, SourceInfo, VectorIndex};
use crate::error::RagError;

const SNAPSHOT_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    model: String,
    metric: DistanceMetric,
    dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<SourceInfo>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Write the index to `path`. The file is replaced atomically.
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            model: self.model.clone(),
            metric: self.metric,
            dimensions: self.dimensions,
            source: self.source.clone(),
            entries: self.entries.clone(),
        };

        let tmp = path.with_extension("tmp");
        let file = fs::File::create(&tmp).map_err(|e| RagError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &snapshot).map_err(|e| RagError::Snapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        writer.flush().map_err(|e| RagError::io(&tmp, e))?;
        drop(writer);
        fs::rename(&tmp, path).map_err(|e| RagError::io(path, e))?;

        info!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Read an index written by [`VectorIndex::save`].
    ///
    /// Every entry is re-validated on the way in.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let file = fs::File::open(path).map_err(|e| RagError::io(path, e))?;
        let snapshot: Snapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| RagError::Snapshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RagError::Snapshot {
                path: path.to_path_buf(),
                reason: format!("unsupported version {}", snapshot.version),
            });
        }

        let mut index = VectorIndex::new(snapshot.metric, snapshot.model);
        if let Some(dimensions) = snapshot.dimensions {
            index = index.with_dimensions(dimensions);
        }
        if let Some(source) = snapshot.source {
            index = index.with_source(source);
        }
        for entry in snapshot.entries {
            index.insert(entry.chunk, entry.embedding)?;
        }

        info!("Loaded {} entries from {}", index.len(), path.display());
        Ok(index)
    }
}
