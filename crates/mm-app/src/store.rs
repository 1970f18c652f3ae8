use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use mm_core::{ArtifactRecord, OutputFormat, RefinedPrompt, SessionHistory};
use mm_mesh::RepairedMesh;
use tracing::info;
use crate::error::StoreError;

const MAX_NAME_COPIES: u32 = 100;

/// Writes meshes under one output directory and keeps the session history.
///
/// Files are written to a temporary sibling and renamed into place, so a
/// failed write leaves neither a partial file nor a history entry.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    directory: PathBuf,
    history: SessionHistory,
}

impl ArtifactStore {
    pub fn new(directory: impl Into<PathBuf>, history: SessionHistory) -> Self {
        Self {
            directory: directory.into(),
            history,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn persist(
        &self,
        mesh: &RepairedMesh,
        filename: &str,
        format: OutputFormat,
    ) -> Result<PathBuf, StoreError> {
        let path = Path::new(filename);
        let plain = path.file_name().is_some_and(|name| name == path.as_os_str());
        let extension_ok = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(format.extension()));
        if !plain || !extension_ok {
            return Err(StoreError::InvalidFilename(filename.to_string()));
        }

        fs::create_dir_all(&self.directory).map_err(|source| StoreError::CreateDir {
            path: self.directory.clone(),
            source,
        })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = mm_mesh::encode(mesh, format, &stem)?;

        let write_err = |source| StoreError::Write {
            path: self.directory.join(filename),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.directory).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        // never replace an earlier artifact; same-second names get a counter
        let mut copy = 1;
        let target = loop {
            let candidate = match copy {
                1 => self.directory.join(filename),
                n => self
                    .directory
                    .join(format!("{stem}_{n}.{}", format.extension())),
            };
            match tmp.persist_noclobber(&candidate) {
                Ok(_) => break candidate,
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists && copy < MAX_NAME_COPIES => {
                    tmp = e.file;
                    copy += 1;
                }
                Err(e) => {
                    return Err(StoreError::Write {
                        path: candidate,
                        source: e.error,
                    });
                }
            }
        };

        ensure_readable(&target)?;
        info!("Saved {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }

    /// Appends to the history. Only call with a path returned by [`Self::persist`].
    pub fn record(
        &self,
        prompt: RefinedPrompt,
        file_path: PathBuf,
        format: OutputFormat,
        timestamp: DateTime<Local>,
    ) -> ArtifactRecord {
        let record = ArtifactRecord {
            prompt,
            file_path,
            format,
            timestamp,
        };
        self.history.append(record.clone());
        record
    }

    /// Persist then record. History is untouched when the write fails.
    pub fn save(
        &self,
        mesh: &RepairedMesh,
        prompt: &RefinedPrompt,
        filename: &str,
        format: OutputFormat,
    ) -> Result<ArtifactRecord, StoreError> {
        let path = self.persist(mesh, filename, format)?;
        Ok(self.record(prompt.clone(), path, format, Local::now()))
    }

    /// Reads back the `index`-th most recent artifact.
    pub fn load(&self, index: usize) -> Result<(ArtifactRecord, Vec<u8>), StoreError> {
        let record = self
            .history
            .get_recent(index)
            .ok_or(StoreError::UnknownRecord(index))?;
        let bytes = fs::read(&record.file_path).map_err(|source| StoreError::Unreadable {
            path: record.file_path.clone(),
            source,
        })?;
        Ok((record, bytes))
    }
}

fn ensure_readable(path: &Path) -> Result<(), StoreError> {
    let unreadable = |source| StoreError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::open(path).map_err(unreadable)?;
    let mut probe = [0u8; 1];
    file.read(&mut probe).map_err(unreadable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_mesh::{FaceBuffer, MeshBuilder, RawDecodedMesh};

    fn tetra() -> RepairedMesh {
        let raw = RawDecodedMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            FaceBuffer::Triangles(vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]]),
        );
        MeshBuilder::default().build(&raw).unwrap()
    }

    #[test]
    fn test_save_creates_directory_and_records() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("nested/out"), SessionHistory::new());
        let record = store
            .save(&tetra(), &RefinedPrompt::refined("a tetra"), "Tetra_abc123_20250101_000000.obj", OutputFormat::Obj)
            .unwrap();

        assert!(record.file_path.exists());
        assert_eq!(record.format, OutputFormat::Obj);
        assert_eq!(store.history().len(), 1);

        let (loaded, bytes) = store.load(0).unwrap();
        assert_eq!(loaded, record);
        assert!(String::from_utf8(bytes).unwrap().contains("f 1 3 2"));
    }

    #[test]
    fn test_failed_write_leaves_no_history() {
        let tmp = tempfile::tempdir().unwrap();
        // a file where the directory should be
        let blocker = tmp.path().join("out");
        fs::write(&blocker, b"x").unwrap();

        let store = ArtifactStore::new(&blocker, SessionHistory::new());
        let result = store.save(&tetra(), &RefinedPrompt::refined("p"), "a_000000_20250101_000000.obj", OutputFormat::Obj);
        assert!(matches!(result, Err(StoreError::CreateDir { .. })));
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_rejects_paths_and_wrong_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path(), SessionHistory::new());
        for name in ["../escape.obj", "sub/dir.obj", "model.ply", "model"] {
            assert!(matches!(
                store.persist(&tetra(), name, OutputFormat::Obj),
                Err(StoreError::InvalidFilename(_))
            ));
        }
    }

    #[test]
    fn test_same_name_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path(), SessionHistory::new());
        let name = "Cup_abc123_20250101_000000.obj";
        let shifted = MeshBuilder::default()
            .build(&RawDecodedMesh::new(
                vec![[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0], [2.0, 0.0, 1.0]],
                FaceBuffer::Triangles(vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]]),
            ))
            .unwrap();

        let first = store.save(&tetra(), &RefinedPrompt::refined("a cup"), name, OutputFormat::Obj).unwrap();
        let second = store.save(&shifted, &RefinedPrompt::refined("a cup"), name, OutputFormat::Obj).unwrap();

        assert_ne!(first.file_path, second.file_path);
        assert_eq!(first.file_path, tmp.path().join(name));
        assert_eq!(second.file_path, tmp.path().join("Cup_abc123_20250101_000000_2.obj"));

        let first_text = fs::read_to_string(&first.file_path).unwrap();
        let second_text = fs::read_to_string(&second.file_path).unwrap();
        assert!(!first_text.contains("v 2 0 0"));
        assert!(second_text.contains("v 2 0 0"));

        assert_eq!(store.history().len(), 2);
        assert_eq!(store.load(0).unwrap().0, second);
        assert_eq!(store.load(1).unwrap().0, first);
    }

    #[test]
    fn test_load_unknown_index() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path(), SessionHistory::new());
        assert!(matches!(store.load(0), Err(StoreError::UnknownRecord(0))));
    }

    #[test]
    fn test_each_format_lands_with_its_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path(), SessionHistory::new());
        for format in OutputFormat::all() {
            let name = format!("mesh.{}", format.extension());
            let path = store.persist(&tetra(), &name, format).unwrap();
            assert!(fs::metadata(&path).unwrap().len() > 0);
        }
        // persist alone does not touch history
        assert!(store.history().is_empty());
    }
}
