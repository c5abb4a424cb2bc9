use crate::{Error, Result, StorageAdapter};
use std::fs;
use std::path::{Path, PathBuf};

/// One JSON file per key. Keys are percent-encoded into file names so that
/// `list` can hand back the original keys, slashes included.
pub struct FileStorageAdapter {
    base_path: PathBuf,
}

impl FileStorageAdapter {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", urlencoding::encode(key)))
    }

    fn path_to_key(file_name: &str) -> Option<String> {
        let encoded = file_name.strip_suffix(".json")?;
        urlencoding::decode(encoded).ok().map(|k| k.into_owned())
    }
}

impl StorageAdapter for FileStorageAdapter {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_to_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read file: {}", e))),
        }
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        let path = self.key_to_path(key);
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, value)
            .map_err(|e| Error::Storage(format!("Failed to write file: {}", e)))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to replace file: {}", e)))?;

        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_to_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to delete file: {}", e))),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| Error::Storage(format!("Failed to read directory: {}", e)))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Storage(format!("Failed to read dir entry: {}", e)))?;
            let file_name = entry.file_name();
            let Some(key) = Self::path_to_key(&file_name.to_string_lossy()) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }

        Ok(keys)
    }
}
