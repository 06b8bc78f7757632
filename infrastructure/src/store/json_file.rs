//! Session store backed by one JSON document per session.
//!
//! Files are written to a temporary name and renamed into place, so a crash
//! mid-write leaves the previous version intact.

use async_trait::async_trait;
use chorus_application::ports::session_store::{SessionStore, StoreError};
use chorus_domain::{Session, SessionId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const EXTENSION: &str = "json";

pub struct JsonFileSessionStore {
    directory: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File for `id`; see [`encode_stem`].
    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.directory
            .join(format!("{}.{EXTENSION}", encode_stem(id.as_str())))
    }
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// File stem for a session id. Bytes outside `[A-Za-z0-9_-]` become `%XX`,
/// so distinct ids map to distinct files and no id can leave the directory.
fn encode_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if is_plain(byte) {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

/// Inverse of [`encode_stem`]; `None` for names this store did not write.
fn decode_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else if is_plain(byte) {
            bytes.push(byte);
            rest = tail;
        } else {
            return None;
        }
    }
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load_session(&self, id: &SessionId) -> Result<Session, StoreError> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        fs::create_dir_all(&self.directory).await?;
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.path_for(session.id());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        debug!("Saved session {} to {}", session.id(), path.display());
        Ok(())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).and_then(decode_stem) {
                Some(id) => ids.push(SessionId::new(id)),
                None => warn!("Skipping unrecognised session file: {}", path.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
