//! Workbook file management and the credentials table
//!
//! The workbook is a JSON file mapping table names to rows. All writes use
//! atomic temp-file + rename to prevent corruption on crash. A tokio Mutex
//! serializes concurrent mutation from overlapping triggers (two scheduled
//! posts refreshing tokens near-simultaneously share the same lock).
//!
//! The workbook file is the single source of truth for credential data; the
//! poster reads rows at posting time and writes refreshed tokens back here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::content::HeaderMode;
use crate::error::{Error, Result};

/// One authorized user's row in the credentials table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub user_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// On-disk workbook shape.
///
/// `credentials` is optional: a workbook where no user has authorized yet has
/// no credentials table at all, and reads against it fail with
/// `StoreUnavailable` (distinct from an existing-but-empty table).
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct WorkbookData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) credentials: Option<Vec<Credential>>,
    #[serde(default)]
    pub(crate) channels: HashMap<String, Vec<String>>,
}

/// Thread-safe workbook file manager.
#[derive(Debug)]
pub struct Workbook {
    path: PathBuf,
    header_mode: HeaderMode,
    pub(crate) state: Mutex<WorkbookData>,
}

impl Workbook {
    /// Load the workbook from the given file path.
    ///
    /// If the file doesn't exist, creates it with no credentials table and no
    /// channels (cold start). `header_mode` is the configured content header
    /// policy applied by `list_content`.
    pub async fn load(path: PathBuf, header_mode: HeaderMode) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading workbook file: {e}")))?;
            let data: WorkbookData = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing workbook file: {e}")))?;
            info!(
                path = %path.display(),
                users = data.credentials.as_ref().map_or(0, |c| c.len()),
                channels = data.channels.len(),
                "loaded workbook"
            );
            data
        } else {
            info!(path = %path.display(), "workbook file not found, starting empty");
            let data = WorkbookData::default();
            // Create the empty file so future loads don't need the cold-start path
            write_atomic(&path, &data).await?;
            data
        };

        Ok(Self {
            path,
            header_mode,
            state: Mutex::new(state),
        })
    }

    /// The configured content header policy.
    pub fn header_mode(&self) -> HeaderMode {
        self.header_mode
    }

    /// Get credential rows, optionally filtered to a single user.
    ///
    /// Fails with `StoreUnavailable` if the credentials table is missing.
    /// An existing table with no matching rows returns an empty list.
    pub async fn get_credentials(&self, user_id: Option<&str>) -> Result<Vec<Credential>> {
        let state = self.state.lock().await;
        let rows = state
            .credentials
            .as_ref()
            .ok_or_else(|| Error::StoreUnavailable("credentials table missing".into()))?;

        Ok(match user_id {
            Some(id) => rows.iter().filter(|c| c.user_id == id).cloned().collect(),
            None => rows.clone(),
        })
    }

    /// Update the row matching `credential.user_id`, or append a new one.
    ///
    /// Provisions the credentials table on first use and persists to disk.
    pub async fn upsert_credentials(&self, credential: Credential) -> Result<()> {
        let mut state = self.state.lock().await;
        let rows = state.credentials.get_or_insert_with(Vec::new);

        match rows.iter_mut().find(|c| c.user_id == credential.user_id) {
            Some(existing) => {
                debug!(user_id = %credential.user_id, "updated credential row");
                *existing = credential;
            }
            None => {
                debug!(user_id = %credential.user_id, "appended credential row");
                rows.push(credential);
            }
        }

        write_atomic(&self.path, &state).await
    }

    /// Update the token columns of an existing user's row after a refresh.
    ///
    /// Returns whether a row was updated; a missing row is not an error (the
    /// caller decides whether that matters). Identity columns are untouched.
    pub async fn update_tokens(
        &self,
        user_id: &str,
        access_token: String,
        refresh_token: String,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        let rows = state
            .credentials
            .as_mut()
            .ok_or_else(|| Error::StoreUnavailable("credentials table missing".into()))?;

        match rows.iter_mut().find(|c| c.user_id == user_id) {
            Some(row) => {
                row.access_token = access_token;
                row.refresh_token = refresh_token;
                debug!(user_id, "updated token columns");
                write_atomic(&self.path, &state).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a user's row (administrative operation).
    ///
    /// Returns whether a row was removed. Fails with `StoreUnavailable` if
    /// the credentials table is missing.
    pub async fn delete_credentials(&self, user_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let rows = state
            .credentials
            .as_mut()
            .ok_or_else(|| Error::StoreUnavailable("credentials table missing".into()))?;

        let before = rows.len();
        rows.retain(|c| c.user_id != user_id);
        let removed = rows.len() < before;

        if removed {
            debug!(user_id, "removed credential row");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    /// Persist the current in-memory state to disk.
    pub(crate) async fn save_locked(&self, state: &WorkbookData) -> Result<()> {
        write_atomic(&self.path, state).await
    }
}

/// Write the workbook to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains OAuth tokens.
async fn write_atomic(path: &Path, data: &WorkbookData) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing workbook: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("workbook path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".workbook.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp workbook file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting workbook file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp workbook file: {e}")))?;

    debug!(path = %path.display(), "persisted workbook");
    Ok(())
}
