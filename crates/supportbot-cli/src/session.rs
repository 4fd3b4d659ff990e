//! Chat sessions persisted as one JSON file per session

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use supportbot_core::{ChatMessage, Error, Result, Role, Source};

/// Default directory for session files
pub const DEFAULT_STORAGE_DIR: &str = "data/chats";

pub const NEW_CHAT_TITLE: &str = "New Chat";

const UNTITLED: &str = "Untitled Chat";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

fn untitled() -> String {
    UNTITLED.to_string()
}

/// A message as stored in a session file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl StoredMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
        }
    }
}

/// One conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in the shape the LLM expects, sources dropped
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage::new(m.role, m.content.clone()))
            .collect()
    }

    /// Messages sent by the user so far
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }
}

/// Listing entry for a stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub updated_at: String,
    pub message_count: usize,
}

/// Parse a stored `updated_at` value as local time
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

fn now_timestamp() -> String {
    Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string()
}

/// Session ids become file names, so they must not escape the storage directory
fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(Error::InvalidInput(format!("invalid session id: {:?}", id)));
    }
    Ok(())
}

/// Saves, loads and manages sessions under a storage directory
#[derive(Debug, Clone)]
pub struct ChatManager {
    storage_dir: PathBuf,
}

impl Default for ChatManager {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_DIR)
    }
}

impl ChatManager {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn session_path(&self, id: &str) -> Result<PathBuf> {
        validate_session_id(id)?;
        Ok(self.storage_dir.join(format!("{}.json", id)))
    }

    /// Paths of every `*.json` file in the storage directory
    async fn session_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.storage_dir).await else {
            return files;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        files
    }

    /// New in-memory session; nothing is written until it is saved
    pub fn create_session(&self) -> ChatSession {
        ChatSession::new(Uuid::new_v4().to_string())
    }

    /// Stamp `updated_at` and write the session file
    pub async fn save_session(&self, session: &mut ChatSession) -> Result<()> {
        let path = self.session_path(&session.id)?;
        tokio::fs::create_dir_all(&self.storage_dir).await?;

        session.updated_at = Some(now_timestamp());
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        tokio::fs::write(&path, json).await?;

        debug!(session = %session.id, "saved session");
        Ok(())
    }

    async fn read_session(&self, path: &Path) -> Result<ChatSession> {
        let raw = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// `None` when the session does not exist or cannot be read
    pub async fn load_session(&self, id: &str) -> Option<ChatSession> {
        let path = match self.session_path(id) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "refusing to load session");
                return None;
            }
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return None;
        }

        match self.read_session(&path).await {
            Ok(session) => Some(session),
            Err(e) => {
                error!(session = %id, error = %e, "failed to load session");
                None
            }
        }
    }

    /// Sessions that have messages, newest first
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions = Vec::new();

        for path in self.session_files().await {
            match self.read_session(&path).await {
                Ok(session) if !session.is_empty() => sessions.push(SessionSummary {
                    message_count: session.messages.len(),
                    id: session.id,
                    title: session.title,
                    updated_at: session.updated_at.unwrap_or_default(),
                }),
                Ok(_) => {}
                Err(e) => error!(file = %path.display(), error = %e, "failed to load session"),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub async fn delete_session(&self, id: &str) -> bool {
        let Ok(path) = self.session_path(id) else {
            return false;
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return false;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(session = %id, "deleted session");
                true
            }
            Err(e) => {
                error!(session = %id, error = %e, "failed to delete session");
                false
            }
        }
    }

    /// Rename a stored session; `false` when it does not exist
    pub async fn update_session_title(&self, id: &str, title: &str) -> Result<bool> {
        let Some(mut session) = self.load_session(id).await else {
            return Ok(false);
        };
        session.title = title.to_string();
        self.save_session(&mut session).await?;
        Ok(true)
    }

    /// Delete sessions last updated more than `days` days ago
    pub async fn delete_old_sessions(&self, days: u32) -> usize {
        let cutoff = TimeDelta::try_days(i64::from(days))
            .and_then(|age| Local::now().naive_local().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            warn!(days, "retention period reaches past the earliest date, nothing to delete");
            return 0;
        };
        let mut deleted = 0;

        for path in self.session_files().await {
            let session = match self.read_session(&path).await {
                Ok(session) => session,
                Err(e) => {
                    error!(file = %path.display(), error = %e, "error processing session");
                    continue;
                }
            };
            let Some(updated_at) = session.updated_at.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };
            let Some(stamp) = parse_timestamp(updated_at) else {
                error!(session = %session.id, updated_at, "unparsable session timestamp");
                continue;
            };

            if stamp >= cutoff {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    info!(file = %path.display(), session = %session.id, "deleted old session");
                }
                Err(e) => error!(file = %path.display(), error = %e, "failed to delete session file"),
            }
        }

        info!(deleted, days, "data retention: deleted old sessions");
        deleted
    }

    /// Write a copy of the session to `export_path`, default `<id>_export.json`
    pub async fn export_session(&self, id: &str, export_path: Option<&Path>) -> bool {
        let Some(session) = self.load_session(id).await else {
            return false;
        };
        let target = export_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}_export.json", id)));

        let written = match serde_json::to_string_pretty(&session) {
            Ok(json) => tokio::fs::write(&target, json).await.map_err(Error::from),
            Err(e) => Err(Error::Serialization(e.to_string())),
        };

        match written {
            Ok(()) => {
                info!(session = %id, path = %target.display(), "exported session");
                true
            }
            Err(e) => {
                error!(session = %id, error = %e, "failed to export session");
                false
            }
        }
    }

    /// Remove every session file, returning how many were removed
    pub async fn delete_all_sessions(&self) -> usize {
        let mut deleted = 0;
        for path in self.session_files().await {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) => error!(file = %path.display(), error = %e, "failed to delete session file"),
            }
        }
        info!(deleted, "deleted all sessions");
        deleted
    }

    pub async fn session_count(&self) -> usize {
        self.session_files().await.len()
    }

    /// Total size in bytes of all session files
    pub async fn storage_size(&self) -> u64 {
        let mut total = 0;
        for path in self.session_files().await {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                total += meta.len();
            }
        }
        total
    }
}
