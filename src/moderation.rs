//! Moderation action log and per-user warning store
//!
//! Two JSON files under a configured directory: `moderation_log.json`, an
//! append-only list of actions, and `warns.json`, warning lists keyed by
//! user id. Writes rewrite the whole file (the files stay small) and are
//! serialized by per-file async locks so concurrent command handlers
//! cannot interleave a read-modify-write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::errors::Result;

/// Kind of moderation action taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationKind {
    Ban,
    Kick,
    Mute,
    Unmute,
    Warn,
    Purge,
}

/// One logged moderation action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationAction {
    #[serde(rename = "type")]
    pub kind: ModerationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub moderator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Mute duration in minutes, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Channel and message count for purges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u32>,
}

impl ModerationAction {
    /// Convenience constructor for the common user-targeted actions.
    pub fn against_user(
        kind: ModerationKind,
        user_id: u64,
        moderator: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            kind,
            user_id: Some(user_id),
            moderator: moderator.into(),
            reason,
            timestamp: Utc::now(),
            duration_minutes: None,
            channel_id: None,
            amount: None,
        }
    }
}

/// One warning on a user's record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub reason: String,
    pub moderator: String,
    pub timestamp: DateTime<Utc>,
}

/// File-backed moderation logger
pub struct ModerationLogger {
    log_path: PathBuf,
    warn_path: PathBuf,
    log_lock: Mutex<()>,
    warn_lock: Mutex<()>,
}

impl ModerationLogger {
    /// Create a logger writing under `dir` (created if absent).
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            log_path: dir.join("moderation_log.json"),
            warn_path: dir.join("warns.json"),
            log_lock: Mutex::new(()),
            warn_lock: Mutex::new(()),
        })
    }

    /// Append one action to the moderation log.
    pub async fn log_action(&self, action: &ModerationAction) -> Result<()> {
        let _guard = self.log_lock.lock().await;
        let mut actions: Vec<ModerationAction> = read_json_or_default(&self.log_path).await?;
        actions.push(action.clone());
        write_json(&self.log_path, &actions).await
    }

    /// Full action log, oldest first.
    pub async fn actions(&self) -> Result<Vec<ModerationAction>> {
        let _guard = self.log_lock.lock().await;
        read_json_or_default(&self.log_path).await
    }

    /// Record a warning and return the user's new warning count.
    pub async fn warn_user(
        &self,
        user_id: u64,
        reason: impl Into<String>,
        moderator: impl Into<String>,
    ) -> Result<usize> {
        let _guard = self.warn_lock.lock().await;
        let mut warns: HashMap<String, Vec<Warning>> =
            read_json_or_default(&self.warn_path).await?;
        let entry = warns.entry(user_id.to_string()).or_default();
        entry.push(Warning {
            reason: reason.into(),
            moderator: moderator.into(),
            timestamp: Utc::now(),
        });
        let count = entry.len();
        write_json(&self.warn_path, &warns).await?;
        Ok(count)
    }

    /// Warnings currently on record for a user.
    pub async fn warnings(&self, user_id: u64) -> Result<Vec<Warning>> {
        let _guard = self.warn_lock.lock().await;
        let warns: HashMap<String, Vec<Warning>> = read_json_or_default(&self.warn_path).await?;
        Ok(warns.get(&user_id.to_string()).cloned().unwrap_or_default())
    }

    /// Remove all warnings for a user. Returns whether any were present.
    pub async fn clear_warnings(&self, user_id: u64) -> Result<bool> {
        let _guard = self.warn_lock.lock().await;
        let mut warns: HashMap<String, Vec<Warning>> =
            read_json_or_default(&self.warn_path).await?;
        let removed = warns.remove(&user_id.to_string()).is_some();
        if removed {
            write_json(&self.warn_path, &warns).await?;
        }
        Ok(removed)
    }
}

async fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match fs::read_to_string(path).await {
        Ok(contents) if !contents.trim().is_empty() => Ok(serde_json::from_str(&contents)?),
        Ok(_) => Ok(T::default()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).await?;
    Ok(())
}
