//! Per-user dashboard preferences.
//!
//! A `UiStore` is built once at startup and carried in `AppState`. Each user's
//! preferences live behind a `watch` channel so interested tasks can observe
//! changes; every dispatched action is persisted to a JSON file. Writes are
//! serialized and land through a rename, so the file on disk is always a
//! complete snapshot no older than the last finished write.

pub mod handlers;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightSidebarMode {
    Upcoming,
    AiChat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Grid,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Recent,
    Name,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOwner {
    All,
    Me,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Dark,
    Light,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    pub left_sidebar_open: bool,
    pub right_sidebar_open: bool,
    pub right_sidebar_mode: RightSidebarMode,
    pub view_mode: ViewMode,
    pub sort_by: SortBy,
    pub filter_owner: FilterOwner,
    pub theme: Theme,
    pub current_class_id: Option<Uuid>,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            left_sidebar_open: true,
            right_sidebar_open: true,
            right_sidebar_mode: RightSidebarMode::Upcoming,
            view_mode: ViewMode::Grid,
            sort_by: SortBy::Recent,
            filter_owner: FilterOwner::All,
            theme: Theme::Dark,
            current_class_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum UiAction {
    ToggleLeftSidebar,
    ToggleRightSidebar,
    /// Opens the right sidebar straight onto the assistant.
    OpenAiChat,
    SetRightSidebarMode(RightSidebarMode),
    SetViewMode(ViewMode),
    SetSortBy(SortBy),
    SetFilterOwner(FilterOwner),
    SetTheme(Theme),
    SetCurrentClass(Option<Uuid>),
}

impl UiPreferences {
    pub fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::ToggleLeftSidebar => self.left_sidebar_open = !self.left_sidebar_open,
            UiAction::ToggleRightSidebar => self.right_sidebar_open = !self.right_sidebar_open,
            UiAction::OpenAiChat => {
                self.right_sidebar_open = true;
                self.right_sidebar_mode = RightSidebarMode::AiChat;
            }
            UiAction::SetRightSidebarMode(mode) => self.right_sidebar_mode = mode,
            UiAction::SetViewMode(mode) => self.view_mode = mode,
            UiAction::SetSortBy(sort) => self.sort_by = sort,
            UiAction::SetFilterOwner(filter) => self.filter_owner = filter,
            UiAction::SetTheme(theme) => self.theme = theme,
            UiAction::SetCurrentClass(class_id) => self.current_class_id = class_id,
        }
    }
}

#[derive(Clone)]
pub struct UiStore {
    users: Arc<Mutex<HashMap<Uuid, watch::Sender<UiPreferences>>>>,
    /// Held across snapshot and write.
    persist: Arc<Mutex<()>>,
    path: Option<PathBuf>,
}

impl UiStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::default(),
            persist: Arc::default(),
            path: None,
        }
    }

    /// Restores preferences from `path`. A missing or unreadable file starts
    /// everyone from defaults.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let saved = match read_snapshot(&path).await {
            Ok(saved) => {
                info!("Loaded UI preferences for {} users", saved.len());
                saved
            }
            Err(e) => {
                warn!("Starting with default UI preferences: {e:#}");
                HashMap::new()
            }
        };

        let users = saved
            .into_iter()
            .map(|(user_id, prefs)| (user_id, watch::Sender::new(prefs)))
            .collect();

        Self {
            users: Arc::new(Mutex::new(users)),
            persist: Arc::default(),
            path: Some(path),
        }
    }

    pub async fn preferences(&self, user_id: Uuid) -> UiPreferences {
        let users = self.users.lock().await;
        users
            .get(&user_id)
            .map(|tx| tx.borrow().clone())
            .unwrap_or_default()
    }

    pub async fn subscribe(&self, user_id: Uuid) -> watch::Receiver<UiPreferences> {
        let mut users = self.users.lock().await;
        users
            .entry(user_id)
            .or_insert_with(|| watch::Sender::new(UiPreferences::default()))
            .subscribe()
    }

    /// Applies `action`, notifies observers and persists the result.
    pub async fn dispatch(&self, user_id: Uuid, action: UiAction) -> UiPreferences {
        let updated = {
            let mut users = self.users.lock().await;
            let tx = users
                .entry(user_id)
                .or_insert_with(|| watch::Sender::new(UiPreferences::default()));
            tx.send_modify(|prefs| prefs.apply(action));
            let current = tx.borrow().clone();
            current
        };

        if let Err(e) = self.save().await {
            warn!("Failed to persist UI preferences: {e:#}");
        }
        updated
    }

    pub async fn save(&self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        // Owned so the guard outlives a cancelled caller until the write lands.
        let persist = self.persist.clone().lock_owned().await;
        let snapshot: HashMap<Uuid, UiPreferences> = {
            let users = self.users.lock().await;
            users
                .iter()
                .map(|(id, tx)| (*id, tx.borrow().clone()))
                .collect()
        };

        let body = serde_json::to_vec_pretty(&snapshot)?;
        tokio::task::spawn_blocking(move || {
            let _persist = persist;
            write_atomically(&path, &body)
        })
            .await
            .context("UI preferences writer panicked")?
    }
}

/// Writes to a temp file beside `path`, then renames it over `path`.
fn write_atomically(path: &Path, body: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    file.write_all(body)?;
    file.as_file().sync_all()?;
    file.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

async fn read_snapshot(path: &Path) -> Result<HashMap<Uuid, UiPreferences>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}
