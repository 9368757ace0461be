use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::UserProfile;
use crate::config::ProfileConfig;
use crate::paths::Paths;
use crate::personality::PersonalityType;

/// JSON file holding one user's profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    backup: bool,
    backup_count: usize,
}

impl ProfileStore {
    pub fn new(path: PathBuf, config: &ProfileConfig) -> Self {
        Self {
            path,
            backup: config.backup,
            backup_count: config.backup_count,
        }
    }

    pub fn for_user(paths: &Paths, user_id: &str, config: &ProfileConfig) -> Self {
        Self::new(paths.profile_file(user_id), config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the profile, or start a fresh one when the file is missing or
    /// unreadable.
    pub fn load_or_create(&self, user_id: &str, personality: PersonalityType) -> UserProfile {
        match self.load() {
            Ok(Some(profile)) => {
                debug!("Loaded profile for {} from {}", user_id, self.path.display());
                profile
            }
            Ok(None) => {
                info!("Creating new profile for {}", user_id);
                UserProfile::new(user_id, personality)
            }
            Err(e) => {
                warn!("Could not read profile, starting fresh: {:#}", e);
                UserProfile::new(user_id, personality)
            }
        }
    }

    pub fn load(&self) -> Result<Option<UserProfile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let profile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(profile))
    }

    /// Back up the current file, then replace it through a temp file and rename.
    pub fn save(&self, profile: &UserProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.backup && self.path.exists() {
            match self.write_backup() {
                Ok(backup) => debug!("Profile backup: {}", backup.display()),
                Err(e) => warn!("Profile backup failed: {:#}", e),
            }
            if let Err(e) = self.prune_backups() {
                warn!("Failed to prune profile backups: {:#}", e);
            }
        }

        let json = serde_json::to_string_pretty(profile)?;
        let tmp = self.sibling(".tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
        }

        debug!("Saved profile to {}", self.path.display());
        Ok(())
    }

    /// Existing backups, oldest first.
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}.backup_*",
            glob::Pattern::escape(&self.path.to_string_lossy())
        );
        let mut found: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|p| p.ok()).collect();
        found.sort();
        Ok(found)
    }

    fn write_backup(&self) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        let mut backup = self.sibling(&format!(".backup_{}", stamp));
        let mut counter = 1;
        while backup.exists() {
            backup = self.sibling(&format!(".backup_{}_{}", stamp, counter));
            counter += 1;
        }
        fs::copy(&self.path, &backup)?;
        Ok(backup)
    }

    fn prune_backups(&self) -> Result<()> {
        let backups = self.backups()?;
        let excess = backups.len().saturating_sub(self.backup_count);
        for old in backups.into_iter().take(excess) {
            fs::remove_file(&old)?;
            debug!("Removed old profile backup {}", old.display());
        }
        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}
