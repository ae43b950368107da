use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::warn;

use crate::search::SearchConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment override for the backend base URL; takes precedence over the
/// config file.
pub const API_URL_ENV: &str = "RISK_DESK_API_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub search: SearchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            search: SearchConfig::default(),
        }
    }
}

impl Settings {
    fn apply_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let Some((k, v)) = line.split_once('=') else {
            return;
        };
        let (k, v) = (k.trim(), v.trim());

        match k {
            "api_base_url" => {
                if !v.is_empty() {
                    self.api_base_url = v.to_string();
                }
            }
            "search_min_term_len" => {
                if let Ok(n) = v.parse::<usize>() {
                    self.search.min_term_len = n.max(1);
                }
            }
            "search_max_results" => {
                if let Ok(n) = v.parse::<usize>() {
                    self.search.max_results = n.clamp(1, 50);
                }
            }
            _ => {}
        }
    }
}

pub struct SettingsManager {
    base_dir: PathBuf,
    cfg_path: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Loads settings from the per-user config dir, writing the defaults on
    /// first run, then applies the environment override.
    pub fn init() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "risk_desk")
            .context("no home directory for config storage")?;
        let mut mgr = Self::with_base_dir(dirs.config_dir().to_path_buf());
        if !mgr.cfg_path.exists() {
            mgr.save_to_disk();
        }
        Ok(mgr)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        let cfg_path = base_dir.join("settings.conf");
        let mut mgr = Self {
            base_dir,
            cfg_path,
            settings: Settings::default(),
        };
        mgr.load_from_disk();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                mgr.settings.api_base_url = url.trim().to_string();
            }
        }
        mgr
    }

    pub fn settings(&self) -> Settings {
        self.settings.clone()
    }

    fn load_from_disk(&mut self) {
        if !self.cfg_path.exists() {
            return;
        }
        let Ok(f) = File::open(&self.cfg_path) else {
            return;
        };
        for line in BufReader::new(f).lines().map_while(|l| l.ok()) {
            self.settings.apply_line(&line);
        }
    }

    fn save_to_disk(&self) {
        if let Err(e) = create_dir_all(&self.base_dir) {
            warn!("failed to create {}: {e}", self.base_dir.display());
            return;
        }

        let tmp = self.base_dir.join("settings.conf.tmp");
        let mut f = match File::create(&tmp) {
            Ok(f) => f,
            Err(e) => {
                warn!("failed to write {}: {e}", tmp.display());
                return;
            }
        };

        let _ = writeln!(f, "# risk_desk settings");
        let _ = writeln!(f, "api_base_url={}", self.settings.api_base_url);
        let _ = writeln!(f, "search_min_term_len={}", self.settings.search.min_term_len);
        let _ = writeln!(f, "search_max_results={}", self.settings.search.max_results);

        // Atomic-ish replace
        let _ = std::fs::rename(tmp, &self.cfg_path);
    }
}
