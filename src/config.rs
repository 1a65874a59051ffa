use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, io::Write, path::PathBuf};

/// Engine tuning. Library consumers pass this directly; the monitor binary
/// loads it from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Detector resample cadence in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Cadence of the drift-correcting enforcement tick, in milliseconds.
    /// 0 disables it.
    #[serde(default = "default_safety_tick_ms")]
    pub safety_tick_ms: u64,
    /// Install the foreground-event accelerator so transitions are caught
    /// ahead of the next poll.
    #[serde(default = "default_foreground_hook")]
    pub foreground_hook: bool,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_safety_tick_ms() -> u64 {
    1200
}

fn default_foreground_hook() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            safety_tick_ms: default_safety_tick_ms(),
            foreground_hook: default_foreground_hook(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Safety tick expressed as a whole number of poll intervals.
    pub(crate) fn safety_ticks(&self) -> Option<u64> {
        if self.safety_tick_ms == 0 {
            return None;
        }
        Some((self.safety_tick_ms / self.poll_interval_ms.max(1)).max(1))
    }
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub cfg_file: PathBuf,
    pub cfg_dir: PathBuf,
    pub log_dir: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let dirs = ProjectDirs::from("com", "Acme", "Zdesk")
        .context("Failed to determine project directories")?;
    let cfg_dir = dirs.config_dir().to_path_buf();
    let cfg_file = cfg_dir.join("zdesk.json");
    let log_dir = dirs.data_local_dir().join("logs");
    Ok(Paths {
        cfg_file,
        cfg_dir,
        log_dir,
    })
}

pub fn load_or_default() -> Result<(EngineConfig, Paths)> {
    let paths = project_paths()?;
    fs::create_dir_all(&paths.cfg_dir).ok();
    fs::create_dir_all(&paths.log_dir).ok();
    let cfg = match fs::read_to_string(&paths.cfg_file) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => EngineConfig::default(),
    };
    Ok((cfg, paths))
}

pub fn save_atomic(cfg: &EngineConfig, paths: &Paths) -> Result<()> {
    fs::create_dir_all(&paths.cfg_dir).ok();
    let tmp = paths.cfg_file.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(cfg)?;
    {
        let mut f = fs::File::create(&tmp).context("create temp cfg")?;
        f.write_all(&data).context("write temp cfg")?;
        f.sync_all().ok();
    }
    // Best-effort atomic replace.
    fs::rename(&tmp, &paths.cfg_file).context("rename temp to final")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_cadence() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.safety_tick_ms, 1200);
        assert!(cfg.foreground_hook);
    }

    #[test]
    fn safety_tick_rounds_to_polls() {
        let cfg = EngineConfig {
            poll_interval_ms: 250,
            safety_tick_ms: 1200,
            foreground_hook: true,
        };
        assert_eq!(cfg.safety_ticks(), Some(4));
        let off = EngineConfig {
            safety_tick_ms: 0,
            ..cfg
        };
        assert_eq!(off.safety_ticks(), None);
        let tight = EngineConfig {
            poll_interval_ms: 500,
            safety_tick_ms: 100,
            foreground_hook: true,
        };
        // Never less than one poll.
        assert_eq!(tight.safety_ticks(), Some(1));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.poll_interval_ms, 250);
    }
}
