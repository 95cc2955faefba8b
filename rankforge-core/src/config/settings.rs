//! Tool-level settings for Rankforge.
//!
//! Uses `figment` for layered settings: defaults -> user file -> workspace
//! file -> environment -> explicit overrides. Settings say where the YAML
//! experiment configs live and where run artifacts go; they are separate
//! from the experiment configuration itself.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Workspace-local settings file name.
pub const SETTINGS_FILE: &str = "rankforge.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root holding `basic.yaml` and `model/`, relative to the workspace.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Where `prepare` writes run manifests, relative to the workspace.
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,
    #[serde(default)]
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            manifest_dir: default_manifest_dir(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// Config root resolved against `workspace` when relative.
    pub fn config_root(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.config_dir)
    }

    pub fn manifest_root(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.manifest_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default stderr filter when no `-v`/`-q` flag is given.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write JSON logs to the project data directory.
    #[serde(default = "default_true")]
    pub json_file: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_file: true,
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(super::resolver::DEFAULT_CONFIG_ROOT)
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from(".rankforge/runs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Per-user project directories (`dev.rankforge.rankforge`).
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "rankforge", "rankforge")
}

/// Load settings from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RANKFORGE_`, nested with `__`)
/// 3. Workspace settings (`rankforge.toml`)
/// 4. User settings (`<config dir>/settings.toml`)
/// 5. Built-in defaults
pub fn load_settings(
    workspace: Option<&Path>,
    overrides: Option<&Settings>,
) -> Result<Settings, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(Settings::default()));

    if let Some(dirs) = project_dirs() {
        let user_settings = dirs.config_dir().join("settings.toml");
        if user_settings.exists() {
            figment = figment.merge(Toml::file(&user_settings));
        }
    }

    if let Some(ws) = workspace {
        let ws_settings = ws.join(SETTINGS_FILE);
        if ws_settings.exists() {
            figment = figment.merge(Toml::file(&ws_settings));
        }
    }

    // RANKFORGE_CONFIG_DIR, RANKFORGE_LOG__LEVEL, ...
    figment = figment.merge(Env::prefixed("RANKFORGE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Whether a workspace settings file exists.
pub fn settings_exist(workspace: &Path) -> bool {
    workspace.join(SETTINGS_FILE).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.config_dir, PathBuf::from("config"));
        assert_eq!(settings.manifest_dir, PathBuf::from(".rankforge/runs"));
        assert_eq!(settings.log.level, "info");
        assert!(settings.log.json_file);
    }

    #[test]
    fn test_settings_toml_roundtrip() {
        let settings = Settings::default();
        let encoded = toml::to_string(&settings).unwrap();
        let decoded: Settings = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let decoded: Settings = toml::from_str("config_dir = \"experiments\"\n").unwrap();
        assert_eq!(decoded.config_dir, PathBuf::from("experiments"));
        assert_eq!(decoded.log, LogSettings::default());
    }

    #[test]
    fn test_load_settings_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"
config_dir = "experiments/config"

[log]
level = "debug"
json_file = false
"#,
        )
        .unwrap();

        let settings = load_settings(Some(dir.path()), None).unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("experiments/config"));
        assert_eq!(settings.log.level, "debug");
        assert!(!settings.log.json_file);
        assert!(settings_exist(dir.path()));
    }

    #[test]
    fn test_load_settings_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "config_dir = \"a\"\n").unwrap();

        let overrides = Settings {
            config_dir: PathBuf::from("b"),
            ..Settings::default()
        };
        let settings = load_settings(Some(dir.path()), Some(&overrides)).unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("b"));
    }

    #[test]
    fn test_config_root_joins_workspace() {
        let settings = Settings::default();
        assert_eq!(
            settings.config_root(Path::new("/ws")),
            PathBuf::from("/ws/config")
        );

        let absolute = Settings {
            config_dir: PathBuf::from("/etc/rankforge"),
            ..Settings::default()
        };
        assert_eq!(
            absolute.config_root(Path::new("/ws")),
            PathBuf::from("/etc/rankforge")
        );
    }

    #[test]
    fn test_malformed_workspace_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "config_dir = [1, 2]\n").unwrap();
        assert!(load_settings(Some(dir.path()), None).is_err());
        assert!(!settings_exist(&dir.path().join("nested")));
    }
}
