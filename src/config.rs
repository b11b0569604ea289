use crate::engine::{EngineConfig, MAX_MOVETIME};
use crate::error::{HarnessError, Result};
use crate::instrumentation::DiscoveryOptions;
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_ENV: &str = "CESTT_MANIFEST";
pub const ADVANCED_ENV: &str = "CESTT_ADVANCED";
pub const DEFAULT_TESTS: &str = "uci,burst,threads,multipv";

/// Run settings: built-in defaults, then the TOML file, then CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-analysis time budget in seconds
    pub movetime: f64,
    /// Endurance run length in seconds
    pub duration: u64,
    /// Positions analysed by the burst test
    pub burst: usize,
    pub threads_max: u32,
    pub instances: usize,
    pub per_instance: usize,
    pub fuzz_seconds: u64,
    /// Comma-separated test selection, or `auto`
    pub tests: String,
    /// Base engine session settings
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            movetime: 0.1,
            duration: 60,
            burst: 200,
            threads_max: 8,
            instances: 4,
            per_instance: 50,
            fuzz_seconds: 10,
            tests: DEFAULT_TESTS.to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl Settings {
    pub fn default_config_dir() -> Result<PathBuf> {
        ProjectDirs::from("dev", "cestt", "cestt")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| HarnessError::Config("could not determine config directory".to_string()))
    }

    pub fn default_config_file() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load settings. An explicit path must exist; the default file is
    /// optional and never created.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_config_file() {
                Ok(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            HarnessError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_toml(&content)
            .map_err(|err| HarnessError::Config(format!("{}: {}", path.display(), err)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<()> {
        let max_movetime = MAX_MOVETIME.as_secs_f64();
        if !self.movetime.is_finite() || self.movetime <= 0.0 || self.movetime > max_movetime {
            return Err(HarnessError::Config(format!(
                "movetime must be between 0 and {} seconds, got {}",
                max_movetime, self.movetime
            )));
        }
        if self.threads_max == 0 {
            return Err(HarnessError::Config("threads_max must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Discovery overrides taken from `CESTT_MANIFEST` and `CESTT_ADVANCED`
pub fn discovery_from_env() -> DiscoveryOptions {
    discovery_from_lookup(|name| std::env::var(name).ok())
}

pub fn discovery_from_lookup<F>(lookup: F) -> DiscoveryOptions
where
    F: Fn(&str) -> Option<String>,
{
    let manifest_override = lookup(MANIFEST_ENV)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(|raw| expand_home(&raw));
    let force_advanced = lookup(ADVANCED_ENV).is_some_and(|raw| !raw.trim().is_empty());

    DiscoveryOptions {
        manifest_override,
        force_advanced,
    }
}

fn expand_home(raw: &str) -> PathBuf {
    let home = || BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    if raw == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
movetime = 0.25
tests = "uci,fuzz"

[engine]
hash_mb = 64
args = ["--uci"]

[engine.options]
Contempt = "10"
"#,
        )
        .unwrap();
        assert_eq!(settings.movetime, 0.25);
        assert_eq!(settings.tests, "uci,fuzz");
        assert_eq!(settings.burst, 200);
        assert_eq!(settings.engine.hash_mb, 64);
        assert_eq!(settings.engine.threads, 1);
        assert_eq!(settings.engine.args, vec!["--uci"]);
        assert_eq!(settings.engine.options.get("Contempt").map(String::as_str), Some("10"));
    }

    #[test]
    fn test_validate_rejects_bad_movetime() {
        let settings = Settings {
            movetime: 0.0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(HarnessError::Config(_))));
        let huge = Settings {
            movetime: 1e30,
            ..Settings::default()
        };
        assert!(matches!(huge.validate(), Err(HarnessError::Config(_))));
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/cestt.toml"))).unwrap_err();
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_discovery_from_lookup() {
        let options = discovery_from_lookup(|name| match name {
            MANIFEST_ENV => Some("/tmp/hooks.json".to_string()),
            ADVANCED_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(options.manifest_override, Some(PathBuf::from("/tmp/hooks.json")));
        assert!(!options.force_advanced);

        let options = discovery_from_lookup(|name| (name == ADVANCED_ENV).then(|| "1".to_string()));
        assert_eq!(options.manifest_override, None);
        assert!(options.force_advanced);
    }
}
