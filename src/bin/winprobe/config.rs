// ── winprobe configuration ────────────────────────────────────────────────────
//
// Reads `%APPDATA%\winprobe\config.json`.  Every field is optional; a missing
// file, a parse failure or an unknown version all yield the defaults.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) version: u32,
    /// `EnvFilter` directive used when `WINPROBE_LOG` is unset.
    pub(crate) log_level: String,
    /// Single-line JSON output.
    pub(crate) compact: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: "warn".to_owned(),
            compact: false,
        }
    }
}

/// `%APPDATA%\winprobe\config.json`, or `None` if `APPDATA` is not set.
pub(crate) fn config_path() -> Option<PathBuf> {
    let appdata = std::env::var_os("APPDATA")?;
    let mut p = PathBuf::from(appdata);
    p.push("winprobe");
    p.push("config.json");
    Some(p)
}

/// Load `path`, or the default location when `None`.
///
/// Runs before logging is set up, so problems are reported after the fact
/// by [`load_reporting`].
pub(crate) fn load(path: Option<&Path>) -> (Config, Option<String>) {
    let path = match path.map(Path::to_path_buf).or_else(config_path) {
        Some(p) => p,
        None => return (Config::default(), None),
    };
    let data = match fs::read(&path) {
        Ok(d) => d,
        // An absent config is the normal case.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return (Config::default(), None),
        Err(e) => return (Config::default(), Some(format!("{}: {e}", path.display()))),
    };
    match parse(&data) {
        Ok(cfg) => (cfg, None),
        Err(why) => (Config::default(), Some(format!("{}: {why}", path.display()))),
    }
}

/// Log a problem found by [`load`] once a subscriber exists.
pub(crate) fn load_reporting(problem: Option<String>) {
    if let Some(problem) = problem {
        warn!(%problem, "ignoring config file");
    }
}

fn parse(data: &[u8]) -> Result<Config, String> {
    let cfg: Config = serde_json::from_slice(data).map_err(|e| e.to_string())?;
    if cfg.version != CONFIG_VERSION {
        return Err(format!("unsupported version {}", cfg.version));
    }
    Ok(cfg)
}

/// Write `cfg` to `path`, creating the parent directory.
pub(crate) fn save(cfg: &Config, path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, cfg).map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = parse(br#"{"version":1}"#).expect("parse");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn fields_override_defaults() {
        let cfg = parse(br#"{"version":1,"log_level":"debug","compact":true}"#).expect("parse");
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.compact);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = parse(br#"{"version":99}"#).unwrap_err();
        assert!(err.contains("99"), "{err}");
    }

    #[test]
    fn broken_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let (cfg, problem) = load(Some(&path));
        assert_eq!(cfg, Config::default());
        assert!(problem.is_some());
    }

    #[test]
    fn absent_file_is_not_a_problem() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, problem) = load(Some(&dir.path().join("none.json")));
        assert_eq!(cfg, Config::default());
        assert!(problem.is_none());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let cfg = Config {
            log_level: "trace".to_owned(),
            compact: true,
            ..Config::default()
        };
        save(&cfg, &path).unwrap();
        let (loaded, problem) = load(Some(&path));
        assert!(problem.is_none());
        assert_eq!(loaded, cfg);
    }
}
