use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub root: Root,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Root {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    #[serde(default = "default_true")]
    pub confine_symlinks: bool,
}
fn default_root_dir() -> PathBuf { PathBuf::from("cdn") }
fn default_true() -> bool { true }

impl Default for Root {
    fn default() -> Self {
        Self { root_dir: default_root_dir(), confine_symlinks: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub route_shape: RouteShape,
}
fn default_bind_addr() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_base_path() -> String { "/cdn".to_string() }

impl Default for Server {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            base_path: default_base_path(),
            route_shape: RouteShape::default(),
        }
    }
}

/// How the file fragment is taken from the request path.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteShape {
    /// Everything after the base path, separators included.
    #[default]
    Remainder,
    /// Exactly one path segment after the base path.
    Segment,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Log {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    /// Like `load`, but a missing file means "all defaults".
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.root.root_dir.is_dir() {
            anyhow::bail!("root_dir does not exist or is not a directory: {}", self.root.root_dir.display());
        }
        let base = &self.server.base_path;
        if !base.starts_with('/') { anyhow::bail!("base_path must start with '/': {base}"); }
        if base.len() < 2 || base.ends_with('/') { anyhow::bail!("base_path must name a segment and not end with '/': {base}"); }
        Ok(())
    }
}

/// Absolute, symlink-free form of the configured root. Relative roots are
/// taken from the working directory.
pub fn canonical_root(root: &Path) -> anyhow::Result<PathBuf> {
    let abs = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir().context("reading working directory")?.join(root)
    };
    let c = dunce::canonicalize(&abs).with_context(|| format!("canonicalizing {}", abs.display()))?;
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.root.root_dir, PathBuf::from("cdn"));
        assert!(cfg.root.confine_symlinks);
        assert_eq!(cfg.server.base_path, "/cdn");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.route_shape, RouteShape::Remainder);
        assert_eq!(cfg.log.format, LogFormat::Json);
    }

    #[test]
    fn loads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cdn-valet.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[root]\nroot_dir = {:?}\nconfine_symlinks = false\n\n[server]\nport = 9000\nbase_path = \"/static\"\nroute_shape = \"segment\"\n\n[log]\nformat = \"pretty\"",
            tmp.path().display().to_string()
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.root.root_dir, tmp.path());
        assert!(!cfg.root.confine_symlinks);
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.base_path, "/static");
        assert_eq!(cfg.server.route_shape, RouteShape::Segment);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        cfg.validate().unwrap();
    }

    #[test]
    fn loads_json_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cdn-valet.json");
        fs::write(&path, r#"{"server": {"bind_addr": "0.0.0.0", "port": 81}}"#).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0");
        assert_eq!(cfg.server.port, 81);
        assert_eq!(cfg.server.base_path, "/cdn");
    }

    #[test]
    fn missing_default_file_means_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.base_path, "/cdn");
        assert!(Config::load(&tmp.path().join("absent.toml")).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.root.root_dir = tmp.path().join("nope");
        assert!(cfg.validate().is_err());

        cfg.root.root_dir = tmp.path().to_path_buf();
        for base in ["cdn", "/", "/cdn/"] {
            cfg.server.base_path = base.into();
            assert!(cfg.validate().is_err(), "{base}");
        }
        cfg.server.base_path = "/cdn".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn canonical_root_is_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        let c = canonical_root(tmp.path()).unwrap();
        assert!(c.is_absolute());
        assert!(canonical_root(&tmp.path().join("missing")).is_err());
    }
}
