use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use thiserror::Error;

/// Why a requested fragment was refused. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("traversal attempt")]
    TraversalAttempt,
    #[error("absolute path rejected")]
    AbsolutePathRejected,
    #[error("path outside root")]
    OutsideRoot,
}

impl Denial {
    pub fn code(&self) -> &'static str {
        match self {
            Denial::TraversalAttempt => "TraversalAttempt",
            Denial::AbsolutePathRejected => "AbsolutePathRejected",
            Denial::OutsideRoot => "OutsideRoot",
        }
    }
}

/// Maps untrusted path fragments onto files under a fixed root.
///
/// Resolution is purely lexical: it never touches the filesystem, so the same
/// fragment always yields the same outcome for the same root. Symlinks are the
/// caller's business (see `files::open_within_root`).
#[derive(Debug, Clone)]
pub struct SafeFileResolver {
    root: PathBuf,
    // root plus a trailing separator, used for the containment test
    prefix: String,
}

impl SafeFileResolver {
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root: PathBuf = root.into();
        if !root.is_absolute() {
            anyhow::bail!("resolver root must be absolute: {}", root.display());
        }
        let root: PathBuf = root.components().collect();
        let mut prefix = root.to_string_lossy().into_owned();
        if !prefix.ends_with(MAIN_SEPARATOR) {
            prefix.push(MAIN_SEPARATOR);
        }
        Ok(Self { root, prefix })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, raw: &str) -> Result<PathBuf, Denial> {
        if raw.contains('\0') {
            return Err(Denial::TraversalAttempt);
        }
        if raw.contains("../") || segments(raw).any(|s| s == "..") {
            return Err(Denial::TraversalAttempt);
        }
        if looks_absolute(raw) {
            return Err(Denial::AbsolutePathRejected);
        }

        let normalized = normalize(raw)?;
        for component in normalized.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => return Err(Denial::TraversalAttempt),
                _ => return Err(Denial::AbsolutePathRejected),
            }
        }

        let candidate = self.root.join(&normalized);
        if !self.contains(&candidate) {
            return Err(Denial::OutsideRoot);
        }
        Ok(candidate)
    }

    /// True when `path` is a strict descendant of the root. Compares against
    /// the root with a trailing separator so `/srv/cdn-evil` never passes for
    /// `/srv/cdn`.
    pub fn contains(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        path.len() > self.prefix.len() && path.starts_with(self.prefix.as_str())
    }
}

// Both separators count on every platform so a fragment means the same thing
// wherever the server runs.
fn segments(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == '/' || c == '\\')
}

fn looks_absolute(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }
    let p = Path::new(raw);
    p.is_absolute() || p.has_root()
}

fn normalize(raw: &str) -> Result<PathBuf, Denial> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in segments(raw) {
        match seg {
            "" | "." => {}
            // unreachable from `resolve`, which refuses `..` up front
            ".." => {
                if parts.pop().is_none() {
                    return Err(Denial::TraversalAttempt);
                }
            }
            s => parts.push(s),
        }
    }
    Ok(parts.into_iter().collect())
}
