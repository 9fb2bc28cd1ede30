use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::Result;

fn paths_equal(p1: &Path, p2: &Path) -> bool {
    fn normalize(p: &Path) -> String {
        p.to_string_lossy().trim_end_matches(['/', '\\']).to_string()
    }
    if cfg!(windows) {
        normalize(p1).eq_ignore_ascii_case(&normalize(p2))
    } else {
        normalize(p1) == normalize(p2)
    }
}

/// Builds a PATH value for a child process without touching our own environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathModifier {
    paths: Vec<PathBuf>,
}

impl PathModifier {
    /// Start from the current process PATH.
    pub fn from_env() -> Self {
        Self::from_paths(path_env().unwrap_or_default())
    }

    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn append(mut self, path: PathBuf) -> Self {
        if !self.contains(&path) {
            self.paths.push(path);
        }
        self
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| paths_equal(p, path))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn build(&self) -> Result<OsString> {
        Ok(env::join_paths(&self.paths)?)
    }
}

pub fn path_env() -> Option<Vec<PathBuf>> {
    env::var_os("PATH").map(|val| env::split_paths(&val).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifier() -> PathModifier {
        PathModifier::from_paths([PathBuf::from("/usr/bin"), PathBuf::from("/bin")])
    }

    #[test]
    fn append_adds_once() {
        let m = modifier()
            .append(PathBuf::from("/opt/jdk/bin"))
            .append(PathBuf::from("/opt/jdk/bin/"));
        assert_eq!(m.paths().len(), 3);
        assert_eq!(m.paths()[2], PathBuf::from("/opt/jdk/bin"));
    }

    #[test]
    fn build_joins_with_platform_separator() {
        let built = modifier().build().unwrap();
        let split: Vec<PathBuf> = env::split_paths(&built).collect();
        assert_eq!(split, modifier().paths());
    }

    #[cfg(unix)]
    #[test]
    fn build_rejects_separator_inside_entry() {
        let m = PathModifier::from_paths([PathBuf::from("/a:b")]);
        assert!(m.build().is_err());
    }

    #[test]
    fn from_env_does_not_modify_process() {
        let before = env::var_os("PATH");
        let _ = PathModifier::from_env().append(PathBuf::from("/logviewer/extra")).build();
        assert_eq!(env::var_os("PATH"), before);
    }
}
