use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;
use crate::error::Error;

/// Prefix of the resource-fork shadow tree macOS adds to zip files.
pub const MACOS_METADATA_PREFIX: &str = "__MACOSX/";

#[derive(Clone)]
pub struct ExtractOptions {
    pub perm_strategy: PermissionStrategy,
    pub skip_prefixes: Vec<String>,
    pub on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            perm_strategy: PermissionStrategy::default(),
            skip_prefixes: vec![MACOS_METADATA_PREFIX.to_string()],
            on_progress: None,
        }
    }
}

impl std::fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("perm_strategy", &self.perm_strategy)
            .field("skip_prefixes", &self.skip_prefixes)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Progress {
    pub entries_processed: usize,
    pub bytes_processed: u64,
    pub current_file: PathBuf,
}

impl ExtractOptions {
    pub fn permission_strategy(mut self, strategy: PermissionStrategy) -> Self {
        self.perm_strategy = strategy;
        self
    }

    pub fn skip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }

    pub fn no_skip_prefixes(mut self) -> Self {
        self.skip_prefixes.clear();
        self
    }

    pub fn on_progress(mut self, callback: Arc<dyn Fn(Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Whether the raw archive name falls under a reserved prefix.
    pub fn is_skipped(&self, raw_name: &str) -> bool {
        let name = raw_name.trim_start_matches("./");
        self.skip_prefixes.iter().any(|prefix| {
            name.starts_with(prefix.as_str()) || name == prefix.trim_end_matches('/')
        })
    }

    pub(crate) fn report(&self, progress: impl FnOnce() -> Progress) {
        if let Some(callback) = &self.on_progress {
            callback(progress());
        }
    }
}

/// How archive mode bits become on-disk permissions.
///
/// Only meaningful on Unix; elsewhere permissions are left to the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PermissionStrategy {
    /// Stored bits as-is. Missing bits fall back to `0o644` / `0o755`.
    #[default]
    Preserve,
    /// Stored bits, widened so owner and group can always read.
    Standard,
    /// Ignore the archive: `0o755` for executables and directories, `0o644` otherwise.
    Owned,
}

impl PermissionStrategy {
    /// Resolve the mode to apply. Directories always keep owner `rwx` so
    /// later entries can be written into them.
    pub fn resolve(self, mode: Option<u32>, is_dir: bool) -> u32 {
        let mode = mode.map(|m| m & 0o7777);
        let default = if is_dir { 0o755 } else { 0o644 };
        let resolved = match self {
            Self::Preserve => mode.unwrap_or(default),
            Self::Standard => match mode {
                Some(m) if m & 0o111 != 0 => m | 0o440,
                Some(m) => m | 0o644,
                None => default,
            },
            Self::Owned => match mode {
                Some(m) if m & 0o111 != 0 => 0o755,
                _ => default,
            },
        };
        if is_dir { resolved | 0o700 } else { resolved }
    }

    #[cfg(unix)]
    pub fn apply_to_path(self, path: &Path, mode: Option<u32>, is_dir: bool) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let resolved = self.resolve(mode, is_dir);
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(resolved))
            .map_err(Error::write(path))
    }

    #[cfg(not(unix))]
    pub fn apply_to_path(self, _path: &Path, _mode: Option<u32>, _is_dir: bool) -> Result<()> {
        Ok(())
    }
}
