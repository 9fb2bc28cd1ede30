use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Result of sanitizing an archive entry path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: PathBuf,
    /// Entry path relative to the destination, `..` and `.` removed.
    pub relative: PathBuf,
    pub resolved: PathBuf,
}

/// Resolve an entry name against `base`, refusing anything that would land
/// outside of it.
///
/// `base` is expected to be absolute and already normalized (the extractor
/// passes the canonical destination). Absolute entry names, drive prefixes and
/// `..` components that climb above the entry root are all rejected as
/// [`Error::PathTraversal`].
pub fn sanitize_entry_path(entry_path: impl AsRef<Path>, base: impl AsRef<Path>) -> Result<SanitizedPath> {
    let entry_path = entry_path.as_ref();
    let base = base.as_ref();

    let traversal = || Error::PathTraversal {
        entry: entry_path.to_path_buf(),
        resolved: lexical_join(base, entry_path),
    };

    let mut relative = PathBuf::new();
    for component in entry_path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    let resolved = base.join(&relative);
    if !resolved.starts_with(base) {
        return Err(traversal());
    }

    Ok(SanitizedPath {
        original: entry_path.to_path_buf(),
        relative,
        resolved,
    })
}

/// Check where a symlink stored at `link` would point, relative to the link's
/// own directory, and reject it unless it stays inside `base`.
///
/// Returns the lexically resolved absolute target.
pub fn sanitize_symlink_target(
    target: impl AsRef<Path>,
    link: impl AsRef<Path>,
    base: impl AsRef<Path>,
) -> Result<PathBuf> {
    let target = target.as_ref();
    let link = link.as_ref();
    let base = base.as_ref();

    let escape = |resolved: PathBuf| Error::SymlinkEscape {
        link: link.to_path_buf(),
        target: resolved,
    };

    if target.has_root() || matches!(target.components().next(), Some(Component::Prefix(_))) {
        return Err(escape(target.to_path_buf()));
    }

    let parent = link.parent().unwrap_or(base);
    let resolved = lexical_join(parent, target);
    if !resolved.starts_with(base) {
        return Err(escape(resolved));
    }
    Ok(resolved)
}

/// Make sure no existing path component between `base` and `path` is a link
/// that leads out of `base`.
///
/// Walks up to the nearest ancestor of `path` that exists and compares its
/// canonical form with `canonical_base`. The final component is not followed:
/// writers replace whatever sits there.
pub fn ensure_contained(path: &Path, canonical_base: &Path, entry: &Path) -> Result<()> {
    let mut ancestor = path.parent();
    while let Some(dir) = ancestor {
        if dir.exists() {
            let canonical = dir.canonicalize().map_err(Error::write(dir))?;
            if !canonical.starts_with(canonical_base) {
                return Err(Error::PathTraversal {
                    entry: entry.to_path_buf(),
                    resolved: canonical.join(path.strip_prefix(dir).unwrap_or(path)),
                });
            }
            return Ok(());
        }
        ancestor = dir.parent();
    }
    Ok(())
}

/// Where `path` really lives once existing links among its ancestors are
/// followed. The last component is kept as-is.
///
/// The nearest ancestor present on disk is canonicalized and the missing
/// components are appended unchanged.
pub fn physical_path(path: &Path) -> Result<PathBuf> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Ok(path.to_path_buf());
    };
    let mut existing = parent;
    loop {
        if existing.symlink_metadata().is_ok() {
            let canonical = existing.canonicalize().map_err(Error::write(existing))?;
            let missing = parent.strip_prefix(existing).unwrap_or(Path::new(""));
            return Ok(canonical.join(missing).join(name));
        }
        match existing.parent() {
            Some(up) => existing = up,
            None => return Ok(path.to_path_buf()),
        }
    }
}

/// Join and collapse `.`/`..` without touching the filesystem. `..` at the
/// root is dropped, so the result may leave `base`.
fn lexical_join(base: &Path, path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_base_path() -> &'static Path {
        if cfg!(windows) {
            Path::new("C:/Users/me/LogViewer")
        } else {
            Path::new("/home/me/LogViewer")
        }
    }

    #[cfg(unix)]
    #[test]
    fn physical_path_follows_linked_parents() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(".", base.join("s")).unwrap();

        let physical = physical_path(&base.join("s/s/s/z")).unwrap();
        assert_eq!(physical, base.join("z"));

        let missing = physical_path(&base.join("s/new/dir/z")).unwrap();
        assert_eq!(missing, base.join("new/dir/z"));
    }

    #[test]
    fn plain_entry_resolves_inside() {
        let result = sanitize_entry_path("elasticsearch-7.17.20/bin/elasticsearch", test_base_path()).unwrap();
        assert_eq!(result.relative, Path::new("elasticsearch-7.17.20/bin/elasticsearch"));
        assert!(result.resolved.starts_with(test_base_path()));
    }

    #[test]
    fn inner_parent_dirs_are_collapsed() {
        let result = sanitize_entry_path("a/./b/../c.txt", test_base_path()).unwrap();
        assert_eq!(result.relative, Path::new("a/c.txt"));
    }

    #[test]
    fn leading_parent_dirs_rejected() {
        let result = sanitize_entry_path("../../evil", test_base_path());
        match result {
            Err(Error::PathTraversal { entry, resolved }) => {
                assert_eq!(entry, Path::new("../../evil"));
                assert!(!resolved.starts_with(test_base_path()));
            }
            other => panic!("expected traversal, got {other:?}"),
        }
    }

    #[test]
    fn climbing_out_midway_rejected() {
        let result = sanitize_entry_path("a/../../evil", test_base_path());
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn absolute_entry_rejected() {
        let malicious = if cfg!(windows) { "C:\\etc\\passwd" } else { "/etc/passwd" };
        let result = sanitize_entry_path(malicious, test_base_path());
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn current_dir_entry_is_base() {
        let result = sanitize_entry_path("./", test_base_path()).unwrap();
        assert_eq!(result.resolved, test_base_path());
        assert!(result.relative.as_os_str().is_empty());
    }

    #[test]
    fn sibling_symlink_target_allowed() {
        let link = test_base_path().join("jdk/lib/libjli.so");
        let resolved = sanitize_symlink_target("../libexec/libjli.so.1", &link, test_base_path()).unwrap();
        assert_eq!(resolved, test_base_path().join("jdk/libexec/libjli.so.1"));
    }

    #[test]
    fn escaping_symlink_target_rejected() {
        let link = test_base_path().join("escape");
        let result = sanitize_symlink_target("../../outside", &link, test_base_path());
        assert!(matches!(result, Err(Error::SymlinkEscape { .. })));
    }

    #[test]
    fn absolute_symlink_target_rejected() {
        let target = if cfg!(windows) { "C:\\Windows" } else { "/etc/passwd" };
        let link = test_base_path().join("bin/link");
        let result = sanitize_symlink_target(target, &link, test_base_path());
        assert!(matches!(result, Err(Error::SymlinkEscape { .. })));
    }

    #[test]
    fn lexical_join_drops_excess_parents() {
        let joined = lexical_join(Path::new("/a/b"), Path::new("../../../c"));
        assert_eq!(joined, Path::new("/c"));
    }

    #[test]
    fn contained_when_nothing_exists_yet() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let path = base.join("x/y/z.txt");
        ensure_contained(&path, &base, Path::new("x/y/z.txt")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn link_out_of_base_detected() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(outside.path(), base.join("trap")).unwrap();

        let path = base.join("trap/payload.txt");
        let result = ensure_contained(&path, &base, Path::new("trap/payload.txt"));
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }
}
