use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::Path;

use logviewer_platform::EnvSpec;
use logviewer_platform::command::Command;
use logviewer_platform::env::PathModifier;

use crate::error::{ProvisionError, Result};

/// Environment handed to launched components.
///
/// Built per run from the platform's [`EnvSpec`] and applied to each child
/// command. The orchestrator's own environment is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    vars: BTreeMap<String, OsString>,
}

impl LaunchEnv {
    /// Derive from `spec` for an install rooted at `install_root`.
    ///
    /// `base_path` is the PATH the additions are appended to, normally
    /// [`PathModifier::from_env`].
    pub fn derive(spec: &EnvSpec, install_root: &Path, base_path: PathModifier) -> Result<Self> {
        let mut vars = BTreeMap::new();

        if let Some(home) = &spec.runtime_home {
            let path = install_root.join(&home.path);
            if !path.is_dir() {
                return Err(ProvisionError::EnvironmentConfig(format!(
                    "{} points at {}, which does not exist",
                    home.var,
                    path.display()
                )));
            }
            vars.insert(home.var.clone(), path.into_os_string());
        }

        if !spec.path_additions.is_empty() {
            let path = spec
                .path_additions
                .iter()
                .fold(base_path, |path, entry| path.append(entry.resolve(install_root)));
            let value = path
                .build()
                .map_err(|e| ProvisionError::EnvironmentConfig(e.to_string()))?;
            vars.insert("PATH".to_string(), value);
        }

        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(key).map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_os_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn apply(&self, command: Command) -> Command {
        command.envs(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logviewer_platform::{PathEntry, RuntimeHome};
    use std::path::PathBuf;

    fn runtime_spec() -> EnvSpec {
        EnvSpec {
            runtime_home: Some(RuntimeHome {
                var: "JAVA_HOME".into(),
                path: PathBuf::from("jdk/Contents/Home"),
            }),
            path_additions: Vec::new(),
        }
    }

    #[test]
    fn empty_spec_adds_nothing() {
        let env = LaunchEnv::derive(&EnvSpec::default(), Path::new("/x"), PathModifier::default()).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn runtime_home_must_exist() {
        let root = tempfile::tempdir().unwrap();
        let err = LaunchEnv::derive(&runtime_spec(), root.path(), PathModifier::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::EnvironmentConfig(_)));
    }

    #[test]
    fn runtime_home_points_into_install() {
        let root = tempfile::tempdir().unwrap();
        let home = root.path().join("jdk/Contents/Home");
        std::fs::create_dir_all(&home).unwrap();

        let env = LaunchEnv::derive(&runtime_spec(), root.path(), PathModifier::default()).unwrap();
        assert_eq!(env.get("JAVA_HOME"), Some(home.as_os_str()));
        assert_eq!(env.get("PATH"), None);
    }

    #[test]
    fn path_additions_are_appended() {
        let spec = EnvSpec {
            runtime_home: None,
            path_additions: vec![
                PathEntry::Fixed(PathBuf::from("/opt/java/bin")),
                PathEntry::UnderInstall(PathBuf::from("tools")),
            ],
        };
        let base = PathModifier::from_paths([PathBuf::from("/usr/bin")]);

        let env = LaunchEnv::derive(&spec, Path::new("/srv/lv"), base).unwrap();
        let path: Vec<PathBuf> = std::env::split_paths(env.get("PATH").unwrap()).collect();
        assert_eq!(
            path,
            vec![
                PathBuf::from("/usr/bin"),
                PathBuf::from("/opt/java/bin"),
                PathBuf::from("/srv/lv/tools"),
            ]
        );
    }

    #[test]
    fn apply_sets_child_variables_only() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("jdk/Contents/Home")).unwrap();
        let env = LaunchEnv::derive(&runtime_spec(), root.path(), PathModifier::default()).unwrap();

        let command = env.apply(Command::new("true"));
        assert!(command.get_env("JAVA_HOME").is_some());
        assert!(std::env::var_os("JAVA_HOME").is_none_or(|v| v != root.path().join("jdk/Contents/Home")));
    }
}
