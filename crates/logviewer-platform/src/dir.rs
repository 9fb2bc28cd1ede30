use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub fn user_home() -> Result<PathBuf> {
    home::home_dir()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(Error::HomeNotFound)
}

/// Directory holding the running executable, where bundled archives live.
pub fn executable_dir() -> Result<PathBuf> {
    let exe = env::current_exe()?;
    Ok(exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_dir_is_absolute() {
        let dir = executable_dir().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.is_dir());
    }

    #[test]
    fn user_home_is_not_empty() {
        if let Ok(home) = user_home() {
            assert!(!home.as_os_str().is_empty());
        }
    }
}
