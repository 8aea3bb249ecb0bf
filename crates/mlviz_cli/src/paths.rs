//! Cross-platform application paths

use std::path::{Path, PathBuf};

use crate::error::CliError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, CliError> {
        let base = dirs::config_dir().ok_or(CliError::NoConfigDir)?;
        Ok(Self::from_dir(base.join("mlviz")))
    }

    pub fn from_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_config_dir() {
        let paths = AppPaths::from_dir("/tmp/mlviz-test");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/mlviz-test/config.json"));
        assert_eq!(paths.config_dir(), Path::new("/tmp/mlviz-test"));
    }
}
