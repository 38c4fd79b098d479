use std::path::{Path, PathBuf};

pub mod dirs {
    pub const DB: &str = "db";
    pub const LOGS: &str = "logs";
}

pub mod filenames {
    pub const DB: &str = "volumeflow.db";
    pub const LOG_PREFIX: &str = "volumeflow.log";
}

/// On-disk layout under the runtime home directory.
///
/// ```text
/// <home>/
/// ├── db/volumeflow.db
/// └── logs/volumeflow.log.YYYY-MM-DD
/// ```
#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::DB)
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir().join(filenames::DB)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS)
    }

    /// Create every directory the runtime writes into.
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.home_dir)?;
        std::fs::create_dir_all(self.db_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_creates_directories() {
        let temp = tempfile::tempdir().unwrap();
        let layout = FilesystemLayout::new(temp.path().join("home"));
        layout.prepare().unwrap();

        assert!(layout.db_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert_eq!(layout.db_path().file_name().unwrap(), "volumeflow.db");
    }
}
