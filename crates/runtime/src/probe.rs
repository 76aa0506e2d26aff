use berth_core::ContainerState;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

/// Samples the current state of the workload container.
pub trait StateProbe: Send + Sync {
    fn sample(&self) -> ContainerState;

    /// Forget whatever a previous workload left behind.
    fn reset(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reads the label the workload writes into a shared state file.
///
/// Until the workload has written anything the container is `starting`.
#[derive(Debug, Clone)]
pub struct FileStateProbe {
    path: PathBuf,
}

impl FileStateProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateProbe for FileStateProbe {
    fn sample(&self) -> ContainerState {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => ContainerState::Starting,
            Ok(content) => ContainerState::from(content.as_str()),
            Err(e) if e.kind() == ErrorKind::NotFound => ContainerState::Starting,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read container state");
                ContainerState::Starting
            }
        }
    }

    fn reset(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_starting() {
        let temp_dir = TempDir::new().unwrap();
        let probe = FileStateProbe::new(temp_dir.path().join("state"));
        assert_eq!(probe.sample(), ContainerState::Starting);
    }

    #[test]
    fn test_reads_label() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state");
        let probe = FileStateProbe::new(&path);

        std::fs::write(&path, "").unwrap();
        assert_eq!(probe.sample(), ContainerState::Starting);

        std::fs::write(&path, "running\n").unwrap();
        assert_eq!(probe.sample(), ContainerState::Running);

        std::fs::write(&path, "complete").unwrap();
        assert!(probe.sample().is_terminal());
    }

    #[test]
    fn test_reset_clears_stale_label() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state");
        let probe = FileStateProbe::new(&path);

        probe.reset().unwrap();
        std::fs::write(&path, "complete").unwrap();
        probe.reset().unwrap();
        assert_eq!(probe.sample(), ContainerState::Starting);
    }
}
