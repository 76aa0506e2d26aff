use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, VcsError};
use crate::traits::{CodeFetcher, CodeSource};

const KEY_FILE_NAME: &str = "berth_deploy_key";

/// Fetches code with the `git` command line client.
pub struct GitFetcher {
    target_dir: PathBuf,
    ssh_dir: PathBuf,
}

impl GitFetcher {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ssh_dir: PathBuf::from("/root/.ssh"),
        }
    }

    pub fn with_ssh_dir(mut self, ssh_dir: impl Into<PathBuf>) -> Self {
        self.ssh_dir = ssh_dir.into();
        self
    }

    fn key_path(&self) -> PathBuf {
        self.ssh_dir.join(KEY_FILE_NAME)
    }

    /// `GIT_SSH_COMMAND` pinning the installed deploy key, if there is one.
    fn ssh_command(&self) -> Option<String> {
        let key_path = self.key_path();
        key_path.exists().then(|| {
            format!(
                "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
                key_path.display()
            )
        })
    }

    async fn run_git(&self, args: &[&str], cwd: &Path) -> Result<String> {
        debug!("Running git {:?} in {:?}", args, cwd);

        let mut command = Command::new("git");
        command.args(args).current_dir(cwd);
        if let Some(ssh_command) = self.ssh_command() {
            command.env("GIT_SSH_COMMAND", ssh_command);
        }

        let output = command.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VcsError::CommandFailed(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CodeFetcher for GitFetcher {
    async fn install_repository_key(&self, key: &str) -> Result<()> {
        if !key.contains("PRIVATE KEY") {
            return Err(VcsError::InvalidKey(
                "expected a PEM/OpenSSH private key".to_string(),
            ));
        }

        fs::create_dir_all(&self.ssh_dir).await?;
        let key_path = self.key_path();

        // ssh refuses keys without a trailing newline
        let mut contents = key.trim_end().to_string();
        contents.push('\n');

        // Created owner-only, and tightened before writing if it already existed
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&key_path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
        }
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;

        info!(path = %key_path.display(), "Repository key installed");
        Ok(())
    }

    async fn fetch(&self, source: &CodeSource) -> Result<PathBuf> {
        let target = self
            .target_dir
            .to_str()
            .ok_or_else(|| VcsError::InvalidPath(self.target_dir.display().to_string()))?;

        if self.target_dir.exists() {
            fs::remove_dir_all(&self.target_dir).await?;
        }
        let parent = match self.target_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await?;

        let mut args = vec!["clone", "--depth=1", "--single-branch"];
        if let Some(reference) = source.reference.as_deref() {
            args.extend(["--branch", reference]);
        }
        args.extend([source.url.as_str(), target]);

        info!(url = %source.url, reference = ?source.reference, target = %target, "Fetching code");
        self.run_git(&args, &parent).await?;

        Ok(self.target_dir.clone())
    }
}
