use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{HostError, Result};

const KEY_PREFIXES: [&str; 4] = ["ssh-", "ecdsa-", "sk-ssh-", "sk-ecdsa-"];

/// Ensures a login account exists with a given public key installed.
#[async_trait]
pub trait LoginProvisioner: Send + Sync {
    async fn ensure_user(&self, username: &str, public_key: &str) -> Result<()>;
}

/// Provisions local Unix accounts with `useradd` and `authorized_keys`.
pub struct LocalUsers {
    home_root: PathBuf,
    id_bin: PathBuf,
    useradd_bin: PathBuf,
    chown_bin: PathBuf,
}

impl LocalUsers {
    pub fn new() -> Self {
        Self {
            home_root: PathBuf::from("/home"),
            id_bin: PathBuf::from("id"),
            useradd_bin: PathBuf::from("useradd"),
            chown_bin: PathBuf::from("chown"),
        }
    }

    pub fn with_home_root(mut self, home_root: impl Into<PathBuf>) -> Self {
        self.home_root = home_root.into();
        self
    }

    pub fn with_binaries(
        mut self,
        id_bin: impl Into<PathBuf>,
        useradd_bin: impl Into<PathBuf>,
        chown_bin: impl Into<PathBuf>,
    ) -> Self {
        self.id_bin = id_bin.into();
        self.useradd_bin = useradd_bin.into();
        self.chown_bin = chown_bin.into();
        self
    }

    fn validate(username: &str, public_key: &str) -> Result<()> {
        let invalid = |reason: &str| HostError::InvalidUser {
            username: username.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = username.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !first_ok || !rest_ok || username.len() > 32 {
            return Err(invalid("not a valid login name"));
        }

        let key = public_key.trim();
        if key.contains('\n') || !KEY_PREFIXES.iter().any(|p| key.starts_with(p)) {
            return Err(invalid("not a single OpenSSH public key"));
        }

        Ok(())
    }

    async fn user_exists(&self, username: &str) -> bool {
        Command::new(&self.id_bin)
            .args(["-u", username])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn run(bin: &Path, args: &[&str]) -> Result<()> {
        debug!("Running {} {:?}", bin.display(), args);
        let output = Command::new(bin).args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::CommandFailed(format!(
                "{} {} failed: {}",
                bin.display(),
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Append `public_key` to the user's `authorized_keys` unless present.
    async fn install_key(&self, username: &str, public_key: &str) -> Result<bool> {
        let ssh_dir = self.home_root.join(username).join(".ssh");
        let keys_path = ssh_dir.join("authorized_keys");
        fs::create_dir_all(&ssh_dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&ssh_dir, std::fs::Permissions::from_mode(0o700)).await?;
        }

        let existing = match fs::read_to_string(&keys_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let key = public_key.trim();
        let added = !existing.lines().any(|line| line.trim() == key);
        let mut content = existing;
        if added {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(key);
            content.push('\n');
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&keys_path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
        }
        if added {
            file.set_len(0).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
        }

        Ok(added)
    }
}

impl Default for LocalUsers {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoginProvisioner for LocalUsers {
    async fn ensure_user(&self, username: &str, public_key: &str) -> Result<()> {
        Self::validate(username, public_key)?;

        if !self.user_exists(username).await {
            let home = self.home_root.join(username);
            let home = home.to_string_lossy();
            Self::run(
                &self.useradd_bin,
                &["-m", "-d", &home, "-s", "/bin/bash", username],
            )
            .await?;
            info!(username = %username, "Login user created");
        }

        let added = self.install_key(username, public_key).await?;

        let ssh_dir = self.home_root.join(username).join(".ssh");
        let owner = format!("{username}:{username}");
        Self::run(&self.chown_bin, &["-R", &owner, &ssh_dir.to_string_lossy()]).await?;

        debug!(username = %username, key_added = added, "Login user provisioned");
        Ok(())
    }
}
