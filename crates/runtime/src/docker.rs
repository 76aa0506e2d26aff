use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, RuntimeError};
use crate::types::{ContainerHandle, ContainerRequest, ContainerRuntime, CODE_MOUNT};

const RUNNING_FORMAT: &str = "{{.State.Running}}";
const ADDRESS_FORMAT: &str = "{{range .NetworkSettings.Networks}}{{.IPAddress}}{{end}}";

/// Container runtime backed by the `docker` and `iptables` command line tools.
pub struct DockerCli {
    docker_bin: PathBuf,
    iptables_bin: PathBuf,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            docker_bin: PathBuf::from("docker"),
            iptables_bin: PathBuf::from("iptables"),
        }
    }

    pub fn with_binaries(docker_bin: impl Into<PathBuf>, iptables_bin: impl Into<PathBuf>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            iptables_bin: iptables_bin.into(),
        }
    }

    async fn run(&self, bin: &Path, args: &[String], stdin: Option<&str>) -> Result<String> {
        debug!("Running {} {:?}", bin.display(), args);

        let mut command = Command::new(bin);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if stdin.is_some() {
            command.stdin(Stdio::piped());
        }

        let mut child = command.spawn().map_err(|e| {
            RuntimeError::CommandFailed(format!("failed to run {}: {}", bin.display(), e))
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::CommandFailed(format!(
                "{} {} failed: {}",
                bin.display(),
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.run(&self.docker_bin, &args, None).await
    }

    /// Arguments for `docker run`, image last.
    pub fn run_args(request: &ContainerRequest) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            request.role.container_name(),
            "--label".to_string(),
            format!("berth.role={}", request.role.as_str()),
        ];

        for (key, value) in &request.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        if let Some(code_dir) = &request.code_dir {
            args.push("-v".to_string());
            args.push(format!("{}:{}", code_dir.display(), CODE_MOUNT));
        }

        for (host, container) in &request.mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{}", host.display(), container));
        }

        args.push(request.image.clone());
        args
    }

    /// Registry host of an image reference, when it names one.
    pub fn registry_host(image: &str) -> Option<&str> {
        let (first, _) = image.split_once('/')?;
        (first.contains('.') || first.contains(':') || first == "localhost").then_some(first)
    }

    fn nat_rule(op: &str, port: u16, address: &str) -> Vec<String> {
        [
            "-t",
            "nat",
            op,
            "PREROUTING",
            "-p",
            "tcp",
            "--dport",
            &port.to_string(),
            "-j",
            "DNAT",
            "--to-destination",
            &format!("{}:{}", address, port),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn login(&self, image: &str, user: &str, password: &str) -> Result<()> {
        let mut args = vec![
            "login".to_string(),
            "--username".to_string(),
            user.to_string(),
            "--password-stdin".to_string(),
        ];
        if let Some(host) = Self::registry_host(image) {
            args.push(host.to_string());
        }
        self.run(&self.docker_bin, &args, Some(password)).await?;
        Ok(())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn start_container(&self, request: &ContainerRequest) -> Result<ContainerHandle> {
        let name = request.role.container_name();

        if let Some((user, password)) = &request.registry_auth {
            self.login(&request.image, user, password).await?;
        }

        if let Err(e) = self.docker(&["rm", "-f", &name]).await {
            debug!(container = %name, error = %e, "No previous container to remove");
        }

        if request.foreground {
            info!(image = %request.image, "Pulling image");
            self.docker(&["pull", &request.image]).await?;
        }

        let output = self.run(&self.docker_bin, &Self::run_args(request), None).await?;
        let id = output.trim().to_string();

        if request.foreground {
            let running = self.docker(&["inspect", "-f", RUNNING_FORMAT, &id]).await?;
            if running.trim() != "true" {
                return Err(RuntimeError::NotRunning(name));
            }
        }

        info!(container = %name, id = %id, role = request.role.as_str(), "Container started");

        Ok(ContainerHandle {
            id,
            name,
            role: request.role,
        })
    }

    async fn map_ports(&self, handle: &ContainerHandle, ports: &[u16]) -> Result<()> {
        if ports.is_empty() {
            return Ok(());
        }

        let address = self
            .docker(&["inspect", "-f", ADDRESS_FORMAT, &handle.id])
            .await?
            .trim()
            .to_string();
        if address.is_empty() {
            return Err(RuntimeError::NoAddress(handle.name.clone()));
        }

        for &port in ports {
            // Drop any rule left by an earlier run before appending.
            if let Err(e) = self
                .run(&self.iptables_bin, &Self::nat_rule("-D", port, &address), None)
                .await
            {
                debug!(port, error = %e, "No stale NAT rule");
            }
            self.run(&self.iptables_bin, &Self::nat_rule("-A", port, &address), None)
                .await
                .map_err(|e| {
                    warn!(port, error = %e, "Failed to map port");
                    e
                })?;
        }

        info!(container = %handle.name, address = %address, ports = ?ports, "Ports mapped");
        Ok(())
    }
}
