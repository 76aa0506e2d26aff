//! The start episode: ordered, fail-fast phases followed by the state poll.
//!
//! Phases run strictly in [`StartupPhase::ALL`] order and the first failure
//! aborts the run. Once an authenticated control plane session exists, a
//! failure is announced upstream with a best-effort `error` status before it
//! is returned. User provisioning never fails the run.

use api::{ControlPlane, ControlPlaneConnector};
use berth_core::{AgentConfig, ConfigLoader, ServerConfig, ServerIdentity, StartupPhase};
use events::{Event, EventBus};
use host::{IdentityProvider, LoginProvisioner};
use runtime::{ContainerHandle, ContainerRequest, ContainerRole, ContainerRuntime};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vcs::CodeSource;

use crate::error::{Result, SequencerError};
use crate::poll::{poll_until_terminal, PollSettings, RunOutcome};
use crate::relay::{report_status, StatusRelay};
use crate::resources::{LocalResources, ResourceFactory};

/// Status sent once the control plane session is up.
pub const STARTING_STATUS: &str = "starting";
/// Status sent when a phase fails after authentication.
pub const ERROR_STATUS: &str = "error";

/// Everything the sequencer calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub config_loader: Arc<dyn ConfigLoader>,
    pub connector: Arc<dyn ControlPlaneConnector>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub logins: Arc<dyn LoginProvisioner>,
    pub resources: Arc<dyn ResourceFactory>,
}

/// Arguments of one start episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Identity provider name, e.g. `aws`
    pub provider: String,
    pub config_path: PathBuf,
    /// Name of the server configuration to fetch
    pub server_config_name: String,
}

pub struct Sequencer {
    collaborators: Collaborators,
    events: Option<EventBus>,
}

impl Sequencer {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            events: None,
        }
    }

    /// Publish progress on `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Run one start episode.
    ///
    /// Returns `Ok(RunOutcome::TimedOut)` rather than an error when the
    /// workload never reaches the terminal state before the deadline.
    pub async fn run(&self, options: &StartOptions) -> Result<RunOutcome> {
        let c = &self.collaborators;

        let identity = self
            .step(
                StartupPhase::ResolveIdentity,
                c.identity.resolve(&options.provider),
                SequencerError::Identity,
            )
            .await?;
        info!(identity = %identity, provider = %options.provider, "Start episode begins");
        self.emit(Event::RunStarted {
            identity: identity.to_string(),
        });

        let config = self
            .step(
                StartupPhase::LoadConfig,
                c.config_loader.load(&options.config_path),
                SequencerError::ConfigLoad,
            )
            .await?;

        let client = self
            .step(
                StartupPhase::Authenticate,
                c.connector.connect(&config),
                SequencerError::Auth,
            )
            .await?;

        report_status(
            client.as_ref(),
            &identity,
            STARTING_STATUS,
            self.events.as_ref(),
        )
        .await;

        let resources = c.resources.resources(&config);
        if let Err(e) = self
            .bring_up(&identity, &config, client.as_ref(), &resources, options)
            .await
        {
            if e.phase().can_report_failure() {
                report_status(client.as_ref(), &identity, ERROR_STATUS, self.events.as_ref())
                    .await;
            }
            return Err(e);
        }

        let relay = StatusRelay::new(client, identity).with_events(self.events.clone());
        let report = poll_until_terminal(
            resources.probe.as_ref(),
            relay,
            PollSettings::from(&config.polling),
            self.events.as_ref(),
        )
        .await;

        Ok(report.outcome)
    }

    /// Every phase after authentication, up to a persisted config.
    async fn bring_up(
        &self,
        identity: &ServerIdentity,
        config: &AgentConfig,
        client: &dyn ControlPlane,
        resources: &LocalResources,
        options: &StartOptions,
    ) -> Result<()> {
        let c = &self.collaborators;

        self.step(
            StartupPhase::ExchangeToken,
            async {
                let token = client.get_security_token().await?;
                client.write_temp_token(&token).await
            },
            SequencerError::TokenExchange,
        )
        .await?;

        let server = self
            .step(
                StartupPhase::FetchServerConfig,
                client.get_server_config(&options.server_config_name),
                SequencerError::ServerConfig,
            )
            .await?;

        self.step(
            StartupPhase::ProvisionUsers,
            async {
                self.provision_users(&server).await;
                Ok::<_, std::convert::Infallible>(())
            },
            |never: std::convert::Infallible| match never {},
        )
        .await?;

        let code_dir = match server.code_reference() {
            Some(url) => Some(
                self.step(
                    StartupPhase::FetchCode,
                    async {
                        if let Some(key) = server.repository_key() {
                            resources.code_fetcher.install_repository_key(key).await?;
                        }
                        let mut source = CodeSource::new(url);
                        if let Some(reference) = server
                            .git_reference
                            .as_deref()
                            .filter(|r| !r.trim().is_empty())
                        {
                            source = source.with_reference(reference);
                        }
                        resources.code_fetcher.fetch(&source).await
                    },
                    SequencerError::CodeFetch,
                )
                .await?,
            ),
            None => {
                debug!("No code reference, skipping checkout");
                None
            }
        };

        self.step(
            StartupPhase::StartLogContainer,
            c.runtime.start_container(&ContainerRequest::log(config, identity)),
            |source| SequencerError::ContainerStart {
                role: ContainerRole::Log,
                source,
            },
        )
        .await?;

        if let Err(e) = resources.probe.reset() {
            warn!(error = %e, "Failed to clear previous container state");
        }

        let handle: ContainerHandle = self
            .step(
                StartupPhase::StartMainContainer,
                c.runtime.start_container(&ContainerRequest::active(
                    &server,
                    code_dir.as_deref(),
                    &config.state_file,
                )),
                |source| SequencerError::ContainerStart {
                    role: ContainerRole::Active,
                    source,
                },
            )
            .await?;

        self.step(
            StartupPhase::MapPorts,
            c.runtime.map_ports(&handle, &server.ports),
            SequencerError::PortMap,
        )
        .await?;

        self.step(
            StartupPhase::PersistConfig,
            resources.config_store.write_updated(&server),
            SequencerError::Persist,
        )
        .await
    }

    /// Ensure every configured login exists. Failures are logged and skipped.
    async fn provision_users(&self, server: &ServerConfig) {
        for (username, user) in &server.users {
            match self
                .collaborators
                .logins
                .ensure_user(username, &user.public_key)
                .await
            {
                Ok(()) => debug!(username = %username, "Login user ready"),
                Err(e) => {
                    warn!(username = %username, error = %e, "Failed to provision login user");
                    self.emit(Event::UserProvisionFailed {
                        username: username.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Run one phase, logging and publishing its start and end.
    async fn step<T, E, F>(
        &self,
        phase: StartupPhase,
        work: F,
        wrap: impl FnOnce(E) -> SequencerError,
    ) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        debug!(phase = %phase, "Phase started");
        self.emit(Event::PhaseStarted {
            phase: phase.to_string(),
        });

        match work.await {
            Ok(value) => {
                info!(phase = %phase, "Phase completed");
                self.emit(Event::PhaseCompleted {
                    phase: phase.to_string(),
                });
                Ok(value)
            }
            Err(e) => {
                let e = wrap(e);
                error!(phase = %phase, error = %e, "Phase failed");
                self.emit(Event::PhaseFailed {
                    phase: phase.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}
