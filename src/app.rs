//! Per-invocation application state shared by CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::{Config, SandboxBackendKind};
use crate::error::Result;
use crate::generator::LlmGenerator;
use crate::llm::ChatClient;
use crate::notify::telegram::TelegramNotifier;
use crate::notify::{LogNotifier, Notifier};
use crate::pipeline::{Collaborators, Pipeline, PipelineOptions};
use crate::publish::{GitHubPublisher, Publisher};
use crate::research::firecrawl::FirecrawlResearcher;
use crate::sandbox::SandboxBackend;
use crate::sandbox::docker::DockerBackend;
use crate::sandbox::process::ProcessBackend;
use crate::storage::{Database, SkillDirWriter};

pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub robot_mode: bool,
    pub verbosity: u8,
    pub db: Arc<Database>,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;
        let db_path = config.storage.resolved_db_path()?;
        debug!(path = %db_path.display(), "opening database");
        let db = Arc::new(Database::open(&db_path)?);

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            robot_mode: cli.robot,
            verbosity: cli.verbose,
            db,
        })
    }

    /// Sandbox backend selected by `sandbox.backend`.
    #[must_use]
    pub fn sandbox_backend(&self) -> Arc<dyn SandboxBackend> {
        match self.config.sandbox.backend {
            SandboxBackendKind::Docker => Arc::new(DockerBackend::from_config(&self.config.sandbox)),
            SandboxBackendKind::Process => Arc::new(ProcessBackend::new()),
        }
    }

    /// Telegram when enabled and credentialed, otherwise log-only.
    pub fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        if self.config.notify.enabled {
            if let Some(telegram) = TelegramNotifier::from_config(&self.config.notify)? {
                return Ok(Arc::new(telegram));
            }
            info!("telegram credentials missing; notifications go to the log");
        }
        Ok(Arc::new(LogNotifier))
    }

    pub fn skill_dir(&self) -> Result<Option<SkillDirWriter>> {
        if !self.config.storage.write_skill_files {
            return Ok(None);
        }
        let root = self.config.storage.resolved_skills_dir()?;
        Ok(Some(
            SkillDirWriter::new(root).drop_version(self.config.storage.sanitize_version),
        ))
    }

    /// GitHub publisher when enabled and credentialed.
    pub fn publisher(&self) -> Result<Option<Arc<dyn Publisher>>> {
        let publisher = GitHubPublisher::from_config(&self.config.publish)?;
        if publisher.is_none() && self.config.publish.enabled {
            debug!("GitHub token or repo not set; skipping publish");
        }
        Ok(publisher.map(|p| Arc::new(p) as Arc<dyn Publisher>))
    }

    /// Production collaborators. Fails when API keys are missing.
    pub fn collaborators(&self) -> Result<Collaborators> {
        let research = FirecrawlResearcher::from_config(&self.config.research)?;
        let generator = LlmGenerator::new(ChatClient::from_config(&self.config.llm)?);

        Ok(Collaborators {
            research: Arc::new(research),
            generator: Arc::new(generator),
            sandbox: self.sandbox_backend(),
            events: self.db.clone(),
            store: self.db.clone(),
            notifier: Some(self.notifier()?),
            skill_dir: self.skill_dir()?,
            publisher: self.publisher()?,
        })
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.collaborators()?,
            &PipelineOptions::from_config(&self.config),
        ))
    }
}
