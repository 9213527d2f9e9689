// ABOUTME: Builds the concrete collaborators for a project on the local host.
// ABOUTME: Shared by the deploy, rollback, and status commands.

use horsestrap::config::Config;
use horsestrap::deploy::Collaborators;
use horsestrap::error::{Error, Result};
use horsestrap::output::Output;
use horsestrap::runtime::{
    ComposePostgres, ComposeProvisioner, ComposeSettings, DEFAULT_PROBE_TIMEOUT, GitSource,
    HyperProbe, PostgresTarget, detect_local,
};

/// Real implementations of every collaborator.
pub struct Environment {
    pub provisioner: ComposeProvisioner,
    pub source: GitSource,
    pub database: Option<ComposePostgres>,
    pub http: HyperProbe,
}

impl Environment {
    pub fn connect(config: &Config, output: &Output) -> Result<Self> {
        output.progress("  → Detecting runtime...");
        let info =
            detect_local(&config.runtime).map_err(|e| Error::RuntimeDetection(e.to_string()))?;
        output.progress(&format!(
            "  → Found {} at {}",
            info.runtime_type, info.socket_path
        ));

        let settings = ComposeSettings::from_config(config);
        let provisioner = ComposeProvisioner::connect(&info, settings.clone())
            .map_err(|e| Error::RuntimeDetection(e.to_string()))?;

        let source = GitSource::new(&config.project_dir, &config.remote)
            .timeout(config.command_timeout);

        let database = match config.database {
            Some(ref db) => {
                let dotenv = config.dotenv()?;
                let target = PostgresTarget {
                    service: db.service.clone(),
                    user: db.user.resolve(&dotenv)?,
                    database: db.name.resolve(&dotenv)?,
                };
                Some(ComposePostgres::new(info.runtime_type, settings, target))
            }
            None => None,
        };

        let timeout = config
            .health
            .http
            .as_ref()
            .map(|h| h.timeout)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT);

        Ok(Self {
            provisioner,
            source,
            database,
            http: HyperProbe::new(timeout),
        })
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            provisioner: &self.provisioner,
            source: &self.source,
            database: self
                .database
                .as_ref()
                .map(|db| db as &dyn horsestrap::runtime::Database),
            http: &self.http,
        }
    }
}
