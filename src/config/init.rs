// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates horsestrap.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const TEMPLATE: &str = r#"# Branch deployed from the remote.
branch: main
remote: origin
compose_file: docker-compose.yml

# Services recreated on every update. The image of primary_service decides
# whether the update changed anything.
primary_service: web
app_services: [web]

# Dumped into every snapshot. Restoring the dump is a manual step.
database:
  service: db
  user: { env: POSTGRES_USER, default: postgres }
  name: { env: POSTGRES_DB, default: postgres }

# Copied into every snapshot and restored on rollback.
config_files:
  - .env

backups:
  dir: backups
  retain: 5

health:
  services: { max_attempts: 30, interval: 2s }
  http:
    url: http://localhost/
    accepted_statuses: [200, 302, 404]
    timeout: 5s
    budget: { max_attempts: 10, interval: 3s }

rollback_probe: { max_attempts: 10, interval: 3s }
"#;

/// Write a template config into `dir`, returning its path.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;

    Ok(config_path)
}
