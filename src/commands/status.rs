// ABOUTME: Status command implementation.
// ABOUTME: Shows the current revision, newest snapshots, and a health sample per target.

use super::environment::Environment;
use horsestrap::backup::BackupManager;
use horsestrap::config::Config;
use horsestrap::deploy::{EXIT_SUCCESS, HealthProber, verification_targets};
use horsestrap::error::Result;
use horsestrap::output::{Output, OutputMode};
use horsestrap::runtime::SourceControl;
use serde::Serialize;

const SHOWN_SNAPSHOTS: usize = 5;

#[derive(Serialize)]
struct StatusReport {
    project: String,
    branch: String,
    revision: Option<String>,
    snapshots: Vec<SnapshotLine>,
    health: Vec<HealthLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime_error: Option<String>,
}

#[derive(Serialize)]
struct SnapshotLine {
    id: String,
    created_at: String,
    revision: String,
    database_dump: bool,
}

#[derive(Serialize)]
struct HealthLine {
    target: String,
    state: String,
}

pub async fn status(config: &Config, output: &Output) -> Result<i32> {
    let backups = BackupManager::from_config(config);
    let snapshots = backups
        .snapshots()?
        .into_iter()
        .rev()
        .take(SHOWN_SNAPSHOTS)
        .map(|s| SnapshotLine {
            id: s.id.to_string(),
            created_at: s.created_at.to_rfc3339(),
            revision: s.revision.short().to_string(),
            database_dump: s.database_dump.is_some(),
        })
        .collect();

    let mut report = StatusReport {
        project: config.project_dir.display().to_string(),
        branch: config.branch.clone(),
        revision: None,
        snapshots,
        health: Vec::new(),
        runtime_error: None,
    };

    match Environment::connect(config, output) {
        Ok(env) => {
            report.revision = env
                .source
                .current_revision()
                .await
                .ok()
                .map(|r| r.short().to_string());

            let prober = HealthProber::new(&env.provisioner, &env.http);
            for (target, _) in verification_targets(config) {
                let sample = prober.sample(&target).await;
                report.health.push(HealthLine {
                    target: target.to_string(),
                    state: sample.state.to_string(),
                });
            }
        }
        Err(e) => report.runtime_error = Some(e.to_string()),
    }

    print_report(&report, output.mode());
    Ok(EXIT_SUCCESS)
}

fn print_report(report: &StatusReport, mode: OutputMode) {
    if mode == OutputMode::Json {
        if let Ok(json) = serde_json::to_string(report) {
            println!("{json}");
        }
        return;
    }

    println!("Project:  {}", report.project);
    println!("Branch:   {}", report.branch);
    println!(
        "Revision: {}",
        report.revision.as_deref().unwrap_or("unknown")
    );

    if report.snapshots.is_empty() {
        println!("Snapshots: none");
    } else {
        println!("Snapshots:");
        for s in &report.snapshots {
            println!(
                "  {}  {}{}",
                s.id,
                s.revision,
                if s.database_dump { "  +db" } else { "" }
            );
        }
    }

    if let Some(ref err) = report.runtime_error {
        println!("Health:   unavailable ({})", err);
    } else {
        println!("Health:");
        for h in &report.health {
            println!("  {:<30} {}", h.target, h.state);
        }
    }
}
