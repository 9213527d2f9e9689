// ABOUTME: End-to-end deployment driver scenarios against in-memory collaborators.
// ABOUTME: Covers commit, no-op, rollback on every failure point, and retention.

mod support;

use horsestrap::backup::BackupManager;
use horsestrap::deploy::{
    Collaborators, DeployError, DeployErrorKind, DeployOptions, DeploymentDriver,
    DeploymentReport, EXIT_ROLLED_BACK, EXIT_SUCCESS, Outcome, Verdict,
};
use horsestrap::diagnostics::{Diagnostics, WarningKind};
use horsestrap::runtime::HealthState;
use support::{FakeDatabase, FakeHttp, FakeProvisioner, FakeSource, Project, quiet, svc};

struct Rig {
    project: Project,
    source: FakeSource,
    provisioner: FakeProvisioner,
    database: FakeDatabase,
    http: FakeHttp,
}

impl Rig {
    /// Running at `aaa111`, with `bbb222` and a new image waiting upstream.
    fn with_update() -> Self {
        let rig = Self::idle();
        rig.source.push_upstream("bbb222");
        rig.provisioner.publish_image("sha256:new");
        rig
    }

    /// Running at `aaa111`, nothing new upstream.
    fn idle() -> Self {
        support::init_tracing();
        Self {
            project: Project::new(),
            source: FakeSource::at("aaa111"),
            provisioner: FakeProvisioner::healthy(),
            database: FakeDatabase::default(),
            http: FakeHttp::always(Some(200)),
        }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            provisioner: &self.provisioner,
            source: &self.source,
            database: Some(&self.database),
            http: &self.http,
        }
    }

    fn backups(&self) -> BackupManager {
        BackupManager::from_config(&self.project.config)
    }

    async fn run(&self, opts: DeployOptions) -> (Result<DeploymentReport, DeployError>, Diagnostics) {
        let mut diag = Diagnostics::default();
        let driver = DeploymentDriver::new(&self.project.config, self.collaborators());
        let result = driver.run(opts, &mut diag, &quiet()).await;
        (result, diag)
    }

    async fn deploy(&self) -> (DeploymentReport, Diagnostics) {
        let (result, diag) = self.run(DeployOptions::default()).await;
        (result.expect("deployment should get past the backup"), diag)
    }
}

mod commit {
    use super::*;

    #[tokio::test]
    async fn clean_update_commits() {
        let rig = Rig::with_update();

        let (report, diag) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::Committed);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.attempt.outcome(), Outcome::Succeeded);
        assert_eq!(report.attempt.revision_before.as_str(), "aaa111");
        assert_eq!(
            report.attempt.revision_after.as_ref().map(|r| r.as_str()),
            Some("bbb222")
        );
        assert_eq!(report.image_changed, Some(true));
        assert!(report.cause.is_none());
        assert!(!diag.has_warnings());

        assert_eq!(rig.source.head().as_str(), "bbb222");
        assert_eq!(rig.provisioner.running_image_id().as_str(), "sha256:new");
        assert_eq!(rig.provisioner.stop_all_calls(), 0);
    }

    #[tokio::test]
    async fn snapshot_is_taken_before_anything_changes() {
        let rig = Rig::with_update();

        let (report, _) = rig.deploy().await;

        let snapshots = rig.backups().snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, report.snapshot.id);
        assert_eq!(snapshots[0].revision.as_str(), "aaa111");
        assert!(snapshots[0].database_dump.is_some());
        assert_eq!(rig.database.dumps().len(), 1);
    }

    #[tokio::test]
    async fn only_app_services_are_recreated() {
        let rig = Rig::with_update();

        rig.deploy().await;

        assert_eq!(rig.provisioner.recreated(), vec![vec![svc("web"), svc("worker")]]);
    }

    #[tokio::test]
    async fn unchanged_image_still_commits() {
        let rig = Rig::idle();
        rig.source.push_upstream("bbb222");

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::Committed);
        assert_eq!(report.image_changed, Some(false));
    }

    #[tokio::test]
    async fn local_modifications_are_stashed_before_pull() {
        let rig = Rig::with_update();
        rig.source.set_dirty(true);

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::Committed);
        let stashes = rig.source.stashes();
        assert_eq!(stashes.len(), 1);
        assert!(stashes[0].starts_with("horsestrap-"));
    }

    #[tokio::test]
    async fn failed_dump_is_a_warning_not_an_abort() {
        let mut rig = Rig::with_update();
        rig.database = FakeDatabase::failing();

        let (report, diag) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::Committed);
        assert!(report.snapshot.database_dump.is_none());
        assert_eq!(diag.count(WarningKind::DatabaseDump), 1);

        let dir = rig.backups().snapshot_dir(&report.snapshot.id);
        assert!(!dir.join("database.sql").exists());
    }

    #[tokio::test]
    async fn skip_sync_updates_without_touching_the_tree() {
        let rig = Rig::with_update();

        let (result, _) = rig
            .run(DeployOptions {
                skip_sync: true,
                ..Default::default()
            })
            .await;
        let report = result.unwrap();

        assert_eq!(report.verdict, Verdict::Committed);
        assert_eq!(rig.source.fetches(), 0);
        assert_eq!(rig.source.head().as_str(), "aaa111");
        assert_eq!(rig.provisioner.recreated().len(), 1);
    }
}

mod noop {
    use super::*;

    #[tokio::test]
    async fn no_upstream_change_is_a_noop() {
        let rig = Rig::idle();

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::Noop);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.attempt.outcome(), Outcome::Succeeded);
        assert!(rig.provisioner.recreated().is_empty());
        assert_eq!(rig.source.fetches(), 1);
    }

    #[tokio::test]
    async fn noop_still_takes_a_snapshot() {
        let rig = Rig::idle();

        rig.deploy().await;

        assert_eq!(rig.backups().snapshots().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_run_recreates_nothing() {
        let rig = Rig::with_update();

        let (first, _) = rig.deploy().await;
        let (second, _) = rig.deploy().await;

        assert_eq!(first.verdict, Verdict::Committed);
        assert_eq!(second.verdict, Verdict::Noop);
        assert_eq!(rig.provisioner.recreated().len(), 1);
        assert_eq!(rig.backups().snapshots().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeated_idle_runs_stay_noops() {
        let rig = Rig::idle();

        let (first, _) = rig.deploy().await;
        let (second, _) = rig.deploy().await;

        assert_eq!(first.verdict, Verdict::Noop);
        assert_eq!(second.verdict, Verdict::Noop);
        assert!(rig.provisioner.recreated().is_empty());
        assert_eq!(rig.provisioner.stop_all_calls(), 0);
    }

    #[tokio::test]
    async fn force_updates_without_changes() {
        let rig = Rig::idle();

        let (result, _) = rig
            .run(DeployOptions {
                force: true,
                ..Default::default()
            })
            .await;

        assert_eq!(result.unwrap().verdict, Verdict::Committed);
        assert_eq!(rig.provisioner.recreated().len(), 1);
    }
}

mod rollback {
    use super::*;

    #[tokio::test]
    async fn failing_http_probe_rolls_back() {
        let rig = Rig::with_update();
        rig.http.set(Some(500));

        let (report, diag) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        assert_eq!(report.exit_code(), EXIT_ROLLED_BACK);
        assert_eq!(report.attempt.outcome(), Outcome::RolledBack);
        assert_eq!(
            report.cause.as_ref().map(|e| e.kind()),
            Some(DeployErrorKind::HealthCheck)
        );

        assert_eq!(rig.source.head().as_str(), "aaa111");
        assert_eq!(rig.provisioner.stop_all_calls(), 1);
        assert_eq!(rig.provisioner.start_all_calls(), 1);
        assert!(rig.provisioner.is_started());

        // Endpoint stays down, so the post-rollback probe reports it.
        let rollback = report.rollback.unwrap();
        assert!(rollback.restarted);
        assert!(!rollback.healthy_after);
        assert!(diag.count(WarningKind::Rollback) >= 1);
    }

    #[tokio::test]
    async fn rollback_restores_captured_config_files() {
        let rig = Rig::with_update();
        rig.source
            .pull_writes(rig.project.path().join(".env"), "APP_MODE=green\n");
        rig.http.set(Some(502));

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        assert_eq!(rig.project.read(".env"), "APP_MODE=blue\n");
        assert_eq!(rig.project.read("config/app.toml"), "workers = 2\n");
        assert_eq!(
            report.rollback.and_then(|r| r.restored).map(|s| s.id),
            Some(report.snapshot.id)
        );
    }

    #[tokio::test]
    async fn unhealthy_service_rolls_back_and_recovers() {
        let rig = Rig::with_update();
        // First sample of web is unhealthy for the whole budget, then the
        // restarted stack comes up healthy.
        rig.provisioner.script_health(vec![
            HealthState::Healthy, // preflight
            HealthState::Unhealthy,
            HealthState::Unhealthy,
            HealthState::Unhealthy,
        ]);

        let (report, diag) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        let rollback = report.rollback.unwrap();
        assert!(rollback.healthy_after);
        assert_eq!(diag.count(WarningKind::Rollback), 0);
        assert_eq!(rig.source.head().as_str(), "aaa111");
    }

    #[tokio::test]
    async fn unreachable_remote_is_not_a_noop() {
        let rig = Rig::with_update();
        rig.source.fail_fetch(true);

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        assert_eq!(report.cause.as_ref().map(|e| e.kind()), Some(DeployErrorKind::Sync));
        assert!(rig.provisioner.recreated().is_empty());
    }

    #[tokio::test]
    async fn recreate_failure_rolls_back() {
        let rig = Rig::with_update();
        rig.provisioner.fail_recreate(true);

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        assert_eq!(report.cause.as_ref().map(|e| e.kind()), Some(DeployErrorKind::Update));
        assert_eq!(rig.source.head().as_str(), "aaa111");
    }

    #[tokio::test]
    async fn failed_restart_is_reported_not_raised() {
        let rig = Rig::with_update();
        rig.http.set(None);
        rig.provisioner.fail_start_all(true);

        let (report, diag) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        let rollback = report.rollback.unwrap();
        assert!(!rollback.restarted);
        assert!(diag.count(WarningKind::Rollback) >= 1);
    }

    #[tokio::test]
    async fn failed_stop_still_starts_every_service() {
        let rig = Rig::with_update();
        rig.http.set(Some(500));
        rig.provisioner.fail_stop_all(true);

        let (report, diag) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::RolledBack);
        assert_eq!(rig.provisioner.stop_all_calls(), 1);
        assert_eq!(rig.provisioner.start_all_calls(), 1);
        assert!(rig.provisioner.is_started());
        assert!(report.rollback.unwrap().restarted);
        assert!(
            diag.warnings()
                .iter()
                .any(|w| w.message.contains("failed to stop all services"))
        );
    }

    #[derive(Debug, Clone, Copy)]
    enum Fault {
        Fetch,
        Pull,
        ImagePull,
        Recreate,
        ServiceUnhealthy,
        HttpUnreachable,
        HttpServerError,
        StopAllFails,
    }

    fn inject(rig: &Rig, fault: Fault) {
        match fault {
            Fault::Fetch => rig.source.fail_fetch(true),
            Fault::Pull => rig.source.fail_pull(true),
            Fault::ImagePull => rig.provisioner.fail_pull(true),
            Fault::Recreate => rig.provisioner.fail_recreate(true),
            Fault::ServiceUnhealthy => {
                rig.provisioner.set_service_health("worker", HealthState::Unhealthy)
            }
            Fault::HttpUnreachable => rig.http.set(None),
            Fault::HttpServerError => rig.http.set(Some(503)),
            Fault::StopAllFails => {
                rig.http.set(Some(503));
                rig.provisioner.fail_stop_all(true);
            }
        }
    }

    #[tokio::test]
    async fn every_failure_returns_to_the_previous_revision() {
        let faults = [
            Fault::Fetch,
            Fault::Pull,
            Fault::ImagePull,
            Fault::Recreate,
            Fault::ServiceUnhealthy,
            Fault::HttpUnreachable,
            Fault::HttpServerError,
            Fault::StopAllFails,
        ];

        for fault in faults {
            let rig = Rig::with_update();
            inject(&rig, fault);

            let (report, _) = rig.deploy().await;

            assert_eq!(report.verdict, Verdict::RolledBack, "{:?}", fault);
            assert_eq!(report.exit_code(), EXIT_ROLLED_BACK, "{:?}", fault);
            assert_eq!(rig.source.head().as_str(), "aaa111", "{:?}", fault);
            assert!(rig.provisioner.is_started(), "{:?}", fault);
            assert_eq!(
                rig.provisioner.stopped(),
                vec![vec![svc("web"), svc("worker")]],
                "{:?}",
                fault
            );
            assert_eq!(rig.backups().snapshots().unwrap().len(), 1, "{:?}", fault);
        }
    }
}

mod fatal {
    use super::*;

    #[tokio::test]
    async fn missing_compose_file_aborts_before_backup() {
        let rig = Rig::with_update();
        std::fs::remove_file(rig.project.path().join("docker-compose.yml")).unwrap();

        let (result, _) = rig.run(DeployOptions::default()).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::Precondition);
        assert!(!err.is_rollback_eligible());
        assert!(rig.backups().snapshots().unwrap().is_empty());
        assert!(rig.database.dumps().is_empty());
    }

    #[tokio::test]
    async fn no_running_environment_aborts() {
        let rig = Rig::with_update();
        rig.provisioner.set_missing(true);

        let (result, _) = rig.run(DeployOptions::default()).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::Precondition);
        assert!(err.to_string().contains("--allow-cold-start"));
        assert!(rig.provisioner.recreated().is_empty());
    }

    #[tokio::test]
    async fn cold_start_skips_the_running_check() {
        let rig = Rig::with_update();
        rig.provisioner.set_missing(true);

        let (result, _) = rig
            .run(DeployOptions {
                allow_cold_start: true,
                ..Default::default()
            })
            .await;

        // Services never report health, so the probe fails and rolls back,
        // but the run got past preflight.
        let report = result.unwrap();
        assert_eq!(report.verdict, Verdict::RolledBack);
        assert_eq!(rig.provisioner.recreated().len(), 1);
        assert!(rig.database.queries().is_empty());
    }

    #[tokio::test]
    async fn database_is_queried_before_the_backup() {
        let rig = Rig::with_update();

        let (report, _) = rig.deploy().await;

        assert_eq!(report.verdict, Verdict::Committed);
        assert_eq!(rig.database.queries(), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_database_aborts_before_backup() {
        let rig = Rig::with_update();
        rig.database.fail_queries(true);

        let (result, _) = rig.run(DeployOptions::default()).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::Precondition);
        assert!(err.to_string().contains("database not reachable"));
        assert!(rig.backups().snapshots().unwrap().is_empty());
        assert!(rig.database.dumps().is_empty());
        assert!(rig.provisioner.recreated().is_empty());
    }
}

mod retention {
    use super::*;
    use horsestrap::config::Config;

    #[tokio::test]
    async fn history_is_capped_at_retain() {
        let rig = Rig::idle();

        let mut ids = Vec::new();
        for _ in 0..7 {
            let (report, _) = rig.deploy().await;
            ids.push(report.snapshot.id);
        }

        let kept: Vec<_> = rig
            .backups()
            .snapshots()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(kept, ids[2..].to_vec());
        for pruned in &ids[..2] {
            assert!(!rig.backups().snapshot_dir(pruned).exists());
        }
    }

    #[tokio::test]
    async fn retain_comes_from_config() {
        let mut rig = Rig::idle();
        let yaml = format!("{}backups:\n  retain: 2\n", support::BASE_CONFIG);
        rig.project.config = Config::from_yaml(&yaml)
            .unwrap()
            .with_project_dir(rig.project.path());

        for _ in 0..4 {
            rig.deploy().await;
        }

        assert_eq!(rig.backups().snapshots().unwrap().len(), 2);
    }
}
