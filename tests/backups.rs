// ABOUTME: Integration tests for snapshot creation, restore, discard, and retention.
// ABOUTME: Includes a property test that pruning always keeps the newest snapshots.

mod support;

use horsestrap::backup::{BackupError, BackupManager};
use horsestrap::diagnostics::{Diagnostics, WarningKind};
use horsestrap::runtime::Database;
use proptest::prelude::*;
use std::path::PathBuf;
use support::{FakeDatabase, FakeSource, Project};

fn manager(project: &Project) -> BackupManager {
    BackupManager::from_config(&project.config)
}

mod create {
    use super::*;

    #[tokio::test]
    async fn captures_revision_config_and_dump() {
        let project = Project::new();
        let source = FakeSource::at("aaa111");
        let db = FakeDatabase::default();
        let backups = manager(&project);
        let mut diag = Diagnostics::default();

        let snapshot = backups
            .create_snapshot(&source, Some(&db as &dyn Database), &mut diag)
            .await
            .unwrap();

        let dir = backups.snapshot_dir(&snapshot.id);
        assert_eq!(snapshot.revision.as_str(), "aaa111");
        assert_eq!(
            std::fs::read_to_string(dir.join("REVISION")).unwrap(),
            "aaa111\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.join("config/.env")).unwrap(),
            "APP_MODE=blue\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.join("config/config/app.toml")).unwrap(),
            "workers = 2\n"
        );
        assert_eq!(
            backups.dump_path(&snapshot),
            Some(dir.join("database.sql"))
        );
        assert!(!diag.has_warnings());
        assert_eq!(backups.load_snapshot(&snapshot.id).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn missing_config_file_is_a_warning() {
        let project = Project::new();
        std::fs::remove_file(project.path().join("config/app.toml")).unwrap();
        let source = FakeSource::at("aaa111");
        let backups = manager(&project);
        let mut diag = Diagnostics::default();

        let snapshot = backups.create_snapshot(&source, None, &mut diag).await.unwrap();

        assert_eq!(snapshot.config_files, vec![PathBuf::from(".env")]);
        assert_eq!(diag.count(WarningKind::ConfigFile), 1);
        assert!(snapshot.database_dump.is_none());
    }

    #[tokio::test]
    async fn rapid_snapshots_get_distinct_increasing_ids() {
        let project = Project::new();
        let source = FakeSource::at("aaa111");
        let backups = manager(&project);
        let mut diag = Diagnostics::default();

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(
                backups
                    .create_snapshot(&source, None, &mut diag)
                    .await
                    .unwrap()
                    .id,
            );
        }

        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        sorted.dedup();
        assert_eq!(sorted, ids);
        assert_eq!(backups.latest().unwrap().map(|s| s.id), ids.last().cloned());
    }
}

mod restore {
    use super::*;

    #[tokio::test]
    async fn restores_latest_revision_and_files() {
        let project = Project::new();
        let source = FakeSource::at("aaa111");
        let backups = manager(&project);
        let mut diag = Diagnostics::default();
        backups.create_snapshot(&source, None, &mut diag).await.unwrap();

        source.push_upstream("bbb222");
        horsestrap::runtime::SourceControl::pull(&source, "main")
            .await
            .unwrap();
        project.write(".env", "APP_MODE=green\n");

        let restored = backups.restore_latest(&source, &mut diag).await.unwrap();

        assert_eq!(restored.revision.as_str(), "aaa111");
        assert_eq!(source.head().as_str(), "aaa111");
        assert_eq!(project.read(".env"), "APP_MODE=blue\n");
        assert!(!diag.has_warnings());
    }

    #[tokio::test]
    async fn nothing_to_restore() {
        let project = Project::new();
        let source = FakeSource::at("aaa111");
        let mut diag = Diagnostics::default();

        let err = manager(&project)
            .restore_latest(&source, &mut diag)
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::NoSnapshots));
        assert!(source.resets().is_empty());
    }

    #[tokio::test]
    async fn discard_removes_only_that_snapshot() {
        let project = Project::new();
        let source = FakeSource::at("aaa111");
        let backups = manager(&project);
        let mut diag = Diagnostics::default();
        let first = backups.create_snapshot(&source, None, &mut diag).await.unwrap();
        let second = backups.create_snapshot(&source, None, &mut diag).await.unwrap();

        backups.discard(&second.id).unwrap();

        assert_eq!(backups.latest().unwrap(), Some(first));
        assert!(!backups.snapshot_dir(&second.id).exists());
        assert!(matches!(
            backups.discard(&second.id),
            Err(BackupError::NotFound(_))
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prune_keeps_the_newest(runs in 1usize..12, retain in 1usize..8) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let project = Project::new();
        let source = FakeSource::at("aaa111");
        let backups = manager(&project);
        let mut diag = Diagnostics::default();

        let mut created = Vec::new();
        for _ in 0..runs {
            let snapshot = runtime
                .block_on(backups.create_snapshot(&source, None, &mut diag))
                .unwrap();
            created.push(snapshot.id);
            backups.prune(retain).unwrap();
        }

        let kept: Vec<_> = backups.snapshots().unwrap().into_iter().map(|s| s.id).collect();
        let expected = created[created.len().saturating_sub(retain)..].to_vec();
        prop_assert_eq!(&kept, &expected);
        for id in &created[..created.len() - expected.len()] {
            prop_assert!(!backups.snapshot_dir(id).exists());
        }
    }
}
