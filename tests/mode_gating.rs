//! Disabled modes skip their operations without touching the repository.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use test_case::test_case;
use treeguard::models::{Mode, ModeController};
use treeguard::storage::SqliteRepository;
use treeguard::{Error, ValidatorConfig, ValidatorService};

/// A repository with one problem of every kind plus a trashed subtree.
fn corrupted_repository() -> Arc<SqliteRepository> {
    let repo = SqliteRepository::in_memory().unwrap();
    repo.execute_batch(
        "INSERT INTO object_data (obj_id, type, title) VALUES
            (1, 'root', 'Repository'), (10, 'fold', 'Orphan'), (30, 'fold', 'Lost'),
            (40, 'file', 'Trashed');
         INSERT INTO object_reference (ref_id, obj_id) VALUES
            (1, 1), (10, 10), (40, 40), (50, 999);
         INSERT INTO tree (tree, child, parent, lft, rgt, depth) VALUES
            (1, 1, 0, 1, 2, 1),
            (1, 10, 20, 7, 8, 3),
            (1, 70, 1, 9, 10, 2),
            (-40, 40, 1, 0, 0, 2);",
    )
    .unwrap();
    Arc::new(repo)
}

/// Full dump of the three tables, used to prove nothing changed.
fn snapshot(repo: &SqliteRepository) -> Vec<String> {
    let mut rows = Vec::new();
    for child in [1, 10, 20, 30, 40, 50, 70] {
        for node in repo.tree_nodes_of(child).unwrap() {
            rows.push(format!("{node:?}"));
        }
    }
    for obj_id in [1, 10, 30, 40, 999] {
        rows.push(format!("{:?}", repo.object(obj_id).unwrap()));
        rows.push(format!("{:?}", repo.references_of(obj_id).unwrap()));
    }
    rows
}

fn validator_with(repo: &Arc<SqliteRepository>, disabled: Mode) -> ValidatorService {
    let mut modes = ModeController::uniform(true);
    modes.set_mode(disabled, false);
    let config = ValidatorConfig::default().with_modes(modes);
    let mut validator = ValidatorService::with_repository(Arc::clone(repo), config);

    // populate the report while analyze is still available
    if disabled != Mode::Analyze {
        validator.analyze_all().unwrap();
    }
    validator
}

#[test_case(Mode::Analyze, "find_missing_objects" ; "analyze missing objects")]
#[test_case(Mode::Analyze, "find_unbound_references" ; "analyze unbound references")]
#[test_case(Mode::Analyze, "find_unbound_childs" ; "analyze unbound childs")]
#[test_case(Mode::Analyze, "find_childs_with_invalid_parent" ; "analyze invalid parents")]
#[test_case(Mode::Analyze, "analyze_all" ; "analyze all")]
#[test_case(Mode::Clean, "remove_unbound_references" ; "clean references")]
#[test_case(Mode::Clean, "remove_unbound_childs" ; "clean childs")]
#[test_case(Mode::Clean, "close_gaps_in_tree" ; "clean gaps")]
#[test_case(Mode::Restore, "restore_missing_objects" ; "restore missing objects")]
#[test_case(Mode::Restore, "restore_unbound_childs" ; "restore unbound childs")]
#[test_case(Mode::EmptyTrash, "empty_trash" ; "empty trash")]
fn test_disabled_mode_skips(disabled: Mode, operation: &str) {
    let repo = corrupted_repository();
    let mut validator = validator_with(&repo, disabled);
    let before = snapshot(&repo);

    let skipped = match operation {
        "find_missing_objects" => validator.find_missing_objects().unwrap().is_skipped(),
        "find_unbound_references" => validator.find_unbound_references().unwrap().is_skipped(),
        "find_unbound_childs" => validator.find_unbound_childs().unwrap().is_skipped(),
        "find_childs_with_invalid_parent" => validator
            .find_childs_with_invalid_parent()
            .unwrap()
            .is_skipped(),
        "analyze_all" => validator.analyze_all().unwrap().is_skipped(),
        "remove_unbound_references" => validator
            .remove_unbound_references(None)
            .unwrap()
            .is_skipped(),
        "remove_unbound_childs" => validator.remove_unbound_childs(None).unwrap().is_skipped(),
        "close_gaps_in_tree" => validator.close_gaps_in_tree().unwrap().is_skipped(),
        "restore_missing_objects" => validator
            .restore_missing_objects(None, None)
            .unwrap()
            .is_skipped(),
        "restore_unbound_childs" => validator
            .restore_unbound_childs(None, None)
            .unwrap()
            .is_skipped(),
        "empty_trash" => validator.empty_trash().unwrap().is_skipped(),
        other => panic!("unknown operation {other}"),
    };

    assert!(skipped, "{operation} ran with {disabled} disabled");
    assert_eq!(snapshot(&repo), before);
}

#[test_case(Mode::Clean ; "clean")]
#[test_case(Mode::Restore ; "restore")]
fn test_disabled_mode_ignores_malformed_override(disabled: Mode) {
    let repo = corrupted_repository();
    let mut validator = validator_with(&repo, disabled);
    let not_a_list = serde_json::json!("everything");

    let skipped = match disabled {
        Mode::Clean => validator
            .remove_unbound_references_json(&not_a_list)
            .unwrap()
            .is_skipped(),
        _ => validator
            .restore_unbound_childs_json(None, &not_a_list)
            .unwrap()
            .is_skipped(),
    };
    assert!(skipped);
}

#[test_case("analyze", true)]
#[test_case("clean", false)]
#[test_case("restore", false)]
#[test_case("empty_trash", false)]
fn test_default_modes(name: &str, expected: bool) {
    let validator = ValidatorService::with_repository(
        corrupted_repository(),
        ValidatorConfig::default(),
    );
    assert_eq!(validator.modes().is_enabled(name).unwrap(), expected);
}

#[test]
fn test_setting_unknown_mode_is_rejected() {
    let mut validator =
        ValidatorService::with_repository(corrupted_repository(), ValidatorConfig::default());
    let before = *validator.modes();

    let err = validator.modes_mut().set("purge", true).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    assert_eq!(*validator.modes(), before);

    let err = validator.modes().is_enabled("purge").unwrap_err();
    assert!(matches!(err, Error::UnknownMode(_)));
}

#[test]
fn test_all_fans_out() {
    let mut validator =
        ValidatorService::with_repository(corrupted_repository(), ValidatorConfig::default());
    validator.modes_mut().set("all", true).unwrap();
    assert!(Mode::all().iter().all(|m| validator.modes().enabled(*m)));
}
