//! Property-based tests for the analyzer and full runs.
//!
//! Uses proptest to verify invariants across randomly corrupted repositories:
//! - Analyzing twice without mutation yields identical reports
//! - A full run leaves no unbound references or tree rows behind

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use treeguard::models::ModeController;
use treeguard::storage::SqliteRepository;
use treeguard::{ValidatorConfig, ValidatorService};

/// One kind of corruption, parameterised by two small ids.
#[derive(Debug, Clone)]
enum Corruption {
    ObjectWithoutReference(i64, &'static str),
    DanglingReference(i64, i64),
    UnboundTreeRow(i64),
    OrphanedNode(i64, i64),
    TrashedNode(i64),
}

impl Corruption {
    fn sql(&self) -> String {
        match self {
            Self::ObjectWithoutReference(id, object_type) => format!(
                "INSERT OR IGNORE INTO object_data (obj_id, type, title) VALUES ({}, '{object_type}', 'o');",
                id + 100
            ),
            Self::DanglingReference(id, obj) => format!(
                "INSERT OR IGNORE INTO object_reference (ref_id, obj_id) VALUES ({}, {});",
                id + 300,
                obj + 900
            ),
            Self::UnboundTreeRow(id) => format!(
                "INSERT INTO tree (tree, child, parent, lft, rgt, depth) VALUES (1, {}, 1, 0, 0, 2);",
                id + 500
            ),
            Self::OrphanedNode(id, parent) => {
                let id = id + 1000;
                format!(
                    "INSERT OR IGNORE INTO object_data (obj_id, type, title) VALUES ({id}, 'fold', 'n');
                     INSERT OR IGNORE INTO object_reference (ref_id, obj_id) VALUES ({id}, {id});
                     INSERT INTO tree (tree, child, parent, lft, rgt, depth) VALUES (1, {id}, {}, 0, 0, 3);",
                    parent + 700
                )
            },
            Self::TrashedNode(id) => {
                let id = id + 2000;
                format!(
                    "INSERT OR IGNORE INTO object_data (obj_id, type, title) VALUES ({id}, 'file', 't');
                     INSERT OR IGNORE INTO object_reference (ref_id, obj_id) VALUES ({id}, {id});
                     INSERT INTO tree (tree, child, parent, lft, rgt, depth) VALUES (-{id}, {id}, 1, 0, 0, 2);"
                )
            },
        }
    }
}

fn corruption() -> impl Strategy<Value = Corruption> {
    let object_type = prop::sample::select(vec!["fold", "file", "mail", "rolf", "usr"]);
    prop_oneof![
        (0i64..50, object_type).prop_map(|(id, t)| Corruption::ObjectWithoutReference(id, t)),
        (0i64..50, 0i64..50).prop_map(|(id, obj)| Corruption::DanglingReference(id, obj)),
        (0i64..50).prop_map(Corruption::UnboundTreeRow),
        (0i64..50, 0i64..5).prop_map(|(id, parent)| Corruption::OrphanedNode(id, parent)),
        (0i64..50).prop_map(Corruption::TrashedNode),
    ]
}

fn corrupted(corruptions: &[Corruption]) -> Arc<SqliteRepository> {
    let repo = SqliteRepository::in_memory().unwrap();
    repo.execute_batch(
        "INSERT INTO object_data (obj_id, type, title) VALUES (1, 'root', 'Repository');
         INSERT INTO object_reference (ref_id, obj_id) VALUES (1, 1);
         INSERT INTO tree (tree, child, parent, lft, rgt, depth) VALUES (1, 1, 0, 1, 2, 1);",
    )
    .unwrap();
    for c in corruptions {
        repo.execute_batch(&c.sql()).unwrap();
    }
    Arc::new(repo)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: scans are read-only and deterministic.
    #[test]
    fn prop_analyze_twice_is_identical(corruptions in prop::collection::vec(corruption(), 0..20)) {
        let repo = corrupted(&corruptions);
        let before = repo.counts().unwrap();
        let mut validator = ValidatorService::with_repository(repo.clone(), ValidatorConfig::default());

        validator.analyze_all().unwrap();
        let first = validator.report().clone();
        validator.analyze_all().unwrap();

        prop_assert_eq!(&first, validator.report());
        prop_assert_eq!(repo.counts().unwrap(), before);
    }

    /// Property: a full run removes every unbound row.
    #[test]
    fn prop_full_run_leaves_no_unbound_rows(corruptions in prop::collection::vec(corruption(), 0..20)) {
        let repo = corrupted(&corruptions);
        let config = ValidatorConfig::default().with_modes(ModeController::uniform(true));
        let mut validator = ValidatorService::with_repository(repo, config);

        validator.run().unwrap();
        validator.analyze_all().unwrap();

        prop_assert!(validator.unbound_references().is_empty());
        prop_assert!(validator.unbound_childs().is_empty());
    }
}
