//! Read-only consistency scans.

use std::sync::Arc;

use crate::models::{
    InvalidParentEntry, MissingObjectEntry, UnboundChildEntry, UnboundReferenceEntry,
};
use crate::storage::RepositoryGateway;
use crate::{Error, Result};

/// Runs the four independent scans.
///
/// None of the scans mutates the repository or depends on another's result.
pub struct Analyzer {
    gateway: Arc<dyn RepositoryGateway>,
    rbac_types: Vec<String>,
}

impl Analyzer {
    /// Creates an analyzer scoped to `rbac_types`.
    #[must_use]
    pub fn new(gateway: Arc<dyn RepositoryGateway>, rbac_types: Vec<String>) -> Self {
        Self {
            gateway,
            rbac_types,
        }
    }

    /// An empty type list would make every reference "unbound".
    fn rbac_types(&self) -> Result<&[String]> {
        if self.rbac_types.is_empty() {
            return Err(Error::InvalidParameter(
                "object_types.rbac must list at least one type".to_string(),
            ));
        }
        Ok(&self.rbac_types)
    }

    /// Objects lacking a reference or a tree node.
    ///
    /// # Errors
    ///
    /// Returns an error if the type list is empty or the scan fails.
    pub fn missing_objects(&self) -> Result<Vec<MissingObjectEntry>> {
        let found = self.gateway.find_missing_objects(self.rbac_types()?)?;
        record_findings("missing_objects", found.len());
        Ok(found)
    }

    /// References whose object is absent or out of scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the type list is empty or the scan fails.
    pub fn unbound_references(&self) -> Result<Vec<UnboundReferenceEntry>> {
        let found = self.gateway.find_unbound_references(self.rbac_types()?)?;
        record_findings("unbound_references", found.len());
        Ok(found)
    }

    /// Tree rows whose child is not a reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn unbound_childs(&self) -> Result<Vec<UnboundChildEntry>> {
        let found = self.gateway.find_unbound_childs()?;
        record_findings("unbound_childs", found.len());
        Ok(found)
    }

    /// Live tree rows whose parent is not in the live tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn childs_with_invalid_parent(&self) -> Result<Vec<InvalidParentEntry>> {
        let found = self.gateway.find_childs_with_invalid_parent()?;
        record_findings("invalid_parent_entries", found.len());
        Ok(found)
    }
}

fn record_findings(scan: &'static str, count: usize) {
    tracing::info!(scan, count, "Scan finished");
    metrics::counter!("validator_findings_total", "scan" => scan).increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::test_support::seeded;

    fn analyzer(types: &[&str]) -> (Arc<crate::storage::SqliteRepository>, Analyzer) {
        let repo = Arc::new(seeded());
        let types = types.iter().map(ToString::to_string).collect();
        let analyzer = Analyzer::new(repo.clone(), types);
        (repo, analyzer)
    }

    #[test]
    fn test_empty_type_list_is_rejected() {
        let (_, analyzer) = analyzer(&[]);
        assert!(matches!(
            analyzer.unbound_references(),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            analyzer.missing_objects(),
            Err(Error::InvalidParameter(_))
        ));
        // scans without a type filter still run
        assert!(analyzer.unbound_childs().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_scope_type_makes_reference_unbound() {
        let (_, analyzer) = analyzer(&["root", "cat"]);
        let unbound = analyzer.unbound_references().unwrap();
        // ref 4 points at the "fold" object
        assert_eq!(unbound, vec![UnboundReferenceEntry { ref_id: 4, obj_id: 3 }]);
    }

    #[test]
    fn test_unbound_childs() {
        let (repo, analyzer) = analyzer(&["root", "cat", "fold"]);
        repo.execute_batch(
            "INSERT INTO tree VALUES (1, 60, 3, 20, 21, 3);
             INSERT INTO tree VALUES (-61, 61, 1, 0, 0, 2);",
        )
        .unwrap();

        let unbound = analyzer.unbound_childs().unwrap();
        assert_eq!(
            unbound,
            vec![
                UnboundChildEntry { child: 60, parent: 3, tree: 1 },
                UnboundChildEntry { child: 61, parent: 1, tree: -61 },
            ]
        );
    }
}
