//! Store summaries logged on every change notification.
//!
//! Notifications carry only a [`ProjectKey`]; the summary is always built
//! from a fresh store snapshot.
//!
//! # Status Rule
//!
//! - No issues -> Clean
//! - Highest severity below High -> Warning
//! - Any High or Critical issue -> Vulnerable

use std::collections::BTreeMap;

use serde::Serialize;

use depwatch_core::types::{ProjectKey, Severity};
use depwatch_scanner::DependencyTree;
use depwatch_scanner::aggregator::collect_licenses;

/// Overall status of one scanned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeStatus {
    Clean,
    Warning,
    Vulnerable,
}

/// Counts derived from one stored tree.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    /// Project name.
    pub project: String,
    /// Root module name.
    pub root: String,
    /// Nodes below the root.
    pub dependencies: usize,
    /// Issues over the whole tree.
    pub issues: usize,
    /// Issue count per severity.
    pub by_severity: BTreeMap<Severity, usize>,
    /// Distinct license names.
    pub licenses: Vec<String>,
    /// Worst-case status.
    pub status: TreeStatus,
}

impl StoreSummary {
    /// Summarize `tree` stored under `key`.
    pub fn from_tree(key: &ProjectKey, tree: &DependencyTree) -> Self {
        let mut by_severity = BTreeMap::new();
        for node in tree.walk() {
            for issue in &node.issues {
                *by_severity.entry(issue.severity).or_insert(0) += 1;
            }
        }

        Self {
            project: key.project_name.clone(),
            root: key.root_name.clone(),
            dependencies: tree.descendant_count(),
            issues: tree.issue_count(),
            status: status_of(&by_severity),
            by_severity,
            licenses: collect_licenses(tree)
                .into_iter()
                .map(|license| license.name)
                .collect(),
        }
    }

    /// Highest severity seen, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.by_severity.keys().next_back().copied()
    }
}

fn status_of(by_severity: &BTreeMap<Severity, usize>) -> TreeStatus {
    match by_severity.keys().next_back() {
        None => TreeStatus::Clean,
        Some(severity) if *severity >= Severity::High => TreeStatus::Vulnerable,
        Some(_) => TreeStatus::Warning,
    }
}
