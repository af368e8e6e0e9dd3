//! Derived views computed purely from snapshots: component tree, dependency graph, baseline
//! diff and health heuristics.

pub mod diagnose;
pub mod diff;
pub mod graph;
pub mod tree;

pub use diagnose::{diagnose, DiagnoseFocus, Diagnosis, Issue, Severity};
pub use diff::{diff_snapshots, SnapshotDiff};
pub use graph::{build_dependency_graph, DependencyGraph, Direction, Focus, GraphError};
pub use tree::{build_component_tree, ComponentTree, TreeNode, TreeOptions};
