//! Component tree reconstruction from the flat component list of a snapshot.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::snapshot::{Component, EntityId, Snapshot};

pub const DEFAULT_TREE_DEPTH: usize = 10;

/// Levels expanded in the text rendering; deeper levels collapse to a child count.
const TEXT_EXPAND_LEVELS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct TreeOptions<'a> {
    /// Start from this component instead of the natural roots.
    pub root_id: Option<EntityId>,
    /// Deepest level serialized; roots are level 1.
    pub max_depth: usize,
    /// Keep a subtree when the node or any descendant name matches.
    pub filter: Option<&'a Regex>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: EntityId,
    pub name: String,
    pub signal_count: usize,
    pub effect_count: usize,
    pub children: Vec<TreeNode>,
    /// Number of children cut off by the depth limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsed_children: Option<usize>,
}

impl TreeNode {
    fn child_count(&self) -> usize {
        self.children.len() + self.collapsed_children.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSummary {
    pub node_count: usize,
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentTree {
    pub summary: TreeSummary,
    pub tree: Vec<TreeNode>,
    pub text: String,
}

struct TreeIndex<'s> {
    by_id: HashMap<EntityId, &'s Component>,
    children: HashMap<EntityId, Vec<EntityId>>,
    roots: Vec<EntityId>,
    signal_counts: HashMap<EntityId, usize>,
    effect_counts: HashMap<EntityId, usize>,
}

impl<'s> TreeIndex<'s> {
    fn new(snapshot: &'s Snapshot) -> Self {
        let by_id: HashMap<EntityId, &Component> =
            snapshot.components.iter().map(|c| (c.id, c)).collect();

        let mut children: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        let mut roots = Vec::new();
        for component in &snapshot.components {
            match component.parent_id {
                Some(parent) if parent != component.id && by_id.contains_key(&parent) => {
                    children.entry(parent).or_default().push(component.id);
                }
                _ => roots.push(component.id),
            }
        }

        let mut signal_counts = HashMap::new();
        for id in snapshot.signals.iter().filter_map(|s| s.component_id) {
            *signal_counts.entry(id).or_insert(0) += 1;
        }
        let mut effect_counts = HashMap::new();
        for id in snapshot.effects.iter().filter_map(|e| e.component_id) {
            *effect_counts.entry(id).or_insert(0) += 1;
        }

        Self {
            by_id,
            children,
            roots,
            signal_counts,
            effect_counts,
        }
    }

    fn children_of(&self, id: EntityId) -> &[EntityId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn name_of(&self, id: EntityId) -> &str {
        self.by_id.get(&id).map(|c| c.name.as_str()).unwrap_or("")
    }

    /// Ids whose own name or some descendant's name matches `filter`.
    fn matching_subtrees(&self, filter: &Regex) -> HashSet<EntityId> {
        let mut keep = HashSet::new();
        let mut visited = HashSet::new();
        for &root in &self.roots {
            self.mark_matches(root, filter, &mut keep, &mut visited);
        }
        keep
    }

    fn mark_matches(
        &self,
        id: EntityId,
        filter: &Regex,
        keep: &mut HashSet<EntityId>,
        visited: &mut HashSet<EntityId>,
    ) -> bool {
        if !visited.insert(id) {
            return keep.contains(&id);
        }
        let mut matched = filter.is_match(self.name_of(id));
        for &child in self.children_of(id) {
            matched |= self.mark_matches(child, filter, keep, visited);
        }
        if matched {
            keep.insert(id);
        }
        matched
    }

    fn build(
        &self,
        id: EntityId,
        depth: usize,
        max_depth: usize,
        keep: Option<&HashSet<EntityId>>,
        path: &mut HashSet<EntityId>,
    ) -> TreeNode {
        path.insert(id);
        let child_ids: Vec<EntityId> = self
            .children_of(id)
            .iter()
            .copied()
            .filter(|child| !path.contains(child))
            .filter(|child| keep.map_or(true, |k| k.contains(child)))
            .collect();

        let (children, collapsed_children) = if depth >= max_depth {
            let hidden = child_ids.len();
            (Vec::new(), (hidden > 0).then_some(hidden))
        } else {
            let children = child_ids
                .into_iter()
                .map(|child| self.build(child, depth + 1, max_depth, keep, path))
                .collect();
            (children, None)
        };
        path.remove(&id);

        TreeNode {
            id,
            name: self.name_of(id).to_string(),
            signal_count: self.signal_counts.get(&id).copied().unwrap_or(0),
            effect_count: self.effect_counts.get(&id).copied().unwrap_or(0),
            children,
            collapsed_children,
        }
    }
}

/// Components whose parent is absent or does not exist in the snapshot.
pub fn find_roots(snapshot: &Snapshot) -> Vec<EntityId> {
    TreeIndex::new(snapshot).roots
}

/// Rebuild the component hierarchy. Returns `None` when `root_id` names no component.
pub fn build_component_tree(
    snapshot: &Snapshot,
    options: &TreeOptions<'_>,
) -> Option<ComponentTree> {
    let index = TreeIndex::new(snapshot);
    let max_depth = options.max_depth.max(1);

    let start: Vec<EntityId> = match options.root_id {
        Some(id) => {
            if !index.by_id.contains_key(&id) {
                return None;
            }
            vec![id]
        }
        None => index.roots.clone(),
    };

    let keep = options.filter.map(|filter| index.matching_subtrees(filter));
    let mut path = HashSet::new();
    let tree: Vec<TreeNode> = start
        .into_iter()
        .filter(|id| keep.as_ref().map_or(true, |k| k.contains(id)))
        .map(|id| index.build(id, 1, max_depth, keep.as_ref(), &mut path))
        .collect();

    let mut summary = TreeSummary {
        node_count: 0,
        max_depth: 0,
    };
    for node in &tree {
        measure(node, 1, &mut summary);
    }

    let mut text = String::new();
    for node in &tree {
        render(node, 0, &mut text);
    }

    Some(ComponentTree {
        summary,
        tree,
        text,
    })
}

fn measure(node: &TreeNode, depth: usize, summary: &mut TreeSummary) {
    summary.node_count += 1;
    summary.max_depth = summary.max_depth.max(depth);
    for child in &node.children {
        measure(child, depth + 1, summary);
    }
}

fn render(node: &TreeNode, level: usize, out: &mut String) {
    out.push_str(&"  ".repeat(level));
    out.push_str(&format!("- {} (#{})", node.name, node.id));

    let mut counts = Vec::new();
    if node.signal_count > 0 {
        counts.push(plural(node.signal_count, "signal"));
    }
    if node.effect_count > 0 {
        counts.push(plural(node.effect_count, "effect"));
    }
    if !counts.is_empty() {
        out.push_str(&format!(" [{}]", counts.join(", ")));
    }

    let child_count = node.child_count();
    if child_count > 0 && (level + 1 >= TEXT_EXPAND_LEVELS || node.children.is_empty()) {
        out.push_str(&format!(" (+{})", plural(child_count, "child")));
        out.push('\n');
        return;
    }
    out.push('\n');
    for child in &node.children {
        render(child, level + 1, out);
    }
}

fn plural(n: usize, noun: &str) -> String {
    match (n, noun) {
        (1, _) => format!("1 {}", noun),
        (_, "child") => format!("{} children", n),
        _ => format!("{} {}s", n, noun),
    }
}
