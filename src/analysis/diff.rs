//! Baseline vs. current snapshot comparison.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::snapshot::{EntityId, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalChange {
    pub id: EntityId,
    pub name: String,
    pub previous_value: Value,
    pub current_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalEntry {
    pub id: EntityId,
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectTrigger {
    pub id: EntityId,
    pub name: String,
    pub previous_run_count: u64,
    pub current_run_count: u64,
    pub runs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub signals_changed: Vec<SignalChange>,
    pub signals_added: Vec<SignalEntry>,
    pub signals_removed: Vec<SignalEntry>,
    pub effects_triggered: Vec<EffectTrigger>,
    pub effects_added: Vec<EntityRef>,
    pub effects_removed: Vec<EntityRef>,
    pub components_added: Vec<EntityRef>,
    pub components_removed: Vec<EntityRef>,
    pub errors_since_baseline: usize,
    pub summary: String,
}

pub const NO_CHANGES: &str = "No changes since baseline.";

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.signals_changed.is_empty()
            && self.signals_added.is_empty()
            && self.signals_removed.is_empty()
            && self.effects_triggered.is_empty()
            && self.effects_added.is_empty()
            && self.effects_removed.is_empty()
            && self.components_added.is_empty()
            && self.components_removed.is_empty()
            && self.errors_since_baseline == 0
    }

    fn summarize(&self) -> String {
        let parts: Vec<String> = [
            (self.signals_changed.len(), "signal", "changed"),
            (self.signals_added.len(), "signal", "added"),
            (self.signals_removed.len(), "signal", "removed"),
            (self.effects_triggered.len(), "effect", "triggered"),
            (self.effects_added.len(), "effect", "added"),
            (self.effects_removed.len(), "effect", "removed"),
            (self.components_added.len(), "component", "added"),
            (self.components_removed.len(), "component", "removed"),
            (self.errors_since_baseline, "new error", ""),
        ]
        .into_iter()
        .filter(|(count, _, _)| *count > 0)
        .map(|(count, noun, verb)| {
            let plural = if count == 1 { "" } else { "s" };
            if verb.is_empty() {
                format!("{} {}{}", count, noun, plural)
            } else {
                format!("{} {}{} {}", count, noun, plural, verb)
            }
        })
        .collect();

        if parts.is_empty() {
            NO_CHANGES.to_string()
        } else {
            format!("{}.", parts.join(", "))
        }
    }
}

/// Compare `current` against `baseline` by id for each entity kind.
///
/// `errors_since_baseline` is counted by the caller from the error log. Output lists are ordered
/// by id.
pub fn diff_snapshots(
    baseline: &Snapshot,
    current: &Snapshot,
    errors_since_baseline: usize,
) -> SnapshotDiff {
    let mut diff = SnapshotDiff {
        errors_since_baseline,
        ..Default::default()
    };

    let before: BTreeMap<EntityId, _> = baseline.signals.iter().map(|s| (s.id, s)).collect();
    let after: BTreeMap<EntityId, _> = current.signals.iter().map(|s| (s.id, s)).collect();
    for (id, signal) in &after {
        match before.get(id) {
            Some(old) if old.value != signal.value => diff.signals_changed.push(SignalChange {
                id: *id,
                name: signal.name.clone(),
                previous_value: old.value.clone(),
                current_value: signal.value.clone(),
            }),
            Some(_) => {}
            None => diff.signals_added.push(SignalEntry {
                id: *id,
                name: signal.name.clone(),
                value: signal.value.clone(),
            }),
        }
    }
    diff.signals_removed = before
        .iter()
        .filter(|(id, _)| !after.contains_key(id))
        .map(|(id, s)| SignalEntry {
            id: *id,
            name: s.name.clone(),
            value: s.value.clone(),
        })
        .collect();

    let before: BTreeMap<EntityId, _> = baseline.effects.iter().map(|e| (e.id, e)).collect();
    let after: BTreeMap<EntityId, _> = current.effects.iter().map(|e| (e.id, e)).collect();
    for (id, effect) in &after {
        match before.get(id) {
            Some(old) if effect.run_count > old.run_count => {
                diff.effects_triggered.push(EffectTrigger {
                    id: *id,
                    name: effect.name.clone(),
                    previous_run_count: old.run_count,
                    current_run_count: effect.run_count,
                    runs: effect.run_count - old.run_count,
                })
            }
            Some(_) => {}
            None => diff.effects_added.push(EntityRef {
                id: *id,
                name: effect.name.clone(),
            }),
        }
    }
    diff.effects_removed = before
        .iter()
        .filter(|(id, _)| !after.contains_key(id))
        .map(|(id, e)| EntityRef {
            id: *id,
            name: e.name.clone(),
        })
        .collect();

    let before: BTreeMap<EntityId, &str> = baseline
        .components
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let after: BTreeMap<EntityId, &str> = current
        .components
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let before_ids: BTreeSet<EntityId> = before.keys().copied().collect();
    let after_ids: BTreeSet<EntityId> = after.keys().copied().collect();
    diff.components_added = after_ids
        .difference(&before_ids)
        .map(|id| EntityRef {
            id: *id,
            name: after[id].to_string(),
        })
        .collect();
    diff.components_removed = before_ids
        .difference(&after_ids)
        .map(|id| EntityRef {
            id: *id,
            name: before[id].to_string(),
        })
        .collect();

    diff.summary = diff.summarize();
    diff
}
