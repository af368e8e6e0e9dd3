//! Heuristic health checks over one snapshot plus the recent logs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::snapshot::{ErrorRecord, LoggedEvent, Snapshot, SnapshotCounts, TimestampMs};

/// Effects that ran more often than this are flagged.
pub const RUN_COUNT_THRESHOLD: u64 = 50;
/// Event volume tolerated within [`EVENT_WINDOW_MS`].
pub const EVENT_RATE_THRESHOLD: usize = 500;
pub const EVENT_WINDOW_MS: TimestampMs = 60_000;
/// Number of most recent errors listed in the error issue.
pub const RECENT_ERROR_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Healthy,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnoseFocus {
    Errors,
    Performance,
    Reactivity,
    #[default]
    All,
}

impl DiagnoseFocus {
    fn covers(self, category: DiagnoseFocus) -> bool {
        self == DiagnoseFocus::All || self == category
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseCounts {
    #[serde(flatten)]
    pub snapshot: SnapshotCounts,
    pub recent_events: usize,
    pub logged_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub severity: Severity,
    pub issues: Vec<Issue>,
    pub healthy: Vec<String>,
    pub counts: DiagnoseCounts,
    pub summary: String,
}

/// Run the checks selected by `focus`.
///
/// `errors` is the bridge's error log; when it is empty the errors carried in the snapshot are
/// used instead. `events` is the event log, of which only entries newer than
/// `now - EVENT_WINDOW_MS` count towards the rate check.
pub fn diagnose(
    snapshot: &Snapshot,
    errors: &[ErrorRecord],
    events: &[LoggedEvent],
    focus: DiagnoseFocus,
    now: TimestampMs,
) -> Diagnosis {
    let errors = if errors.is_empty() {
        snapshot.errors.as_slice()
    } else {
        errors
    };
    let cutoff = now - EVENT_WINDOW_MS;
    let recent_events = events.iter().filter(|e| e.timestamp > cutoff).count();

    let mut issues = Vec::new();
    let mut healthy = Vec::new();

    if focus.covers(DiagnoseFocus::Errors) {
        check_errors(errors, &mut issues, &mut healthy);
    }
    if focus.covers(DiagnoseFocus::Performance) {
        check_performance(snapshot, recent_events, &mut issues, &mut healthy);
    }
    if focus.covers(DiagnoseFocus::Reactivity) {
        check_reactivity(snapshot, &mut issues, &mut healthy);
    }

    let severity = issues
        .iter()
        .map(|i| i.severity)
        .max()
        .unwrap_or(Severity::Healthy);
    let summary = if issues.is_empty() {
        format!("No issues found ({} checks passed).", healthy.len())
    } else {
        let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
        format!(
            "{} issue(s): {} error, {} warning, {} info.",
            issues.len(),
            count(Severity::Error),
            count(Severity::Warning),
            count(Severity::Info)
        )
    };

    Diagnosis {
        severity,
        issues,
        healthy,
        counts: DiagnoseCounts {
            snapshot: snapshot.counts(),
            recent_events,
            logged_errors: errors.len(),
        },
        summary,
    }
}

fn check_errors(errors: &[ErrorRecord], issues: &mut Vec<Issue>, healthy: &mut Vec<String>) {
    if errors.is_empty() {
        healthy.push("No errors captured.".to_string());
        return;
    }
    let recent: Vec<&ErrorRecord> = errors.iter().rev().take(RECENT_ERROR_LIMIT).collect();
    issues.push(Issue {
        category: "errors",
        severity: Severity::Error,
        message: format!("{} error(s) captured", errors.len()),
        details: json!({ "recent": recent }),
    });
}

fn check_performance(
    snapshot: &Snapshot,
    recent_events: usize,
    issues: &mut Vec<Issue>,
    healthy: &mut Vec<String>,
) {
    let hot: Vec<Value> = snapshot
        .effects
        .iter()
        .filter(|e| e.run_count > RUN_COUNT_THRESHOLD)
        .map(|e| json!({ "id": e.id, "name": e.name, "runCount": e.run_count }))
        .collect();
    if hot.is_empty() {
        healthy.push(format!(
            "No effect has run more than {} times.",
            RUN_COUNT_THRESHOLD
        ));
    } else {
        issues.push(Issue {
            category: "performance",
            severity: Severity::Warning,
            message: format!(
                "{} effect(s) ran more than {} times",
                hot.len(),
                RUN_COUNT_THRESHOLD
            ),
            details: json!({ "effects": hot }),
        });
    }

    if recent_events > EVENT_RATE_THRESHOLD {
        issues.push(Issue {
            category: "performance",
            severity: Severity::Warning,
            message: format!(
                "{} events in the last {} seconds",
                recent_events,
                EVENT_WINDOW_MS / 1000
            ),
            details: json!({ "recentEvents": recent_events, "threshold": EVENT_RATE_THRESHOLD }),
        });
    } else {
        healthy.push(format!(
            "Event volume is normal ({} in the last {} seconds).",
            recent_events,
            EVENT_WINDOW_MS / 1000
        ));
    }
}

fn check_reactivity(snapshot: &Snapshot, issues: &mut Vec<Issue>, healthy: &mut Vec<String>) {
    let read: HashSet<_> = snapshot
        .effects
        .iter()
        .flat_map(|e| e.dependency_signal_ids.iter().copied())
        .collect();

    let unused: Vec<Value> = snapshot
        .signals
        .iter()
        .filter(|s| !read.contains(&s.id))
        .map(|s| json!({ "id": s.id, "name": s.name }))
        .collect();
    if unused.is_empty() {
        healthy.push("Every signal has at least one subscriber.".to_string());
    } else {
        issues.push(Issue {
            category: "reactivity",
            severity: Severity::Info,
            message: format!("{} signal(s) have no subscribers", unused.len()),
            details: json!({ "signals": unused }),
        });
    }

    let detached: Vec<Value> = snapshot
        .effects
        .iter()
        .filter(|e| e.dependency_signal_ids.is_empty())
        .map(|e| json!({ "id": e.id, "name": e.name }))
        .collect();
    if detached.is_empty() {
        healthy.push("Every effect declares at least one dependency.".to_string());
    } else {
        issues.push(Issue {
            category: "reactivity",
            severity: Severity::Info,
            message: format!("{} effect(s) have no dependencies", detached.len()),
            details: json!({ "effects": detached }),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(value: Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    fn healthy_app() -> Snapshot {
        snapshot(json!({
            "signals": [{"id": 1, "name": "count", "value": 0}],
            "effects": [{"id": 2, "name": "render", "dependencySignalIds": [1], "runCount": 50}]
        }))
    }

    fn event(timestamp: TimestampMs) -> LoggedEvent {
        LoggedEvent {
            event: "signal:update".to_string(),
            data: Value::Null,
            timestamp,
        }
    }

    #[test]
    fn test_healthy_app_has_no_issues() {
        let diagnosis = diagnose(&healthy_app(), &[], &[], DiagnoseFocus::All, 1_000_000);
        assert_eq!(diagnosis.severity, Severity::Healthy);
        assert!(diagnosis.issues.is_empty());
        assert_eq!(diagnosis.healthy.len(), 5);
        assert_eq!(diagnosis.summary, "No issues found (5 checks passed).");
    }

    #[test]
    fn test_errors_dominate_severity() {
        let errors: Vec<ErrorRecord> = (0..7)
            .map(|i| ErrorRecord {
                message: format!("boom {}", i),
                kind: "Error".to_string(),
                timestamp: i,
            })
            .collect();
        let mut app = healthy_app();
        app.effects[0].run_count = 51;

        let diagnosis = diagnose(&app, &errors, &[], DiagnoseFocus::All, 1_000_000);
        assert_eq!(diagnosis.severity, Severity::Error);
        let error_issue = &diagnosis.issues[0];
        let recent = error_issue.details["recent"].as_array().unwrap();
        assert_eq!(recent.len(), RECENT_ERROR_LIMIT);
        assert_eq!(recent[0]["message"], "boom 6");
        assert!(diagnosis
            .issues
            .iter()
            .any(|i| i.category == "performance" && i.severity == Severity::Warning));
    }

    #[test]
    fn test_event_rate_counts_only_trailing_window() {
        let now = 10 * EVENT_WINDOW_MS;
        let mut events: Vec<LoggedEvent> = (0..501).map(|_| event(now - 1000)).collect();
        events.extend((0..100).map(|_| event(now - 2 * EVENT_WINDOW_MS)));

        let diagnosis = diagnose(&healthy_app(), &[], &events, DiagnoseFocus::Performance, now);
        assert_eq!(diagnosis.counts.recent_events, 501);
        assert_eq!(diagnosis.severity, Severity::Warning);

        events.truncate(500);
        let diagnosis = diagnose(&healthy_app(), &[], &events, DiagnoseFocus::Performance, now);
        assert_eq!(diagnosis.severity, Severity::Healthy);
    }

    #[test]
    fn test_reactivity_focus_reports_info_only() {
        let app = snapshot(json!({
            "signals": [{"id": 1, "name": "orphan", "value": 0}],
            "effects": [{"id": 2, "name": "standalone", "runCount": 500}]
        }));
        let diagnosis = diagnose(&app, &[], &[], DiagnoseFocus::Reactivity, 0);
        assert_eq!(diagnosis.severity, Severity::Info);
        assert_eq!(diagnosis.issues.len(), 2);
        assert!(diagnosis.issues.iter().all(|i| i.category == "reactivity"));
    }

    #[test]
    fn test_snapshot_errors_used_when_log_is_empty() {
        let app = snapshot(json!({
            "errors": [{"message": "render failed", "type": "TypeError", "timestamp": 5}]
        }));
        let diagnosis = diagnose(&app, &[], &[], DiagnoseFocus::Errors, 0);
        assert_eq!(diagnosis.severity, Severity::Error);
        assert_eq!(diagnosis.counts.logged_errors, 1);
    }
}
