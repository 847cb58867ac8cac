//! Learning statistics derived from a user's history.

use serde::Serialize;
use std::collections::HashSet;

use crate::store::{HistoryEntry, HistoryKind};

/// Estimated minutes spent per history entry
const MINUTES_PER_ENTRY: u64 = 3;

/// Aggregated learning statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub time_spent: String,
    pub topics_learned: usize,
    pub questions_solved: usize,
    pub accuracy: u32,
}

impl UserStats {
    pub fn from_history(entries: &[HistoryEntry]) -> Self {
        let topics_learned = entries
            .iter()
            .filter(|e| matches!(e.kind, HistoryKind::Explain | HistoryKind::Mcq))
            .map(|e| e.topic.as_str())
            .collect::<HashSet<_>>()
            .len();

        let questions_solved = entries.iter().filter(|e| e.kind == HistoryKind::Mcq).count();

        Self {
            time_spent: format_time_spent(entries.len() as u64 * MINUTES_PER_ENTRY),
            topics_learned,
            questions_solved,
            accuracy: accuracy(entries),
        }
    }
}

/// Rounded percentage of correct answers across all recorded quiz scores
pub fn accuracy(entries: &[HistoryEntry]) -> u32 {
    let (correct, total) = entries
        .iter()
        .filter(|e| e.kind == HistoryKind::McqScore)
        .filter_map(|e| score_of(e.metadata.as_ref()?))
        .fold((0u64, 0u64), |(c, t), (score, total)| {
            (c.saturating_add(score), t.saturating_add(total))
        });

    if total == 0 {
        return 0;
    }

    (correct as f64 / total as f64 * 100.0).round() as u32
}

/// `(score, total)` from quiz metadata; both must be non-negative integers
/// (numeric strings are accepted).
fn score_of(metadata: &serde_json::Value) -> Option<(u64, u64)> {
    let field = |name: &str| -> Option<u64> {
        match metadata.get(name)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };

    Some((field("score")?, field("total")?))
}

/// `"1h 30m"`, `"2h"`, `"45m"` or `"0m"`
pub fn format_time_spent(minutes: u64) -> String {
    if minutes >= 60 {
        let (hours, mins) = (minutes / 60, minutes % 60);
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}m", minutes)
    }
}
