use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNTITLED_ROUTINE: &str = "Untitled Routine";

/// A previously generated routine that a feedback message may be about.
///
/// Candidates arrive already scoped to one user and a trailing time window;
/// nothing in the engine re-checks either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineCandidate {
    /// Opaque routine identifier
    pub id: String,
    pub routine_title: String,
    /// Lower-cased primary muscles across every exercise of every session
    #[serde(default)]
    pub routine_muscles: BTreeSet<String>,
    /// Lower-cased exercise names across every session
    #[serde(default)]
    pub routine_exercises: BTreeSet<String>,
    /// Raw timestamp of the last chat turn referencing the routine.
    /// Kept unparsed so a malformed value only costs recency.
    #[serde(default)]
    pub last_mentioned_at: Option<String>,
    /// Feedback episodes already recorded against this routine
    #[serde(default)]
    pub existing_outcome_count: u32,
}

impl RoutineCandidate {
    /// Build a candidate from a stored routine document
    /// (`{title, sessions: [{exercises: [{name, primary_muscle}]}]}`).
    /// Missing pieces degrade to empty sets and the untitled placeholder.
    pub fn from_routine_document(
        id: impl Into<String>,
        document: &serde_json::Value,
        last_mentioned_at: Option<String>,
        existing_outcome_count: u32,
    ) -> Self {
        let routine_title = document
            .get("title")
            .and_then(|title| title.as_str())
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED_ROUTINE)
            .to_string();

        let mut routine_muscles = BTreeSet::new();
        let mut routine_exercises = BTreeSet::new();

        let sessions = document
            .get("sessions")
            .and_then(|sessions| sessions.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for session in sessions {
            let exercises = session
                .get("exercises")
                .and_then(|exercises| exercises.as_array())
                .map(Vec::as_slice)
                .unwrap_or_default();
            for exercise in exercises {
                if let Some(muscle) = normalized_str(exercise.get("primary_muscle")) {
                    routine_muscles.insert(muscle);
                }
                if let Some(name) = normalized_str(exercise.get("name")) {
                    routine_exercises.insert(name);
                }
            }
        }

        Self {
            id: id.into(),
            routine_title,
            routine_muscles,
            routine_exercises,
            last_mentioned_at,
            existing_outcome_count,
        }
    }

    /// Parsed `last_mentioned_at`, or `None` when missing or unparsable.
    pub fn last_mentioned(&self) -> Option<DateTime<Utc>> {
        self.last_mentioned_at.as_deref().and_then(parse_timestamp)
    }

    /// Whole days between the last mention and `now`. Mentions stamped in
    /// the future count as today.
    pub fn days_since_mention(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_mentioned()
            .map(|mentioned| now.signed_duration_since(mentioned).num_days().max(0))
    }

    /// Exercise membership on the literal name or its underscore form
    /// ("bench press" also matches "bench_press").
    pub fn has_exercise(&self, exercise: &str) -> bool {
        self.routine_exercises.contains(exercise)
            || self.routine_exercises.contains(&exercise.replace(' ', "_"))
    }
}

fn normalized_str(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

/// Parse the timestamp shapes the chat store produces: RFC 3339, naive ISO
/// (`2026-01-05T10:00:00.123`) or SQLite (`2026-01-05 10:00:00`). Naive
/// values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
