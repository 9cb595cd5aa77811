use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spotter_core::error::FeedbackError;
use spotter_core::feedback::OutcomeType;
use spotter_core::pipeline::{EpisodeDraft, EpisodeRecorder};
use uuid::Uuid;

/// One line of the episode log.
#[derive(Debug, Serialize, Deserialize)]
pub struct EpisodeLine {
    pub id: Uuid,
    pub user_id: String,
    pub routine_id: String,
    pub outcome_type: OutcomeType,
    pub outcome_text: String,
    pub created_at: DateTime<Utc>,
}

/// Appends resolved episodes to a JSON-lines file.
pub struct JsonlEpisodeRecorder {
    path: PathBuf,
}

impl JsonlEpisodeRecorder {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, line: &EpisodeLine) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let mut encoded = serde_json::to_string(line).map_err(|e| e.to_string())?;
        encoded.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("{}: {e}", self.path.display()))?;
        file.write_all(encoded.as_bytes())
            .map_err(|e| format!("{}: {e}", self.path.display()))
    }
}

impl EpisodeRecorder for JsonlEpisodeRecorder {
    fn record_episode(&self, episode: &EpisodeDraft) -> Result<Uuid, FeedbackError> {
        let line = EpisodeLine {
            id: Uuid::now_v7(),
            user_id: episode.user_id.clone(),
            routine_id: episode.routine_id.clone(),
            outcome_type: episode.outcome_type,
            outcome_text: episode.outcome_text.clone(),
            created_at: Utc::now(),
        };
        self.append(&line)
            .map_err(|message| FeedbackError::EpisodeWrite {
                routine_id: episode.routine_id.clone(),
                message,
            })?;
        tracing::info!(
            episode_id = %line.id,
            routine_id = %line.routine_id,
            outcome_type = line.outcome_type.as_str(),
            path = %self.path.display(),
            "episode recorded"
        );
        Ok(line.id)
    }
}

/// Issues episode ids without persisting anything.
pub struct DryRunRecorder;

impl EpisodeRecorder for DryRunRecorder {
    fn record_episode(&self, episode: &EpisodeDraft) -> Result<Uuid, FeedbackError> {
        let id = Uuid::now_v7();
        tracing::info!(
            episode_id = %id,
            routine_id = %episode.routine_id,
            "dry run: episode not persisted"
        );
        Ok(id)
    }
}
