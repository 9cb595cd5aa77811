use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ResolutionConfig;
use crate::routines::RoutineCandidate;
use crate::scoring::{CandidateScorer, ChatMembership, ScoredCandidate};
use crate::signals::TargetSignals;

/// A routine offered back to the user when the engine cannot pick one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationCandidate {
    pub id: String,
    pub title: String,
}

/// Terminal result of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ResolutionDecision {
    Resolved { routine_id: String },
    Clarification { candidates: Vec<ClarificationCandidate> },
    Ignore,
}

impl ResolutionDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionDecision::Resolved { .. } => "resolved",
            ResolutionDecision::Clarification { .. } => "clarification",
            ResolutionDecision::Ignore => "ignore",
        }
    }
}

/// Which rule of the decision policy produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ExplicitReference,
    NoCandidates,
    BelowConfidenceFloor,
    SingleCandidate,
    ClearWinner,
    AmbiguousTopCandidates,
    /// Scores cleared the floor but matched no resolve/clarify rule,
    /// e.g. a lone candidate at exactly the threshold or a mid-range top
    /// score with a wide margin.
    NoDecisiveRule,
}

/// Why the decider decided what it did. Returned alongside the decision
/// instead of being logged implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDiagnostics {
    pub reason: DecisionReason,
    pub candidates_considered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_gap: Option<f64>,
    /// Ranked candidates; empty when scoring was skipped
    #[serde(default)]
    pub scored_candidates: Vec<ScoredCandidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub decision: ResolutionDecision,
    pub diagnostics: ResolutionDiagnostics,
}

/// Applies the fixed decision policy over a candidate set.
///
/// Phase 1: an explicit routine reference wins outright, in candidate
/// order, without scoring. Phase 2: score, then ignore below the
/// confidence floor, resolve a clear winner, ask when the top is
/// contested, and ignore whatever is left.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionDecider<'a> {
    config: &'a ResolutionConfig,
    scorer: CandidateScorer<'a>,
}

impl<'a> ResolutionDecider<'a> {
    pub fn new(config: &'a ResolutionConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            scorer: CandidateScorer::new(config, now),
        }
    }

    pub fn resolve(
        &self,
        candidates: &[RoutineCandidate],
        signals: &TargetSignals,
        chat_id: &str,
        membership: &dyn ChatMembership,
    ) -> Resolution {
        if let Some(resolution) = self.resolve_explicit_reference(candidates, signals) {
            return resolution;
        }

        let mut diagnostics = ResolutionDiagnostics {
            reason: DecisionReason::NoCandidates,
            candidates_considered: candidates.len(),
            matched_reference: None,
            top_score: None,
            score_gap: None,
            scored_candidates: Vec::new(),
        };
        if candidates.is_empty() {
            return Resolution {
                decision: ResolutionDecision::Ignore,
                diagnostics,
            };
        }

        let scored = self
            .scorer
            .score_candidates(candidates, signals, chat_id, membership);
        let top_score = scored[0].total_score;
        let score_gap = scored.get(1).map(|second| top_score - second.total_score);
        diagnostics.top_score = Some(top_score);
        diagnostics.score_gap = score_gap;

        let (decision, reason) = match score_gap {
            _ if top_score < self.config.confidence_floor => {
                (ResolutionDecision::Ignore, DecisionReason::BelowConfidenceFloor)
            }
            None if top_score > self.config.single_candidate_min => (
                resolved(&scored[0]),
                DecisionReason::SingleCandidate,
            ),
            Some(gap)
                if top_score > self.config.auto_resolve_min
                    && gap > self.config.clarification_gap =>
            {
                (resolved(&scored[0]), DecisionReason::ClearWinner)
            }
            Some(gap)
                if top_score > self.config.clarification_min
                    && gap <= self.config.clarification_gap =>
            {
                (
                    ResolutionDecision::Clarification {
                        candidates: scored
                            .iter()
                            .take(self.config.clarification_size)
                            .map(|c| ClarificationCandidate {
                                id: c.routine_id.clone(),
                                title: c.title.clone(),
                            })
                            .collect(),
                    },
                    DecisionReason::AmbiguousTopCandidates,
                )
            }
            _ => (ResolutionDecision::Ignore, DecisionReason::NoDecisiveRule),
        };

        tracing::debug!(
            decision = decision.kind(),
            reason = ?reason,
            top_score,
            score_gap = ?score_gap,
            candidates = candidates.len(),
            "resolution decided"
        );

        diagnostics.reason = reason;
        diagnostics.scored_candidates = scored;
        Resolution {
            decision,
            diagnostics,
        }
    }

    /// First candidate (in given order) whose title contains a reference or
    /// is contained in one. Candidates struck out by a negation are skipped
    /// so an excluded routine never wins; a reference that only names
    /// negated routines falls through to scoring. Blank titles never match.
    fn resolve_explicit_reference(
        &self,
        candidates: &[RoutineCandidate],
        signals: &TargetSignals,
    ) -> Option<Resolution> {
        let references: Vec<String> = signals
            .explicit_routine_refs
            .iter()
            .map(|reference| reference.trim().to_lowercase())
            .filter(|reference| !reference.is_empty())
            .collect();
        if references.is_empty() {
            return None;
        }

        candidates.iter().find_map(|candidate| {
            if CandidateScorer::is_negated(candidate, signals) {
                return None;
            }
            let title = candidate.routine_title.trim().to_lowercase();
            if title.is_empty() {
                return None;
            }
            let reference = references.iter().find(|reference| {
                title.contains(reference.as_str()) || reference.contains(title.as_str())
            })?;

            tracing::debug!(
                routine_id = %candidate.id,
                reference = %reference,
                "explicit routine reference matched"
            );
            Some(Resolution {
                decision: ResolutionDecision::Resolved {
                    routine_id: candidate.id.clone(),
                },
                diagnostics: ResolutionDiagnostics {
                    reason: DecisionReason::ExplicitReference,
                    candidates_considered: candidates.len(),
                    matched_reference: Some(reference.clone()),
                    top_score: None,
                    score_gap: None,
                    scored_candidates: Vec::new(),
                },
            })
        })
    }
}

fn resolved(candidate: &ScoredCandidate) -> ResolutionDecision {
    ResolutionDecision::Resolved {
        routine_id: candidate.routine_id.clone(),
    }
}
