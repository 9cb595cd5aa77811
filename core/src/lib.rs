//! Feedback resolution for Spotter.
//!
//! Given a free-text message, decides which previously generated training
//! routine (if any) it is feedback about, and whether to record it, ask the
//! user to pick, or stay silent. Collaborators (candidate store, chat
//! membership, text understanding, episode store) are injected through the
//! traits in [`pipeline`], [`scoring`], [`signals`] and [`feedback`].

pub mod clarification;
pub mod config;
pub mod error;
pub mod feedback;
pub mod pipeline;
pub mod resolution;
pub mod routines;
pub mod scoring;
pub mod signals;
