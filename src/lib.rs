//! Adherex: medication adherence tracking backend.
//!
//! Patients and their caretakers register accounts, maintain medication
//! schedules, and record dose events (manually or from a pillbox
//! trigger). The adherence engine scores the history into timing
//! windows, consumption ratios and milestone badges, and a support
//! assistant answers questions with the patient's context.

pub mod adherence;
pub mod api;
pub mod assistant;
pub mod auth;
pub mod config;
pub mod db;
pub mod notify;
