//! Sales Hub consultation service library
//!
//! Backend for the sales dashboard: it consults client and archetype profiles
//! through the automation webhook, normalizes whatever shape the webhook
//! answers with, paces the progress stages shown to the user, and forwards
//! client spreadsheets to the clustering flow.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `clustering`: Cluster upload flow.
//! - `config`: Configuration management.
//! - `consultation`: Consultation controller and stage pacing.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `models`: Core data models.
//! - `normalizer`: Webhook response normalization.
//! - `notifier`: Notice and progress reporting.
//! - `progress`: Progress tracker.
//! - `webhook_client`: Automation webhook client.
//! - `webhook_models`: Webhook wire models.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod clustering;
pub mod config;
pub mod consultation;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod notifier;
pub mod progress;
pub mod webhook_client;
pub mod webhook_models;
