//! Registry push notifications in, compose project updates out.
//!
//! Two services share this crate. The listener accepts registry webhooks,
//! extracts the pushed image references and relays them to the executor.
//! The executor finds the containers running those images and pulls and
//! reconciles the compose projects they belong to.

pub mod auth;
pub mod compose;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod listener;
pub mod orchestrator;
pub mod relay;
pub mod resolver;
pub mod runtime;
pub mod types;
pub mod web;
pub mod webhook;
