//! Companion - a terminal AI companion with memory and personality
//!
//! This crate provides:
//! - Multi-provider language model orchestration with offline fallback
//! - Session and SQLite-backed long-term memory
//! - Selectable personalities that shape the system prompt
//! - Per-user profiles learned from conversation

pub mod ai;
pub mod cli;
pub mod commands;
pub mod companion;
pub mod concurrency;
pub mod config;
pub mod conversation;
pub mod logging;
pub mod memory;
pub mod paths;
pub mod personality;
pub mod profile;
pub mod text;
pub mod ui;

pub use companion::Companion;
pub use config::Config;
