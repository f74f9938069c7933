//! prayertimes library - daily prayer times with a next-prayer countdown
//!
//! This module exports internal components for integration testing.

pub mod api;
pub mod app;
pub mod board;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod redact;
pub mod render;
pub mod resolver;
pub mod schedule;
pub mod time;
