//! Tubewatch daemon library
//!
//! Everything behind the `tubewatch` binary: configuration, logging setup
//! and the event loop that connects the watcher to the uploader.

pub mod config;
pub mod daemon;
pub mod logging;
