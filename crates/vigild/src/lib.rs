//! Vigil collection daemon library - exposes modules for testing.

pub mod cache;
pub mod crypto;
pub mod fetcher;
pub mod runner;
pub mod simulator;
pub mod source;
pub mod summarizer;
