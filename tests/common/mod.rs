//! Integration test common infrastructure.
//!
//! Runs the `rankbot` binary against a scripted console session.

pub mod bot;

#[allow(unused_imports)]
pub use bot::{BotRun, TestBot};
