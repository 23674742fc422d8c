//! plumb: a parallel layout-test runner and regression triage engine.
//!
//! Drives many instances of an external rendering harness, classifies
//! captured output against stored baselines, and reconciles observed
//! outcomes against declarative expectation files.

pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod expectations;
pub mod fs;
pub mod harness;
pub mod models;
pub mod queue;
pub mod reconcile;
pub mod stats;
pub mod worker;
