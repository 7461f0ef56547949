//! # forgekeeper-cli
//!
//! Command-line interface for the forgekeeper engine.
//!
//! - **verify**: run an integrity sweep across every tier
//! - **status**: summarize tier health and the newest recoverable snapshot
//! - **snapshot**: bundle artifacts and push them to the remote tiers
//! - **restore**: run a supervised recovery into a target environment
//! - **prune**: apply retention, gated on the administrator credential
//! - **risk**: score anomaly indicators against the recovery threshold
//! - **drill**: rehearse a full restore into a throwaway target

pub mod cli;
pub mod config;
pub mod hooks;
pub mod output;

pub use cli::run;
