//! Supervised recovery: advisory target locks and the state-machine
//! orchestrator.

pub mod locks;
pub mod orchestrator;
