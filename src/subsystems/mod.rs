//! Pipeline stages and the surfaces around them.

pub mod comms;
pub mod generation;
pub mod knowledge;
pub mod memory;
pub mod nlu;
pub mod orchestrator;
pub mod remote;
