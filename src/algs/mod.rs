//! Communication layer: communicators, typed collectives and wire records.

pub mod collective;
pub mod communicator;
pub mod wire;

pub use communicator::{Communicator, NoComm, ThreadComm};
