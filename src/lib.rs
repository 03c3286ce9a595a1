#![cfg_attr(docsrs, feature(doc_cfg))]
//! # distvec
//!
//! distvec provides distributed index maps and dense distributed vectors over
//! pluggable communicators, plus a walkthrough routine that exercises them.
//!
//! ## Features
//! - Communicator backends: serial ([`NoComm`](algs::communicator::NoComm)),
//!   in-process threads ([`ThreadComm`](algs::communicator::ThreadComm)) and
//!   MPI (`mpi-support` feature)
//! - Contiguous, user-sized and explicit-list (e.g. cyclic) [`Map`](data::map::Map)s
//! - [`Vector`](data::vector::Vector) with scaled updates, dot products and norms
//!
//! ## Determinism
//!
//! Reductions fold contributions in rank order and random fills use `SmallRng`
//! seeds mixed with the rank, so a run is reproducible for a fixed process count.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! distvec = "0.1"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod data;
pub mod demo;
pub mod dist_error;
pub mod platform;

use once_cell::sync::Lazy;

static VERSION: Lazy<String> =
    Lazy::new(|| format!("distvec version {}", env!("CARGO_PKG_VERSION")));

/// Human-readable library version banner.
pub fn version() -> &'static str {
    VERSION.as_str()
}

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::data::directory::Directory;
    pub use crate::data::map::{GlobalOrdinal, LocalGlobal, LocalOrdinal, Map};
    pub use crate::data::scalar::Scalar;
    pub use crate::data::vector::Vector;
    pub use crate::demo::{DemoConfig, DemoReport, DiagnosticHook, example_routine};
    pub use crate::dist_error::DistError;
    pub use crate::platform::{Session, output_stream, output_stream_with};
}
