//! cargo run --bin dist_vectors
//! cargo mpirun -n 4 --features mpi-support --bin dist_vectors
//!
//! Builds a block map and a cyclic map, three vectors over them, and prints
//! the norms after two scaled updates. Only rank 0 prints.

use std::io::Write;

use distvec::demo::{DemoConfig, example_routine};
use distvec::dist_error::DistError;
use distvec::platform::Session;

fn main() -> Result<(), DistError> {
    env_logger::init();

    #[cfg(feature = "mpi-support")]
    let session = Session::mpi(std::env::args())?;
    #[cfg(not(feature = "mpi-support"))]
    let session = Session::serial(std::env::args());

    let config = DemoConfig::from_env()?;
    let mut out = session.output();
    if let Err(err) = example_routine(session.comm(), &mut out, &config, None) {
        log::error!("example routine failed: {err}");
        return Err(err);
    }
    out.flush()?;
    Ok(())
}
