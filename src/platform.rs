//! Runtime bootstrap: a communicator plus a rank-aware output stream.
//!
//! Only rank 0 prints; every other rank writes into a sink so that the same
//! driver code can emit output unconditionally.

use std::io::Write;

use crate::algs::communicator::{Communicator, NoComm};
#[cfg(feature = "mpi-support")]
use crate::algs::communicator::MpiComm;
#[cfg(feature = "mpi-support")]
use crate::dist_error::DistError;

/// A started parallel session.
#[derive(Debug)]
pub struct Session<C: Communicator> {
    comm: C,
    args: Vec<String>,
}

impl Session<NoComm> {
    /// Single-process session.
    pub fn serial<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Session::with_comm(NoComm, args)
    }
}

#[cfg(feature = "mpi-support")]
impl Session<MpiComm> {
    /// Initialize MPI and run over `MPI_COMM_WORLD`.
    pub fn mpi<I>(args: I) -> Result<Self, DistError>
    where
        I: IntoIterator<Item = String>,
    {
        Ok(Session::with_comm(MpiComm::new()?, args))
    }
}

impl<C: Communicator> Session<C> {
    /// Wrap an already created communicator.
    pub fn with_comm<I>(comm: C, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        log::info!(
            "session started on rank {} of {} ({} args)",
            comm.rank(),
            comm.size(),
            args.len()
        );
        Session { comm, args }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Command-line arguments, unchanged.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Output stream for this rank; see [`output_stream`].
    pub fn output(&self) -> Box<dyn Write + Send> {
        output_stream(&self.comm)
    }
}

/// Standard output on rank 0, a discard sink on every other rank.
pub fn output_stream<C>(comm: &C) -> Box<dyn Write + Send>
where
    C: Communicator + ?Sized,
{
    output_stream_with(comm, std::io::stdout())
}

/// `root` on rank 0, a discard sink on every other rank.
pub fn output_stream_with<C, W>(comm: &C, root: W) -> Box<dyn Write + Send>
where
    C: Communicator + ?Sized,
    W: Write + Send + 'static,
{
    if comm.rank() == 0 {
        Box::new(root)
    } else {
        Box::new(std::io::sink())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::algs::communicator::ThreadComm;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn only_rank_zero_output_reaches_the_writer() {
        let buf = SharedBuf::default();
        ThreadComm::run(3, |comm| {
            let mut out = output_stream_with(&comm, buf.clone());
            writeln!(out, "hello from rank {}", comm.rank()).unwrap();
            out.flush().unwrap();
        });
        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert_eq!(text, "hello from rank 0\n");
    }

    #[test]
    fn serial_session_keeps_args() {
        let s = Session::serial(vec!["prog".to_string(), "--flag".to_string()]);
        assert_eq!(s.args(), &["prog".to_string(), "--flag".to_string()]);
        assert_eq!(s.comm().size(), 1);
    }
}
