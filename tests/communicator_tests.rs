use distvec::algs::collective::{all_equal, all_gather_value, all_reduce_sum};
use distvec::algs::communicator::{Communicator, NoComm, ThreadComm};

#[test]
fn no_comm_is_single_rank() {
    let comm = NoComm;
    assert!(comm.is_no_comm());
    assert_eq!(comm.allgatherv(&[1, 2, 3]), vec![vec![1, 2, 3]]);
    comm.barrier();
}

#[test]
fn thread_world_ranks_are_distinct() {
    let ranks = ThreadComm::run(4, |comm| (comm.rank(), comm.size(), comm.is_no_comm()));
    assert_eq!(
        ranks,
        vec![(0, 4, false), (1, 4, false), (2, 4, false), (3, 4, false)]
    );
}

#[test]
fn gathered_values_follow_rank_order() {
    let out = ThreadComm::run(3, |comm| all_gather_value(&comm, 100u64 + comm.rank() as u64));
    for got in out {
        assert_eq!(got, vec![100, 101, 102]);
    }
}

#[test]
fn float_sum_is_identical_on_every_rank() {
    let out = ThreadComm::run(4, |comm| all_reduce_sum(&comm, 0.1f64 * (comm.rank() + 1) as f64));
    assert!(out.windows(2).all(|w| w[0].to_bits() == w[1].to_bits()));
}

#[test]
fn all_equal_detects_disagreement() {
    let out = ThreadComm::run(3, |comm| {
        (
            all_equal(&comm, 7i64),
            all_equal(&comm, if comm.rank() == 2 { 8i64 } else { 7 }),
        )
    });
    assert!(out.iter().all(|&(same, differ)| same && !differ));
}

#[test]
#[should_panic(expected = "at least one rank")]
fn empty_world_is_rejected() {
    let _ = ThreadComm::world(0);
}

#[cfg(feature = "mpi-support")]
#[test]
fn mpi_comm_smoke_if_available() {
    use distvec::algs::communicator::MpiComm;
    let world = MpiComm::new().expect("MPI initialization failed");
    let n = world.size();
    let got = all_gather_value(&world, world.rank() as u32);
    assert_eq!(got, (0..n as u32).collect::<Vec<_>>());
}
