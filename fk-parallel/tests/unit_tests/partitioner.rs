use fk_parallel::{Communicator, Partitioner, Universe};
use proptest::prelude::*;
use std::ops::Range;

/// Splits `[0, n)` into `size` contiguous ranges, the first ones one longer if needed.
fn block_range(n: usize, size: usize, rank: usize) -> Range<usize> {
    let base = n / size;
    let remainder = n % size;
    let start = rank * base + rank.min(remainder);
    let len = base + usize::from(rank < remainder);
    start..start + len
}

/// Ghosts of a periodic 1D stencil: the two neighbors of each end of the owned range.
fn stencil_ghosts(owned: &Range<usize>, n: usize) -> Vec<usize> {
    if owned.is_empty() {
        return Vec::new();
    }
    vec![(owned.start + n - 1) % n, owned.end % n, owned.start, (owned.end + n - 2) % n]
}

#[test]
fn layout_queries() {
    let results = Universe::run(3, |comm| {
        let owned = block_range(10, 3, comm.rank());
        let ghosts = stencil_ghosts(&owned, 10);
        let partitioner = Partitioner::new(&comm, owned.clone(), ghosts);
        (owned, partitioner)
    });

    let (owned, p) = &results[1];
    assert_eq!(owned, &(4..7));
    assert_eq!(p.global_size(), 10);
    assert_eq!(p.owned_ranges(), &[0..4, 4..7, 7..10]);
    // Owned indices among the requested ghosts are dropped
    assert_eq!(p.ghost_indices(), &[3, 7]);
    assert_eq!(p.n_local(), 5);
    assert_eq!(p.owner_of(0), 0);
    assert_eq!(p.owner_of(3), 0);
    assert_eq!(p.owner_of(4), 1);
    assert_eq!(p.owner_of(9), 2);
    assert_eq!(p.global_to_local(5), Some(1));
    assert_eq!(p.global_to_local(3), Some(3));
    assert_eq!(p.global_to_local(7), Some(4));
    assert_eq!(p.global_to_local(0), None);
    for local in 0..p.n_local() {
        assert_eq!(p.global_to_local(p.local_to_global(local)), Some(local));
    }

    let (_, p0) = &results[0];
    assert_eq!(p0.ghost_indices(), &[4, 9]);
}

#[test]
fn ghost_update_reads_owner_values() {
    let n = 11;
    let results = Universe::run(3, |comm| {
        let owned = block_range(n, comm.size(), comm.rank());
        let partitioner = Partitioner::new(&comm, owned.clone(), stencil_ghosts(&owned, n));
        let owned_values: Vec<f64> = owned.clone().map(|i| (i * i) as f64).collect();
        let mut ghosts = vec![f64::NAN; partitioner.n_ghosts()];
        partitioner.update_ghost_values(&owned_values, &mut ghosts);
        let first = ghosts.clone();
        // Refreshing again without changes is idempotent
        partitioner.update_ghost_values(&owned_values, &mut ghosts);
        (partitioner.ghost_indices().to_vec(), first, ghosts)
    });

    for (indices, first, second) in results {
        let expected: Vec<f64> = indices.iter().map(|&i| (i * i) as f64).collect();
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }
}

#[test]
fn compress_add_accumulates_on_owners() {
    let n = 9;
    let results = Universe::run(3, |comm| {
        let owned = block_range(n, comm.size(), comm.rank());
        // Every rank contributes 1 to every index
        let all: Vec<usize> = (0..n).collect();
        let partitioner = Partitioner::new(&comm, owned.clone(), all);
        let mut owned_values = vec![1.0; partitioner.n_owned()];
        let mut ghosts = vec![1.0; partitioner.n_ghosts()];
        partitioner.compress_add(&mut ghosts, &mut owned_values);
        (owned_values, ghosts)
    });

    for (owned_values, ghosts) in results {
        assert!(owned_values.iter().all(|&v| v == 3.0));
        assert!(ghosts.iter().all(|&v| v == 0.0));
    }
}

#[test]
fn ranks_without_indices_take_part_in_exchanges() {
    let results = Universe::run(4, |comm: Communicator| {
        // Rank 2 owns nothing and has no ghosts
        let ranges = [0..3, 3..5, 5..5, 5..8];
        let owned = ranges[comm.rank()].clone();
        let ghosts = if owned.is_empty() { vec![] } else { vec![0, 7] };
        let partitioner = Partitioner::new(&comm, owned.clone(), ghosts);
        let owned_values: Vec<f64> = owned.map(|i| i as f64).collect();
        let mut ghost_values = vec![0.0; partitioner.n_ghosts()];
        partitioner.update_ghost_values(&owned_values, &mut ghost_values);
        (partitioner.owner_of(5), ghost_values)
    });

    assert_eq!(results[0], (3, vec![7.0]));
    assert_eq!(results[1], (3, vec![0.0, 7.0]));
    assert_eq!(results[2], (3, vec![]));
    assert_eq!(results[3], (3, vec![0.0]));
}

#[test]
#[should_panic]
fn non_contiguous_ranges_are_rejected() {
    Universe::run(2, |comm| {
        let owned = if comm.rank() == 0 { 0..3 } else { 4..6 };
        Partitioner::new(&comm, owned, Vec::new())
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn ghost_update_matches_global_vector(n in 1usize..40, size in 1usize..5, seed in 0usize..1000) {
        let results = Universe::run(size, |comm| {
            let owned = block_range(n, comm.size(), comm.rank());
            let ghosts: Vec<usize> = (0..n).filter(|i| (i * 7 + seed + comm.rank()) % 3 == 0).collect();
            let partitioner = Partitioner::new(&comm, owned.clone(), ghosts);
            let owned_values: Vec<f64> = owned.map(|i| i as f64 + 0.5).collect();
            let mut ghost_values = vec![0.0; partitioner.n_ghosts()];
            partitioner.update_ghost_values(&owned_values, &mut ghost_values);
            (partitioner.ghost_indices().to_vec(), ghost_values)
        });

        for (indices, values) in results {
            let expected: Vec<f64> = indices.iter().map(|&i| i as f64 + 0.5).collect();
            prop_assert_eq!(values, expected);
        }
    }
}
