use super::Chain;
use fk_parallel::Universe;
use fk_sparse::{DistributedVector, GhostedVector};
use matrixcompare::assert_scalar_eq;
use std::sync::Arc;

#[test]
fn cell_contributions_are_summed_on_owners() {
    let n_cells = 9;
    let results = Universe::run(3, |comm| {
        let chain = Chain::new(&comm, n_cells);
        let mut vector = DistributedVector::new(Arc::clone(&chain.partitioner));
        for e in chain.cells.clone() {
            vector.add(&[e, e + 1], &[1.0, 1.0]);
        }
        vector.compress_add();
        (chain.partitioner.owned_range(), vector.owned_values().clone())
    });

    for (owned, values) in results {
        for (global, value) in owned.zip(values.iter()) {
            let expected = if global == 0 || global == n_cells { 1.0 } else { 2.0 };
            assert_eq!(*value, expected);
        }
    }
}

#[test]
fn norms_and_dot_are_global() {
    let n_cells = 7;
    let results = Universe::run(3, |comm| {
        let chain = Chain::new(&comm, n_cells);
        let mut vector = DistributedVector::new(Arc::clone(&chain.partitioner));
        let owned = chain.partitioner.owned_range();
        for (local, global) in owned.enumerate() {
            vector.owned_values_mut()[local] = global as f64 - 3.0;
        }
        (vector.l2_norm(), vector.linfty_norm(), vector.dot(&vector))
    });

    // Entries -3, ..., 4
    let expected_dot: f64 = (0..=7).map(|i| ((i - 3) * (i - 3)) as f64).sum();
    for (l2, linfty, dot) in results {
        assert_scalar_eq!(dot, expected_dot, comp = abs, tol = 1e-12);
        assert_scalar_eq!(l2, expected_dot.sqrt(), comp = abs, tol = 1e-12);
        assert_eq!(linfty, 4.0);
    }
}

#[test]
fn ghosted_vector_sees_owner_values() {
    let n_cells = 8;
    let results = Universe::run(4, |comm| {
        let chain = Chain::new(&comm, n_cells);
        let mut owned = DistributedVector::new(Arc::clone(&chain.partitioner));
        let range = chain.partitioner.owned_range();
        for (local, global) in range.enumerate() {
            owned.owned_values_mut()[local] = 10.0 * global as f64;
        }
        let mut ghosted = GhostedVector::new(Arc::clone(&chain.partitioner));
        ghosted.update_from(&owned);

        chain
            .cells
            .clone()
            .flat_map(|e| [e, e + 1])
            .map(|node| (node, ghosted.value(node)))
            .collect::<Vec<_>>()
    });

    for (node, value) in results.into_iter().flatten() {
        assert_eq!(value, 10.0 * node as f64);
    }
}

#[test]
fn add_assign_and_fill() {
    Universe::run(2, |comm| {
        let chain = Chain::new(&comm, 4);
        let mut a = DistributedVector::new(Arc::clone(&chain.partitioner));
        let mut b = DistributedVector::new(Arc::clone(&chain.partitioner));
        a.fill(1.0);
        b.fill(2.5);
        a += &b;
        assert!(a.owned_values().iter().all(|&v| v == 3.5));
        for global in chain.partitioner.owned_range() {
            assert_eq!(a.get(global), Some(3.5));
        }
        assert_eq!(a.get(chain.partitioner.global_size()), None);
    });
}
