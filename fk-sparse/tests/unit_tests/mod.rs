mod cg;
mod vector;

use fk_parallel::{Communicator, Partitioner};
use fk_sparse::{DistributedCsrMatrix, DistributedSparsityPattern};
use nalgebra::{DMatrix, DVector};
use std::ops::Range;
use std::sync::Arc;

/// Splits `[0, n)` into contiguous blocks, the first ones one longer if needed.
pub fn block_range(n: usize, size: usize, rank: usize) -> Range<usize> {
    let base = n / size;
    let remainder = n % size;
    let start = rank * base + rank.min(remainder);
    start..start + base + usize::from(rank < remainder)
}

/// A chain of `n_cells` two-node cells, cell `e` connecting nodes `e` and `e + 1`.
///
/// Cells are distributed over the ranks in contiguous blocks, and node `i` is owned by the
/// lowest rank among the cells touching it, which mimics the ownership rule of the finite
/// element degrees of freedom.
pub struct Chain {
    pub cells: Range<usize>,
    pub partitioner: Arc<Partitioner>,
}

impl Chain {
    pub fn new(comm: &Communicator, n_cells: usize) -> Self {
        let cell_ranges: Vec<_> = (0..comm.size())
            .map(|rank| block_range(n_cells, comm.size(), rank))
            .collect();
        let node_owner = |node: usize| {
            cell_ranges
                .iter()
                .position(|cells| cells.contains(&node) || (node > 0 && cells.contains(&(node - 1))))
                .unwrap()
        };
        let first = (0..=n_cells).position(|node| node_owner(node) == comm.rank());
        let count = (0..=n_cells)
            .filter(|&node| node_owner(node) == comm.rank())
            .count();
        let start = first.unwrap_or_else(|| {
            (0..=n_cells)
                .find(|&node| node_owner(node) > comm.rank())
                .unwrap_or(n_cells + 1)
        });
        let cells = cell_ranges[comm.rank()].clone();
        let ghosts = cells.clone().flat_map(|e| [e, e + 1]);
        let partitioner = Arc::new(Partitioner::new(comm, start..start + count, ghosts));
        Self { cells, partitioner }
    }

    /// Element matrix of cell `e` of a shifted 1D Laplacian, which is symmetric positive definite.
    pub fn element_matrix(e: usize) -> DMatrix<f64> {
        let k = 1.0 + 0.1 * e as f64;
        DMatrix::from_row_slice(2, 2, &[k + 0.5, -k, -k, k + 0.5])
    }

    pub fn assemble(&self) -> DistributedCsrMatrix {
        let mut pattern = DistributedSparsityPattern::new(Arc::clone(&self.partitioner));
        for e in self.cells.clone() {
            pattern.add_cell_entries(&[e, e + 1]);
        }
        pattern.compress();

        let mut matrix = DistributedCsrMatrix::new(&pattern);
        for e in self.cells.clone() {
            matrix.add_block(&[e, e + 1], &Self::element_matrix(e));
        }
        matrix.compress_add();
        matrix
    }

    pub fn dense(n_cells: usize) -> DMatrix<f64> {
        let mut a = DMatrix::zeros(n_cells + 1, n_cells + 1);
        for e in 0..n_cells {
            let block = Self::element_matrix(e);
            for (i, j) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                a[(e + i, e + j)] += block[(i, j)];
            }
        }
        a
    }

    /// The owned entries of a global vector.
    pub fn restrict(&self, global: &DVector<f64>) -> DVector<f64> {
        let owned = self.partitioner.owned_range();
        DVector::from_column_slice(&global.as_slice()[owned])
    }
}
