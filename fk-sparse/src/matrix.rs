use crate::cg::{LinearOperator, OperatorError};
use crate::pattern::DistributedSparsityPattern;
use fk_parallel::Partitioner;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::sync::Arc;

/// A sparse matrix whose rows are distributed over the ranks.
///
/// Each rank stores its owned rows as a [`CsrMatrix`] in a local column numbering: owned
/// columns come first, in global order, followed by the ghost columns of the
/// [column partitioner](Self::column_partitioner). Rows are sorted by local column index, so
/// within a row the owned columns precede the ghost columns.
///
/// The sparsity pattern is fixed at construction. Adding to an entry outside the pattern is
/// a logic error and panics.
#[derive(Debug)]
pub struct DistributedCsrMatrix {
    row_partitioner: Arc<Partitioner>,
    column_partitioner: Arc<Partitioner>,
    local: CsrMatrix<f64>,
    off_process: Vec<(usize, usize, f64)>,
    /// Owned and ghost entries of the operand of a product.
    extended_operand: RefCell<DVector<f64>>,
}

impl DistributedCsrMatrix {
    /// A zero matrix with the given compressed sparsity pattern. Collective.
    ///
    /// # Panics
    ///
    /// Panics if the pattern has not been compressed.
    pub fn new(pattern: &DistributedSparsityPattern) -> Self {
        assert!(
            pattern.is_compressed(),
            "the sparsity pattern must be compressed before creating a matrix"
        );
        let row_partitioner = Arc::clone(pattern.row_partitioner());
        let owned = row_partitioner.owned_range();
        let comm = row_partitioner.communicator();

        let ghost_columns = pattern
            .owned_rows()
            .iter()
            .flatten()
            .copied()
            .filter(|col| !owned.contains(col));
        let column_partitioner = Arc::new(Partitioner::new(comm, owned.clone(), ghost_columns));

        let mut offsets = Vec::with_capacity(owned.len() + 1);
        let mut indices = Vec::with_capacity(pattern.local_nnz());
        offsets.push(0);
        for row in pattern.owned_rows() {
            let start = indices.len();
            indices.extend(row.iter().map(|&col| {
                column_partitioner
                    .global_to_local(col)
                    .expect("Internal error: every column of an owned row is owned or a ghost")
            }));
            indices[start..].sort_unstable();
            offsets.push(indices.len());
        }

        let values = vec![0.0; indices.len()];
        let local = CsrMatrix::try_from_csr_data(owned.len(), column_partitioner.n_local(), offsets, indices, values)
            .expect("Internal error: sorted, unique and in-bounds columns form a valid CSR matrix");
        let extended_operand = RefCell::new(DVector::zeros(column_partitioner.n_local()));

        Self {
            row_partitioner,
            column_partitioner,
            local,
            off_process: Vec::new(),
            extended_operand,
        }
    }

    pub fn row_partitioner(&self) -> &Arc<Partitioner> {
        &self.row_partitioner
    }

    pub fn column_partitioner(&self) -> &Arc<Partitioner> {
        &self.column_partitioner
    }

    /// The owned rows in local column numbering.
    pub fn local_matrix(&self) -> &CsrMatrix<f64> {
        &self.local
    }

    /// Number of global rows and columns.
    pub fn global_size(&self) -> usize {
        self.row_partitioner.global_size()
    }

    /// Zeroes all stored entries and discards buffered off-process contributions.
    pub fn set_zero(&mut self) {
        self.local.values_mut().fill(0.0);
        self.off_process.clear();
    }

    /// Adds the dense block `block` to the entries `(indices[a], indices[b])`.
    ///
    /// Contributions to rows owned by other ranks are buffered until [`compress_add`](Self::compress_add).
    pub fn add_block(&mut self, indices: &[usize], block: &DMatrix<f64>) {
        assert_eq!(block.nrows(), indices.len());
        assert_eq!(block.ncols(), indices.len());

        let owned = self.row_partitioner.owned_range();
        let local_columns: Vec<Option<usize>> = indices
            .iter()
            .map(|&col| self.column_partitioner.global_to_local(col))
            .collect();

        for (a, &row) in indices.iter().enumerate() {
            if owned.contains(&row) {
                let mut local_row = self.local.row_mut(row - owned.start);
                let (cols, values) = local_row.cols_and_values_mut();
                for (b, local_col) in local_columns.iter().copied().enumerate() {
                    let position = local_col
                        .and_then(|local_col| cols.binary_search(&local_col).ok())
                        .unwrap_or_else(|| panic!("entry ({}, {}) is outside the sparsity pattern", row, indices[b]));
                    values[position] += block[(a, b)];
                }
            } else {
                self.off_process
                    .extend(indices.iter().enumerate().map(|(b, &col)| (row, col, block[(a, b)])));
            }
        }
    }

    /// Adds a single entry, buffering it if the row is owned by another rank.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        let owned = self.row_partitioner.owned_range();
        if owned.contains(&row) {
            self.add_owned(row - owned.start, col, value);
        } else {
            self.off_process.push((row, col, value));
        }
    }

    fn add_owned(&mut self, local_row: usize, col: usize, value: f64) {
        let position = self.column_partitioner.global_to_local(col).and_then(|local_col| {
            self.local
                .row(local_row)
                .col_indices()
                .binary_search(&local_col)
                .ok()
        });
        match position {
            Some(position) => self.local.row_mut(local_row).values_mut()[position] += value,
            None => panic!("entry in local row {} and column {} is outside the sparsity pattern", local_row, col),
        }
    }

    /// Sends buffered contributions to the owners of their rows and adds them there. Collective.
    ///
    /// Received contributions are added in ascending order of the sending rank.
    pub fn compress_add(&mut self) {
        let comm = self.row_partitioner.communicator().clone();
        let mut outgoing = vec![Vec::new(); comm.size()];
        for (row, col, value) in self.off_process.drain(..) {
            outgoing[self.row_partitioner.owner_of(row)].push((row, col, value));
        }

        let owned_start = self.row_partitioner.owned_range().start;
        for entries in comm.all_to_all(outgoing) {
            for (row, col, value) in entries {
                self.add_owned(row - owned_start, col, value);
            }
        }
    }

    /// The entry at global `(row, col)`, or `None` if the row is not owned by this rank.
    ///
    /// Entries outside the sparsity pattern are zero.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let owned = self.row_partitioner.owned_range();
        if !owned.contains(&row) {
            return None;
        }
        let local_row = self.local.row(row - owned.start);
        let value = self
            .column_partitioner
            .global_to_local(col)
            .and_then(|local_col| local_row.col_indices().binary_search(&local_col).ok())
            .map_or(0.0, |position| local_row.values()[position]);
        Some(value)
    }

    /// Computes `y = A x` for owned vectors `x` and `y`. Collective.
    pub fn multiply(&self, y: &mut DVector<f64>, x: &DVector<f64>) {
        let n_owned = self.row_partitioner.n_owned();
        assert_eq!(x.len(), n_owned);
        assert_eq!(y.len(), n_owned);

        let mut extended = self.extended_operand.borrow_mut();
        let (owned, ghosts) = extended.as_mut_slice().split_at_mut(n_owned);
        owned.copy_from_slice(x.as_slice());
        self.column_partitioner.update_ghost_values(owned, ghosts);
        spmm_csr_dense(0.0, &mut *y, 1.0, Op::NoOp(&self.local), Op::NoOp(&*extended));
    }
}

impl LinearOperator for DistributedCsrMatrix {
    fn apply(&self, y: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), OperatorError> {
        self.multiply(y, x);
        Ok(())
    }
}
