use fk_parallel::Partitioner;
use std::sync::Arc;

/// Sparsity pattern of a distributed matrix whose rows are laid out by a [`Partitioner`].
///
/// Entries are added cell by cell. Entries in rows owned by other ranks are buffered and sent
/// to their owners by the collective [`compress`](Self::compress), after which every rank
/// knows the complete column set of each of its owned rows.
#[derive(Debug, Clone)]
pub struct DistributedSparsityPattern {
    row_partitioner: Arc<Partitioner>,
    owned_rows: Vec<Vec<usize>>,
    off_process: Vec<(usize, usize)>,
    compressed: bool,
}

impl DistributedSparsityPattern {
    pub fn new(row_partitioner: Arc<Partitioner>) -> Self {
        let owned_rows = vec![Vec::new(); row_partitioner.n_owned()];
        Self {
            row_partitioner,
            owned_rows,
            off_process: Vec::new(),
            compressed: true,
        }
    }

    pub fn row_partitioner(&self) -> &Arc<Partitioner> {
        &self.row_partitioner
    }

    /// Adds the couplings of all pairs of `indices`, as produced by an element whose degrees
    /// of freedom are `indices`.
    pub fn add_cell_entries(&mut self, indices: &[usize]) {
        let owned = self.row_partitioner.owned_range();
        for &row in indices {
            if owned.contains(&row) {
                self.owned_rows[row - owned.start].extend_from_slice(indices);
            } else {
                self.off_process
                    .extend(indices.iter().map(|&col| (row, col)));
            }
        }
        self.compressed = false;
    }

    /// Exchanges buffered off-process entries with their owners and sorts every owned row.
    /// Collective.
    pub fn compress(&mut self) {
        let comm = self.row_partitioner.communicator();
        self.off_process.sort_unstable();
        self.off_process.dedup();

        let mut outgoing = vec![Vec::new(); comm.size()];
        for &(row, col) in &self.off_process {
            outgoing[self.row_partitioner.owner_of(row)].push((row, col));
        }
        self.off_process.clear();

        let owned = self.row_partitioner.owned_range();
        for entries in comm.all_to_all(outgoing) {
            for (row, col) in entries {
                self.owned_rows[row - owned.start].push(col);
            }
        }

        for row in &mut self.owned_rows {
            row.sort_unstable();
            row.dedup();
        }
        self.compressed = true;
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Sorted global column indices of the owned row `global_row`.
    pub fn row(&self, global_row: usize) -> &[usize] {
        let owned = self.row_partitioner.owned_range();
        &self.owned_rows[global_row - owned.start]
    }

    /// Number of stored entries in the owned rows.
    pub fn local_nnz(&self) -> usize {
        self.owned_rows.iter().map(Vec::len).sum()
    }

    pub(crate) fn owned_rows(&self) -> &[Vec<usize>] {
        &self.owned_rows
    }
}
