use fk_parallel::Partitioner;
use nalgebra::DVector;
use std::ops::AddAssign;
use std::sync::Arc;

/// A vector whose entries are distributed over the ranks by a [`Partitioner`].
///
/// Each rank stores its owned entries. Additions to ghost entries are buffered locally and
/// sent to the owning ranks by [`compress_add`](Self::compress_add).
#[derive(Debug, Clone)]
pub struct DistributedVector {
    partitioner: Arc<Partitioner>,
    owned: DVector<f64>,
    ghost_contributions: DVector<f64>,
}

impl DistributedVector {
    /// A zero vector with the layout of the given partitioner.
    pub fn new(partitioner: Arc<Partitioner>) -> Self {
        let owned = DVector::zeros(partitioner.n_owned());
        let ghost_contributions = DVector::zeros(partitioner.n_ghosts());
        Self {
            partitioner,
            owned,
            ghost_contributions,
        }
    }

    pub fn partitioner(&self) -> &Arc<Partitioner> {
        &self.partitioner
    }

    pub fn owned_values(&self) -> &DVector<f64> {
        &self.owned
    }

    pub fn owned_values_mut(&mut self) -> &mut DVector<f64> {
        &mut self.owned
    }

    /// Sets every owned entry to `value` and discards pending ghost contributions.
    pub fn fill(&mut self, value: f64) {
        self.owned.fill(value);
        self.ghost_contributions.fill(0.0);
    }

    /// The value of an owned entry, or `None` if the index is not owned by this rank.
    pub fn get(&self, global_index: usize) -> Option<f64> {
        let owned = self.partitioner.owned_range();
        owned
            .contains(&global_index)
            .then(|| self.owned[global_index - owned.start])
    }

    /// Adds `values[k]` to entry `indices[k]` for every `k`.
    ///
    /// # Panics
    ///
    /// Panics if an index is neither owned nor a ghost of this rank.
    pub fn add(&mut self, indices: &[usize], values: &[f64]) {
        assert_eq!(indices.len(), values.len());
        let n_owned = self.owned.len();
        for (&index, &value) in indices.iter().zip(values) {
            let local = self
                .partitioner
                .global_to_local(index)
                .unwrap_or_else(|| panic!("index {} is not locally relevant", index));
            if local < n_owned {
                self.owned[local] += value;
            } else {
                self.ghost_contributions[local - n_owned] += value;
            }
        }
    }

    /// Sends buffered ghost contributions to their owners and adds them there. Collective.
    pub fn compress_add(&mut self) {
        self.partitioner
            .compress_add(self.ghost_contributions.as_mut_slice(), self.owned.as_mut_slice());
    }

    /// Global dot product of the owned entries. Collective.
    pub fn dot(&self, other: &DistributedVector) -> f64 {
        self.partitioner
            .communicator()
            .all_reduce_sum(self.owned.dot(&other.owned))
    }

    /// Global Euclidean norm of the owned entries. Collective.
    pub fn l2_norm(&self) -> f64 {
        self.partitioner
            .communicator()
            .all_reduce_sum(self.owned.norm_squared())
            .sqrt()
    }

    /// Global maximum absolute entry. Collective.
    pub fn linfty_norm(&self) -> f64 {
        self.partitioner
            .communicator()
            .all_reduce_max(self.owned.iter().fold(0.0f64, |max, x| max.max(x.abs())))
    }

    /// Copies the owned entries of `other` into `self`.
    pub fn copy_from(&mut self, other: &DistributedVector) {
        debug_assert!(Arc::ptr_eq(&self.partitioner, &other.partitioner));
        self.owned.copy_from(&other.owned);
        self.ghost_contributions.fill(0.0);
    }
}

impl AddAssign<&DistributedVector> for DistributedVector {
    fn add_assign(&mut self, rhs: &DistributedVector) {
        debug_assert!(Arc::ptr_eq(&self.partitioner, &rhs.partitioner));
        self.owned += &rhs.owned;
    }
}

/// A read-only view of a distributed vector that also holds the values of the ghost entries.
///
/// Values are laid out as in [`Partitioner`]: owned entries first, then ghosts. Ghost values
/// are refreshed from the owners by [`update_from`](Self::update_from).
#[derive(Debug, Clone)]
pub struct GhostedVector {
    partitioner: Arc<Partitioner>,
    values: DVector<f64>,
}

impl GhostedVector {
    pub fn new(partitioner: Arc<Partitioner>) -> Self {
        let values = DVector::zeros(partitioner.n_local());
        Self { partitioner, values }
    }

    pub fn partitioner(&self) -> &Arc<Partitioner> {
        &self.partitioner
    }

    /// Copies the owned entries of `source` and refreshes all ghost entries from their
    /// owners. Collective.
    pub fn update_from(&mut self, source: &DistributedVector) {
        debug_assert!(Arc::ptr_eq(&self.partitioner, &source.partitioner));
        let n_owned = self.partitioner.n_owned();
        let (owned, ghosts) = self.values.as_mut_slice().split_at_mut(n_owned);
        owned.copy_from_slice(source.owned.as_slice());
        self.partitioner.update_ghost_values(owned, ghosts);
    }

    /// Copies all local values, owned and ghost, from another ghosted vector with the same layout.
    pub fn copy_from(&mut self, other: &GhostedVector) {
        debug_assert!(Arc::ptr_eq(&self.partitioner, &other.partitioner));
        self.values.copy_from(&other.values);
    }

    /// Owned entries followed by ghost entries.
    pub fn local_values(&self) -> &DVector<f64> {
        &self.values
    }

    /// The value of a locally relevant entry.
    ///
    /// # Panics
    ///
    /// Panics if the index is neither owned nor a ghost of this rank.
    pub fn value(&self, global_index: usize) -> f64 {
        let local = self
            .partitioner
            .global_to_local(global_index)
            .unwrap_or_else(|| panic!("index {} is not locally relevant", global_index));
        self.values[local]
    }

    /// Writes the values of `indices` into `values`.
    pub fn gather(&self, indices: &[usize], values: &mut [f64]) {
        assert_eq!(indices.len(), values.len());
        for (value, &index) in values.iter_mut().zip(indices) {
            *value = self.value(index);
        }
    }
}
