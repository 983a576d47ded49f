//! Ownership layout of a distributed index space and the ghost exchange built on it.
use crate::Communicator;
use std::ops::Range;

/// Describes how a global index space `[0, N)` is split into contiguous per-rank ranges, and
/// which indices owned by other ranks (*ghosts*) the local rank reads or contributes to.
///
/// Local storage for data laid out by a partitioner consists of the owned entries in global
/// order, followed by the ghost entries in ascending global order. Within that layout, local
/// index `i < n_owned()` refers to global index `owned_range().start + i`, and local index
/// `n_owned() + k` refers to `ghost_indices()[k]`.
///
/// Construction and the exchange methods are collective.
#[derive(Debug, Clone)]
pub struct Partitioner {
    comm: Communicator,
    owned_ranges: Vec<Range<usize>>,
    ghost_indices: Vec<usize>,
    /// For every rank we import ghosts from: the rank and the positions of its ghosts in `ghost_indices`.
    ghost_sources: Vec<(usize, Range<usize>)>,
    /// For every rank that holds ghosts of our owned indices: the rank and the local offsets it reads.
    export_targets: Vec<(usize, Vec<usize>)>,
}

impl Partitioner {
    /// Creates the partitioner for the owned range `owned` of the calling rank and the given
    /// ghost indices.
    ///
    /// Ghost indices may be given in any order and may contain duplicates or owned indices,
    /// which are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the owned ranges of all ranks, in rank order, do not tile `[0, N)`, or if a
    /// ghost index lies outside `[0, N)`.
    pub fn new(comm: &Communicator, owned: Range<usize>, ghosts: impl IntoIterator<Item = usize>) -> Self {
        let owned_ranges = comm.all_gather(owned.clone());
        let mut expected_start = 0;
        for (rank, range) in owned_ranges.iter().enumerate() {
            assert!(
                range.start == expected_start && range.end >= range.start,
                "owned range {:?} of rank {} does not continue the ranges of lower ranks",
                range,
                rank
            );
            expected_start = range.end;
        }
        let global_size = expected_start;

        let mut ghost_indices: Vec<usize> = ghosts
            .into_iter()
            .filter(|index| !owned.contains(index))
            .collect();
        ghost_indices.sort_unstable();
        ghost_indices.dedup();
        if let Some(&last) = ghost_indices.last() {
            assert!(
                last < global_size,
                "ghost index {} is out of bounds for global size {}",
                last,
                global_size
            );
        }

        let mut ghost_sources: Vec<(usize, Range<usize>)> = Vec::new();
        for (position, &index) in ghost_indices.iter().enumerate() {
            let owner = owner_in(&owned_ranges, index);
            match ghost_sources.last_mut() {
                Some((rank, positions)) if *rank == owner => positions.end = position + 1,
                _ => ghost_sources.push((owner, position..position + 1)),
            }
        }

        let mut requests = vec![Vec::new(); comm.size()];
        for (rank, positions) in &ghost_sources {
            requests[*rank] = ghost_indices[positions.clone()].to_vec();
        }
        let export_targets = comm
            .all_to_all(requests)
            .into_iter()
            .enumerate()
            .filter(|(_, requested)| !requested.is_empty())
            .map(|(rank, requested)| {
                let offsets = requested
                    .into_iter()
                    .map(|index| index - owned.start)
                    .collect();
                (rank, offsets)
            })
            .collect();

        Self {
            comm: comm.clone(),
            owned_ranges,
            ghost_indices,
            ghost_sources,
            export_targets,
        }
    }

    pub fn communicator(&self) -> &Communicator {
        &self.comm
    }

    /// Size `N` of the global index space.
    pub fn global_size(&self) -> usize {
        self.owned_ranges.last().map_or(0, |range| range.end)
    }

    pub fn owned_range(&self) -> Range<usize> {
        self.owned_ranges[self.comm.rank()].clone()
    }

    /// Owned ranges of all ranks, in rank order.
    pub fn owned_ranges(&self) -> &[Range<usize>] {
        &self.owned_ranges
    }

    pub fn n_owned(&self) -> usize {
        self.owned_range().len()
    }

    pub fn ghost_indices(&self) -> &[usize] {
        &self.ghost_indices
    }

    pub fn n_ghosts(&self) -> usize {
        self.ghost_indices.len()
    }

    /// Number of locally stored entries, owned and ghost.
    pub fn n_local(&self) -> usize {
        self.n_owned() + self.n_ghosts()
    }

    /// The rank owning `global_index`.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub fn owner_of(&self, global_index: usize) -> usize {
        owner_in(&self.owned_ranges, global_index)
    }

    /// Maps a global index to its position in local storage, or `None` if the index is
    /// neither owned nor a ghost of this rank.
    pub fn global_to_local(&self, global_index: usize) -> Option<usize> {
        let owned = self.owned_range();
        if owned.contains(&global_index) {
            Some(global_index - owned.start)
        } else {
            self.ghost_indices
                .binary_search(&global_index)
                .ok()
                .map(|position| owned.len() + position)
        }
    }

    pub fn local_to_global(&self, local_index: usize) -> usize {
        let owned = self.owned_range();
        if local_index < owned.len() {
            owned.start + local_index
        } else {
            self.ghost_indices[local_index - owned.len()]
        }
    }

    /// Overwrites `ghosts` with the current values of the corresponding owned entries on
    /// their owning ranks. Collective.
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths do not match the layout.
    pub fn update_ghost_values(&self, owned: &[f64], ghosts: &mut [f64]) {
        assert_eq!(owned.len(), self.n_owned(), "owned slice does not match the layout");
        assert_eq!(ghosts.len(), self.n_ghosts(), "ghost slice does not match the layout");

        let mut outgoing = vec![Vec::new(); self.comm.size()];
        for (rank, offsets) in &self.export_targets {
            outgoing[*rank] = offsets.iter().map(|&offset| owned[offset]).collect();
        }
        let mut incoming = self.comm.all_to_all(outgoing);
        for (rank, positions) in &self.ghost_sources {
            ghosts[positions.clone()].copy_from_slice(&incoming[*rank]);
            incoming[*rank].clear();
        }
    }

    /// Adds the contributions accumulated in `ghosts` to the owned entries on their owning
    /// ranks, then zeroes `ghosts`. Collective.
    ///
    /// Contributions are added in ascending order of the sending rank.
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths do not match the layout.
    pub fn compress_add(&self, ghosts: &mut [f64], owned: &mut [f64]) {
        assert_eq!(owned.len(), self.n_owned(), "owned slice does not match the layout");
        assert_eq!(ghosts.len(), self.n_ghosts(), "ghost slice does not match the layout");

        let mut outgoing = vec![Vec::new(); self.comm.size()];
        for (rank, positions) in &self.ghost_sources {
            outgoing[*rank] = ghosts[positions.clone()].to_vec();
        }
        let incoming = self.comm.all_to_all(outgoing);
        for (rank, offsets) in &self.export_targets {
            for (&offset, &value) in offsets.iter().zip(&incoming[*rank]) {
                owned[offset] += value;
            }
        }
        ghosts.fill(0.0);
    }
}

fn owner_in(owned_ranges: &[Range<usize>], global_index: usize) -> usize {
    let owner = owned_ranges.partition_point(|range| range.end <= global_index);
    assert!(
        owner < owned_ranges.len(),
        "global index {} is out of bounds",
        global_index
    );
    owner
}
