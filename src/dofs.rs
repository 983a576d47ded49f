//! Enumeration of the degrees of freedom of a distributed finite element space.
use crate::coefficients::ScalarField;
use crate::discretization::{DistributedMesh, FiniteElementSpace};
use fk_parallel::Partitioner;
use fk_sparse::DistributedVector;
use itertools::Itertools;
use log::debug;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use std::ops::Range;
use std::sync::Arc;

/// Mesh-independent identity of a Lagrange node.
///
/// A node is identified by the global vertices it is supported on, each with its
/// barycentric count. The pairs are sorted by vertex, so every cell sharing the node produces
/// the same key regardless of its local vertex order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct NodeKey(Vec<(usize, usize)>);

impl NodeKey {
    fn new(cell_vertices: &[usize; 4], alpha: &[usize; 4]) -> Self {
        let mut support: Vec<_> = cell_vertices
            .iter()
            .zip(alpha)
            .filter(|(_, count)| **count > 0)
            .map(|(&vertex, &count)| (vertex, count))
            .collect();
        support.sort_unstable();
        Self(support)
    }
}

/// Global numbering of the degrees of freedom together with the index sets of this rank.
///
/// Each degree of freedom is owned by the lowest subdomain that has a cell touching it.
/// Owned degrees of freedom of rank `p` form one contiguous range of global indices, and the
/// ranges are ordered by rank. Within a rank, owned degrees of freedom are numbered in the
/// order they are first met when walking the locally owned cells.
#[derive(Debug, Clone)]
pub struct DofHandler {
    partitioner: Arc<Partitioner>,
    dofs_per_cell: usize,
    // Global indices per locally owned cell, in element node order
    cell_dofs: Vec<usize>,
    owned_support_points: Vec<Point3<f64>>,
}

impl DofHandler {
    /// Numbers the degrees of freedom of the space on the mesh. Collective.
    ///
    /// Ranks resolve the global indices of their ghost degrees of freedom by asking the
    /// owning ranks.
    pub fn distribute(mesh: &DistributedMesh, space: &FiniteElementSpace) -> Self {
        let comm = mesh.communicator();
        let rank = comm.rank();
        let tet_mesh = mesh.mesh();
        let element = space.element();
        let dofs_per_cell = element.num_nodes();

        // Any cell touching a node of an owned cell shares a vertex with it, so this halo is
        // enough to determine the owners of all nodes of owned cells
        let mut vertex_is_local = vec![false; tet_mesh.vertices().len()];
        for &cell in mesh.locally_owned_cells() {
            for &v in tet_mesh.connectivity()[cell].vertex_indices() {
                vertex_is_local[v] = true;
            }
        }
        let mut node_owners: FxHashMap<NodeKey, usize> = FxHashMap::default();
        for (cell, connectivity) in tet_mesh.connectivity().iter().enumerate() {
            let vertices = connectivity.vertex_indices();
            if !vertices.iter().any(|&v| vertex_is_local[v]) {
                continue;
            }
            let subdomain = mesh.subdomain_of(cell);
            for alpha in element.multi_indices() {
                node_owners
                    .entry(NodeKey::new(vertices, alpha))
                    .and_modify(|owner| *owner = (*owner).min(subdomain))
                    .or_insert(subdomain);
            }
        }

        // Number owned nodes and collect the keys of ghost nodes
        let mut owned_numbers: FxHashMap<NodeKey, usize> = FxHashMap::default();
        let mut owned_support_points = Vec::new();
        let mut cell_keys = Vec::with_capacity(mesh.locally_owned_cells().len() * dofs_per_cell);
        let mut ghost_requests = vec![Vec::new(); comm.size()];
        let mut ghost_numbers: FxHashMap<NodeKey, usize> = FxHashMap::default();
        for &cell in mesh.locally_owned_cells() {
            let vertices = tet_mesh.connectivity()[cell].vertex_indices();
            let cell_vertices = tet_mesh.cell_vertices(cell);
            for alpha in element.multi_indices() {
                let key = NodeKey::new(vertices, alpha);
                let owner = node_owners[&key];
                if owner == rank {
                    if !owned_numbers.contains_key(&key) {
                        owned_numbers.insert(key.clone(), owned_numbers.len());
                        owned_support_points.push(support_point(&cell_vertices, alpha, element.degree()));
                    }
                } else if !ghost_numbers.contains_key(&key) {
                    ghost_numbers.insert(key.clone(), usize::MAX);
                    ghost_requests[owner].push(key.clone());
                }
                cell_keys.push(key);
            }
        }

        let owned_counts = comm.all_gather(owned_numbers.len());
        let offset: usize = owned_counts[..rank].iter().sum();
        let owned_range = offset..offset + owned_numbers.len();

        // Owners answer with the global indices of the requested keys, in request order
        let requests = comm.all_to_all(ghost_requests.clone());
        let answers: Vec<Vec<usize>> = requests
            .iter()
            .map(|keys| {
                keys.iter()
                    .map(|key| {
                        offset
                            + *owned_numbers
                                .get(key)
                                .expect("Internal error: requested node is not owned by this rank")
                    })
                    .collect()
            })
            .collect();
        let answers = comm.all_to_all(answers);
        for (keys, numbers) in ghost_requests.iter().zip(answers) {
            for (key, number) in keys.iter().zip(numbers) {
                ghost_numbers.insert(key.clone(), number);
            }
        }

        let cell_dofs: Vec<usize> = cell_keys
            .iter()
            .map(|key| match owned_numbers.get(key) {
                Some(local) => offset + local,
                None => ghost_numbers[key],
            })
            .collect();

        let partitioner = Arc::new(Partitioner::new(comm, owned_range, ghost_numbers.values().copied()));
        debug!(
            "Rank {} owns {} of {} DoFs and has {} ghost DoFs",
            rank,
            partitioner.n_owned(),
            partitioner.global_size(),
            partitioner.n_ghosts()
        );

        Self {
            partitioner,
            dofs_per_cell,
            cell_dofs,
            owned_support_points,
        }
    }

    /// The layout of owned and ghost degrees of freedom of this rank.
    pub fn partitioner(&self) -> &Arc<Partitioner> {
        &self.partitioner
    }

    /// Total number of degrees of freedom over all ranks.
    pub fn n_dofs(&self) -> usize {
        self.partitioner.global_size()
    }

    pub fn locally_owned_dofs(&self) -> Range<usize> {
        self.partitioner.owned_range()
    }

    /// Owned degrees of freedom followed by the ghost degrees of freedom of owned cells, in
    /// ascending order.
    pub fn locally_relevant_dofs(&self) -> Vec<usize> {
        self.locally_owned_dofs()
            .chain(self.partitioner.ghost_indices().iter().copied())
            .sorted_unstable()
            .collect()
    }

    pub fn dofs_per_cell(&self) -> usize {
        self.dofs_per_cell
    }

    pub fn n_locally_owned_cells(&self) -> usize {
        self.cell_dofs.len() / self.dofs_per_cell
    }

    /// Global degrees of freedom of the `i`-th locally owned cell, in element node order.
    ///
    /// The first four entries are the degrees of freedom at the cell vertices.
    pub fn cell_dofs(&self, local_cell: usize) -> &[usize] {
        &self.cell_dofs[local_cell * self.dofs_per_cell..(local_cell + 1) * self.dofs_per_cell]
    }

    /// Positions of the owned degrees of freedom, in global index order.
    pub fn owned_support_points(&self) -> &[Point3<f64>] {
        &self.owned_support_points
    }

    /// Sets every owned entry of `target` to the value of `field` at the position of its
    /// degree of freedom.
    pub fn interpolate(&self, field: &dyn ScalarField, target: &mut DistributedVector) {
        debug_assert!(Arc::ptr_eq(target.partitioner(), &self.partitioner));
        for (value, x) in target
            .owned_values_mut()
            .iter_mut()
            .zip(&self.owned_support_points)
        {
            *value = field.value(x);
        }
    }
}

fn support_point(cell_vertices: &[Point3<f64>; 4], alpha: &[usize; 4], degree: usize) -> Point3<f64> {
    let coords = cell_vertices
        .iter()
        .zip(alpha)
        .fold(Vector3::zeros(), |sum, (v, &count)| {
            sum + v.coords * (count as f64 / degree as f64)
        });
    Point3::from(coords)
}
