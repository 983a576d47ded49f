//! Partitioning of mesh cells into subdomains.
use crate::mesh::TetMesh;

const MORTON_BITS_PER_AXIS: u32 = 21;

/// Assigns every cell of the mesh to one of `num_subdomains` subdomains.
///
/// Cells are ordered along a Morton (Z-order) curve through their centroids, and the order is
/// split into contiguous chunks whose sizes differ by at most one. Cells that are close in
/// space therefore tend to share a subdomain. Ties are broken by cell index, so the result is
/// deterministic. Returns the subdomain id of each cell.
///
/// Panics if `num_subdomains` is zero.
pub fn partition_cells(mesh: &TetMesh, num_subdomains: usize) -> Vec<usize> {
    assert!(num_subdomains > 0, "Number of subdomains must be positive");
    let num_cells = mesh.num_cells();
    let mut subdomains = vec![0; num_cells];
    let Some((min, max)) = mesh.bounding_box() else {
        return subdomains;
    };

    let extent = max - min;
    let scale = ((1u64 << MORTON_BITS_PER_AXIS) - 1) as f64;
    let mut keyed_cells: Vec<(u64, usize)> = (0..num_cells)
        .map(|cell_index| {
            let relative = mesh.cell_centroid(cell_index) - min;
            let quantized = [0, 1, 2].map(|axis| {
                if extent[axis] > 0.0 {
                    ((relative[axis] / extent[axis]).clamp(0.0, 1.0) * scale) as u64
                } else {
                    0
                }
            });
            (morton_key(quantized), cell_index)
        })
        .collect();
    keyed_cells.sort_unstable();

    for (position, &(_, cell_index)) in keyed_cells.iter().enumerate() {
        subdomains[cell_index] = position * num_subdomains / num_cells;
    }
    subdomains
}

/// Interleaves the bits of three coordinates, `x` in the lowest position.
fn morton_key(coordinates: [u64; 3]) -> u64 {
    let mut key = 0;
    for bit in 0..MORTON_BITS_PER_AXIS {
        for (axis, coordinate) in coordinates.iter().enumerate() {
            key |= ((coordinate >> bit) & 1) << (3 * bit + axis as u32);
        }
    }
    key
}
