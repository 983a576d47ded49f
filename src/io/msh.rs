//! Loading tetrahedral meshes from Gmsh MSH files.
use crate::error::Error;
use crate::mesh::{Tet4Connectivity, TetMesh};
use log::debug;
use nalgebra::Point3;
use std::path::Path;

/// Loads a [`TetMesh`] from a Gmsh MSH file at the given path.
///
/// The mesh is validated before it is returned.
pub fn load_msh_from_file(file_path: impl AsRef<Path>) -> Result<TetMesh, Error> {
    let path = file_path.as_ref();
    let msh_bytes = std::fs::read(path).map_err(|source| Error::MeshIo {
        path: path.to_path_buf(),
        source,
    })?;
    load_msh_from_bytes(&msh_bytes)
}

/// Loads a [`TetMesh`] by parsing the given bytes as a Gmsh MSH file.
///
/// All `Tet4` element blocks are collected. Blocks of lower-dimensional elements (boundary
/// triangles, lines and points that Gmsh writes for physical groups) are ignored, while any
/// other three-dimensional element type is rejected.
pub fn load_msh_from_bytes(bytes: &[u8]) -> Result<TetMesh, Error> {
    let mut msh_file =
        mshio::parse_msh_bytes(bytes).map_err(|e| Error::MeshInvalid(format!("failed to parse msh file: {}", e)))?;

    let msh_nodes = msh_file
        .data
        .nodes
        .take()
        .ok_or_else(|| Error::MeshInvalid("MSH file does not contain nodes".to_string()))?;
    let msh_elements = msh_file
        .data
        .elements
        .take()
        .ok_or_else(|| Error::MeshInvalid("MSH file does not contain elements".to_string()))?;

    let mut vertices = Vec::new();
    for node_block in &msh_nodes.node_blocks {
        vertices.extend(vertices_from_node_block(node_block)?);
    }

    let mut connectivity = Vec::new();
    for element_block in &msh_elements.element_blocks {
        connectivity.extend(connectivity_from_element_block(element_block)?);
    }

    if connectivity.is_empty() {
        return Err(Error::MeshInvalid(
            "MSH file does not contain any Tet4 elements".to_string(),
        ));
    }

    debug!(
        "Loaded msh mesh with {} vertices and {} tetrahedra",
        vertices.len(),
        connectivity.len()
    );
    let mesh = TetMesh::from_vertices_and_connectivity(vertices, connectivity);
    mesh.validate()?;
    Ok(mesh)
}

/// Converts the nodes of a `mshio::NodeBlock` to vertices.
fn vertices_from_node_block<I, F>(node_block: &mshio::NodeBlock<u64, I, F>) -> Result<Vec<Point3<f64>>, Error>
where
    F: mshio::MshFloatT,
    I: mshio::MshIntT,
{
    // Vertex indices are derived from node tags, which requires consecutive tags
    if node_block.node_tags.is_some() {
        return Err(Error::MeshInvalid(
            "node block tags are not consecutive in msh file".to_string(),
        ));
    }

    node_block
        .nodes
        .iter()
        .map(|node| {
            let coordinate = |component: F| {
                component
                    .to_f64()
                    .ok_or_else(|| Error::MeshInvalid("failed to convert node coordinate to f64".to_string()))
            };
            Ok(Point3::new(coordinate(node.x)?, coordinate(node.y)?, coordinate(node.z)?))
        })
        .collect()
}

/// Extracts the tetrahedra of a `mshio::ElementBlock`.
fn connectivity_from_element_block<I>(element_block: &mshio::ElementBlock<u64, I>) -> Result<Vec<Tet4Connectivity>, Error>
where
    I: mshio::MshIntT,
{
    let entity_dim = element_block
        .entity_dim
        .to_usize()
        .ok_or_else(|| Error::MeshInvalid("invalid element block entity dimension".to_string()))?;

    if entity_dim < 3 {
        // Boundary and physical group entities
        return Ok(Vec::new());
    }
    if element_block.element_type != mshio::ElementType::Tet4 {
        return Err(Error::MeshInvalid(format!(
            "unsupported volume element type {:?}, only Tet4 is supported",
            element_block.element_type
        )));
    }

    element_block
        .elements
        .iter()
        .map(|element| {
            if element.nodes.len() < 4 {
                return Err(Error::MeshInvalid(
                    "not enough nodes to initialize Tet4 connectivity".to_string(),
                ));
            }
            let mut vertex_indices = [0; 4];
            for (index, &tag) in vertex_indices.iter_mut().zip(&element.nodes) {
                // Node tags are one-based
                *index = tag
                    .checked_sub(1)
                    .and_then(|index| usize::try_from(index).ok())
                    .ok_or_else(|| Error::MeshInvalid(format!("invalid node tag {}", tag)))?;
            }
            Ok(Tet4Connectivity(vertex_indices))
        })
        .collect()
}
