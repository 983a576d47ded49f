//! Output of distributed solutions as VTK XML unstructured grids.
//!
//! Every rank writes the cells it owns to its own `.vtu` piece, and rank 0 writes a `.pvtu`
//! file that collects the pieces of all ranks.
use crate::discretization::Discretization;
use crate::error::Error;
use fk_sparse::GhostedVector;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use rustc_hash::FxHashMap;
use std::fs;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer, Piece,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

/// Name of the output files of a time step, without rank and extension.
pub fn output_file_stem(n_global_cells: usize, step: usize) -> String {
    format!("{}_output_{:03}", n_global_cells, step)
}

/// Path of the piece written by `rank`.
pub fn piece_path(directory: &Path, stem: &str, rank: usize) -> PathBuf {
    directory.join(format!("{}.{}.vtu", stem, rank))
}

/// Path of the record that collects all pieces.
pub fn record_path(directory: &Path, stem: &str) -> PathBuf {
    directory.join(format!("{}.pvtu", stem))
}

/// Builds the piece of this rank: the locally owned cells with the solution `u` at their
/// vertices and the owning rank as cell data `partitioning`.
pub fn build_piece(discretization: &Discretization, solution: &GhostedVector) -> UnstructuredGridPiece {
    let mesh = &discretization.mesh;
    let dofs = &discretization.dofs;
    let rank = discretization.communicator().rank() as f64;

    let mut local_vertices: FxHashMap<usize, u64> = FxHashMap::default();
    let mut points = Vec::new();
    let mut u = Vec::new();
    let mut connectivity = Vec::with_capacity(4 * mesh.locally_owned_cells().len());
    let mut offsets = Vec::with_capacity(mesh.locally_owned_cells().len());

    for (local_cell, &cell) in mesh.locally_owned_cells().iter().enumerate() {
        let vertex_indices = mesh.mesh().connectivity()[cell].vertex_indices();
        // Vertex nodes come first in the element node order
        let vertex_dofs = &dofs.cell_dofs(local_cell)[..4];
        for (&vertex, &dof) in vertex_indices.iter().zip(vertex_dofs) {
            let next_index = local_vertices.len() as u64;
            let index = *local_vertices.entry(vertex).or_insert_with(|| {
                points.extend_from_slice(mesh.mesh().vertices()[vertex].coords.as_slice());
                u.push(solution.value(dof));
                next_index
            });
            connectivity.push(index);
        }
        offsets.push(connectivity.len() as u64);
    }

    let num_cells = offsets.len();
    UnstructuredGridPiece {
        points: IOBuffer::F64(points),
        cells: Cells {
            cell_verts: VertexNumbers::XML { connectivity, offsets },
            types: vec![CellType::Tetra; num_cells],
        },
        data: Attributes {
            point: vec![scalar_attribute("u", u)],
            cell: vec![scalar_attribute("partitioning", vec![rank; num_cells])],
        },
    }
}

fn scalar_attribute(name: &str, values: Vec<f64>) -> Attribute {
    Attribute::DataArray(DataArray {
        name: name.to_string(),
        elem: ElementType::Scalars {
            num_comp: 1,
            lookup_table: None,
        },
        data: IOBuffer::F64(values),
    })
}

/// Writes the piece of this rank to `path`.
pub fn write_piece(path: &Path, discretization: &Discretization, solution: &GhostedVector) -> Result<(), Error> {
    let title = path
        .file_stem()
        .map(|os_str| os_str.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());
    let piece = build_piece(discretization, solution);
    Vtk {
        version: Version { major: 1, minor: 0 },
        title,
        byte_order: ByteOrder::LittleEndian,
        data: DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        },
        file_path: None,
    }
    .export(path)
    .map_err(|err| Error::Output {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, err.to_string()),
    })
}

/// Writes a `.pvtu` record referencing the given piece files.
///
/// Piece paths are written as given, so they should be relative to the directory of the
/// record.
pub fn write_record(path: &Path, pieces: &[String]) -> Result<(), Error> {
    let output_error = |source: io::Error| Error::Output {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(output_error)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    write_record_xml(&mut writer, pieces).map_err(|err| match err {
        quick_xml::Error::Io(source) => output_error(source),
        other => output_error(io::Error::new(io::ErrorKind::Other, other.to_string())),
    })?;
    writer.into_inner().flush().map_err(output_error)
}

fn write_record_xml<W: io::Write>(writer: &mut Writer<W>, pieces: &[String]) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new(b"1.0", None, None)))?;
    writer.write_event(Event::Start(BytesStart::borrowed_name(b"VTKFile").with_attributes([
        ("type", "PUnstructuredGrid"),
        ("version", "1.0"),
        ("byte_order", "LittleEndian"),
        ("header_type", "UInt64"),
    ])))?;
    writer.write_event(Event::Start(
        BytesStart::borrowed_name(b"PUnstructuredGrid").with_attributes([("GhostLevel", "0")]),
    ))?;

    // Attributes must match those of the pieces written by `build_piece`
    write_scalar_attribute_meta(writer, "PPointData", "u")?;
    write_scalar_attribute_meta(writer, "PCellData", "partitioning")?;

    writer.write_event(Event::Start(BytesStart::borrowed_name(b"PPoints")))?;
    writer.write_event(Event::Empty(
        BytesStart::borrowed_name(b"PDataArray").with_attributes([("type", "Float64"), ("NumberOfComponents", "3")]),
    ))?;
    writer.write_event(Event::End(BytesEnd::borrowed(b"PPoints")))?;

    for piece in pieces {
        writer.write_event(Event::Empty(
            BytesStart::borrowed_name(b"Piece").with_attributes([("Source", piece.as_str())]),
        ))?;
    }

    writer.write_event(Event::End(BytesEnd::borrowed(b"PUnstructuredGrid")))?;
    writer.write_event(Event::End(BytesEnd::borrowed(b"VTKFile")))
}

fn write_scalar_attribute_meta<W: io::Write>(writer: &mut Writer<W>, element: &str, name: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(
        BytesStart::borrowed_name(element.as_bytes()).with_attributes([("Scalars", name)]),
    ))?;
    writer.write_event(Event::Empty(BytesStart::borrowed_name(b"PDataArray").with_attributes([
        ("type", "Float64"),
        ("Name", name),
        ("NumberOfComponents", "1"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::borrowed(element.as_bytes())))
}

/// Writes the output files of one time step into `directory`, creating it if needed. Collective.
///
/// Returns the error of this rank, if any; the files of other ranks are still written.
pub fn write_time_step(
    directory: &Path,
    step: usize,
    discretization: &Discretization,
    solution: &GhostedVector,
) -> Result<(), Error> {
    let comm = discretization.communicator();
    let stem = output_file_stem(discretization.mesh.n_global_cells(), step);
    let piece_result = fs::create_dir_all(directory)
        .map_err(|source| Error::Output {
            path: directory.to_path_buf(),
            source,
        })
        .and_then(|()| write_piece(&piece_path(directory, &stem, comm.rank()), discretization, solution));

    // Keep all ranks in step with each other even if some fail
    comm.barrier();
    if comm.is_root() {
        let pieces: Vec<String> = (0..comm.size())
            .map(|rank| format!("{}.{}.vtu", stem, rank))
            .collect();
        write_record(&record_path(directory, &stem), &pieces)?;
    }
    piece_result
}
