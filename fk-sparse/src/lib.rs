//! Distributed linear algebra for finite element systems.
//!
//! Rows of matrices and entries of vectors are distributed over the ranks of a
//! [`Communicator`](fk_parallel::Communicator) according to a shared
//! [`Partitioner`](fk_parallel::Partitioner). Every rank stores its owned rows. Assembly may add
//! to rows owned by other ranks, and such contributions are buffered until a collective
//! `compress` sends them to their owners.

pub mod cg;
pub mod matrix;
pub mod pattern;
pub mod ssor;
pub mod vector;

pub use matrix::DistributedCsrMatrix;
pub use pattern::DistributedSparsityPattern;
pub use ssor::SsorPreconditioner;
pub use vector::{DistributedVector, GhostedVector};
