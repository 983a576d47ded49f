//! Rank-based parallelism for distributed finite element computations.
//!
//! A group of `P` ranks runs the same program on disjoint parts of the data and synchronizes
//! through the collective operations of a [`Communicator`]. Each rank is a thread spawned by
//! [`Universe::run`], and all data exchange goes through explicit collectives, so code written
//! against this crate follows the usual SPMD discipline: every rank must call the same
//! collectives in the same order.
//!
//! [`Partitioner`] builds on the collectives to describe a contiguous ownership layout of a
//! global index space together with the ghost indices a rank needs to read or write.

pub mod communicator;
pub mod partitioner;

pub use communicator::{Communicator, Universe};
pub use partitioner::Partitioner;
