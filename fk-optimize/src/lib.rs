//! Nonlinear solvers for systems whose state the caller owns.
//!
//! The solvers here only drive the iteration. Assembly of the residual and the Jacobian, the
//! linear solve and the update of the iterate are delegated to an implementation of
//! [`newton::NonlinearSystem`], which may distribute its state over many ranks.

pub mod newton;
