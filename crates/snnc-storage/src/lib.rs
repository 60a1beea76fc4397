//! Connectivity storage for the snnc code generator
//!
//! This crate holds the connection structures generated simulations load at
//! start-up: the row-compressed [`SparseProjection`], the per-connection
//! [`ConnectivityBitmask`], and the unframed little-endian file layout both
//! are persisted in.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod bitmask;
pub mod error;
pub mod file;
pub mod sparse;

pub use bitmask::ConnectivityBitmask;
pub use error::{Result, StorageError};
pub use file::{
    load_sparse_file, read_dense_weights, read_sparse, read_sparse_split, save_sparse_file,
    write_dense_weights, write_sparse, write_sparse_split, SparseLayout, WeightValues,
};
pub use sparse::SparseProjection;
