//! Self-describing, chunked, columnar bulk-storage for large scientific
//! arrays (the canonical use case: cosmological N-body snapshots).
//!
//! A dataset is a directory tree ([`file::File`]) of typed two-dimensional
//! blocks ([`block::Block`]), each block sharded across a fixed number of
//! physical files plus a plain-text header and a binary attribute file
//! ([`attr::AttrSet`]). Random-access read/write at any row offset streams
//! through [`convert`], which handles endianness and numeric-kind
//! conversion between the on-disk dtype and the caller's own. [`collective`]
//! layers a parallel/collective API over the same block on-disk format for
//! many peers writing disjoint row ranges at once.
//!
//! This crate has no binary front end and does not create the top-level
//! directory tree on its own behalf beyond `mkdir_p`-ing block
//! subdirectories — both are left to callers, matching the scope of the
//! format this library implements.

pub mod array;
pub mod attr;
pub mod block;
pub mod collective;
pub mod config;
pub mod convert;
pub mod dtype;
pub mod error;
pub mod file;
pub mod record;

pub use array::{BigArray, BigArrayIter, BigArrayIterMut, BigArrayMut, OwnedArray};
pub use block::{Block, BlockPtr};
pub use config::Config;
pub use dtype::Dtype;
pub use error::{BigFileError, Result};
pub use file::File;
