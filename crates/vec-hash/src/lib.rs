//! Hash computation and object identity for the vecr version control system.
//!
//! This crate provides the core `ObjectId` type (a 32-byte SHA-256 digest),
//! hex encoding/decoding, and the streaming `Hasher` used to compute object
//! identities over their typed on-disk representation.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
