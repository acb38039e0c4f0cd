//! Merkle Search Tree decoding

pub mod node;
pub mod util;
pub mod walk;

pub use node::{NodeData, TreeEntry};
pub use walk::MstWalker;
