//! Data module: index maps, owner directories and distributed vectors

pub mod directory;
pub mod map;
pub mod scalar;
pub mod vector;

pub use directory::Directory;
pub use map::{GlobalOrdinal, LocalGlobal, LocalOrdinal, Map};
pub use scalar::Scalar;
pub use vector::Vector;
