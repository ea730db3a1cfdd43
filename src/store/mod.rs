//! The local NAR store and its record model

pub mod closure;
pub mod hash;
pub mod local;
pub mod narinfo;

pub use closure::{Closure, NarInfoSource};
pub use hash::StoreHash;
pub use local::{NarStore, StoreIndex};
pub use narinfo::{CompressionFormat, NarInfo};
