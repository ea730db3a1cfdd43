//! External service seams
//!
//! Hashing, compression codecs and the build-graph source are narrow
//! traits, so the core logic runs against fakes in tests and is not tied
//! to any one backing tool.

pub mod codec;
pub mod hasher;
pub mod nix;

pub use codec::{NarCodec, StreamCodec};
pub use hasher::{ContentHasher, Sha256Hasher};
pub use nix::{BuildSource, NixCli};
