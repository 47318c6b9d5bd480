// src/document/mod.rs
//! Document blocks: the block model, tree reconstruction and reference
//! resolution.

pub mod block;
pub mod lookup;
pub mod resolver;
pub mod single_flight;
pub mod text;
pub mod tree;

pub use block::{Block, BlockPayload, BlockType};
pub use lookup::{ApiLookup, FileUrlResolver, ReferenceLookup};
pub use resolver::BlockResolver;
pub use single_flight::SingleFlight;
pub use text::{TextElement, TextPayload};
pub use tree::{BlockNode, BlockTree, FileReference, ResolvedDocument};
