//! Transfer Engine - the heart of Artifactor
//!
//! This module implements the concurrent artifact transfer engine:
//! - Bounded worker pool per repository
//! - Work-list enumeration of remote trees
//! - Ranged parallel downloads of large files
//! - Aggregated reporting of partial failures

mod chunk;
mod paths;
mod pool;
mod repository;
mod store;
mod walker;

pub use chunk::*;
pub use paths::*;
pub use pool::*;
pub use repository::*;
pub use store::*;
pub use walker::*;
