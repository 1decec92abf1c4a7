//! Domain types for the persona engine
//!
//! Personas and their activity metadata, plus the forum records (profiles,
//! topic seeds, threads, posts) the engine reads and writes.

mod forum;
mod persona;

pub use forum::*;
pub use persona::*;
