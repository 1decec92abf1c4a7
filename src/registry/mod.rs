//! Persona registry: persona records, their backing author profiles and
//! activity bookkeeping.

mod overview;
mod personas;

pub use overview::{PersonaOverview, WorkflowOverview};
pub use personas::PersonaRegistry;
