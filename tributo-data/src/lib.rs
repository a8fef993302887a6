//! File-based replacements for the built-in policy tables.

mod anexo_loader;
mod policy_loader;

pub use anexo_loader::{AnexoTableLoader, BracketLoaderError, BracketRecord};
pub use policy_loader::{PolicyLoadError, PolicyOverrides};
