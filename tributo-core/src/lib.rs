pub mod api;
pub mod calculations;
pub mod error;
pub mod models;
pub mod policy;

pub use error::CalculationError;
pub use models::*;
pub use policy::TaxPolicy;
