//! Client-to-server message bodies.
pub mod auth_response;
pub mod batch;
pub mod execute;
pub mod options;
pub mod params;
pub mod prepare;
pub mod query;
pub mod register;
pub mod startup;

pub use auth_response::AuthResponse;
pub use batch::{Batch, BatchEntry, BatchStatement, BatchType};
pub use execute::Execute;
pub use options::Options;
pub use params::{NamedValue, QueryParams};
pub use prepare::Prepare;
pub use query::Query;
pub use register::{EventType, Register};
pub use startup::Startup;
