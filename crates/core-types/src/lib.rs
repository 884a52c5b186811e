pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::CustomerStatus;
pub use error::CoreError;
pub use structs::{CustomerRecord, NewCustomer, PLAN_VALUE_SCALE, max_plan_value};
