//! Cloud DNS CRDs

pub mod managed_zone;
pub mod resource_record_set;

pub use managed_zone::*;
pub use resource_record_set::*;
