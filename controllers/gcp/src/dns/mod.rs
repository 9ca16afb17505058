//! Cloud DNS managed resources

pub mod managed_zone;
pub mod resource_record_set;
#[cfg(test)]
mod resource_record_set_test;

pub use managed_zone::ManagedZoneExternal;
pub use resource_record_set::ResourceRecordSetExternal;
