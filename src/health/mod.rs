//! Server health state: keyed conditions with severity and dedup queries.

pub mod registry;

pub use registry::{
    DISK_FULL_ID, HealthCondition, HealthLevel, HealthRegistry, HealthScope, HealthStateType,
};
