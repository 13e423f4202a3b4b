//! Storage monitoring: free-space probing, threshold state machine,
//! admission flags.

pub mod probe;
pub mod threshold;

pub use probe::{SpaceProbe, StatvfsProbe};
pub use threshold::{AdmissionFlags, ThresholdMonitor};
