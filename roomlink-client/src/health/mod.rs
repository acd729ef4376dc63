mod monitor;

pub use monitor::{HealthMonitor, StabilitySnapshot, compute_timeout};
