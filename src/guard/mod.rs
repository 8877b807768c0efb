pub mod app_guard;

pub use app_guard::{AppGuard, GuardEvent, CheckDepth, HealthState};
