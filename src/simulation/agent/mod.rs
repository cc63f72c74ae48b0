//! Vehicle agents: physics, collision handling and the per-tick control loop.

mod assist;
mod car;
mod controls;
mod recovery;
mod route;

pub use assist::{LaneKeeping, lane_keeping, must_stop_for_light};
pub use car::{Agent, AgentState, body_polygon};
pub use controls::{Controls, Driver, OUTPUT_THRESHOLD};
pub use recovery::{Recovery, RecoveryPhase, RecoverySteering, recovery_steering};
pub use route::{LaneRoute, TARGET_REACHED_DISTANCE};
