//! Timeslot and room assignment for course sections: overlap geometry,
//! conflict normalization, the section graph and a one-pass greedy solver.

pub mod config;
pub mod conflicts;
pub mod data;
pub mod error;
pub mod graph;
pub mod inspect;
pub mod server;
pub mod solver;
pub mod timeslot;

pub use data::{Placement, SchedulingInput, SchedulingOutput};
pub use error::ScheduleError;
pub use graph::SectionGraph;
pub use solver::{GapWindowPolicy, ProximityPolicy, schedule, schedule_with};
