//! Actor-based registry of devices grouped by group id.
//!
//! Each device is an actor holding its latest reading. A group actor creates
//! devices on first registration, forgets them when they stop, and answers
//! group queries with one reading per device, bounded by a deadline.

pub mod actors;
pub mod config;
pub mod metrics;
pub mod models;
