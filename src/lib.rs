//! care-planner resource allocation engine
//!
//! Computes staffing, vehicle and transport-route assignments for recurring
//! group-activity sessions. Attendance and enrollment are the durable truth;
//! assignments and routes are derived and rebuilt wholesale on every
//! recalculation.

pub mod model;
pub mod error;
pub mod store;
pub mod haversine;
pub mod requirements;
pub mod staffing;
pub mod vehicles;
pub mod route;
pub mod osrm;
pub mod pending;
pub mod engine;
