//! shared, domain-agnostic support used by both `sat_actor` and `sat_coordinator`:
//! orbital/geo constants and math, timestamp helpers, and the logging macro shims.

pub mod datetime;
pub mod geo_constants;
pub mod macros;
pub mod polar;

pub use polar::{normalize_2pi, Cartesian2, PolarPos};
