//! physical constants shared by the orbital and geo modules.
//! Note const floats derived from `sqrt`/`powi` are still not stabilized, so a few
//! of these are written out as decimal literals rather than computed.

/// mean earth radius in meters
pub const MEAN_EARTH_RADIUS: f64 = 6_371_000.0;

/// earth mass in kg
pub const EARTH_MASS: f64 = 5.972e24;

/// gravitational constant in m^3 kg^-1 s^-2
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;

pub const TWO_PI: f64 = std::f64::consts::TAU;
