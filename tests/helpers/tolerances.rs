//! Tolerance constants for session tests.

/// Floating point rounding errors (unit conversions, ratios).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Anything at or below this is dither filler, not signal (~-80dB).
pub const DITHER_CEILING: f32 = 1e-4;
