//! # Constants and type definitions for forcedphot
//!
//! This module centralizes the **conversion factors**, **naming conventions**, and **common type
//! definitions** used throughout the `forcedphot` library.
//!
//! ## Overview
//!
//! - Unit conversions (degrees ↔ radians)
//! - Core type aliases used across the crate
//! - Dataset naming conventions shared by the reference provider and the driver
//!
//! These definitions are used by all main modules, including the sky-tile index, the
//! reference provider, and the forced measurement driver.

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

// -------------------------------------------------------------------------------------------------
// Dataset naming conventions
// -------------------------------------------------------------------------------------------------

/// Default coadd name used when none is configured. Typically one of `deep` or `goodSeeing`.
pub const DEFAULT_COADD_NAME: &str = "deep";

/// Coadd name of the band-independent chi-squared detection scheme.
///
/// A reference configuration may leave its bandpass filter unset if and only if it targets
/// this coadd.
pub const CHI_SQUARED_COADD_NAME: &str = "chiSquared";

// -------------------------------------------------------------------------------------------------
// Core type aliases
// -------------------------------------------------------------------------------------------------

/// An angle expressed in radians
pub type Radian = f64;

/// An angle expressed in degrees
pub type Degree = f64;

/// Unique identifier of a source record within a catalog.
///
/// The value 0 is reserved: a record whose parent id is 0 is a top-level (undeblended or
/// deblend-root) source.
pub type SourceId = i64;

/// Identifier of a tract within a sky map
pub type TractId = u32;

/// Parent id marking a top-level source
pub const NO_PARENT: SourceId = 0;
