//! # TAN-projection world coordinate system
//!
//! [`TanWcs`] is a FITS-style gnomonic (TAN) WCS: a reference sky position (CRVAL), a reference
//! pixel (CRPIX), and a 2×2 CD matrix mapping pixel offsets from CRPIX to tangent-plane
//! coordinates in radians. It provides the bidirectional pixel ↔ sky mapping the rest of the
//! crate depends on.
//!
//! Two independent WCS instances are in play during one forced-photometry invocation: the
//! reference tract's WCS and the destination image's WCS. They are generally *not* the same
//! transform, so every function in this crate that reprojects coordinates takes the WCS it
//! should use as an explicit argument rather than inferring one from ambient state.
//!
//! Projection formulas: Calabretta & Greisen (2002), FITS WCS Paper II, §5.1.1.

use nalgebra::{Matrix2, Point2, Vector2};

use crate::constants::Radian;
use crate::forcedphot_errors::ForcedPhotError;
use crate::geom::SkyCoord;

/// Forward gnomonic (TAN) projection.
///
/// Projects the celestial point `coord` onto the tangent plane at `crval`. Returns `(ξ, η)` in
/// radians, or `None` if the point is on or behind the tangent plane.
#[inline]
fn tan_project(coord: SkyCoord, crval: SkyCoord) -> Option<(f64, f64)> {
    let da = coord.ra - crval.ra;
    let sin_dec = coord.dec.sin();
    let cos_dec = coord.dec.cos();
    let sin_dec0 = crval.dec.sin();
    let cos_dec0 = crval.dec.cos();
    let cos_da = da.cos();

    let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_da;
    if denom <= 1e-12 {
        return None; // behind or on the tangent plane
    }

    let xi = cos_dec * da.sin() / denom;
    let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_da) / denom;
    Some((xi, eta))
}

/// Inverse gnomonic (TAN) projection.
///
/// Given tangent-plane coordinates `(ξ, η)` in radians at reference point `crval`, returns the
/// celestial coordinates.
#[inline]
fn inverse_tan_project(xi: f64, eta: f64, crval: SkyCoord) -> SkyCoord {
    let sin_dec0 = crval.dec.sin();
    let cos_dec0 = crval.dec.cos();
    let rho_sq = xi * xi + eta * eta;

    if rho_sq < 1e-30 {
        return crval;
    }

    let rho = rho_sq.sqrt();
    let c = rho.atan(); // for TAN projection, c = atan(rho)
    let sin_c = c.sin();
    let cos_c = c.cos();

    let dec = (cos_c * sin_dec0 + eta * sin_c * cos_dec0 / rho).asin();
    let ra = crval.ra + (xi * sin_c).atan2(rho * cos_dec0 * cos_c - eta * sin_dec0 * sin_c);
    SkyCoord::new(ra, dec)
}

/// A TAN-projection WCS with a full CD matrix.
///
/// The CD matrix captures pixel scale, rotation, parity, and skew in one linear transform; its
/// inverse is computed once at construction so both mapping directions are cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct TanWcs {
    crval: SkyCoord,
    crpix: Point2<f64>,
    cd: Matrix2<f64>,
    cd_inv: Matrix2<f64>,
}

impl TanWcs {
    /// Build a WCS from its reference point, reference pixel, and CD matrix (radians/pixel).
    ///
    /// Fails with [`ForcedPhotError::SingularCdMatrix`] if the CD matrix cannot be inverted.
    pub fn new(crval: SkyCoord, crpix: Point2<f64>, cd: Matrix2<f64>) -> Result<Self, ForcedPhotError> {
        let cd_inv = cd.try_inverse().ok_or(ForcedPhotError::SingularCdMatrix)?;
        Ok(Self {
            crval,
            crpix,
            cd,
            cd_inv,
        })
    }

    /// Build an undistorted, north-up WCS with a uniform pixel scale in radians/pixel.
    pub fn with_scale(crval: SkyCoord, crpix: Point2<f64>, scale: Radian) -> Result<Self, ForcedPhotError> {
        Self::new(crval, crpix, Matrix2::new(scale, 0.0, 0.0, scale))
    }

    pub fn crval(&self) -> SkyCoord {
        self.crval
    }

    pub fn crpix(&self) -> Point2<f64> {
        self.crpix
    }

    /// Map a pixel position to the sky.
    ///
    /// Total: every finite pixel position projects through the tangent plane at CRVAL.
    pub fn pixel_to_sky(&self, pixel: Point2<f64>) -> SkyCoord {
        let offset = Vector2::new(pixel.x - self.crpix.x, pixel.y - self.crpix.y);
        let tan = self.cd * offset;
        inverse_tan_project(tan.x, tan.y, self.crval)
    }

    /// Map a sky position to a pixel position.
    ///
    /// Fails with [`ForcedPhotError::UnmappablePosition`] for points on or behind the tangent
    /// plane, which cannot be represented in this projection.
    pub fn sky_to_pixel(&self, coord: SkyCoord) -> Result<Point2<f64>, ForcedPhotError> {
        let (xi, eta) = tan_project(coord, self.crval)
            .ok_or(ForcedPhotError::UnmappablePosition(coord.ra, coord.dec))?;
        let offset = self.cd_inv * Vector2::new(xi, eta);
        Ok(Point2::new(self.crpix.x + offset.x, self.crpix.y + offset.y))
    }
}
