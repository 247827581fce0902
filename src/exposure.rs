//! Destination image handle.
//!
//! The forced photometry core never touches pixels; all it needs from the image being measured
//! is its pixel bounding box and its own WCS. Pixel data stays behind the out-of-scope
//! measurement engine.

use crate::geom::Box2I;
use crate::wcs::TanWcs;

/// The image a forced measurement runs on: a pixel bounding box plus the image's WCS.
#[derive(Debug, Clone)]
pub struct Exposure {
    bbox: Box2I,
    wcs: TanWcs,
}

impl Exposure {
    pub fn new(bbox: Box2I, wcs: TanWcs) -> Self {
        Self { bbox, wcs }
    }

    pub fn bbox(&self) -> Box2I {
        self.bbox
    }

    pub fn wcs(&self) -> &TanWcs {
        &self.wcs
    }
}
