//! # Sky-tile index: tracts and patches
//!
//! The sky map partitions the sky into [`Tract`]s, large contiguous regions each carrying its
//! own [`TanWcs`] and a regular grid of [`Patch`]es. A patch has an *inner* bounding box —
//! its exclusive ownership region, non-overlapping with any neighbor — and an *outer* bounding
//! box that adds a fixed overlap border. Reference catalogs are stored one dataset per patch,
//! so resolving an image region to the patches that cover it is the first step of every
//! reference fetch.
//!
//! [`Patch`] values are materialized on demand from the tract's grid parameters; nothing in
//! this module caches them, and repeated lookups rebuild the same read-only view.

use std::fmt;

use ahash::AHashMap;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::constants::TractId;
use crate::forcedphot_errors::ForcedPhotError;
use crate::geom::{Box2D, Box2I, SkyCoord};
use crate::wcs::TanWcs;

/// 2-D integer index of a patch within its tract's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchIndex(pub i32, pub i32);

impl fmt::Display for PatchIndex {
    /// Rendered as `x,y`, the form used in dataset keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}

/// A rectangular sky tile within a tract, in tract pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    index: PatchIndex,
    inner_bbox: Box2I,
    outer_bbox: Box2I,
}

impl Patch {
    pub fn index(&self) -> PatchIndex {
        self.index
    }

    /// The exclusive ownership region; inner boxes tile the tract without overlap.
    pub fn inner_bbox(&self) -> Box2I {
        self.inner_bbox
    }

    /// The overlap-including region, the inner box grown by the tract's patch border and
    /// clipped to the tract bounds.
    pub fn outer_bbox(&self) -> Box2I {
        self.outer_bbox
    }
}

/// A large contiguous sky region with one WCS and a regular grid of patches.
#[derive(Debug, Clone)]
pub struct Tract {
    id: TractId,
    wcs: TanWcs,
    num_patches: (i32, i32),
    patch_inner_dimensions: (i32, i32),
    patch_border: i32,
}

impl Tract {
    /// Build a tract from its grid parameters.
    ///
    /// `num_patches` is the grid shape `(nx, ny)`, `patch_inner_dimensions` the inner box size
    /// of each patch in pixels, `patch_border` the overlap added to form outer boxes.
    pub fn new(
        id: TractId,
        wcs: TanWcs,
        num_patches: (i32, i32),
        patch_inner_dimensions: (i32, i32),
        patch_border: i32,
    ) -> Self {
        Self {
            id,
            wcs,
            num_patches,
            patch_inner_dimensions,
            patch_border,
        }
    }

    pub fn id(&self) -> TractId {
        self.id
    }

    pub fn wcs(&self) -> &TanWcs {
        &self.wcs
    }

    pub fn num_patches(&self) -> (i32, i32) {
        self.num_patches
    }

    /// The whole tract's pixel bounding box.
    pub fn bbox(&self) -> Box2I {
        Box2I::from_dimensions(
            Point2::new(0, 0),
            self.num_patches.0 * self.patch_inner_dimensions.0,
            self.num_patches.1 * self.patch_inner_dimensions.1,
        )
    }

    /// Materialize the patch view for a grid index.
    ///
    /// Fails with [`ForcedPhotError::UnknownPatch`] if the index is outside the grid.
    pub fn patch_info(&self, index: PatchIndex) -> Result<Patch, ForcedPhotError> {
        let PatchIndex(ix, iy) = index;
        if ix < 0 || ix >= self.num_patches.0 || iy < 0 || iy >= self.num_patches.1 {
            return Err(ForcedPhotError::UnknownPatch(ix, iy));
        }
        let (w, h) = self.patch_inner_dimensions;
        let inner_bbox = Box2I::from_dimensions(Point2::new(ix * w, iy * h), w, h);
        let outer_bbox = clip_to(inner_bbox.grow(self.patch_border), &self.bbox());
        Ok(Patch {
            index,
            inner_bbox,
            outer_bbox,
        })
    }

    /// Find the patches whose outer box intersects the region spanned by the given sky points.
    ///
    /// The points are projected into tract pixel coordinates through the tract WCS and the
    /// search region is their bounding box. Points that cannot be projected (on or behind the
    /// tract's tangent plane) lie far outside any tract and are ignored. Patches are returned
    /// in row-major grid order; callers must not rely on this.
    pub fn find_patch_list(&self, coords: &[SkyCoord]) -> Result<Vec<Patch>, ForcedPhotError> {
        let projected: Vec<Point2<f64>> = coords
            .iter()
            .filter_map(|c| self.wcs.sky_to_pixel(*c).ok())
            .collect();
        if projected.is_empty() {
            return Ok(Vec::new());
        }

        let mut min = projected[0];
        let mut max = projected[0];
        for p in &projected[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        let region = Box2D::new(min, max);

        let mut patches = Vec::new();
        for iy in 0..self.num_patches.1 {
            for ix in 0..self.num_patches.0 {
                let patch = self.patch_info(PatchIndex(ix, iy))?;
                if Box2D::from(patch.outer_bbox()).intersects(&region) {
                    patches.push(patch);
                }
            }
        }
        Ok(patches)
    }
}

fn clip_to(b: Box2I, bounds: &Box2I) -> Box2I {
    Box2I::new(
        Point2::new(b.min().x.max(bounds.min().x), b.min().y.max(bounds.min().y)),
        Point2::new(b.max().x.min(bounds.max().x), b.max().y.min(bounds.max().y)),
    )
}

/// Registry of tracts, keyed by tract id.
#[derive(Debug, Clone, Default)]
pub struct SkyMap {
    tracts: AHashMap<TractId, Tract>,
}

impl SkyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tract(&mut self, tract: Tract) {
        self.tracts.insert(tract.id(), tract);
    }

    /// Look up a tract, failing with [`ForcedPhotError::UnknownTract`] if absent.
    pub fn tract(&self, id: TractId) -> Result<&Tract, ForcedPhotError> {
        self.tracts.get(&id).ok_or(ForcedPhotError::UnknownTract(id))
    }
}
