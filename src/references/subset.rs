//! Deblend-family-preserving spatial filter.

use std::sync::Arc;

use crate::catalog::{Schema, SourceCatalog, SourceRecord};
use crate::constants::NO_PARENT;
use crate::geom::Box2D;
use crate::wcs::TanWcs;

/// Filter sources to those within `bbox`, defined in the pixel frame of `wcs`, without breaking
/// deblend families.
///
/// Instead of filtering records directly by their own positions, top-level records are tested
/// against the box and each accepted parent brings **all** of its direct children along,
/// whatever their own positions; children of rejected parents are dropped even when they lie
/// inside the box. Downstream measurement replaces a child's neighbors with noise using the
/// parent's footprint, so a child without its parent (or the reverse) silently corrupts the
/// measurement.
///
/// The input is materialized and stable-sorted by parent id, so records sharing a parent keep
/// their relative order in the output. Positions that cannot be projected into the pixel frame
/// (on or behind the tangent plane of `wcs`) count as outside the box.
pub fn subset<I>(sources: I, schema: Arc<Schema>, bbox: &Box2D, wcs: &TanWcs) -> Vec<SourceRecord>
where
    I: IntoIterator<Item = SourceRecord>,
{
    let mut catalog = SourceCatalog::new(schema);
    catalog.extend(sources);
    // children() requires the sort-by-parent invariant.
    catalog.sort_by_parent();

    let mut filtered = Vec::new();
    for parent in catalog.children(NO_PARENT) {
        let inside = match wcs.sky_to_pixel(parent.coord) {
            Ok(pixel) => bbox.contains(pixel),
            Err(_) => false,
        };
        if inside {
            filtered.push(parent.clone());
            filtered.extend(catalog.children(parent.id).iter().cloned());
        }
    }
    filtered
}
