//! # Source records and catalogs
//!
//! In-memory model of a detection catalog: [`SourceRecord`] (identity, deblend parentage, sky
//! position, detection [`Footprint`], measured fields), and [`SourceCatalog`], an ordered
//! sequence of records sharing one [`Schema`].
//!
//! ## Deblend families
//!
//! A record whose parent id is [`NO_PARENT`] is a top-level source; any other parent id names
//! another record of the same catalog (an invariant established by upstream deblending, not
//! re-verified here). Family traversal — "give me all direct children of record X" — requires
//! the catalog to be sorted by parent id first; [`SourceCatalog::sort_by_parent`] establishes
//! that local invariant and [`SourceCatalog::children`] relies on it.

pub mod schema;

use std::sync::Arc;

use nalgebra::Point2;
use smallvec::SmallVec;

use crate::constants::{SourceId, NO_PARENT};
use crate::geom::{Box2I, SkyCoord};

pub use schema::{Field, FieldKind, Schema};

/// One local maximum inside a detection footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// One row of pixels belonging to a footprint: the inclusive pixel run `[x0, x1]` at row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
}

/// An irregular pixel region plus the peak positions of one detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub spans: Vec<Span>,
    pub peaks: SmallVec<[Peak; 1]>,
}

impl Footprint {
    /// A rectangular footprint with a single peak at the box center, the common fixture shape.
    pub fn rectangle(bbox: Box2I) -> Self {
        let spans = (bbox.min().y..=bbox.max().y)
            .map(|y| Span {
                y,
                x0: bbox.min().x,
                x1: bbox.max().x,
            })
            .collect();
        let mut peaks = SmallVec::new();
        peaks.push(Peak {
            x: (bbox.min().x + bbox.max().x) as f64 / 2.0,
            y: (bbox.min().y + bbox.max().y) as f64 / 2.0,
            value: 0.0,
        });
        Self { spans, peaks }
    }

    /// The tight bounding box of the spans, or `None` for an empty footprint.
    pub fn bbox(&self) -> Option<Box2I> {
        let first = self.spans.first()?;
        let mut min = Point2::new(first.x0, first.y);
        let mut max = Point2::new(first.x1, first.y);
        for span in &self.spans[1..] {
            min.x = min.x.min(span.x0);
            min.y = min.y.min(span.y);
            max.x = max.x.max(span.x1);
            max.y = max.y.max(span.y);
        }
        Some(Box2I::new(min, max))
    }
}

/// One catalog row: identity, deblend parentage, reference sky position, detection footprint,
/// and the measured values laid out by the catalog schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: SourceId,
    pub parent: SourceId,
    pub coord: SkyCoord,
    pub footprint: Footprint,
    pub fields: Vec<f64>,
}

impl SourceRecord {
    pub fn is_top_level(&self) -> bool {
        self.parent == NO_PARENT
    }
}

/// An ordered sequence of [`SourceRecord`]s sharing one schema.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    schema: Arc<Schema>,
    records: Vec<SourceRecord>,
}

impl SourceCatalog {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: SourceRecord) {
        self.records.push(record);
    }

    pub fn extend<I: IntoIterator<Item = SourceRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceRecord> {
        self.records.iter()
    }

    /// Sort the catalog by parent id.
    ///
    /// The sort is stable, so records sharing a parent keep their relative order. This is the
    /// local invariant [`children`](Self::children) requires.
    pub fn sort_by_parent(&mut self) {
        self.records.sort_by_key(|r| r.parent);
    }

    /// All records whose parent id equals `parent`, as a contiguous slice.
    ///
    /// Requires the catalog to be sorted by parent id ([`sort_by_parent`](Self::sort_by_parent));
    /// on an unsorted catalog the result is meaningless. `children(NO_PARENT)` yields the
    /// top-level records.
    pub fn children(&self, parent: SourceId) -> &[SourceRecord] {
        let start = self.records.partition_point(|r| r.parent < parent);
        let end = self.records.partition_point(|r| r.parent <= parent);
        &self.records[start..end]
    }
}

impl IntoIterator for SourceCatalog {
    type Item = SourceRecord;
    type IntoIter = std::vec::IntoIter<SourceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
