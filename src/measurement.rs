//! # Measurement engine contract and forced-source id allocation
//!
//! The numerical measurement algorithms (flux, shape, centroid estimators) are external to this
//! crate; the driver only sees them through the [`MeasurementEngine`] trait, a pure function
//! from (exposure, reference records, reference WCS, id factory) to a result catalog. Per-record
//! measurement failures and flag-setting policy are handled entirely inside the engine.
//!
//! [`IdFactory`] allocates the identifiers of the forced sources the engine produces. One
//! factory is instantiated per driver invocation, parameterized by the destination partition:
//! the partition id occupies the high bits of every allocated id, so ids from concurrent
//! invocations over different partitions never collide.

use crate::catalog::{SourceCatalog, SourceRecord};
use crate::constants::SourceId;
use crate::exposure::Exposure;
use crate::forcedphot_errors::ForcedPhotError;
use crate::wcs::TanWcs;

/// Partition-scoped allocator of unique forced-source ids.
#[derive(Debug, Clone)]
pub struct IdFactory {
    partition_id: i64,
    counter_bits: u32,
    next: i64,
}

impl IdFactory {
    /// Build a factory whose ids carry `partition_id` in the bits above `counter_bits`.
    ///
    /// `counter_bits` bounds how many sources one partition can hold; sizing it for the
    /// pipeline's largest partition is the caller's configuration responsibility.
    pub fn for_partition(partition_id: i64, counter_bits: u32) -> Self {
        Self {
            partition_id,
            counter_bits,
            next: 0,
        }
    }

    /// Allocate the next id: strictly increasing within one factory, disjoint across partitions.
    ///
    /// Exhausting the counter range would bleed into the neighboring partition's id space;
    /// debug builds assert before that happens.
    pub fn next_id(&mut self) -> SourceId {
        debug_assert!(
            self.next < (1_i64 << self.counter_bits),
            "forced-source id counter exhausted for partition {}",
            self.partition_id
        );
        let id = (self.partition_id << self.counter_bits) | self.next;
        self.next += 1;
        id
    }
}

/// Output of one forced measurement invocation.
///
/// One record per matched reference source; written once by the driver, never mutated after
/// persistence.
#[derive(Debug, Clone)]
pub struct ForcedPhotResult {
    pub sources: SourceCatalog,
}

/// External measurement engine: performs the numerical forced measurement.
pub trait MeasurementEngine {
    /// Measure every reference record on `exposure`, allocating output ids from `id_factory`.
    ///
    /// `ref_wcs` is the reference catalog's WCS, passed explicitly alongside the exposure's own
    /// WCS (carried by `exposure`) so the engine can reproject reference positions and
    /// footprints into the measurement frame.
    fn run(
        &self,
        exposure: &Exposure,
        references: &[SourceRecord],
        ref_wcs: &TanWcs,
        id_factory: &mut IdFactory,
    ) -> Result<ForcedPhotResult, ForcedPhotError>;
}
