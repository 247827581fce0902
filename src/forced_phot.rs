//! # Forced measurement driver
//!
//! [`ForcedPhotDriver`] orchestrates one forced photometry invocation end to end:
//!
//! 1. resolve the reference catalog's WCS from the sky tiling,
//! 2. load the destination exposure from the repository,
//! 3. fetch the reference sources overlapping the exposure (strategy hook),
//! 4. allocate a partition-scoped [`IdFactory`] (hook) and run the measurement engine once,
//! 5. persist the result catalog under the destination partition's output key.
//!
//! The sequence is fixed; only the two hooks vary between the concrete drivers.
//! [`ForcedPhotCoadd`] measures on a coadd tile, so its destination region is exactly one patch
//! and it fetches references by sky-tile list; [`ForcedPhotCcd`] measures on an arbitrary
//! single exposure and fetches by the exposure's pixel bounding box, optionally padded.
//!
//! Every error is fatal to the invocation and propagates unchanged: no retry, no partial
//! result, no mid-invocation checkpoint. Each invocation processes exactly one destination
//! partition single-threaded; parallelism lives above this layer, one independent invocation
//! per partition.

use tracing::{debug, info};

use crate::catalog::SourceRecord;
use crate::exposure::Exposure;
use crate::forcedphot_errors::ForcedPhotError;
use crate::geom::Box2D;
use crate::measurement::{ForcedPhotResult, IdFactory, MeasurementEngine};
use crate::references::{CoaddSrcReferences, References};
use crate::repository::{DataId, Dataset, Repository};

/// Counter width of coadd forced-source ids; the packed tract/patch id sits above these bits.
const COADD_ID_COUNTER_BITS: u32 = 24;

/// Counter width of single-exposure forced-source ids.
const CCD_ID_COUNTER_BITS: u32 = 24;

/// Base driver: the fixed invocation state machine plus the two specialization hooks.
pub trait ForcedPhotDriver {
    fn references(&self) -> &dyn References;

    fn measurement(&self) -> &dyn MeasurementEngine;

    /// Prefix of the destination's exposure and output dataset names (for example
    /// `deepCoadd_` on a coadd, empty on a single exposure).
    fn data_prefix(&self) -> String;

    /// Hook: build the forced-source id factory for the destination partition.
    fn make_id_factory(&self, data_id: &DataId) -> Result<IdFactory, ForcedPhotError>;

    /// Hook: fetch the reference sources overlapping the destination.
    ///
    /// Implementations call one of the two fetch strategies on the references provider,
    /// depending on whether the destination region is naturally tile-aligned or an arbitrary
    /// pixel box.
    fn fetch_references(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        exposure: &Exposure,
    ) -> Result<Vec<SourceRecord>, ForcedPhotError>;

    /// Name of the destination image dataset.
    fn exposure_dataset(&self) -> String {
        format!("{}calexp", self.data_prefix())
    }

    /// Name of the output forced-source dataset.
    fn output_dataset(&self) -> String {
        format!("{}forced_src", self.data_prefix())
    }

    /// Measure one destination partition end to end and persist the result catalog.
    ///
    /// The returned catalog is the same one written to the repository; on retry of a failed
    /// invocation the output key is overwritten in full, never appended to.
    fn run(&self, repo: &dyn Repository, data_id: &DataId) -> Result<ForcedPhotResult, ForcedPhotError> {
        let ref_wcs = self.references().get_wcs(repo, data_id)?;
        debug!("Resolved reference WCS for {data_id}");

        let exposure = repo.get(&self.exposure_dataset(), data_id)?.into_exposure()?;
        let ref_records = self.fetch_references(repo, data_id, &exposure)?;
        info!(
            "Performing forced measurement of {} reference sources on {data_id}",
            ref_records.len()
        );

        let mut id_factory = self.make_id_factory(data_id)?;
        let result = self.measurement().run(&exposure, &ref_records, &ref_wcs, &mut id_factory)?;

        repo.put(
            &self.output_dataset(),
            data_id,
            Dataset::SourceCatalog(result.sources.clone()),
        )?;
        Ok(result)
    }
}

/// Forced measurement on a coadd tile: the destination is one patch of the reference tiling.
pub struct ForcedPhotCoadd<M> {
    references: CoaddSrcReferences,
    measurement: M,
}

impl<M: MeasurementEngine> ForcedPhotCoadd<M> {
    pub fn new(references: CoaddSrcReferences, measurement: M) -> Self {
        Self {
            references,
            measurement,
        }
    }
}

impl<M: MeasurementEngine> ForcedPhotDriver for ForcedPhotCoadd<M> {
    fn references(&self) -> &dyn References {
        &self.references
    }

    fn measurement(&self) -> &dyn MeasurementEngine {
        &self.measurement
    }

    fn data_prefix(&self) -> String {
        format!("{}Coadd_", self.references.config().coadd_name)
    }

    fn make_id_factory(&self, data_id: &DataId) -> Result<IdFactory, ForcedPhotError> {
        let tract = data_id.tract()?;
        let patch = data_id.patch()?;
        // Pack tract and patch grid indices into the high bits.
        let partition_id =
            ((tract as i64) << 20) | (((patch.0 as i64) & 0x3ff) << 10) | ((patch.1 as i64) & 0x3ff);
        Ok(IdFactory::for_partition(partition_id, COADD_ID_COUNTER_BITS))
    }

    fn fetch_references(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        _exposure: &Exposure,
    ) -> Result<Vec<SourceRecord>, ForcedPhotError> {
        // The destination is tile-aligned: fetch exactly the destination patch.
        let skymap = repo
            .get(&self.references.skymap_dataset_name(), &DataId::new())?
            .into_sky_map()?;
        let tract = skymap.tract(data_id.tract()?)?;
        let patch = tract.patch_info(data_id.patch()?)?;
        self.references.fetch_in_patches(repo, data_id, &[patch])
    }
}

/// Forced measurement on an arbitrary single exposure.
pub struct ForcedPhotCcd<M> {
    references: CoaddSrcReferences,
    measurement: M,
    /// Pixels to grow the exposure bounding box by before the final reference filter.
    ref_pad: f64,
}

impl<M: MeasurementEngine> ForcedPhotCcd<M> {
    pub fn new(references: CoaddSrcReferences, measurement: M, ref_pad: f64) -> Self {
        Self {
            references,
            measurement,
            ref_pad,
        }
    }
}

impl<M: MeasurementEngine> ForcedPhotDriver for ForcedPhotCcd<M> {
    fn references(&self) -> &dyn References {
        &self.references
    }

    fn measurement(&self) -> &dyn MeasurementEngine {
        &self.measurement
    }

    fn data_prefix(&self) -> String {
        String::new()
    }

    fn make_id_factory(&self, data_id: &DataId) -> Result<IdFactory, ForcedPhotError> {
        let visit = data_id.visit()?;
        let ccd = data_id.ccd()?;
        let partition_id = ((visit as i64) << 8) | (ccd as i64);
        Ok(IdFactory::for_partition(partition_id, CCD_ID_COUNTER_BITS))
    }

    fn fetch_references(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        exposure: &Exposure,
    ) -> Result<Vec<SourceRecord>, ForcedPhotError> {
        self.references.fetch_in_box(
            repo,
            data_id,
            Box2D::from(exposure.bbox()),
            exposure.wcs(),
            self.ref_pad,
        )
    }
}
