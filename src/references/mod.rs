//! # Reference catalog provider
//!
//! Retrieves the previously-detected sources a forced measurement re-measures. The provider
//! resolves an image region to the sky-tile partitions ("patches") that cover it, loads each
//! patch's catalog from the [`Repository`], and reconciles the reference tiling's coordinate
//! system with the destination image's through explicitly-passed WCS instances.
//!
//! The capability contract is the [`References`] trait; [`CoaddSrcReferences`] is the concrete
//! coadd-backed provider, with a [`ReferenceVariant`] tag selecting between the single-band
//! `src` catalogs and the merged multi-band `ref` catalogs. The two variants share every line
//! of matching logic and differ only in the dataset suffix and in which cross-field
//! configuration rule applies.
//!
//! Reference datasets are resolved as `{coaddName}Coadd_{suffix}` keyed by tract, patch, and
//! (for the per-band scheme) the configured filter. A missing patch dataset is a pipeline
//! ordering or configuration error and fails the whole fetch with
//! [`ForcedPhotError::MissingReference`]; nothing is retried at this layer.

pub mod subset;

use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{Schema, SourceRecord};
use crate::constants::{CHI_SQUARED_COADD_NAME, DEFAULT_COADD_NAME};
use crate::forcedphot_errors::ForcedPhotError;
use crate::geom::{Box2D, SkyCoord};
use crate::repository::{DataId, Repository};
use crate::skymap::{Patch, SkyMap, Tract};
use crate::wcs::TanWcs;

pub use subset::subset;

/// Configuration of a reference provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencesConfig {
    /// Only include reference sources for each patch that lie within the patch's inner bbox.
    pub remove_patch_overlaps: bool,
    /// Bandpass for reference sources; `None` indicates chi-squared detections.
    pub filter: Option<String>,
    /// Coadd name: typically one of `deep` or `goodSeeing`.
    pub coadd_name: String,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            remove_patch_overlaps: true,
            filter: None,
            coadd_name: DEFAULT_COADD_NAME.to_string(),
        }
    }
}

/// Which reference catalog flavor a provider reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceVariant {
    /// Per-band detection catalogs (`…Coadd_src`).
    CoaddSrc,
    /// Merged multi-band reference catalogs (`…Coadd_ref`).
    MultiBand,
}

impl ReferenceVariant {
    /// Suffix appended to `{coaddName}Coadd_` to form the reference dataset name.
    pub fn dataset_suffix(&self) -> &'static str {
        match self {
            ReferenceVariant::CoaddSrc => "src",
            ReferenceVariant::MultiBand => "ref",
        }
    }

    /// Cross-field validation of `config` for this variant.
    ///
    /// Runs at provider construction, before any I/O:
    /// - per-band (`CoaddSrc`): `filter` must be unset if and only if the coadd is the
    ///   band-independent chi-squared scheme;
    /// - merged (`MultiBand`): `filter` must never be set.
    pub fn validate(&self, config: &ReferencesConfig) -> Result<(), ForcedPhotError> {
        match self {
            ReferenceVariant::CoaddSrc => {
                if (config.coadd_name == CHI_SQUARED_COADD_NAME) != config.filter.is_none() {
                    return Err(ForcedPhotError::ConfigValidation(format!(
                        "filter may be unset if and only if coaddName is {CHI_SQUARED_COADD_NAME}"
                    )));
                }
            }
            ReferenceVariant::MultiBand => {
                if config.filter.is_some() {
                    return Err(ForcedPhotError::ConfigValidation(
                        "filter must not be set for the multiband processing scheme".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Capability contract for reference source retrieval.
///
/// Two fetch strategies are offered: by explicit sky-tile list ([`fetch_in_patches`]) for
/// destinations naturally aligned with the tiling, and by destination pixel box
/// ([`fetch_in_box`]) for arbitrary exposures. Both return materialized record vectors; the
/// cross-patch record order is unspecified and callers must not depend on it, while the order
/// within one patch preserves the stored catalog's order.
///
/// [`fetch_in_patches`]: References::fetch_in_patches
/// [`fetch_in_box`]: References::fetch_in_box
pub trait References {
    /// The field layout of reference sources, available before any data partition is selected.
    fn schema(&self) -> &Arc<Schema>;

    /// The sky-tile WCS of the tract referenced by `data_id` (which must carry a tract key).
    fn get_wcs(&self, repo: &dyn Repository, data_id: &DataId) -> Result<TanWcs, ForcedPhotError>;

    /// Reference sources of the given patches.
    ///
    /// With `remove_patch_overlaps` set, only records whose sky position falls within each
    /// patch's inner box are returned, so adjacent patches never contribute duplicates. With it
    /// unset, records in overlap borders may be emitted once per covering patch; duplicates are
    /// tolerated and deliberately not removed here.
    fn fetch_in_patches(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        patch_list: &[Patch],
    ) -> Result<Vec<SourceRecord>, ForcedPhotError>;

    /// Reference sources overlapping a pixel bounding box in the frame of the destination `wcs`.
    ///
    /// The box corners are mapped to the sky to resolve the covering patches; `pad` then grows
    /// the box before the final spatial filter, without ever expanding the patch search. The
    /// result is family-complete: see [`subset`].
    fn fetch_in_box(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        bbox: Box2D,
        wcs: &TanWcs,
        pad: f64,
    ) -> Result<Vec<SourceRecord>, ForcedPhotError>;
}

/// Coadd-backed reference provider reading `{coaddName}Coadd_{suffix}` catalogs.
#[derive(Debug, Clone)]
pub struct CoaddSrcReferences {
    config: ReferencesConfig,
    variant: ReferenceVariant,
    schema: Arc<Schema>,
}

impl CoaddSrcReferences {
    /// Build a provider, bootstrapping the reference schema from the repository's
    /// partition-independent `{coaddName}Coadd_{suffix}_schema` dataset.
    pub fn new(
        variant: ReferenceVariant,
        config: ReferencesConfig,
        repo: &dyn Repository,
    ) -> Result<Self, ForcedPhotError> {
        variant.validate(&config)?;
        let dataset = format!("{}Coadd_{}_schema", config.coadd_name, variant.dataset_suffix());
        let schema = repo.get(&dataset, &DataId::new())?.into_schema()?;
        Ok(Self {
            config,
            variant,
            schema: Arc::new(schema),
        })
    }

    /// Build a provider around an already-known schema; takes precedence over the repository
    /// bootstrap when the caller has the schema in hand.
    pub fn with_schema(
        variant: ReferenceVariant,
        config: ReferencesConfig,
        schema: Arc<Schema>,
    ) -> Result<Self, ForcedPhotError> {
        variant.validate(&config)?;
        Ok(Self {
            config,
            variant,
            schema,
        })
    }

    pub fn config(&self) -> &ReferencesConfig {
        &self.config
    }

    pub fn variant(&self) -> ReferenceVariant {
        self.variant
    }

    /// Name of the reference catalog dataset this provider reads.
    pub fn dataset_name(&self) -> String {
        format!("{}Coadd_{}", self.config.coadd_name, self.variant.dataset_suffix())
    }

    /// Name of the sky map dataset describing the reference tiling.
    pub fn skymap_dataset_name(&self) -> String {
        format!("{}Coadd_skyMap", self.config.coadd_name)
    }

    fn tract<'a>(
        &self,
        skymap: &'a SkyMap,
        data_id: &DataId,
    ) -> Result<&'a Tract, ForcedPhotError> {
        skymap.tract(data_id.tract()?)
    }

    fn patch_data_id(&self, data_id: &DataId, patch: &Patch) -> Result<DataId, ForcedPhotError> {
        let mut patch_id = DataId::new().with_tract(data_id.tract()?).with_patch(patch.index());
        if let Some(filter) = &self.config.filter {
            patch_id = patch_id.with_filter(filter);
        }
        Ok(patch_id)
    }
}

impl References for CoaddSrcReferences {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn get_wcs(&self, repo: &dyn Repository, data_id: &DataId) -> Result<TanWcs, ForcedPhotError> {
        let skymap = repo.get(&self.skymap_dataset_name(), &DataId::new())?.into_sky_map()?;
        Ok(self.tract(&skymap, data_id)?.wcs().clone())
    }

    fn fetch_in_patches(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        patch_list: &[Patch],
    ) -> Result<Vec<SourceRecord>, ForcedPhotError> {
        let dataset = self.dataset_name();
        let skymap = repo.get(&self.skymap_dataset_name(), &DataId::new())?.into_sky_map()?;
        let tract = self.tract(&skymap, data_id)?;

        // Validate existence of every patch dataset before yielding a single record, so a
        // missing reference surfaces with zero records emitted.
        for patch in patch_list {
            let patch_id = self.patch_data_id(data_id, patch)?;
            if !repo.exists(&dataset, &patch_id) {
                return Err(ForcedPhotError::MissingReference {
                    dataset,
                    data_id: patch_id.to_string(),
                });
            }
        }

        let mut records = Vec::new();
        for patch in patch_list {
            let patch_id = self.patch_data_id(data_id, patch)?;
            info!("Getting references in {patch_id}");
            let catalog = repo.get(&dataset, &patch_id)?.into_source_catalog()?;
            if self.config.remove_patch_overlaps {
                let inner = Box2D::from(patch.inner_bbox());
                records.extend(catalog.into_iter().filter(|source| {
                    match tract.wcs().sky_to_pixel(source.coord) {
                        Ok(pixel) => inner.contains(pixel),
                        Err(_) => false,
                    }
                }));
            } else {
                records.extend(catalog);
            }
        }
        debug!(
            "Fetched {} reference sources from {} patches",
            records.len(),
            patch_list.len()
        );
        Ok(records)
    }

    fn fetch_in_box(
        &self,
        repo: &dyn Repository,
        data_id: &DataId,
        bbox: Box2D,
        wcs: &TanWcs,
        pad: f64,
    ) -> Result<Vec<SourceRecord>, ForcedPhotError> {
        let skymap = repo.get(&self.skymap_dataset_name(), &DataId::new())?.into_sky_map()?;
        let tract = self.tract(&skymap, data_id)?;

        let coord_list: Vec<SkyCoord> =
            bbox.corners().iter().map(|corner| wcs.pixel_to_sky(*corner)).collect();
        info!(
            "Getting references in region with corners {} [degrees]",
            coord_list
                .iter()
                .map(|c| format!("({:.6}, {:.6})", c.ra_deg(), c.dec_deg()))
                .join(", ")
        );
        let patch_list = tract.find_patch_list(&coord_list)?;

        // Pad after patch resolution: padding only widens the final spatial filter, it must
        // never pull in additional patches.
        let bbox = if pad > 0.0 { bbox.grow(pad) } else { bbox };

        let sources = self.fetch_in_patches(repo, data_id, &patch_list)?;
        Ok(subset(sources, self.schema.clone(), &bbox, wcs))
    }
}
