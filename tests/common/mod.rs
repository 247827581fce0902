use std::sync::Arc;

use nalgebra::Point2;
use smallvec::SmallVec;

use forcedphot::catalog::{FieldKind, Footprint, Peak, Schema, SourceCatalog, SourceRecord};
use forcedphot::constants::{SourceId, TractId, RADEG};
use forcedphot::exposure::Exposure;
use forcedphot::forcedphot_errors::ForcedPhotError;
use forcedphot::geom::{Box2I, SkyCoord};
use forcedphot::measurement::{ForcedPhotResult, IdFactory, MeasurementEngine};
use forcedphot::repository::{DataId, Dataset, MemoryRepository, Repository};
use forcedphot::skymap::{PatchIndex, SkyMap, Tract};
use forcedphot::wcs::TanWcs;

/// Tract id used by every fixture.
pub const TRACT_ID: TractId = 9;

/// 1 arcsec/pixel, the fixture scale everywhere.
pub const PIXEL_SCALE: f64 = 1.0 / 3600.0 * RADEG;

/// The fixture tract WCS: tangent point (30°, 10°) at the center of the 2000×2000 tract.
pub fn tract_wcs() -> TanWcs {
    TanWcs::with_scale(
        SkyCoord::from_degrees(30.0, 10.0),
        Point2::new(1000.0, 1000.0),
        PIXEL_SCALE,
    )
    .unwrap()
}

/// A 2×2-patch tract: 1000×1000 inner pixels per patch, 100 pixel overlap border.
pub fn test_tract() -> Tract {
    Tract::new(TRACT_ID, tract_wcs(), (2, 2), (1000, 1000), 100)
}

pub fn test_skymap() -> SkyMap {
    let mut skymap = SkyMap::new();
    skymap.add_tract(test_tract());
    skymap
}

/// Minimal reference schema shared by the fixture catalogs.
pub fn ref_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_field("coord", FieldKind::Float, "reference sky position");
    schema.add_field("deblend_nChild", FieldKind::Int, "number of deblended children");
    schema
}

/// A reference record whose sky position is the given tract pixel.
pub fn reference_record(id: SourceId, parent: SourceId, tract_pixel: Point2<f64>) -> SourceRecord {
    let coord = tract_wcs().pixel_to_sky(tract_pixel);
    let mut peaks = SmallVec::new();
    peaks.push(Peak {
        x: tract_pixel.x,
        y: tract_pixel.y,
        value: 1.0,
    });
    SourceRecord {
        id,
        parent,
        coord,
        footprint: Footprint {
            spans: Footprint::rectangle(Box2I::from_dimensions(
                Point2::new(tract_pixel.x as i32 - 2, tract_pixel.y as i32 - 2),
                5,
                5,
            ))
            .spans,
            peaks,
        },
        fields: vec![0.0, 0.0],
    }
}

/// Populate a repository with the fixture sky map, the multiband reference schema, and one
/// `deepCoadd_ref` catalog per listed patch.
pub fn setup_repository(patches: &[(PatchIndex, Vec<SourceRecord>)]) -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.put("deepCoadd_skyMap", &DataId::new(), Dataset::SkyMap(test_skymap()))
        .unwrap();
    repo.put("deepCoadd_ref_schema", &DataId::new(), Dataset::Schema(ref_schema()))
        .unwrap();
    for (index, records) in patches {
        let mut catalog = SourceCatalog::new(Arc::new(ref_schema()));
        catalog.extend(records.iter().cloned());
        let data_id = DataId::new().with_tract(TRACT_ID).with_patch(*index);
        repo.put("deepCoadd_ref", &data_id, Dataset::SourceCatalog(catalog))
            .unwrap();
    }
    repo
}

/// A destination exposure whose pixel frame is a pure shift of the tract frame: exposure pixel
/// (0,0) sits at tract pixel `tract_origin`, same scale, north up.
pub fn shifted_exposure(tract_origin: Point2<f64>, width: i32, height: i32) -> Exposure {
    let crpix = Point2::new(width as f64 / 2.0, height as f64 / 2.0);
    let crval = tract_wcs().pixel_to_sky(Point2::new(
        tract_origin.x + crpix.x,
        tract_origin.y + crpix.y,
    ));
    let wcs = TanWcs::with_scale(crval, crpix, PIXEL_SCALE).unwrap();
    Exposure::new(Box2I::from_dimensions(Point2::new(0, 0), width, height), wcs)
}

/// Measurement engine stand-in: one output record per reference, id from the factory, the
/// matched reference id stored in the single output field.
pub struct CopyMeasurementEngine;

impl MeasurementEngine for CopyMeasurementEngine {
    fn run(
        &self,
        _exposure: &Exposure,
        references: &[SourceRecord],
        _ref_wcs: &TanWcs,
        id_factory: &mut IdFactory,
    ) -> Result<ForcedPhotResult, ForcedPhotError> {
        let mut schema = Schema::new();
        schema.add_field("objectId", FieldKind::Int, "id of the matched reference source");
        let mut sources = SourceCatalog::new(Arc::new(schema));
        for reference in references {
            sources.push(SourceRecord {
                id: id_factory.next_id(),
                parent: 0,
                coord: reference.coord,
                footprint: reference.footprint.clone(),
                fields: vec![reference.id as f64],
            });
        }
        Ok(ForcedPhotResult { sources })
    }
}

/// Repository wrapper recording every `get` key, for asserting which datasets a fetch touched.
pub struct RecordingRepository<R> {
    inner: R,
    gets: std::cell::RefCell<Vec<(String, DataId)>>,
}

impl<R: Repository> RecordingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            gets: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// The data ids of every `get` against the given dataset so far.
    pub fn gets_for(&self, dataset: &str) -> Vec<DataId> {
        self.gets
            .borrow()
            .iter()
            .filter(|(name, _)| name == dataset)
            .map(|(_, data_id)| data_id.clone())
            .collect()
    }
}

impl<R: Repository> Repository for RecordingRepository<R> {
    fn exists(&self, dataset: &str, data_id: &DataId) -> bool {
        self.inner.exists(dataset, data_id)
    }

    fn get(&self, dataset: &str, data_id: &DataId) -> Result<Dataset, ForcedPhotError> {
        self.gets
            .borrow_mut()
            .push((dataset.to_string(), data_id.clone()));
        self.inner.get(dataset, data_id)
    }

    fn put(&self, dataset: &str, data_id: &DataId, value: Dataset) -> Result<(), ForcedPhotError> {
        self.inner.put(dataset, data_id, value)
    }
}
