//! # Key-addressed dataset repository
//!
//! The storage layer is an external collaborator: this crate only sees an opaque, key-addressed
//! [`Repository`] with `exists` / `get` / `put`. Keys are a logical dataset name (for example
//! `deepCoadd_src`) plus a [`DataId`], the partition handle carrying whichever of tract, patch,
//! band filter, visit, and ccd identify the partition. Dataset encoding, caching, and retry
//! policy all belong to the implementation behind this trait, not to the forced photometry
//! core — a failed `get` is fatal to the invocation that issued it.
//!
//! [`MemoryRepository`] is the in-process implementation used by the tests and by pipelines
//! that assemble their inputs in memory.

use std::cell::RefCell;
use std::fmt;

use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::catalog::{Schema, SourceCatalog};
use crate::constants::TractId;
use crate::exposure::Exposure;
use crate::forcedphot_errors::ForcedPhotError;
use crate::skymap::{PatchIndex, SkyMap};

/// A partition handle: the identifying keys of one data partition.
///
/// Which keys are set depends on the dataset: a coadd catalog needs tract and patch (and a
/// filter outside the merged scheme), a single exposure needs visit and ccd. Accessors for
/// required keys return [`ForcedPhotError::MissingDataIdKey`] when the key is absent, which
/// signals caller misuse rather than missing data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataId {
    pub tract: Option<TractId>,
    pub patch: Option<PatchIndex>,
    pub filter: Option<String>,
    pub visit: Option<u32>,
    pub ccd: Option<u32>,
}

impl DataId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tract(mut self, tract: TractId) -> Self {
        self.tract = Some(tract);
        self
    }

    pub fn with_patch(mut self, patch: PatchIndex) -> Self {
        self.patch = Some(patch);
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn with_visit(mut self, visit: u32) -> Self {
        self.visit = Some(visit);
        self
    }

    pub fn with_ccd(mut self, ccd: u32) -> Self {
        self.ccd = Some(ccd);
        self
    }

    /// The tract key, required by every reference operation.
    pub fn tract(&self) -> Result<TractId, ForcedPhotError> {
        self.tract.ok_or(ForcedPhotError::MissingDataIdKey("tract"))
    }

    /// The patch key, required when fetching references for a tile-aligned destination.
    pub fn patch(&self) -> Result<PatchIndex, ForcedPhotError> {
        self.patch.ok_or(ForcedPhotError::MissingDataIdKey("patch"))
    }

    /// The visit key, required when the destination is a single exposure.
    pub fn visit(&self) -> Result<u32, ForcedPhotError> {
        self.visit.ok_or(ForcedPhotError::MissingDataIdKey("visit"))
    }

    /// The ccd key, required when the destination is a single exposure.
    pub fn ccd(&self) -> Result<u32, ForcedPhotError> {
        self.ccd.ok_or(ForcedPhotError::MissingDataIdKey("ccd"))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            self.tract.map(|t| format!("tract={t}")),
            self.patch.map(|p| format!("patch={p}")),
            self.filter.as_ref().map(|b| format!("filter={b}")),
            self.visit.map(|v| format!("visit={v}")),
            self.ccd.map(|c| format!("ccd={c}")),
        ];
        write!(f, "{{{}}}", parts.iter().flatten().join(", "))
    }
}

/// Tagged payload stored under one repository key.
#[derive(Debug, Clone)]
pub enum Dataset {
    SourceCatalog(SourceCatalog),
    SkyMap(SkyMap),
    Exposure(Exposure),
    Schema(Schema),
}

impl Dataset {
    fn kind(&self) -> &'static str {
        match self {
            Dataset::SourceCatalog(_) => "source catalog",
            Dataset::SkyMap(_) => "sky map",
            Dataset::Exposure(_) => "exposure",
            Dataset::Schema(_) => "schema",
        }
    }

    pub fn into_source_catalog(self) -> Result<SourceCatalog, ForcedPhotError> {
        match self {
            Dataset::SourceCatalog(catalog) => Ok(catalog),
            other => Err(ForcedPhotError::UnexpectedDataset {
                expected: "source catalog",
                found: other.kind(),
            }),
        }
    }

    pub fn into_sky_map(self) -> Result<SkyMap, ForcedPhotError> {
        match self {
            Dataset::SkyMap(skymap) => Ok(skymap),
            other => Err(ForcedPhotError::UnexpectedDataset {
                expected: "sky map",
                found: other.kind(),
            }),
        }
    }

    pub fn into_exposure(self) -> Result<Exposure, ForcedPhotError> {
        match self {
            Dataset::Exposure(exposure) => Ok(exposure),
            other => Err(ForcedPhotError::UnexpectedDataset {
                expected: "exposure",
                found: other.kind(),
            }),
        }
    }

    pub fn into_schema(self) -> Result<Schema, ForcedPhotError> {
        match self {
            Dataset::Schema(schema) => Ok(schema),
            other => Err(ForcedPhotError::UnexpectedDataset {
                expected: "schema",
                found: other.kind(),
            }),
        }
    }
}

/// Key-addressed dataset store.
///
/// Implementations must support concurrent reads and disjoint-key writes; within one forced
/// photometry invocation all access is single-threaded and synchronous.
pub trait Repository {
    fn exists(&self, dataset: &str, data_id: &DataId) -> bool;

    fn get(&self, dataset: &str, data_id: &DataId) -> Result<Dataset, ForcedPhotError>;

    fn put(&self, dataset: &str, data_id: &DataId, value: Dataset) -> Result<(), ForcedPhotError>;
}

/// In-memory repository used by tests and in-process pipelines.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    datasets: RefCell<AHashMap<(String, DataId), Dataset>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn exists(&self, dataset: &str, data_id: &DataId) -> bool {
        self.datasets
            .borrow()
            .contains_key(&(dataset.to_string(), data_id.clone()))
    }

    fn get(&self, dataset: &str, data_id: &DataId) -> Result<Dataset, ForcedPhotError> {
        self.datasets
            .borrow()
            .get(&(dataset.to_string(), data_id.clone()))
            .cloned()
            .ok_or_else(|| {
                ForcedPhotError::RepositoryFailure(format!("no dataset {dataset} for {data_id}"))
            })
    }

    fn put(&self, dataset: &str, data_id: &DataId, value: Dataset) -> Result<(), ForcedPhotError> {
        self.datasets
            .borrow_mut()
            .insert((dataset.to_string(), data_id.clone()), value);
        Ok(())
    }
}
