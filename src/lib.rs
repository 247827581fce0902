//! # forcedphot: forced photometry reference-catalog core
//!
//! Forced photometry re-measures a fixed catalog of previously detected sky sources on a
//! different image, one that may use a different pixel grid, orientation, and coordinate
//! system than the image the catalog was built from. This crate implements the part that makes
//! that hard: acquiring the right reference sources for an image region and keeping the two
//! coordinate systems consistent, plus the driver that ties reference acquisition to per-source
//! measurement.
//!
//! - [`skymap`] — the sky-tile index: tracts, patches, and region → patch resolution.
//! - [`references`] — the reference catalog provider: both fetch strategies, overlap removal,
//!   and the deblend-family-preserving [`references::subset`] filter.
//! - [`forced_phot`] — the invocation driver with its coadd and single-exposure variants.
//! - [`repository`], [`measurement`] — the contracts of the external storage layer and
//!   measurement engine.
//! - [`catalog`], [`geom`], [`wcs`] — source records, boxes, and the TAN WCS they live in.
//!
//! The numerical measurement algorithms, the storage backend, and the command-line front end
//! are all external collaborators; see the [`measurement`] and [`repository`] traits for their
//! contracts.

pub mod catalog;
pub mod constants;
pub mod exposure;
pub mod forced_phot;
pub mod forcedphot_errors;
pub mod geom;
pub mod measurement;
pub mod references;
pub mod repository;
pub mod skymap;
pub mod wcs;
