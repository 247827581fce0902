mod common;

use std::sync::Arc;

use nalgebra::Point2;

use forcedphot::constants::SourceId;
use forcedphot::forcedphot_errors::ForcedPhotError;
use forcedphot::geom::Box2D;
use forcedphot::references::{CoaddSrcReferences, References, ReferenceVariant, ReferencesConfig};
use forcedphot::repository::{DataId, MemoryRepository, Repository};
use forcedphot::skymap::{Patch, PatchIndex};

use common::{
    reference_record, setup_repository, test_tract, tract_wcs, RecordingRepository, TRACT_ID,
};

fn multiband_provider(repo: &dyn Repository) -> CoaddSrcReferences {
    CoaddSrcReferences::new(ReferenceVariant::MultiBand, ReferencesConfig::default(), repo).unwrap()
}

fn tract_data_id() -> DataId {
    DataId::new().with_tract(TRACT_ID)
}

fn patch(index: PatchIndex) -> Patch {
    test_tract().patch_info(index).unwrap()
}

fn ids(records: &[forcedphot::catalog::SourceRecord]) -> Vec<SourceId> {
    let mut ids: Vec<SourceId> = records.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids
}

/// Sources in the overlap border are stored in both adjacent patch catalogs; with overlap
/// removal on, each must come back exactly once, owned by the patch whose inner box holds it.
#[test]
fn test_remove_patch_overlaps_partitions_sky() {
    // Both records sit in the border around x=1000 and are duplicated in both catalogs.
    let near_boundary_left = reference_record(1, 0, Point2::new(950.0, 450.0));
    let near_boundary_right = reference_record(2, 0, Point2::new(1050.0, 450.0));
    let both = vec![near_boundary_left, near_boundary_right];
    let repo = setup_repository(&[
        (PatchIndex(0, 0), both.clone()),
        (PatchIndex(1, 0), both),
    ]);
    let provider = multiband_provider(&repo);

    let records = provider
        .fetch_in_patches(
            &repo,
            &tract_data_id(),
            &[patch(PatchIndex(0, 0)), patch(PatchIndex(1, 0))],
        )
        .unwrap();
    assert_eq!(ids(&records), vec![1, 2]);
}

#[test]
fn test_overlap_duplicates_tolerated_when_disabled() {
    let record = reference_record(1, 0, Point2::new(950.0, 450.0));
    let repo = setup_repository(&[
        (PatchIndex(0, 0), vec![record.clone()]),
        (PatchIndex(1, 0), vec![record]),
    ]);
    let provider = CoaddSrcReferences::new(
        ReferenceVariant::MultiBand,
        ReferencesConfig {
            remove_patch_overlaps: false,
            ..Default::default()
        },
        &repo,
    )
    .unwrap();

    let records = provider
        .fetch_in_patches(
            &repo,
            &tract_data_id(),
            &[patch(PatchIndex(0, 0)), patch(PatchIndex(1, 0))],
        )
        .unwrap();
    // The border source is emitted once per covering patch.
    assert_eq!(ids(&records), vec![1, 1]);
}

#[test]
fn test_missing_patch_dataset_fails_with_its_key() {
    let repo = setup_repository(&[(
        PatchIndex(0, 0),
        vec![reference_record(1, 0, Point2::new(450.0, 450.0))],
    )]);
    let provider = multiband_provider(&repo);

    // (1,1) has no catalog; the error must identify exactly that key even though (0,0) exists.
    let err = provider
        .fetch_in_patches(
            &repo,
            &tract_data_id(),
            &[patch(PatchIndex(0, 0)), patch(PatchIndex(1, 1))],
        )
        .unwrap_err();
    match err {
        ForcedPhotError::MissingReference { dataset, data_id } => {
            assert_eq!(dataset, "deepCoadd_ref");
            assert!(data_id.contains("patch=1,1"), "unexpected key: {data_id}");
        }
        other => panic!("expected MissingReference, got {other:?}"),
    }
}

#[test]
fn test_fetch_is_idempotent() {
    let repo = setup_repository(&[(
        PatchIndex(0, 0),
        vec![
            reference_record(1, 0, Point2::new(450.0, 450.0)),
            reference_record(2, 1, Point2::new(452.0, 450.0)),
            reference_record(3, 0, Point2::new(120.0, 800.0)),
        ],
    )]);
    let provider = multiband_provider(&repo);
    let patches = [patch(PatchIndex(0, 0))];

    let first = provider.fetch_in_patches(&repo, &tract_data_id(), &patches).unwrap();
    let second = provider.fetch_in_patches(&repo, &tract_data_id(), &patches).unwrap();
    let first_ids: Vec<SourceId> = first.iter().map(|r| r.id).collect();
    let second_ids: Vec<SourceId> = second.iter().map(|r| r.id).collect();
    assert_eq!(first_ids, second_ids);
    // In-patch order preserves the stored catalog order.
    assert_eq!(first_ids, vec![1, 2, 3]);
}

/// Growing the search box by `pad` must not pull in additional patches; it only widens the
/// final per-record filter.
#[test]
fn test_padding_does_not_expand_patch_search() {
    let inside = reference_record(1, 0, Point2::new(450.0, 450.0));
    let in_pad_margin = reference_record(2, 0, Point2::new(330.0, 450.0));
    let repo = RecordingRepository::new(setup_repository(&[(
        PatchIndex(0, 0),
        vec![inside, in_pad_margin],
    )]));
    let provider = multiband_provider(&repo);

    // Query box (400..500)^2 in tract pixels, using the tract frame itself as destination.
    let bbox = Box2D::new(Point2::new(400.0, 400.0), Point2::new(500.0, 500.0));
    let wcs = tract_wcs();

    let unpadded = provider
        .fetch_in_box(&repo, &tract_data_id(), bbox, &wcs, 0.0)
        .unwrap();
    let touched_unpadded = repo.gets_for("deepCoadd_ref");

    // Pad far enough that a box grown *before* patch resolution would reach patch (1,0)'s
    // outer region (and fail on its missing dataset).
    let padded = provider
        .fetch_in_box(&repo, &tract_data_id(), bbox, &wcs, 600.0)
        .unwrap();
    let touched_padded: Vec<DataId> = repo.gets_for("deepCoadd_ref")[touched_unpadded.len()..].to_vec();

    // Same patch datasets read either way.
    assert_eq!(touched_unpadded, touched_padded);
    // The pad margin only changes the final filter.
    assert_eq!(ids(&unpadded), vec![1]);
    assert_eq!(ids(&padded), vec![1, 2]);
}

#[test]
fn test_fetch_in_box_keeps_families_intact() {
    let parent = reference_record(1, 0, Point2::new(450.0, 450.0));
    let child_inside = reference_record(2, 1, Point2::new(448.0, 452.0));
    let child_outside_box = reference_record(3, 1, Point2::new(700.0, 700.0));
    let unrelated_outside = reference_record(4, 0, Point2::new(700.0, 700.0));
    let repo = setup_repository(&[(
        PatchIndex(0, 0),
        vec![parent, child_inside, child_outside_box, unrelated_outside],
    )]);
    let provider = multiband_provider(&repo);

    let bbox = Box2D::new(Point2::new(400.0, 400.0), Point2::new(500.0, 500.0));
    let records = provider
        .fetch_in_box(&repo, &tract_data_id(), bbox, &tract_wcs(), 0.0)
        .unwrap();
    // The accepted parent pulls in both children; the unrelated outside parent is dropped.
    assert_eq!(ids(&records), vec![1, 2, 3]);
}

#[test]
fn test_get_wcs_requires_tract_key() {
    let repo = setup_repository(&[]);
    let provider = multiband_provider(&repo);
    assert!(matches!(
        provider.get_wcs(&repo, &DataId::new()),
        Err(ForcedPhotError::MissingDataIdKey("tract"))
    ));
}

#[test]
fn test_schema_bootstrap_from_repository() {
    let repo = setup_repository(&[]);
    let provider = multiband_provider(&repo);
    assert_eq!(provider.schema().as_ref(), &common::ref_schema());
}

/// The per-band variant composes the configured filter into every patch dataset key.
#[test]
fn test_per_band_fetch_uses_filter_key() {
    let repo = MemoryRepository::new();
    repo.put(
        "deepCoadd_skyMap",
        &DataId::new(),
        forcedphot::repository::Dataset::SkyMap(common::test_skymap()),
    )
    .unwrap();
    let mut catalog =
        forcedphot::catalog::SourceCatalog::new(Arc::new(common::ref_schema()));
    catalog.push(reference_record(1, 0, Point2::new(450.0, 450.0)));
    let keyed = DataId::new()
        .with_tract(TRACT_ID)
        .with_patch(PatchIndex(0, 0))
        .with_filter("r");
    repo.put(
        "deepCoadd_src",
        &keyed,
        forcedphot::repository::Dataset::SourceCatalog(catalog),
    )
    .unwrap();

    let provider = CoaddSrcReferences::with_schema(
        ReferenceVariant::CoaddSrc,
        ReferencesConfig {
            filter: Some("r".to_string()),
            ..Default::default()
        },
        Arc::new(common::ref_schema()),
    )
    .unwrap();
    let records = provider
        .fetch_in_patches(&repo, &tract_data_id(), &[patch(PatchIndex(0, 0))])
        .unwrap();
    assert_eq!(ids(&records), vec![1]);

    // A provider configured for another band misses the dataset.
    let provider_i = CoaddSrcReferences::with_schema(
        ReferenceVariant::CoaddSrc,
        ReferencesConfig {
            filter: Some("i".to_string()),
            ..Default::default()
        },
        Arc::new(common::ref_schema()),
    )
    .unwrap();
    assert!(matches!(
        provider_i.fetch_in_patches(&repo, &tract_data_id(), &[patch(PatchIndex(0, 0))]),
        Err(ForcedPhotError::MissingReference { .. })
    ));
}
