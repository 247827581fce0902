use thiserror::Error;

/// Crate-wide error type for the forced photometry core.
///
/// All errors in this crate are fatal to the invocation that raised them: a missing reference
/// dataset or a malformed partition handle is a structural problem of the pipeline, not a
/// transient condition, so nothing here is retried internally. Errors propagate unchanged to
/// the caller with enough context (the offending dataset key or data id) to diagnose the
/// pipeline ordering or configuration mistake that caused them.
#[derive(Error, Debug)]
pub enum ForcedPhotError {
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("Reference dataset {dataset} doesn't exist for {data_id}")]
    MissingReference { dataset: String, data_id: String },

    #[error("Data id is missing the required '{0}' key")]
    MissingDataIdKey(&'static str),

    #[error("Repository failure: {0}")]
    RepositoryFailure(String),

    #[error("Expected a {expected} dataset, found a {found}")]
    UnexpectedDataset {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown tract {0} in sky map")]
    UnknownTract(u32),

    #[error("Patch index ({0},{1}) is outside the tract patch grid")]
    UnknownPatch(i32, i32),

    #[error("WCS CD matrix is singular and cannot be inverted")]
    SingularCdMatrix,

    #[error("Sky position (ra={0}, dec={1}) [rad] cannot be mapped to the tangent plane")]
    UnmappablePosition(f64, f64),

    #[error("Measurement engine failure: {0}")]
    MeasurementFailure(String),
}
