use thiserror::Error;

/// Errors raised when building a [`SpectralSample`](crate::data::spectrum::SpectralSample)
/// through the validating constructor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrumError {
    #[error("spectral sample is empty")]
    Empty,
    #[error("wavelength ({wavelengths}) and intensity ({intensities}) lengths differ")]
    MismatchedLengths { wavelengths: usize, intensities: usize },
    #[error("non-finite value at index {0}")]
    NonFinite(usize),
    #[error("wavelengths must be strictly ascending (violated at index {0})")]
    Unsorted(usize),
}

/// Failure modes of the nonlinear Gaussian fit.
///
/// These never leave the scoring layer: a failed fit is recovered as a
/// zero score or a narrower retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("need at least {needed} samples to fit, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("fit did not converge within {0} iterations")]
    NonConvergence(usize),
    #[error("normal equations are singular")]
    Singular,
    #[error("fit produced non-finite parameters")]
    NonFinite,
}

/// Errors from loading a scoring configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid scoring configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the parallel batch drivers.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
