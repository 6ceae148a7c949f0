use log::info;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::classify::classifier::{classify, ClassifierSolution};
use crate::classify::lines::LineCatalog;
use crate::config::ScoringConfig;
use crate::data::detection::DetectionCandidate;
use crate::error::BatchError;
use crate::scoring::detection::ScoreResult;

/// Scores many detection candidates in parallel
///
/// # Arguments
/// * `candidates` - Candidates to score; each caches its own result
/// * `force` - Rescore candidates that already carry a result
/// * `config` - Scoring configuration shared by all candidates
/// * `num_threads` - Number of threads for parallel processing
///
/// # Returns
/// One result per candidate, in input order
pub fn score_detections_batch(
    candidates: &mut [DetectionCandidate],
    force: bool,
    config: &ScoringConfig,
    num_threads: usize,
) -> Result<Vec<ScoreResult>, BatchError> {
    let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;

    let results: Vec<ScoreResult> = pool.install(|| {
        candidates
            .par_iter_mut()
            .map(|candidate| {
                let result = candidate.score(force, config).clone();
                candidate.apply();
                result
            })
            .collect()
    });

    info!(
        "scored {} detections on {} threads, {} could not be fitted",
        results.len(),
        num_threads,
        results.iter().filter(|r| r.could_not_fit()).count()
    );

    Ok(results)
}

/// Classifies the line of every candidate that carries a full spectrum
///
/// Candidates without a spectrum get an empty solution list.
pub fn classify_batch(
    candidates: &[DetectionCandidate],
    catalog: &LineCatalog,
    config: &ScoringConfig,
    num_threads: usize,
) -> Result<Vec<Vec<ClassifierSolution>>, BatchError> {
    let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;

    let solutions = pool.install(|| {
        candidates
            .par_iter()
            .map(|candidate| match &candidate.spectrum {
                Some(spectrum) => classify(spectrum, candidate.wavelength, catalog, config),
                None => Vec::new(),
            })
            .collect()
    });

    Ok(solutions)
}
