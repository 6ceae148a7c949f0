use emscore::config::ScoringConfig;
use emscore::data::detection::DetectionCandidate;
use emscore::data::fiber::{ExposureKey, Fiber};
use emscore::data::sky::SkyPosition;
use emscore::data::spectrum::SpectralSample;
use emscore::scoring::batch::score_detections_batch;
use emscore::scoring::detection::FitStatus;
use emscore::scoring::fiber::PairwiseAdjustment;
use emscore::simulation::synthetic::{fiber_with_line, gaussian_spectrum, SyntheticLine};

const WAVELENGTH: f64 = 4500.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn source() -> SkyPosition {
    SkyPosition::new(150.1, 2.2)
}

fn candidate(fibers: Vec<Fiber>) -> DetectionCandidate {
    DetectionCandidate::new(42, WAVELENGTH).with_source(source(), true).with_fibers(fibers)
}

fn near_fiber() -> Fiber {
    let line = SyntheticLine::new(WAVELENGTH, 2.0, 50.0);
    fiber_with_line("near", &source(), 0.3, 0.0, Some(6.0), line)
}

fn far_fiber() -> Fiber {
    let line = SyntheticLine::new(WAVELENGTH, 2.0, 45.0);
    fiber_with_line("far", &source(), 0.0, 2.5, Some(4.0), line)
}

#[test]
fn test_two_fibers_outscore_the_far_one_alone() {
    init_logging();
    let config = ScoringConfig::default();

    let mut both = candidate(vec![near_fiber(), far_fiber()]);
    let mut single = candidate(vec![far_fiber()]);
    let both_result = both.score(false, &config).clone();
    let single_result = single.score(false, &config).clone();

    assert_eq!(both_result.fibers[0].weight, 1.0);
    let far_weight = both_result.fibers[1].weight;
    assert!(far_weight > 0.0 && far_weight < 1.0);

    // SN 6 -> 5.0, SN 4 -> 1.0
    assert!((both_result.fibers[0].weighted - 5.0).abs() < 1e-9);
    assert!((both_result.fibers[1].weighted - far_weight).abs() < 1e-9);

    assert_eq!(both_result.fit_status, FitStatus::Wide);
    assert!(both_result.raw > single_result.raw);
    assert!(both_result.scaled > single_result.scaled);
    assert!(both_result.scaled > 0.0 && both_result.scaled <= 5.0);
}

#[test]
fn test_hot_pixel_fiber_is_flagged_and_excluded() {
    init_logging();
    let config = ScoringConfig::default();
    let line = SyntheticLine::new(WAVELENGTH, 2.0, 100.0);

    let clean = fiber_with_line("clean", &source(), 0.3, 0.0, Some(6.0), line);

    let window = gaussian_spectrum(WAVELENGTH - 8.0, WAVELENGTH + 8.0, 1.0, &[line]);
    let mut counts = window.intensity.to_vec();
    counts[8] *= 50.0;
    let hot = Fiber::new("hot", Some(source().offset_arcsec(0.2, 0.0)), Some(6.0))
        .with_exposure(ExposureKey::new("20180124v010", 1))
        .with_window(SpectralSample::new(window.wavelength.to_vec(), counts));

    let mut with_hot = candidate(vec![hot, clean.clone()]);
    let mut clean_only = candidate(vec![clean]);

    let result = with_hot.score(false, &config).clone();
    let reference = clean_only.score(false, &config).clone();

    assert!(result.recomputed);
    assert_eq!(result.flagged, vec!["hot".to_string()]);
    assert!(result.fibers[0].bad);
    assert_eq!(result.fibers[0].weighted, 0.0);
    assert!((result.raw - reference.raw).abs() < 1e-6);
    assert_eq!(result.scaled, reference.scaled);
    assert!(!reference.recomputed);

    assert!(with_hot.apply());
    assert!(with_hot.fibers[0].bad);
    assert!(!with_hot.fibers[1].bad);
}

fn bright_pair(edge_pixels: usize) -> Vec<Fiber> {
    let a = SyntheticLine::new(WAVELENGTH, 4.0, 80.0);
    let b = SyntheticLine::new(WAVELENGTH, 4.0, 70.0);
    vec![
        fiber_with_line("a", &source(), 0.3, 0.0, Some(20.0), a).with_edge_pixels(edge_pixels),
        fiber_with_line("b", &source(), 0.5, 0.0, Some(20.0), b).with_edge_pixels(edge_pixels),
    ]
}

#[test]
fn test_edge_pixels_block_shape_bonus_and_cap_scaled_score() {
    init_logging();
    let config = ScoringConfig::default();

    let clean = candidate(bright_pair(0)).score(false, &config).clone();
    let edged = candidate(bright_pair(3)).score(false, &config).clone();

    assert_eq!(clean.scaled, 5.0);
    assert_eq!(edged.scaled, 3.5);

    // same fit, but the sigma bonus of the good-fit branch is withheld
    let sigma = clean.shape.as_ref().unwrap().sigma();
    assert!((sigma - 4.0).abs() < 1e-6);
    let bonus = (sigma - 2.5).sqrt();
    assert!((clean.raw - edged.raw - bonus).abs() < 1e-6);
    assert!(edged.raw > 14.0);
}

#[test]
fn test_pairwise_adjustment_needs_weighted_position() {
    init_logging();
    let config = ScoringConfig::default();

    let weighted = candidate(bright_pair(0)).score(false, &config).clone();
    let mut catalog_position = DetectionCandidate::new(42, WAVELENGTH)
        .with_source(source(), false)
        .with_fibers(bright_pair(0));
    let unweighted = catalog_position.score(false, &config).clone();

    assert_eq!(unweighted.pairwise, PairwiseAdjustment::default());
    assert_eq!(weighted.pairwise.penalty, 0.0);
    assert!(weighted.pairwise.bonus > 0.5);
    assert!((weighted.raw - unweighted.raw - weighted.pairwise.bonus).abs() < 1e-9);
}

#[test]
fn test_config_override_changes_weighting() {
    init_logging();
    let json = r#"{ "weight": { "zero_weight_distance": 2.0 } }"#;
    let config = ScoringConfig::from_json_str(json).unwrap();

    let mut both = candidate(vec![near_fiber(), far_fiber()]);
    let result = both.score(false, &config).clone();
    assert_eq!(result.fibers[1].weight, 0.0);
    assert_eq!(result.fibers[1].weighted, 0.0);
}

#[test]
fn test_batch_scoring_writes_back_fiber_records() {
    init_logging();
    let config = ScoringConfig::default();
    let mut candidates = vec![
        candidate(vec![near_fiber(), far_fiber()]),
        candidate(vec![far_fiber()]),
        DetectionCandidate::new(7, WAVELENGTH),
    ];

    let results = score_detections_batch(&mut candidates, false, &config, 2).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].scaled > results[1].scaled);
    assert_eq!(results[2].fit_status, FitStatus::Unpositioned);
    assert!(results[2].could_not_fit());

    let near = &candidates[0].fibers[0];
    assert_eq!(near.weight, Some(1.0));
    assert!((near.distance.unwrap() - 0.3).abs() < 1e-6);
}

#[test]
fn test_weight_is_non_increasing_in_distance() {
    let config = ScoringConfig::default();
    let weights: Vec<f64> = (0..=40).map(|k| config.weight.weight(k as f64 * 0.1)).collect();
    assert_eq!(weights[0], 1.0);
    assert!(weights.windows(2).all(|w| w[1] <= w[0]));
    assert!(weights[30..].iter().all(|w| *w == 0.0));
}

#[test]
fn test_scaled_score_is_monotonic_and_bounded() {
    let table = ScoringConfig::default().scaled;
    let scaled: Vec<f64> = (-20..=400).map(|k| table.scale(k as f64 * 0.05)).collect();
    assert!(scaled.windows(2).all(|w| w[1] >= w[0]));
    assert!(scaled.iter().all(|s| (0.0..=5.0).contains(s)));
    assert_eq!(table.scale(9.5), table.scale(9.5));
}
