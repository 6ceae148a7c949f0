// Purpose: To store constants that are used across the scoring core

// Rest-frame wavelengths of the known emission lines, in Angstrom
pub const LYA_REST: f64 = 1216.0;
pub const NV_REST: f64 = 1240.0;
pub const SI_II_REST: f64 = 1260.0;
pub const CIV_REST: f64 = 1549.0;
pub const HEII_REST: f64 = 1640.0;
pub const CIII_REST: f64 = 1909.0;
pub const MGII_REST: f64 = 2798.0;
pub const OII_REST: f64 = 3727.0;
pub const HGAMMA_REST: f64 = 4341.0;
pub const HBETA_REST: f64 = 4861.0;
pub const OIII_4959_REST: f64 = 4959.0;
pub const OIII_5007_REST: f64 = 5007.0;

// Instrument geometry
pub const FIBER_RADIUS_ARCSEC: f64 = 0.75;
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;
pub const ANGSTROM_PER_PIXEL: f64 = 1.9; // fitted sigma (pixels) to Angstrom

// Half width (in pixels / 1 Angstrom steps) of the window a line shape is fitted on
pub const SHAPE_WINDOW_HALF_WIDTH: usize = 8;
// Number of points the fitted curve is evaluated on for its diagnostics
pub const FIT_CURVE_POINTS: usize = 100;
