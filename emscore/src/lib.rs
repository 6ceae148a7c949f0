// error types
pub mod error;

// tuned constants and configuration tables
pub mod constants;
pub mod config;

// data module
pub mod data {
    pub mod spectrum;
    pub mod sky;
    pub mod fiber;
    pub mod detection;
}

// algorithm module
pub mod algorithm {
    pub mod utility;
    pub mod peaks;
    pub mod noise;
    pub mod gaussian;
    pub mod line_shape;
    pub mod weighting;
}

// scoring module
pub mod scoring {
    pub mod scaled;
    pub mod fiber;
    pub mod detection;
    pub mod batch;
}

// classification module
pub mod classify {
    pub mod lines;
    pub mod classifier;
}

// synthetic data for tests and demos
pub mod simulation {
    pub mod synthetic;
}
