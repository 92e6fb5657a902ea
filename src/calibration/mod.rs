pub mod config;
pub mod optimizer;
pub mod pipeline;
pub mod types;

// Re-export the bounded quasi-Newton refiner used after the restarts
pub use cmaes_lbfgsb::lbfgsb_optimize;
