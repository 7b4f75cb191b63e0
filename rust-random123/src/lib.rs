pub mod rng;
pub mod threefry;
