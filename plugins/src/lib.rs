pub mod factory;
pub mod generator;
