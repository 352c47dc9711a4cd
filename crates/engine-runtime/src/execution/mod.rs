pub mod executor;
pub mod factory;
pub mod runner;
pub mod state;
pub mod utils;
pub mod workers;
