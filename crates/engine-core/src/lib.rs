pub mod context;
pub mod error;
pub mod metrics;
pub mod plugin;
pub mod state;
pub mod util;
