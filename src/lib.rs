pub mod config;
pub mod denominator;
pub mod error;
pub mod export;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod schema;
pub mod source;
pub mod totals;
pub mod whatif;
