pub mod alert;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod proximity;
pub mod record;
pub mod report;
pub mod simulate;
pub mod store;
pub mod transport;
