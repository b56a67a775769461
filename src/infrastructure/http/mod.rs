//! HTTP adapters for the simulator's appearance capabilities.

pub mod appearance_client;

pub use appearance_client::HttpAppearanceService;
