pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use config::AppConfig;
pub use core::normalizer::{normalize, normalize_batch};
pub use core::service::{Connectors, DealService};
pub use domain::model::{DealPage, NormalizedDeal, Provider, RawRecord, TermYears};
pub use server::{router, AppState};
pub use utils::error::{CrmError, Result};
