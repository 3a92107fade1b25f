//! Promote performing customer search terms from an advertising bulk export
//! into bulk-upload rows for new exact-match campaigns.

pub mod bulk;
pub mod candidates;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod grouping;
pub mod metrics;
pub mod pipeline;
pub mod portfolio;
pub mod sheets;
pub mod sku;

pub use config::PromotionConfig;
pub use error::{PromoteError, Result};
pub use pipeline::{run, PromotionOutput, RunSummary};
pub use sheets::Workbook;
