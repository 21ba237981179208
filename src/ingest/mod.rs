//! Row-to-entity ingestion.
//!
//! Workers are independent per row and never touch the catalog; they hand
//! back an [`IngestOutcome`] and the orchestrator reduces those.

mod asset;
mod comment;

pub use asset::AssetIngestWorker;
pub use comment::CommentIngestWorker;

use crate::types::{Asset, Comment};

/// Result of ingesting one asset row
#[derive(Debug, Clone)]
pub enum IngestOutcome {
   /// First time this asset has been seen.
   New { asset: Asset },
   /// Already in the catalog; `new_comments` were appended to it.
   Reused { asset: Asset, new_comments: Vec<Comment> },
   /// The row could not be turned into an asset and was skipped.
   Dropped { guid: String, reason: String },
}
