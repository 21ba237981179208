//! Read-only access to the source store.
//!
//! Query shapes are fixed per entity kind; implementations only decide how
//! the rows are fetched.

mod sqlite;

use async_trait::async_trait;

pub use sqlite::SqliteSource;

use crate::Result;

/// One row of the albums table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRow {
   pub guid: String,
   pub name: String,
   pub url:  String,
}

/// One row of the asset-collections table
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRow {
   pub album_guid: String,
   pub guid:       String,
   /// Source-native timestamp of the upload batch.
   pub batch_date: f64,
   pub number:     f64,
   pub blob:       Vec<u8>,
}

/// One row of the comments table
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
   pub asset_guid: String,
   pub guid:       String,
   /// Source-native timestamp.
   pub timestamp:  f64,
   pub is_caption: bool,
   pub is_mine:    bool,
   pub blob:       Vec<u8>,
}

/// Abstraction over the source store's read queries.
#[async_trait]
pub trait RowSource: Send + Sync {
   /// Every album row.
   async fn albums(&self) -> Result<Vec<AlbumRow>>;

   /// Number of asset rows in an album.
   async fn asset_count(&self, album_guid: &str) -> Result<usize>;

   /// Asset rows of an album, most recent batch first.
   async fn assets(&self, album_guid: &str) -> Result<Vec<AssetRow>>;

   /// Comment rows of an asset, skipping the GUIDs in `exclude`.
   async fn comments(&self, asset_guid: &str, exclude: &[String]) -> Result<Vec<CommentRow>>;

   /// Releases any held connection at the end of a pass.
   async fn release(&self) {}
}
