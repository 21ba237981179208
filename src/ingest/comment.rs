use std::{collections::BTreeMap, sync::Arc};

use crate::{
   Result,
   decode::{BlobDecoder, CommentMetadata},
   source::{CommentRow, RowSource},
   timestamp,
   types::Comment,
};

/// Turns comment rows of one asset into typed comments.
#[derive(Clone)]
pub struct CommentIngestWorker {
   source:  Arc<dyn RowSource>,
   decoder: Arc<dyn BlobDecoder>,
}

impl CommentIngestWorker {
   pub fn new(source: Arc<dyn RowSource>, decoder: Arc<dyn BlobDecoder>) -> Self {
      Self { source, decoder }
   }

   /// Fetches and decodes the comments of `asset_guid` that are not already
   /// in `known`.
   ///
   /// Rows that fail to decode are dropped with a warning; a failed query is
   /// returned to the caller.
   pub async fn ingest(
      &self,
      asset_guid: &str,
      known: &BTreeMap<String, Comment>,
   ) -> Result<BTreeMap<String, Comment>> {
      let exclude: Vec<String> = known.keys().cloned().collect();
      let rows = self.source.comments(asset_guid, &exclude).await?;

      let mut comments = BTreeMap::new();
      for row in rows {
         if known.contains_key(&row.guid) {
            continue;
         }
         if let Some(comment) = self.build(asset_guid, row) {
            comments.insert(comment.guid.clone(), comment);
         }
      }
      Ok(comments)
   }

   fn build(&self, asset_guid: &str, row: CommentRow) -> Option<Comment> {
      let date = match timestamp::from_source(row.timestamp) {
         Ok(date) => date,
         Err(e) => {
            tracing::warn!("dropping comment {} on {asset_guid}: {e}", row.guid);
            return None;
         },
      };
      let meta = match self.decoder.decode(&row.blob) {
         Ok(record) => CommentMetadata::from_record(&record),
         Err(e) => {
            tracing::warn!("dropping comment {} on {asset_guid}: {e}", row.guid);
            return None;
         },
      };

      Some(Comment {
         guid: row.guid,
         asset_guid: asset_guid.to_string(),
         date,
         is_caption: row.is_caption,
         is_mine: row.is_mine,
         is_like: meta.is_like,
         author_name: meta.author_name,
         author_id: meta.author_id,
         author_email: meta.author_email,
         content: meta.content,
      })
   }
}
