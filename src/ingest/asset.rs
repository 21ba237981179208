use std::{
   collections::BTreeMap,
   ffi::OsString,
   path::{Path, PathBuf},
   sync::Arc,
   time::Duration,
};

use super::{CommentIngestWorker, IngestOutcome};
use crate::{
   Result,
   decode::{AssetMetadata, BlobDecoder},
   media::{self, FrameExtractor, THUMBNAIL_SUFFIX},
   source::AssetRow,
   timestamp,
   types::Asset,
};

/// Turns asset rows into typed assets, probing local media for new ones.
pub struct AssetIngestWorker {
   decoder:       Arc<dyn BlobDecoder>,
   frames:        Arc<dyn FrameExtractor>,
   comments:      CommentIngestWorker,
   assets_root:   PathBuf,
   frame_timeout: Duration,
}

impl AssetIngestWorker {
   pub fn new(
      decoder: Arc<dyn BlobDecoder>,
      frames: Arc<dyn FrameExtractor>,
      comments: CommentIngestWorker,
      assets_root: impl Into<PathBuf>,
      frame_timeout: Duration,
   ) -> Self {
      Self { decoder, frames, comments, assets_root: assets_root.into(), frame_timeout }
   }

   /// Ingests one row of album `album_guid`.
   ///
   /// With `existing` set the stored asset is reused as is and only comments
   /// it does not know yet are fetched. Decode and timestamp failures drop the
   /// row; media failures degrade it. Only query failures are returned as
   /// errors.
   pub async fn ingest(
      &self,
      album_guid: &str,
      row: AssetRow,
      existing: Option<Asset>,
   ) -> Result<IngestOutcome> {
      if let Some(asset) = existing {
         return self.refresh(asset).await;
      }

      let capture_date = match timestamp::from_source(row.batch_date) {
         Ok(date) => date,
         Err(e) => return Ok(dropped(row.guid, e.to_string())),
      };
      let meta = match self
         .decoder
         .decode(&row.blob)
         .and_then(|record| AssetMetadata::from_record(&record))
      {
         Ok(meta) => meta,
         Err(e) => return Ok(dropped(row.guid, e.to_string())),
      };

      let filetype = media::filetype(&meta.filename);
      let is_video = media::is_video(&filetype);
      let local_path = self
         .assets_root
         .join(album_guid)
         .join(&row.guid)
         .join(&meta.filename);
      let path = format!("/file/{album_guid}/{}/{}", row.guid, meta.filename);

      let mut asset = Asset {
         guid: row.guid,
         album_guid: album_guid.to_string(),
         capture_date,
         sorting_date: capture_date,
         author: meta.author,
         author_id: meta.author_id,
         is_video,
         mime: media::mime_for(&filetype).to_string(),
         filename: meta.filename,
         filetype,
         local_path,
         thumbnail_path: String::new(),
         path,
         width: 0,
         height: 0,
         number: row.number,
         comments: BTreeMap::new(),
      };

      if is_video {
         self.probe_video(&mut asset).await;
      } else {
         asset.thumbnail_path = asset.path.clone();
         if let Some((width, height)) = probe_still(&asset.local_path).await.or(meta.dimensions) {
            asset.width = width;
            asset.height = height;
         }
      }

      asset.comments = self.comments.ingest(&asset.guid, &BTreeMap::new()).await?;
      asset.sorting_date = asset.compute_sorting_date();
      Ok(IngestOutcome::New { asset })
   }

   async fn refresh(&self, mut asset: Asset) -> Result<IngestOutcome> {
      let fresh = self.comments.ingest(&asset.guid, &asset.comments).await?;
      if fresh.is_empty() {
         tracing::debug!("reusing asset {} unchanged", asset.guid);
         return Ok(IngestOutcome::Reused { asset, new_comments: Vec::new() });
      }

      tracing::debug!("asset {} has {} new comments", asset.guid, fresh.len());
      let new_comments: Vec<_> = fresh.values().cloned().collect();
      asset.comments.extend(fresh);
      asset.sorting_date = asset.compute_sorting_date();
      Ok(IngestOutcome::Reused { asset, new_comments })
   }

   /// Fills dimensions and thumbnail of a video whose file is cached locally.
   /// Failures and timeouts leave both unset.
   async fn probe_video(&self, asset: &mut Asset) {
      if !is_file(&asset.local_path).await {
         return;
      }

      let video = asset.local_path.clone();
      let output = thumbnail_file(&video);
      let work = async {
         let (width, height) = self.frames.probe(&video).await?;
         self.frames.extract_frame(&video, width, height, &output).await?;
         Ok::<_, crate::error::MediaError>((width, height))
      };

      let result = tokio::time::timeout(self.frame_timeout, work).await;
      match result {
         Ok(Ok((width, height))) => {
            asset.width = width;
            asset.height = height;
            asset.thumbnail_path = format!("{}{THUMBNAIL_SUFFIX}", asset.path);
         },
         Ok(Err(e)) => {
            tracing::warn!("no thumbnail for video {}: {e}", asset.guid);
         },
         Err(_) => {
            tracing::warn!(
               "no thumbnail for video {}: frame extraction timed out after {} ms",
               asset.guid,
               self.frame_timeout.as_millis()
            );
         },
      }
   }
}

fn dropped(guid: String, reason: String) -> IngestOutcome {
   tracing::warn!("dropping asset {guid}: {reason}");
   IngestOutcome::Dropped { guid, reason }
}

async fn is_file(path: &Path) -> bool {
   tokio::fs::metadata(path)
      .await
      .is_ok_and(|m| m.is_file())
}

/// Header dimensions of a locally cached still, `None` when the file is not
/// downloaded yet or unreadable.
async fn probe_still(path: &Path) -> Option<(u32, u32)> {
   if !is_file(path).await {
      return None;
   }
   let owned = path.to_path_buf();
   match tokio::task::spawn_blocking(move || media::probe_image_dimensions(&owned)).await {
      Ok(Ok(dims)) => Some(dims),
      Ok(Err(e)) => {
         tracing::warn!("{e}");
         None
      },
      Err(e) => {
         tracing::warn!("image probe for {} failed: {e}", path.display());
         None
      },
   }
}

fn thumbnail_file(local_path: &Path) -> PathBuf {
   let mut name = OsString::from(local_path.as_os_str());
   name.push(THUMBNAIL_SUFFIX);
   PathBuf::from(name)
}
