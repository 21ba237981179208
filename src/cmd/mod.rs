//! CLI command implementations for albumsync.
//!
//! Each module corresponds to one subcommand. [`Engine`] wires the
//! production collaborators together from a loaded [`Config`].

pub mod once;
pub mod register;
pub mod serve;

use std::sync::Arc;

use crate::{
   Result,
   catalog::Catalog,
   change::ChangeDetector,
   config::Config,
   decode::{BlobDecoder, KeyedArchiveDecoder},
   identity::SelfIdentity,
   ingest::{AssetIngestWorker, CommentIngestWorker},
   media::{FfmpegExtractor, FrameExtractor},
   notify::{HttpTransport, NotificationTrigger, Recipients},
   source::{RowSource, SqliteSource},
   sync::SyncOrchestrator,
};

/// Change detector plus orchestrator over the configured source store.
pub struct Engine {
   pub detector:     ChangeDetector,
   pub orchestrator: SyncOrchestrator,
}

impl Engine {
   pub fn from_config(cfg: &Config) -> Result<Self> {
      let db = cfg.db_path()?;
      let assets = cfg.assets_path()?;

      let source: Arc<dyn RowSource> = Arc::new(SqliteSource::new(db));
      let decoder: Arc<dyn BlobDecoder> = Arc::new(KeyedArchiveDecoder::new());
      let frames: Arc<dyn FrameExtractor> =
         Arc::new(FfmpegExtractor::new(&cfg.ffmpeg, &cfg.ffprobe));

      let comments = CommentIngestWorker::new(Arc::clone(&source), Arc::clone(&decoder));
      let worker = AssetIngestWorker::new(decoder, frames, comments, assets, cfg.frame_timeout());

      let identity = Arc::new(SelfIdentity::new());
      let mut orchestrator =
         SyncOrchestrator::new(source, worker, Arc::new(Catalog::new()), Arc::clone(&identity))
            .with_concurrency(cfg.ingest_concurrency);

      if cfg.notifications {
         let recipients = Arc::new(Recipients::load(cfg.effective_tokens_file())?);
         let transport = Arc::new(HttpTransport::new(&cfg.notification_url));
         orchestrator = orchestrator
            .with_notifier(Arc::new(NotificationTrigger::new(transport, recipients, identity)));
      }

      Ok(Self { detector: ChangeDetector::new(db), orchestrator })
   }

   pub const fn catalog(&self) -> &Arc<Catalog> {
      self.orchestrator.catalog()
   }
}
