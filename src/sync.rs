//! Synchronization passes from the source store into the catalog

use std::{
   collections::{BTreeMap, HashSet},
   sync::Arc,
   time::Instant,
};

use indicatif::ProgressBar;
use tokio::task::JoinSet;

pub use crate::types::SyncProgress;
use crate::{
   Result,
   catalog::Catalog,
   identity::SelfIdentity,
   ingest::{AssetIngestWorker, IngestOutcome},
   notify::NotificationTrigger,
   source::{AlbumRow, RowSource},
   types::{Album, SyncMode},
};

/// Default number of asset ingestions in flight per album.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Trait for receiving sync progress updates
pub trait SyncProgressCallback: Send {
   fn progress(&mut self, progress: SyncProgress);
}

impl<F: FnMut(SyncProgress) + Send> SyncProgressCallback for F {
   fn progress(&mut self, progress: SyncProgress) {
      self(progress);
   }
}

impl SyncProgressCallback for () {
   fn progress(&mut self, _progress: SyncProgress) {}
}

impl SyncProgressCallback for ProgressBar {
   fn progress(&mut self, progress: SyncProgress) {
      self.update(|state| {
         state.set_len(progress.total as u64);
         state.set_pos(progress.processed as u64);
      });
      self.set_message(progress.album);
   }
}

/// Result summary from a sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
   pub albums:        usize,
   pub new_assets:    usize,
   pub reused_assets: usize,
   pub dropped:       usize,
   pub new_comments:  usize,
   pub notifications: usize,
}

/// What one album contributed to a pass, kept until notifications go out.
#[derive(Debug, Default)]
struct AlbumDelta {
   name:                 String,
   new_comments:         usize,
   new_assets_by_author: BTreeMap<String, usize>,
}

/// Drives synchronization passes: reads rows, fans them out to ingest
/// workers, merges finished albums and triggers notifications.
pub struct SyncOrchestrator {
   source:      Arc<dyn RowSource>,
   worker:      Arc<AssetIngestWorker>,
   catalog:     Arc<Catalog>,
   identity:    Arc<SelfIdentity>,
   notifier:    Option<Arc<NotificationTrigger>>,
   concurrency: usize,
}

impl SyncOrchestrator {
   pub fn new(
      source: Arc<dyn RowSource>,
      worker: AssetIngestWorker,
      catalog: Arc<Catalog>,
      identity: Arc<SelfIdentity>,
   ) -> Self {
      Self {
         source,
         worker: Arc::new(worker),
         catalog,
         identity,
         notifier: None,
         concurrency: DEFAULT_CONCURRENCY,
      }
   }

   pub fn with_concurrency(mut self, concurrency: usize) -> Self {
      self.concurrency = concurrency.max(1);
      self
   }

   pub fn with_notifier(mut self, notifier: Arc<NotificationTrigger>) -> Self {
      self.notifier = Some(notifier);
      self
   }

   pub const fn catalog(&self) -> &Arc<Catalog> {
      &self.catalog
   }

   /// Runs one pass over every album in the source.
   ///
   /// A failed query abandons the rest of the pass; albums merged before the
   /// failure stay merged and are still notified. The source connection is
   /// released either way.
   pub async fn run_pass(
      &self,
      mode: SyncMode,
      callback: &mut dyn SyncProgressCallback,
   ) -> Result<PassReport> {
      let started = Instant::now();
      tracing::info!("starting {} sync", mode.as_str());

      let result = self.sync_albums(mode, callback).await;
      self.source.release().await;

      if let Ok(report) = &result {
         tracing::info!(
            "{} sync finished in {:.2?}: {} albums, {} new assets, {} reused, {} dropped, {} new \
             comments",
            mode.as_str(),
            started.elapsed(),
            report.albums,
            report.new_assets,
            report.reused_assets,
            report.dropped,
            report.new_comments
         );
      }
      result
   }

   async fn sync_albums(
      &self,
      mode: SyncMode,
      callback: &mut dyn SyncProgressCallback,
   ) -> Result<PassReport> {
      let rows = self.source.albums().await?;
      let mut report = PassReport::default();
      let mut deltas = Vec::with_capacity(rows.len());
      let mut failure = None;

      for row in rows {
         let previous = match mode {
            SyncMode::Full => None,
            SyncMode::Incremental => self.catalog.album(&row.guid),
         };
         match self.sync_album(row, previous, &mut report, callback).await {
            Ok(delta) => {
               report.albums += 1;
               deltas.push(delta);
            },
            Err(e) => {
               failure = Some(e);
               break;
            },
         }
      }

      // Albums merged before a failure are reused on the retry and must be
      // announced by this pass.
      if mode.is_incremental() {
         report.notifications = self.notify(&deltas).await;
      }

      match failure {
         Some(e) => Err(e),
         None => Ok(report),
      }
   }

   async fn notify(&self, deltas: &[AlbumDelta]) -> usize {
      let Some(notifier) = &self.notifier else {
         return 0;
      };
      let mut sent = 0;
      for delta in deltas {
         sent += notifier
            .notify_album(&delta.name, delta.new_comments, &delta.new_assets_by_author)
            .await;
      }
      sent
   }

   /// Ingests every asset row of one album and merges the result. Assets of
   /// `previous` are reused by GUID.
   async fn sync_album(
      &self,
      row: AlbumRow,
      previous: Option<Arc<Album>>,
      report: &mut PassReport,
      callback: &mut dyn SyncProgressCallback,
   ) -> Result<AlbumDelta> {
      let AlbumRow { guid, name, url } = row;
      let total = self.source.asset_count(&guid).await?;
      tracing::info!(
         "syncing album {name} ({guid}): {total} assets, {}",
         if previous.is_some() { "incremental" } else { "full" }
      );
      callback.progress(SyncProgress { album: name.clone(), processed: 0, total });

      let rows = self.source.assets(&guid).await?;
      let total = total.max(rows.len());

      let mut album = Album::new(guid.clone(), name.clone(), url);
      let mut delta = AlbumDelta { name: name.clone(), ..AlbumDelta::default() };
      let mut seen = HashSet::with_capacity(rows.len());
      let mut processed = 0;
      let mut tasks = JoinSet::new();

      for row in rows {
         if !seen.insert(row.guid.clone()) {
            tracing::debug!("skipping duplicate asset row {}", row.guid);
            continue;
         }

         while tasks.len() >= self.concurrency {
            if let Some(joined) = tasks.join_next().await {
               self.reduce(joined??, &mut album, &mut delta, report);
               processed += 1;
               callback.progress(SyncProgress { album: name.clone(), processed, total });
            }
         }

         let existing = previous
            .as_ref()
            .and_then(|album| album.assets.get(&row.guid))
            .cloned();
         let worker = Arc::clone(&self.worker);
         let album_guid = guid.clone();
         tasks.spawn(async move { worker.ingest(&album_guid, row, existing).await });
      }

      while let Some(joined) = tasks.join_next().await {
         self.reduce(joined??, &mut album, &mut delta, report);
         processed += 1;
         callback.progress(SyncProgress { album: name.clone(), processed, total });
      }

      album.refresh_cover();
      tracing::debug!("album {name} cover: {:?}", album.cover_photo);
      self.catalog.merge(album);
      Ok(delta)
   }

   /// Folds one worker result into the album being built.
   fn reduce(
      &self,
      outcome: IngestOutcome,
      album: &mut Album,
      delta: &mut AlbumDelta,
      report: &mut PassReport,
   ) {
      match outcome {
         IngestOutcome::New { asset } => {
            for comment in asset.comments.values() {
               self.identity.observe(comment);
            }
            report.new_assets += 1;
            if asset.author.is_empty() {
               tracing::debug!("new asset {} has no author, not announced", asset.guid);
            } else if !self.identity.is_self(&asset.author) {
               *delta
                  .new_assets_by_author
                  .entry(asset.author.clone())
                  .or_default() += 1;
            }
            album.assets.insert(asset.guid.clone(), asset);
         },
         IngestOutcome::Reused { asset, new_comments } => {
            for comment in &new_comments {
               self.identity.observe(comment);
            }
            report.reused_assets += 1;
            report.new_comments += new_comments.len();
            delta.new_comments += new_comments.len();
            album.assets.insert(asset.guid.clone(), asset);
         },
         IngestOutcome::Dropped { .. } => {
            report.dropped += 1;
         },
      }
   }
}
