#![allow(dead_code)]

use std::{
   path::{Path, PathBuf},
   sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
   },
   time::Duration,
};

use albumsync::{
   catalog::Catalog,
   decode::{BlobDecoder, BlobRecord, BlobValue},
   error::{DecodeError, HttpError, MediaError},
   identity::SelfIdentity,
   ingest::{AssetIngestWorker, CommentIngestWorker},
   media::FrameExtractor,
   notify::{NotificationTrigger, Recipients, Transport},
   source::{AlbumRow, AssetRow, CommentRow, RowSource},
   sync::SyncOrchestrator,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const FRAME_TIMEOUT: Duration = Duration::from_millis(100);

/// In-flight ingestion budget of [`TestEngine`].
pub const CONCURRENCY: usize = 3;

pub const BAD_BLOB: &[u8] = b"\x00\x01 not a record";

#[derive(Default)]
struct Tables {
   albums:   Vec<AlbumRow>,
   assets:   Vec<AssetRow>,
   comments: Vec<CommentRow>,
   failing:  bool,
   /// Album whose asset query fails, on top of `failing`.
   broken:   Option<String>,
}

/// In-memory stand-in for the source store.
#[derive(Default)]
pub struct MemorySource {
   tables:        Mutex<Tables>,
   queries:       AtomicUsize,
   releases:      AtomicUsize,
   comment_delay: Mutex<Duration>,
   in_flight:     AtomicUsize,
   peak:          AtomicUsize,
}

impl MemorySource {
   pub fn new() -> Arc<Self> {
      Arc::new(Self::default())
   }

   pub fn add_album(&self, guid: &str, name: &str) {
      self.tables.lock().albums.push(AlbumRow {
         guid: guid.to_string(),
         name: name.to_string(),
         url:  format!("https://example.test/{guid}"),
      });
   }

   pub fn add_asset(&self, album: &str, guid: &str, batch_date: f64, blob: Vec<u8>) {
      let mut tables = self.tables.lock();
      let number = tables.assets.len() as f64;
      tables.assets.push(AssetRow {
         album_guid: album.to_string(),
         guid: guid.to_string(),
         batch_date,
         number,
         blob,
      });
   }

   pub fn add_comment(&self, asset: &str, guid: &str, timestamp: f64, is_mine: bool, blob: Vec<u8>) {
      self.tables.lock().comments.push(CommentRow {
         asset_guid: asset.to_string(),
         guid: guid.to_string(),
         timestamp,
         is_caption: false,
         is_mine,
         blob,
      });
   }

   /// Makes every asset query fail until reset.
   pub fn set_failing(&self, failing: bool) {
      self.tables.lock().failing = failing;
   }

   /// Makes the asset query of one album fail until reset with `None`.
   pub fn set_broken_album(&self, album: Option<&str>) {
      self.tables.lock().broken = album.map(str::to_string);
   }

   /// Holds every comment query open for `delay`, so overlapping ingestions
   /// can be counted.
   pub fn set_comment_delay(&self, delay: Duration) {
      *self.comment_delay.lock() = delay;
   }

   /// Most comment queries ever running at the same time.
   pub fn peak_in_flight(&self) -> usize {
      self.peak.load(Ordering::SeqCst)
   }

   pub fn queries(&self) -> usize {
      self.queries.load(Ordering::SeqCst)
   }

   pub fn releases(&self) -> usize {
      self.releases.load(Ordering::SeqCst)
   }

   fn hit(&self) {
      self.queries.fetch_add(1, Ordering::SeqCst);
   }
}

#[async_trait]
impl RowSource for MemorySource {
   async fn albums(&self) -> albumsync::Result<Vec<AlbumRow>> {
      self.hit();
      Ok(self.tables.lock().albums.clone())
   }

   async fn asset_count(&self, album_guid: &str) -> albumsync::Result<usize> {
      self.hit();
      let tables = self.tables.lock();
      Ok(tables.assets.iter().filter(|a| a.album_guid == album_guid).count())
   }

   async fn assets(&self, album_guid: &str) -> albumsync::Result<Vec<AssetRow>> {
      self.hit();
      let tables = self.tables.lock();
      if tables.failing || tables.broken.as_deref() == Some(album_guid) {
         return Err(rusqlite::Error::InvalidQuery.into());
      }
      let mut rows: Vec<AssetRow> = tables
         .assets
         .iter()
         .filter(|a| a.album_guid == album_guid)
         .cloned()
         .collect();
      rows.sort_by(|a, b| b.batch_date.total_cmp(&a.batch_date));
      Ok(rows)
   }

   async fn comments(&self, asset_guid: &str, exclude: &[String]) -> albumsync::Result<Vec<CommentRow>> {
      self.hit();
      let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.peak.fetch_max(running, Ordering::SeqCst);
      let delay = *self.comment_delay.lock();
      if !delay.is_zero() {
         tokio::time::sleep(delay).await;
      }
      self.in_flight.fetch_sub(1, Ordering::SeqCst);

      let tables = self.tables.lock();
      let mut rows: Vec<CommentRow> = tables
         .comments
         .iter()
         .filter(|c| c.asset_guid == asset_guid && !exclude.contains(&c.guid))
         .cloned()
         .collect();
      rows.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
      Ok(rows)
   }

   async fn release(&self) {
      self.releases.fetch_add(1, Ordering::SeqCst);
   }
}

/// Decodes JSON objects into records and counts every call.
#[derive(Default)]
pub struct JsonDecoder {
   calls: AtomicUsize,
}

impl JsonDecoder {
   pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
   }
}

impl BlobDecoder for JsonDecoder {
   fn decode(&self, blob: &[u8]) -> Result<BlobRecord, DecodeError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let value: Value =
         serde_json::from_slice(blob).map_err(|e| DecodeError::Malformed(e.to_string()))?;
      match to_blob(value) {
         BlobValue::Record(record) => Ok(record),
         _ => Err(DecodeError::NotARecord),
      }
   }
}

fn to_blob(value: Value) -> BlobValue {
   match value {
      Value::Null => BlobValue::Null,
      Value::Bool(b) => BlobValue::Bool(b),
      Value::Number(n) => n
         .as_i64()
         .map_or_else(|| BlobValue::Real(n.as_f64().unwrap_or_default()), BlobValue::Integer),
      Value::String(s) => BlobValue::String(s),
      Value::Array(items) => BlobValue::Array(items.into_iter().map(to_blob).collect()),
      Value::Object(map) => BlobValue::Record(map.into_iter().map(|(k, v)| (k, to_blob(v))).collect()),
   }
}

pub fn asset_blob(filename: &str, author: &str) -> Vec<u8> {
   serde_json::to_vec(&json!({ "fileName": filename, "fullName": author, "personID": "p" }))
      .expect("asset blob")
}

pub fn asset_blob_with_derivative(filename: &str, author: &str, width: u32, height: u32) -> Vec<u8> {
   serde_json::to_vec(&json!({
      "fileName": filename,
      "fullName": author,
      "assets": [{
         "metadata": {
            "MSAssetMetadataAssetType": "derivative",
            "MSAssetMetadataPixelWidth": width,
            "MSAssetMetadataPixelHeight": height
         }
      }]
   }))
   .expect("asset blob")
}

pub fn comment_blob(author: &str, content: &str) -> Vec<u8> {
   serde_json::to_vec(&json!({ "fullName": author, "content": content, "isLike": false }))
      .expect("comment blob")
}

pub fn like_blob(author: &str) -> Vec<u8> {
   serde_json::to_vec(&json!({ "fullName": author, "isLike": true })).expect("like blob")
}

/// How the scripted extractor answers.
#[derive(Debug, Clone, Copy)]
pub enum FrameScript {
   Succeed(u32, u32),
   Fail,
   Hang,
}

pub struct ScriptedFrames {
   script: FrameScript,
   calls:  AtomicUsize,
}

impl ScriptedFrames {
   pub fn new(script: FrameScript) -> Arc<Self> {
      Arc::new(Self { script, calls: AtomicUsize::new(0) })
   }

   pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
   }
}

#[async_trait]
impl FrameExtractor for ScriptedFrames {
   async fn probe(&self, _video: &Path) -> Result<(u32, u32), MediaError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match self.script {
         FrameScript::Succeed(w, h) => Ok((w, h)),
         FrameScript::Fail => Err(MediaError::ToolFailed {
            tool:   "ffprobe".to_string(),
            status: "exit status: 1".to_string(),
         }),
         FrameScript::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok((1, 1))
         },
      }
   }

   async fn extract_frame(
      &self,
      _video: &Path,
      _width: u32,
      _height: u32,
      output: &Path,
   ) -> Result<PathBuf, MediaError> {
      std::fs::write(output, b"jpeg").map_err(|source| MediaError::Spawn {
         tool: "ffmpeg".to_string(),
         source,
      })?;
      Ok(output.to_path_buf())
   }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
   pub recipients: Vec<String>,
   pub title:      String,
   pub message:    String,
}

#[derive(Default)]
pub struct RecordingTransport {
   sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
   pub fn sent(&self) -> Vec<Sent> {
      self.sent.lock().clone()
   }

   pub fn clear(&self) {
      self.sent.lock().clear();
   }
}

#[async_trait]
impl Transport for RecordingTransport {
   async fn send(&self, recipients: &[String], title: &str, message: &str) -> Result<(), HttpError> {
      self.sent.lock().push(Sent {
         recipients: recipients.to_vec(),
         title:      title.to_string(),
         message:    message.to_string(),
      });
      Ok(())
   }
}

/// Orchestrator wired to fakes, with notifications going to one recipient.
pub struct TestEngine {
   pub orchestrator: SyncOrchestrator,
   pub source:       Arc<MemorySource>,
   pub decoder:      Arc<JsonDecoder>,
   pub frames:       Arc<ScriptedFrames>,
   pub transport:    Arc<RecordingTransport>,
   pub identity:     Arc<SelfIdentity>,
}

impl TestEngine {
   pub fn new(source: Arc<MemorySource>, frames: Arc<ScriptedFrames>, assets_root: &Path) -> Self {
      Self::with_identity(source, frames, assets_root, SelfIdentity::new())
   }

   pub fn with_identity(
      source: Arc<MemorySource>,
      frames: Arc<ScriptedFrames>,
      assets_root: &Path,
      identity: SelfIdentity,
   ) -> Self {
      let decoder = Arc::new(JsonDecoder::default());
      let transport = Arc::new(RecordingTransport::default());
      let identity = Arc::new(identity);

      let row_source: Arc<dyn RowSource> = source.clone();
      let blob_decoder: Arc<dyn BlobDecoder> = decoder.clone();
      let comments = CommentIngestWorker::new(row_source.clone(), blob_decoder.clone());
      let worker =
         AssetIngestWorker::new(blob_decoder, frames.clone(), comments, assets_root, FRAME_TIMEOUT);

      let recipients = Arc::new(Recipients::in_memory(["token".to_string()]));
      let notifier = Arc::new(NotificationTrigger::new(
         transport.clone(),
         recipients,
         identity.clone(),
      ));
      let orchestrator =
         SyncOrchestrator::new(row_source, worker, Arc::new(Catalog::new()), identity.clone())
            .with_concurrency(CONCURRENCY)
            .with_notifier(notifier);

      Self { orchestrator, source, decoder, frames, transport, identity }
   }

   pub fn catalog(&self) -> &Arc<Catalog> {
      self.orchestrator.catalog()
   }
}
