//! In-memory album catalog.
//!
//! One reader-writer lock guards the whole map. Albums are stored behind
//! `Arc` so a merge swaps a single pointer and readers clone pointers out of
//! the critical section before doing any serialization work.

use std::{
   collections::{BTreeMap, HashMap},
   sync::Arc,
};

use parking_lot::RwLock;

use crate::{
   Result,
   error::Error,
   types::{Album, AlbumSummary, Asset},
};

/// Read-only view of the catalog at one instant
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
   albums: BTreeMap<String, Arc<Album>>,
}

impl Snapshot {
   pub fn album(&self, guid: &str) -> Option<&Album> {
      self.albums.get(guid).map(|album| album.as_ref())
   }

   pub fn contains(&self, guid: &str) -> bool {
      self.albums.contains_key(guid)
   }

   pub fn len(&self) -> usize {
      self.albums.len()
   }

   pub fn is_empty(&self) -> bool {
      self.albums.is_empty()
   }

   pub fn iter(&self) -> impl Iterator<Item = &Album> {
      self.albums.values().map(|album| album.as_ref())
   }
}

/// Authoritative mirror of every album, asset and comment.
///
/// Only the sync orchestrator merges; any number of readers may query
/// concurrently.
#[derive(Debug, Default)]
pub struct Catalog {
   albums: RwLock<HashMap<String, Arc<Album>>>,
}

impl Catalog {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn snapshot(&self) -> Snapshot {
      let albums = self.albums.read();
      Snapshot {
         albums: albums
            .iter()
            .map(|(guid, album)| (guid.clone(), Arc::clone(album)))
            .collect(),
      }
   }

   /// Inserts or replaces the full state of one album.
   pub fn merge(&self, album: Album) {
      let guid = album.guid.clone();
      let album = Arc::new(album);
      self.albums.write().insert(guid, album);
   }

   pub fn contains(&self, guid: &str) -> bool {
      self.albums.read().contains_key(guid)
   }

   pub fn album(&self, guid: &str) -> Option<Arc<Album>> {
      self.albums.read().get(guid).cloned()
   }

   pub fn len(&self) -> usize {
      self.albums.read().len()
   }

   pub fn is_empty(&self) -> bool {
      self.albums.read().is_empty()
   }

   /// Every album with its assets, keyed by GUID.
   pub fn albums(&self) -> BTreeMap<String, Album> {
      self
         .snapshot()
         .albums
         .into_iter()
         .map(|(guid, album)| (guid, Album::clone(&album)))
         .collect()
   }

   /// Album summaries, newest `LastPhotoDate` first.
   pub fn album_list(&self) -> Vec<AlbumSummary> {
      let mut list: Vec<AlbumSummary> = self.snapshot().iter().map(Album::summary).collect();
      list.sort_by(AlbumSummary::recency_cmp);
      list
   }

   /// Assets of one album, newest `SortingDate` first.
   pub fn album_assets(&self, guid: &str) -> Result<Vec<Asset>> {
      let album = self
         .album(guid)
         .ok_or_else(|| Error::AlbumNotFound(guid.to_string()))?;
      Ok(album.sorted_assets().into_iter().cloned().collect())
   }

   pub fn albums_json(&self) -> Result<String> {
      Ok(serde_json::to_string(&self.albums())?)
   }

   pub fn album_list_json(&self) -> Result<String> {
      Ok(serde_json::to_string(&self.album_list())?)
   }

   pub fn album_assets_json(&self, guid: &str) -> Result<String> {
      Ok(serde_json::to_string(&self.album_assets(guid)?)?)
   }
}
