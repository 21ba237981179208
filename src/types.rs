use std::{cmp::Ordering, collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a pass ingests everything or reuses what the catalog already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
   Full,
   Incremental,
}

impl SyncMode {
   pub const fn as_str(self) -> &'static str {
      match self {
         Self::Full => "full",
         Self::Incremental => "incremental",
      }
   }

   pub const fn is_incremental(self) -> bool {
      matches!(self, Self::Incremental)
   }
}

/// Progress of a running pass, reported once per finished asset
#[derive(Debug, Clone, Default)]
pub struct SyncProgress {
   pub album:     String,
   pub processed: usize,
   pub total:     usize,
}

/// A single comment, caption or like attached to an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Comment {
   #[serde(rename = "GUID")]
   pub guid:         String,
   #[serde(rename = "AssetGUID")]
   pub asset_guid:   String,
   pub date:         DateTime<Utc>,
   pub is_caption:   bool,
   pub is_mine:      bool,
   pub is_like:      bool,
   #[serde(rename = "Name")]
   pub author_name:  String,
   #[serde(rename = "AuthorID")]
   pub author_id:    String,
   #[serde(rename = "Email", default, skip_serializing_if = "Option::is_none")]
   pub author_email: Option<String>,
   /// Always `None` for likes.
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub content:      Option<String>,
}

/// A photo or video posted to an album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Asset {
   #[serde(rename = "GUID")]
   pub guid:           String,
   #[serde(rename = "AlbumGUID")]
   pub album_guid:     String,
   #[serde(rename = "Date")]
   pub capture_date:   DateTime<Utc>,
   pub sorting_date:   DateTime<Utc>,
   pub author:         String,
   #[serde(rename = "AuthorID")]
   pub author_id:      String,
   pub is_video:       bool,
   pub filename:       String,
   pub filetype:       String,
   #[serde(rename = "MIME")]
   pub mime:           String,
   pub local_path:     PathBuf,
   pub path:           String,
   pub thumbnail_path: String,
   pub width:          u32,
   pub height:         u32,
   #[serde(rename = "PhotoNumber")]
   pub number:         f64,
   /// Keyed by comment GUID.
   pub comments:       BTreeMap<String, Comment>,
}

impl Asset {
   /// Latest of the capture date and every comment date.
   pub fn compute_sorting_date(&self) -> DateTime<Utc> {
      self
         .comments
         .values()
         .map(|c| c.date)
         .fold(self.capture_date, DateTime::max)
   }

   /// Orders by sorting date, newest first, with the GUID as a stable
   /// tie-breaker.
   pub fn recency_cmp(&self, other: &Self) -> Ordering {
      other
         .sorting_date
         .cmp(&self.sorting_date)
         .then_with(|| self.guid.cmp(&other.guid))
   }
}

/// An album with its full asset set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Album {
   #[serde(rename = "GUID")]
   pub guid:            String,
   pub name:            String,
   #[serde(rename = "URL")]
   pub url:             String,
   /// Served path of the newest still image, empty when there is none.
   pub cover_photo:     String,
   /// Written as the zero time when the album has no still images.
   #[serde(with = "zero_time")]
   pub last_photo_date: Option<DateTime<Utc>>,
   pub assets:          BTreeMap<String, Asset>,
}

impl Album {
   pub fn new(guid: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
      Self {
         guid:            guid.into(),
         name:            name.into(),
         url:             url.into(),
         cover_photo:     String::new(),
         last_photo_date: None,
         assets:          BTreeMap::new(),
      }
   }

   /// Recomputes the cover photo from the newest non-video asset.
   pub fn refresh_cover(&mut self) {
      let newest = self
         .assets
         .values()
         .filter(|a| !a.is_video)
         .min_by(|a, b| a.recency_cmp(b));

      match newest {
         Some(asset) => {
            self.cover_photo = asset.path.clone();
            self.last_photo_date = Some(asset.sorting_date);
         },
         None => {
            self.cover_photo.clear();
            self.last_photo_date = None;
         },
      }
   }

   /// Assets ordered newest first by sorting date.
   pub fn sorted_assets(&self) -> Vec<&Asset> {
      let mut assets: Vec<&Asset> = self.assets.values().collect();
      assets.sort_by(|a, b| a.recency_cmp(b));
      assets
   }

   pub fn summary(&self) -> AlbumSummary {
      AlbumSummary {
         guid:            self.guid.clone(),
         name:            self.name.clone(),
         url:             self.url.clone(),
         cover_photo:     self.cover_photo.clone(),
         last_photo_date: self.last_photo_date,
         asset_count:     self.assets.len(),
      }
   }
}

/// An album without its assets, as served by the album list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlbumSummary {
   #[serde(rename = "GUID")]
   pub guid:            String,
   pub name:            String,
   #[serde(rename = "URL")]
   pub url:             String,
   pub cover_photo:     String,
   #[serde(with = "zero_time")]
   pub last_photo_date: Option<DateTime<Utc>>,
   pub asset_count:     usize,
}

impl AlbumSummary {
   /// Orders by last photo date, newest first; albums without photos last.
   pub fn recency_cmp(&self, other: &Self) -> Ordering {
      other
         .last_photo_date
         .cmp(&self.last_photo_date)
         .then_with(|| self.guid.cmp(&other.guid))
   }
}

/// Missing dates as `0001-01-01T00:00:00Z` on the wire.
mod zero_time {
   use chrono::{DateTime, Utc};
   use serde::{Deserialize, Deserializer, Serialize, Serializer};

   pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";
   const ZERO_UNIX_SECS: i64 = -62_135_596_800;

   #[allow(clippy::ref_option, reason = "signature required by serde(with)")]
   pub fn serialize<S: Serializer>(
      date: &Option<DateTime<Utc>>,
      serializer: S,
   ) -> Result<S::Ok, S::Error> {
      match date {
         Some(date) => date.serialize(serializer),
         None => serializer.serialize_str(ZERO_TIME),
      }
   }

   pub fn deserialize<'de, D: Deserializer<'de>>(
      deserializer: D,
   ) -> Result<Option<DateTime<Utc>>, D::Error> {
      Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?
         .filter(|date| date.timestamp() != ZERO_UNIX_SECS))
   }
}
