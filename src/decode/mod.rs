//! Metadata blob decoding.
//!
//! A [`BlobDecoder`] turns the opaque blob attached to a row into a
//! [`BlobRecord`]: a tree of tagged [`BlobValue`]s addressed by string key.
//! The typed views ([`AssetMetadata`], [`CommentMetadata`]) are built from a
//! record once, with explicit defaults for optional keys.

mod archive;

use std::collections::BTreeMap;

pub use archive::KeyedArchiveDecoder;

use crate::error::DecodeError;

/// A decoded value inside a blob
#[derive(Debug, Clone, PartialEq)]
pub enum BlobValue {
   Null,
   Bool(bool),
   Integer(i64),
   Real(f64),
   String(String),
   Data(Vec<u8>),
   Array(Vec<BlobValue>),
   Record(BlobRecord),
}

impl BlobValue {
   pub fn as_str(&self) -> Option<&str> {
      match self {
         Self::String(s) => Some(s),
         _ => None,
      }
   }

   pub const fn as_bool(&self) -> Option<bool> {
      match self {
         Self::Bool(b) => Some(*b),
         Self::Integer(i) => Some(*i != 0),
         _ => None,
      }
   }

   pub fn as_u32(&self) -> Option<u32> {
      match self {
         Self::Integer(i) => u32::try_from(*i).ok(),
         Self::Real(r) if r.is_finite() && *r >= 0.0 && *r <= f64::from(u32::MAX) => {
            Some(*r as u32)
         },
         _ => None,
      }
   }


   pub const fn as_record(&self) -> Option<&BlobRecord> {
      match self {
         Self::Record(r) => Some(r),
         _ => None,
      }
   }

   pub fn as_array(&self) -> Option<&[Self]> {
      match self {
         Self::Array(a) => Some(a),
         _ => None,
      }
   }
}

/// Named fields of a decoded blob
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobRecord {
   fields: BTreeMap<String, BlobValue>,
}

impl BlobRecord {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn insert(&mut self, key: impl Into<String>, value: BlobValue) {
      self.fields.insert(key.into(), value);
   }

   pub fn with(mut self, key: impl Into<String>, value: BlobValue) -> Self {
      self.insert(key, value);
      self
   }

   pub fn get(&self, key: &str) -> Option<&BlobValue> {
      self.fields.get(key)
   }

   pub fn len(&self) -> usize {
      self.fields.len()
   }

   pub fn is_empty(&self) -> bool {
      self.fields.is_empty()
   }

   /// Non-empty string value of `key`.
   pub fn text(&self, key: &str) -> Option<&str> {
      self.get(key).and_then(BlobValue::as_str).filter(|s| !s.is_empty())
   }

   pub fn flag(&self, key: &str) -> Option<bool> {
      self.get(key).and_then(BlobValue::as_bool)
   }
}

impl FromIterator<(String, BlobValue)> for BlobRecord {
   fn from_iter<I: IntoIterator<Item = (String, BlobValue)>>(iter: I) -> Self {
      Self { fields: iter.into_iter().collect() }
   }
}

/// Decodes metadata blobs into records.
pub trait BlobDecoder: Send + Sync {
   fn decode(&self, blob: &[u8]) -> Result<BlobRecord, DecodeError>;
}

/// Asset fields carried by an asset-collection blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
   pub filename:   String,
   pub author:     String,
   pub author_id:  String,
   /// Pixel size of the derivative rendition, when the blob lists one.
   pub dimensions: Option<(u32, u32)>,
}

impl AssetMetadata {
   pub const FILENAME: &'static str = "fileName";
   pub const AUTHOR: &'static str = "fullName";
   pub const AUTHOR_ID: &'static str = "personID";
   pub const RENDITIONS: &'static str = "assets";
   pub const RENDITION_METADATA: &'static str = "metadata";
   pub const RENDITION_TYPE: &'static str = "MSAssetMetadataAssetType";
   pub const RENDITION_WIDTH: &'static str = "MSAssetMetadataPixelWidth";
   pub const RENDITION_HEIGHT: &'static str = "MSAssetMetadataPixelHeight";
   pub const DERIVATIVE: &'static str = "derivative";

   /// Builds asset metadata; a record without a file name is rejected since
   /// there is nothing to serve for it.
   pub fn from_record(record: &BlobRecord) -> Result<Self, DecodeError> {
      let filename = record
         .text(Self::FILENAME)
         .ok_or(DecodeError::MissingField(Self::FILENAME))?
         .to_string();

      Ok(Self {
         filename,
         author: record.text(Self::AUTHOR).unwrap_or_default().to_string(),
         author_id: record.text(Self::AUTHOR_ID).unwrap_or_default().to_string(),
         dimensions: Self::derivative_dimensions(record),
      })
   }

   fn derivative_dimensions(record: &BlobRecord) -> Option<(u32, u32)> {
      record
         .get(Self::RENDITIONS)?
         .as_array()?
         .iter()
         .filter_map(BlobValue::as_record)
         .filter_map(|rendition| {
            rendition
               .get(Self::RENDITION_METADATA)
               .and_then(BlobValue::as_record)
         })
         .find(|meta| meta.text(Self::RENDITION_TYPE) == Some(Self::DERIVATIVE))
         .and_then(|meta| {
            let width = meta.get(Self::RENDITION_WIDTH)?.as_u32()?;
            let height = meta.get(Self::RENDITION_HEIGHT)?.as_u32()?;
            Some((width, height))
         })
   }
}

/// Comment fields carried by a comment blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentMetadata {
   pub author_name:  String,
   pub author_id:    String,
   pub author_email: Option<String>,
   pub is_like:      bool,
   pub content:      Option<String>,
}

impl CommentMetadata {
   pub const AUTHOR: &'static str = "fullName";
   pub const AUTHOR_ID: &'static str = "personID";
   pub const EMAIL: &'static str = "email";
   pub const IS_LIKE: &'static str = "isLike";
   pub const CONTENT: &'static str = "content";

   pub fn from_record(record: &BlobRecord) -> Self {
      let is_like = record.flag(Self::IS_LIKE).unwrap_or(false);
      let content = if is_like {
         None
      } else {
         record.text(Self::CONTENT).map(str::to_string)
      };

      Self {
         author_name: record.text(Self::AUTHOR).unwrap_or_default().to_string(),
         author_id: record.text(Self::AUTHOR_ID).unwrap_or_default().to_string(),
         author_email: record.text(Self::EMAIL).map(str::to_string),
         is_like,
         content,
      }
   }
}
