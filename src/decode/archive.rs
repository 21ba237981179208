//! Decoder for keyed-archive property lists.
//!
//! Archives store a flat object table (`$objects`) and a `$top` entry that
//! references the root object by UID. Containers are flattened back into
//! [`BlobValue`] trees here; plain (non-archived) property-list dictionaries
//! are accepted as well.

use std::io::Cursor;

use plist::{Dictionary, Value};

use super::{BlobDecoder, BlobRecord, BlobValue};
use crate::error::DecodeError;

const MAX_DEPTH: usize = 32;
const NULL_MARKER: &str = "$null";

/// [`BlobDecoder`] for binary or XML property lists, archived or not.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyedArchiveDecoder;

impl KeyedArchiveDecoder {
   pub const fn new() -> Self {
      Self
   }
}

impl BlobDecoder for KeyedArchiveDecoder {
   fn decode(&self, blob: &[u8]) -> Result<BlobRecord, DecodeError> {
      if blob.is_empty() {
         return Err(DecodeError::Malformed("empty blob".to_string()));
      }
      let value =
         Value::from_reader(Cursor::new(blob)).map_err(|e| DecodeError::Malformed(e.to_string()))?;
      let Value::Dictionary(top) = value else {
         return Err(DecodeError::NotARecord);
      };

      let Some(Value::Array(objects)) = top.get("$objects") else {
         return plain_record(&top, 0);
      };
      let root = top
         .get("$top")
         .and_then(Value::as_dictionary)
         .and_then(|t| t.get("root").or_else(|| t.values().next()))
         .ok_or(DecodeError::MissingRoot)?;

      match (Archive { objects }).resolve(root, 0)? {
         BlobValue::Record(record) => Ok(record),
         _ => Err(DecodeError::NotARecord),
      }
   }
}

struct Archive<'a> {
   objects: &'a [Value],
}

impl Archive<'_> {
   fn resolve(&self, value: &Value, depth: usize) -> Result<BlobValue, DecodeError> {
      if depth > MAX_DEPTH {
         return Err(DecodeError::TooDeep(MAX_DEPTH));
      }

      match value {
         Value::Uid(uid) => {
            let idx = uid.get();
            let object = usize::try_from(idx)
               .ok()
               .and_then(|i| self.objects.get(i))
               .ok_or(DecodeError::DanglingReference(idx))?;
            self.resolve(object, depth + 1)
         },
         Value::Array(items) => Ok(BlobValue::Array(
            items
               .iter()
               .map(|item| self.resolve(item, depth + 1))
               .collect::<Result<_, _>>()?,
         )),
         Value::Dictionary(dict) => self.resolve_object(dict, depth),
         other => Ok(scalar(other)),
      }
   }

   fn resolve_object(&self, dict: &Dictionary, depth: usize) -> Result<BlobValue, DecodeError> {
      if let (Some(Value::Array(keys)), Some(Value::Array(values))) =
         (dict.get("NS.keys"), dict.get("NS.objects"))
      {
         let mut record = BlobRecord::new();
         for (key, value) in keys.iter().zip(values) {
            let BlobValue::String(key) = self.resolve(key, depth + 1)? else {
               continue;
            };
            record.insert(key, self.resolve(value, depth + 1)?);
         }
         return Ok(BlobValue::Record(record));
      }
      if let Some(objects) = dict.get("NS.objects") {
         return self.resolve(objects, depth + 1);
      }
      if let Some(string) = dict.get("NS.string") {
         return self.resolve(string, depth + 1);
      }
      if let Some(Value::Real(time)) = dict.get("NS.time") {
         return Ok(BlobValue::Real(*time));
      }
      if let Some(data) = dict.get("NS.data").or_else(|| dict.get("NS.bytes")) {
         return self.resolve(data, depth + 1);
      }

      let mut record = BlobRecord::new();
      for (key, value) in dict {
         if key.starts_with('$') {
            continue;
         }
         record.insert(key.clone(), self.resolve(value, depth + 1)?);
      }
      Ok(BlobValue::Record(record))
   }
}

fn plain(value: &Value, depth: usize) -> Result<BlobValue, DecodeError> {
   if depth > MAX_DEPTH {
      return Err(DecodeError::TooDeep(MAX_DEPTH));
   }
   match value {
      Value::Array(items) => Ok(BlobValue::Array(
         items
            .iter()
            .map(|item| plain(item, depth + 1))
            .collect::<Result<_, _>>()?,
      )),
      Value::Dictionary(dict) => Ok(BlobValue::Record(plain_record(dict, depth + 1)?)),
      other => Ok(scalar(other)),
   }
}

fn plain_record(dict: &Dictionary, depth: usize) -> Result<BlobRecord, DecodeError> {
   dict
      .iter()
      .map(|(k, v)| Ok((k.clone(), plain(v, depth + 1)?)))
      .collect()
}

fn scalar(value: &Value) -> BlobValue {
   match value {
      Value::String(s) if s == NULL_MARKER => BlobValue::Null,
      Value::String(s) => BlobValue::String(s.clone()),
      Value::Boolean(b) => BlobValue::Bool(*b),
      Value::Integer(i) => i
         .as_signed()
         .map(BlobValue::Integer)
         .or_else(|| i.as_unsigned().map(|u| BlobValue::Real(u as f64)))
         .unwrap_or(BlobValue::Null),
      Value::Real(r) => BlobValue::Real(*r),
      Value::Data(d) => BlobValue::Data(d.clone()),
      Value::Date(d) => BlobValue::String(d.to_xml_format()),
      _ => BlobValue::Null,
   }
}
