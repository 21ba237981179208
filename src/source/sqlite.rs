//! `SQLite` implementation of [`RowSource`].

use std::{
   path::{Path, PathBuf},
   sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Row, params, params_from_iter};

use super::{AlbumRow, AssetRow, CommentRow, RowSource};
use crate::Result;

const ALBUMS_SQL: &str = "SELECT GUID, name, url FROM Albums";

const ASSET_COUNT_SQL: &str = "SELECT COUNT(*) FROM AssetCollections WHERE albumGUID = ?1";

const ASSETS_SQL: &str = "SELECT albumGUID, GUID, batchDate, photoNumber, obj FROM AssetCollections \
                          WHERE albumGUID = ?1 ORDER BY batchDate DESC";

const COMMENTS_SQL: &str = "SELECT assetCollectionGUID, GUID, timestamp, isCaption, isMine, obj \
                            FROM Comments WHERE assetCollectionGUID = ?1";

/// Reads the photo-stream database through a lazily opened read-only
/// connection. The connection is dropped after a failed query or on
/// [`RowSource::release`] and reopened on the next query.
#[derive(Clone)]
pub struct SqliteSource {
   path: PathBuf,
   conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteSource {
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self { path: path.into(), conn: Arc::new(Mutex::new(None)) }
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   fn open(path: &Path) -> rusqlite::Result<Connection> {
      tracing::debug!("opening source store {}", path.display());
      Connection::open_with_flags(
         path,
         OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
      )
   }

   /// Runs `f` against the connection on the blocking pool.
   async fn with_conn<T, F>(&self, f: F) -> Result<T>
   where
      T: Send + 'static,
      F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
   {
      let path = self.path.clone();
      let conn = Arc::clone(&self.conn);
      let result = tokio::task::spawn_blocking(move || {
         let mut guard = conn.lock();
         if guard.is_none() {
            *guard = Some(Self::open(&path)?);
         }
         let Some(connection) = guard.as_ref() else {
            return Err(rusqlite::Error::InvalidQuery);
         };
         let result = f(connection);
         if result.is_err() {
            *guard = None;
         }
         result
      })
      .await?;
      Ok(result?)
   }
}

fn optional_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
   Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn optional_real(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
   Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or_default())
}

fn optional_blob(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<u8>> {
   Ok(row.get::<_, Option<Vec<u8>>>(idx)?.unwrap_or_default())
}

fn optional_flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
   Ok(row.get::<_, Option<bool>>(idx)?.unwrap_or(false))
}

/// Rows without an identity cannot be tracked across passes.
fn keep_identified<T>(rows: Vec<Option<T>>, table: &str) -> Vec<T> {
   let total = rows.len();
   let kept: Vec<T> = rows.into_iter().flatten().collect();
   if kept.len() != total {
      tracing::warn!("skipped {} {table} rows without a GUID", total - kept.len());
   }
   kept
}

fn comments_sql(exclude: usize) -> String {
   let mut sql = String::from(COMMENTS_SQL);
   if exclude > 0 {
      sql.push_str(" AND GUID NOT IN (");
      for i in 0..exclude {
         if i > 0 {
            sql.push(',');
         }
         sql.push_str(&format!("?{}", i + 2));
      }
      sql.push(')');
   }
   sql.push_str(" ORDER BY timestamp DESC");
   sql
}

#[async_trait]
impl RowSource for SqliteSource {
   async fn albums(&self) -> Result<Vec<AlbumRow>> {
      tracing::debug!("{ALBUMS_SQL}");
      let rows = self
         .with_conn(|conn| {
            let mut stmt = conn.prepare(ALBUMS_SQL)?;
            stmt
               .query_map([], |row| {
                  let Some(guid) = row.get::<_, Option<String>>(0)? else {
                     return Ok(None);
                  };
                  Ok(Some(AlbumRow { guid, name: optional_text(row, 1)?, url: optional_text(row, 2)? }))
               })?
               .collect::<rusqlite::Result<Vec<_>>>()
         })
         .await?;
      Ok(keep_identified(rows, "album"))
   }

   async fn asset_count(&self, album_guid: &str) -> Result<usize> {
      tracing::debug!("{ASSET_COUNT_SQL} [{album_guid}]");
      let album_guid = album_guid.to_string();
      let count: i64 = self
         .with_conn(move |conn| {
            conn.query_row(ASSET_COUNT_SQL, params![album_guid], |row| row.get(0))
         })
         .await?;
      Ok(usize::try_from(count).unwrap_or_default())
   }

   async fn assets(&self, album_guid: &str) -> Result<Vec<AssetRow>> {
      tracing::debug!("{ASSETS_SQL} [{album_guid}]");
      let album_guid = album_guid.to_string();
      let rows = self
         .with_conn(move |conn| {
            let mut stmt = conn.prepare(ASSETS_SQL)?;
            stmt
               .query_map(params![album_guid], |row| {
                  let Some(guid) = row.get::<_, Option<String>>(1)? else {
                     return Ok(None);
                  };
                  Ok(Some(AssetRow {
                     album_guid: optional_text(row, 0)?,
                     guid,
                     batch_date: optional_real(row, 2)?,
                     number: optional_real(row, 3)?,
                     blob: optional_blob(row, 4)?,
                  }))
               })?
               .collect::<rusqlite::Result<Vec<_>>>()
         })
         .await?;
      Ok(keep_identified(rows, "asset"))
   }

   async fn comments(&self, asset_guid: &str, exclude: &[String]) -> Result<Vec<CommentRow>> {
      let sql = comments_sql(exclude.len());
      tracing::debug!("{sql} [{asset_guid}, {} excluded]", exclude.len());

      let mut bound = Vec::with_capacity(exclude.len() + 1);
      bound.push(asset_guid.to_string());
      bound.extend(exclude.iter().cloned());

      let rows = self
         .with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            stmt
               .query_map(params_from_iter(bound.iter()), |row| {
                  let Some(guid) = row.get::<_, Option<String>>(1)? else {
                     return Ok(None);
                  };
                  Ok(Some(CommentRow {
                     asset_guid: optional_text(row, 0)?,
                     guid,
                     timestamp: optional_real(row, 2)?,
                     is_caption: optional_flag(row, 3)?,
                     is_mine: optional_flag(row, 4)?,
                     blob: optional_blob(row, 5)?,
                  }))
               })?
               .collect::<rusqlite::Result<Vec<_>>>()
         })
         .await?;
      Ok(keep_identified(rows, "comment"))
   }

   async fn release(&self) {
      self.conn.lock().take();
   }
}
