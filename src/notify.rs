//! Outbound notifications for new photos and comments.

use std::{
   collections::BTreeMap,
   fs, io,
   path::{Path, PathBuf},
   sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;

use crate::{
   Result,
   error::{Error, HttpError},
   identity::SelfIdentity,
};

const PLATFORM_ANDROID: u8 = 2;
const ICON: &str = "AirPhoto";
const COLOR: &str = "#5EA5F5";

/// Delivers a title and message to a set of recipient tokens.
#[async_trait]
pub trait Transport: Send + Sync {
   async fn send(&self, recipients: &[String], title: &str, message: &str) -> Result<(), HttpError>;
}

#[derive(Serialize)]
struct Envelope<'a> {
   notifications: [Notification<'a>; 1],
}

#[derive(Serialize)]
struct Notification<'a> {
   tokens:       &'a [String],
   platform:     u8,
   title:        &'a str,
   message:      &'a str,
   notification: Appearance,
}

#[derive(Serialize)]
struct Appearance {
   icon:  &'static str,
   color: &'static str,
}

/// [`Transport`] that posts to a push gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
   client: reqwest::Client,
   url:    String,
}

impl HttpTransport {
   pub fn new(url: impl Into<String>) -> Self {
      Self { client: reqwest::Client::new(), url: url.into() }
   }
}

#[async_trait]
impl Transport for HttpTransport {
   async fn send(&self, recipients: &[String], title: &str, message: &str) -> Result<(), HttpError> {
      let body = Envelope {
         notifications: [Notification {
            tokens: recipients,
            platform: PLATFORM_ANDROID,
            title,
            message,
            notification: Appearance { icon: ICON, color: COLOR },
         }],
      };

      let response = self.client.post(&self.url).json(&body).send().await?;
      let status = response.status();
      if status != reqwest::StatusCode::OK {
         let body = response.text().await.unwrap_or_default();
         return Err(HttpError::StatusCode { status: status.as_u16(), body });
      }
      Ok(())
   }
}

/// Outcome of [`Recipients::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
   Added,
   AlreadyPresent,
}

/// Registered device tokens, optionally persisted one per line.
#[derive(Debug, Default)]
pub struct Recipients {
   path:   Option<PathBuf>,
   tokens: RwLock<Vec<String>>,
}

impl Recipients {
   /// Registry that lives only in memory.
   pub fn in_memory(tokens: impl IntoIterator<Item = String>) -> Self {
      Self { path: None, tokens: RwLock::new(tokens.into_iter().collect()) }
   }

   /// Loads tokens from `path`; a missing file is an empty registry.
   pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
      let path = path.into();
      let tokens = match fs::read_to_string(&path) {
         Ok(content) => parse_tokens(&content),
         Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
         Err(e) => return Err(e.into()),
      };
      tracing::debug!("loaded {} recipient tokens from {}", tokens.len(), path.display());
      Ok(Self { path: Some(path), tokens: RwLock::new(tokens) })
   }

   pub fn path(&self) -> Option<&Path> {
      self.path.as_deref()
   }

   /// Adds `token` and persists the registry.
   pub fn register(&self, token: &str) -> Result<Registration> {
      let token = token.trim();
      if token.is_empty() || token.contains(char::is_whitespace) {
         tracing::warn!("rejected recipient token {token:?}");
         return Err(Error::InvalidToken(token.to_string()));
      }

      let mut tokens = self.tokens.write();
      if tokens.iter().any(|t| t == token) {
         return Ok(Registration::AlreadyPresent);
      }

      tracing::info!("adding recipient token {token}");
      tokens.push(token.to_string());
      if let Some(path) = &self.path {
         persist(path, &tokens)?;
      }
      Ok(Registration::Added)
   }

   pub fn list(&self) -> Vec<String> {
      self.tokens.read().clone()
   }

   pub fn is_empty(&self) -> bool {
      self.tokens.read().is_empty()
   }
}

fn parse_tokens(content: &str) -> Vec<String> {
   let mut tokens: Vec<String> = Vec::new();
   for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
      if !tokens.iter().any(|t| t == line) {
         tokens.push(line.to_string());
      }
   }
   tokens
}

fn persist(path: &Path, tokens: &[String]) -> Result<()> {
   if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
   {
      fs::create_dir_all(parent)?;
   }
   let mut content = tokens.join("\n");
   content.push('\n');
   fs::write(path, content)?;
   Ok(())
}

pub fn comments_message(count: usize) -> String {
   if count == 1 {
      "1 new comment".to_string()
   } else {
      format!("{count} new comments")
   }
}

pub fn photos_message(author: &str, count: usize) -> String {
   if count == 1 {
      format!("{author} posted a new photo.")
   } else {
      format!("{author} posted {count} new photos.")
   }
}

/// Composes notifications for new content and hands them to a [`Transport`].
///
/// Nothing here fails a sync pass: missing recipients and transport errors
/// are logged and dropped.
pub struct NotificationTrigger {
   transport:  Arc<dyn Transport>,
   recipients: Arc<Recipients>,
   identity:   Arc<SelfIdentity>,
}

impl NotificationTrigger {
   pub fn new(
      transport: Arc<dyn Transport>,
      recipients: Arc<Recipients>,
      identity: Arc<SelfIdentity>,
   ) -> Self {
      Self { transport, recipients, identity }
   }

   /// Sends `message` titled with the album name. Returns whether the
   /// transport accepted it.
   pub async fn notify(&self, album_name: &str, message: &str) -> bool {
      let recipients = self.recipients.list();
      if recipients.is_empty() {
         tracing::info!("no recipients registered, not sending \"{message}\"");
         return false;
      }

      tracing::info!("notifying {} recipients: {album_name}: {message}", recipients.len());
      match self.transport.send(&recipients, album_name, message).await {
         Ok(()) => true,
         Err(e) => {
            tracing::warn!("failed to send notification for {album_name}: {e}");
            false
         },
      }
   }

   /// Sends one notification for the album's new comments, if any, and one
   /// per author with new assets, skipping the local user. Returns the
   /// number of notifications accepted by the transport.
   pub async fn notify_album(
      &self,
      album_name: &str,
      new_comments: usize,
      new_assets_by_author: &BTreeMap<String, usize>,
   ) -> usize {
      let mut sent = 0;
      if new_comments > 0 && self.notify(album_name, &comments_message(new_comments)).await {
         sent += 1;
      }

      for (author, &count) in new_assets_by_author {
         if count == 0 || self.identity.is_self(author) {
            continue;
         }
         if self.notify(album_name, &photos_message(author, count)).await {
            sent += 1;
         }
      }
      sent
   }
}
