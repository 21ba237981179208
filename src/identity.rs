//! Local user identity learned from the stream itself.

use parking_lot::RwLock;

use crate::types::Comment;

/// Display name of the local user.
///
/// The source store never names its owner directly; the first comment the
/// owner wrote that carries a non-empty author name settles it. Once set the
/// name is never replaced.
#[derive(Debug, Default)]
pub struct SelfIdentity {
   name: RwLock<Option<String>>,
}

impl SelfIdentity {
   pub fn new() -> Self {
      Self::default()
   }

   /// Starts with a known name, e.g. one carried over from configuration.
   pub fn with_name(name: impl Into<String>) -> Self {
      Self { name: RwLock::new(Some(name.into())) }
   }

   /// Records `comment`'s author if it is the first qualifying one. Returns
   /// `true` when this call settled the identity.
   pub fn observe(&self, comment: &Comment) -> bool {
      if !comment.is_mine || comment.author_name.is_empty() {
         return false;
      }
      if self.name.read().is_some() {
         return false;
      }

      let mut name = self.name.write();
      if name.is_some() {
         return false;
      }
      tracing::info!("determined local user as {}", comment.author_name);
      *name = Some(comment.author_name.clone());
      true
   }

   pub fn get(&self) -> Option<String> {
      self.name.read().clone()
   }

   pub fn is_self(&self, author: &str) -> bool {
      self.name.read().as_deref().is_some_and(|name| name == author)
   }
}
