//! Single full pass with JSON output.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::Engine;
use crate::{Result, config::Config, types::SyncMode};

/// Runs one full pass and prints the album list, or the sorted assets of
/// `album` when given.
pub async fn execute(cfg: Config, album: Option<String>, pretty: bool) -> Result<()> {
   cfg.validate()?;
   let engine = Engine::from_config(&cfg)?;

   let mut progress = ProgressBar::new_spinner();
   if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{pos}/{len}]") {
      progress.set_style(style);
   }
   progress.enable_steady_tick(Duration::from_millis(100));

   let result = engine.orchestrator.run_pass(SyncMode::Full, &mut progress).await;
   progress.finish_and_clear();
   let report = result?;
   tracing::debug!("pass report: {report:?}");

   let catalog = engine.catalog();
   let json = match (album, pretty) {
      (Some(guid), true) => serde_json::to_string_pretty(&catalog.album_assets(&guid)?)?,
      (Some(guid), false) => catalog.album_assets_json(&guid)?,
      (None, true) => serde_json::to_string_pretty(&catalog.album_list())?,
      (None, false) => catalog.album_list_json()?,
   };
   println!("{json}");
   Ok(())
}
