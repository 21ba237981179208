//! Long-running sync daemon.
//!
//! Runs a forced full pass, then polls the source store and runs an
//! incremental pass whenever it has been written.

use std::{sync::Arc, time::Duration};

use console::style;
use tokio::{signal, sync::watch, time};

use super::Engine;
use crate::{Result, config::Config, types::SyncMode};

/// Executes the serve command until Ctrl+C or a fatal error.
pub async fn execute(cfg: Config) -> Result<()> {
   cfg.validate()?;
   let engine = Arc::new(Engine::from_config(&cfg)?);
   let interval = cfg.recheck_interval();

   println!("{}", style("Starting albumsync...").green().bold());
   println!("Source: {}", style(engine.detector.path().display()).cyan());
   println!("Assets: {}", style(cfg.assets_path()?.display()).dim());
   println!("Recheck interval: {}", style(format!("{interval:?}")).dim());
   if cfg.notifications {
      println!("Notifications: {}", style(&cfg.notification_url).dim());
   }

   // Records the current modification time so the first tick does not
   // immediately repeat the full pass.
   engine.detector.has_changed()?;

   let (shutdown_tx, shutdown_rx) = watch::channel(false);
   let loop_engine = Arc::clone(&engine);
   let mut sync_handle =
      tokio::spawn(async move { sync_loop(loop_engine, interval, shutdown_rx).await });

   println!("{}", style("Press Ctrl+C to stop").dim());

   let result = tokio::select! {
      _ = signal::ctrl_c() => {
         println!("\n{}", style("Shutting down...").yellow());
         let _ = shutdown_tx.send(true);
         (&mut sync_handle).await?
      }
      joined = &mut sync_handle => joined?,
   };

   match &result {
      Ok(()) => println!("{}", style("Stopped").green()),
      Err(e) => println!("{} {e}", style("Stopped:").red()),
   }
   result
}

/// Runs passes until `shutdown_rx` turns true. The first pass is full, later
/// ones run when the store changes. A failed pass keeps its mode and is
/// retried on the next tick; a fatal error ends the loop.
pub async fn sync_loop(
   engine: Arc<Engine>,
   interval: Duration,
   mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
   let mut pending = Some(SyncMode::Full);

   loop {
      if let Some(mode) = pending.take() {
         match engine.orchestrator.run_pass(mode, &mut ()).await {
            Ok(report) => {
               tracing::debug!("pass report: {report:?}");
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
               tracing::error!("{} sync failed: {e}", mode.as_str());
               pending = Some(mode);
            },
         }
      }

      tokio::select! {
         _ = shutdown_rx.changed() => {
            if *shutdown_rx.borrow() {
               break;
            }
         }
         () = time::sleep(interval) => {
            if engine.detector.has_changed()? {
               tracing::debug!("source store changed");
               pending = pending.or(Some(SyncMode::Incremental));
            }
         }
      }
   }
   Ok(())
}
