use std::path::PathBuf;

use albumsync::{
   Result, cmd,
   config::{Config, Overrides},
};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the albumsync daemon
#[derive(Parser)]
#[command(name = "albumsync")]
#[command(about = "Mirror a shared photo-stream database into a live album catalog")]
#[command(version)]
struct Cli {
   #[arg(long, global = true, env = "ALBUMSYNC_CONFIG", help = "Extra config file to layer in")]
   config: Option<PathBuf>,

   #[arg(long, global = true, help = "Path to the photo-stream database")]
   db: Option<PathBuf>,

   #[arg(long, global = true, help = "Root of the locally cached asset files")]
   assets: Option<PathBuf>,

   #[arg(long, global = true, help = "Recheck interval in milliseconds")]
   interval: Option<u64>,

   #[arg(long, global = true, help = "Send notifications for new content")]
   notifications: bool,

   #[arg(long, global = true, help = "Verbose logging")]
   debug: bool,

   #[command(subcommand)]
   command: Option<Cmd>,
}

/// Available subcommands for albumsync
#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Keep the catalog in sync until interrupted (default)")]
   Serve,

   #[command(about = "Run a single full pass and print the catalog as JSON")]
   Once {
      #[arg(long, help = "Print the sorted assets of this album instead of the album list")]
      album: Option<String>,

      #[arg(long, help = "Pretty-print JSON")]
      pretty: bool,
   },

   #[command(about = "Register a device token for notifications")]
   Register {
      #[arg(help = "Device token")]
      token: String,
   },
}

impl Cli {
   fn overrides(&self) -> Overrides {
      Overrides {
         db:                  self.db.clone(),
         assets:              self.assets.clone(),
         recheck_interval_ms: self.interval,
         notifications:       self.notifications.then_some(true),
         debug:               self.debug.then_some(true),
      }
   }
}

#[tokio::main]
async fn main() {
   let cli = Cli::parse();

   let cfg = match Config::load(cli.config.as_deref(), &cli.overrides()) {
      Ok(cfg) => cfg,
      Err(err) => {
         eprintln!("{err}");
         std::process::exit(err.exit_code());
      },
   };

   let level = if cfg.debug { Level::DEBUG } else { Level::INFO };
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::builder().with_default_directive(level.into()).from_env_lossy())
      .with_writer(std::io::stderr)
      .init();

   if let Err(err) = run(cli.command, cfg).await {
      tracing::error!("{err}");
      std::process::exit(err.exit_code());
   }
}

async fn run(command: Option<Cmd>, cfg: Config) -> Result<()> {
   match command.unwrap_or(Cmd::Serve) {
      Cmd::Serve => cmd::serve::execute(cfg).await,
      Cmd::Once { album, pretty } => cmd::once::execute(cfg, album, pretty).await,
      Cmd::Register { token } => cmd::register::execute(&cfg, &token),
   }
}
