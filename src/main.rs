mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod listing;
mod logging;
mod query;
mod ui;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use commands::CommandKind;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InitialView {
  Listings,
  Featured,
  Mine,
  Drafts,
  Profile,
}

impl From<InitialView> for CommandKind {
  fn from(view: InitialView) -> Self {
    match view {
      InitialView::Listings => CommandKind::Listings,
      InitialView::Featured => CommandKind::Featured,
      InitialView::Mine => CommandKind::Mine,
      InitialView::Drafts => CommandKind::Drafts,
      InitialView::Profile => CommandKind::Profile,
    }
  }
}

#[derive(Parser, Debug)]
#[command(name = "staydeck")]
#[command(about = "A terminal client for shortlet and rental listings")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./staydeck.yaml, then $XDG_CONFIG_HOME/staydeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// View to open on start
  #[arg(short, long, value_enum, default_value_t = InitialView::Listings)]
  view: InitialView,

  /// Log level or filter directive (overridden by STAYDECK_LOG / RUST_LOG)
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_level.as_deref())?;

  let config = config::Config::load(args.config.as_deref())?;
  info!(base_url = %config.api.base_url, view = ?args.view, "starting");

  // One cache for the whole session, shared by every view
  let cache = cache::QueryClient::new();
  let api = api::cached_client::CachedApiClient::new(&config, cache)?;

  let mut app = app::App::new(&config, api, args.view.into());
  app.run().await?;

  Ok(())
}
