mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod report;
mod store;
mod ui;

use api::types::Meal;
use api::{HttpResourceClient, Resource, ResourceClient};
use cache::QueryCache;
use chrono::NaiveDate;
use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use store::{DateFilter, Feature, StoreDeps};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mealdesk")]
#[command(about = "File meal requests and review lunch/dinner totals per department")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./mealdesk.yaml, then $XDG_CONFIG_HOME/mealdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// View to open first: new, requests, report or settings
  #[arg(short, long)]
  feature: Option<Feature>,

  /// Print the department report to stdout and exit
  #[arg(long)]
  report: bool,

  /// Only count meals on this day (YYYY-MM-DD), with --report
  #[arg(long, requires = "report")]
  date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config::Config::log_dir()?)?;
  info!(base_url = %config.api.base_url, "starting");

  let client = HttpResourceClient::new(&config.api, config.retry.policy())?;
  let cache = QueryCache::new(Arc::new(client) as Arc<dyn ResourceClient>)
    .with_stale_time(config.cache.stale_time());

  if args.report {
    let filter = args.date.map(DateFilter::On).unwrap_or_default();
    return print_report(&cache, filter).await;
  }

  let initial = match (args.feature, config.default_feature.as_deref()) {
    (Some(feature), _) => feature,
    (None, Some(name)) => name
      .parse()
      .map_err(|e| eyre!("Invalid default_feature in config: {}", e))?,
    (None, None) => Feature::Requests,
  };

  let mut app = app::App::new(&config, StoreDeps::new(cache), initial);
  app.run().await?;

  Ok(())
}

async fn print_report(cache: &QueryCache, filter: DateFilter) -> Result<()> {
  let meals: Vec<Meal> = cache
    .read_as(Resource::Meals.into())
    .await
    .map_err(|e| eyre!("Failed to load meals: {}", e))?;

  let selected: Vec<Meal> = meals.into_iter().filter(|m| filter.matches(m)).collect();
  println!("Meal requests, {}", filter.label());
  print!("{}", report::aggregate(&selected));
  Ok(())
}
