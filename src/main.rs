#[macro_use]
extern crate rocket;

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info, warn};
use markerkit::cache::MarkerCache;
use markerkit::config::AppConfig;
use markerkit::images::{IconDirectory, IconFetcher, IconRegistry, IconSource, IconSources};
use markerkit::retry::RetryPolicy;
use rocket::{
    figment::{
        providers::{Format, Toml},
        Figment, Profile,
    },
    Config,
};
use tokio_util::sync::CancellationToken;

#[launch]
async fn rocket() -> _ {
    dotenv().ok();

    // Load config
    let mut figment = Figment::from(Config::default())
        .merge(Toml::file("App.toml").nested());

    if let Ok(icons_dir) = env::var("ICONS_DIR") {
        figment = figment.merge(("icons_dir", icons_dir));
    }

    if let Ok(url) = env::var("REMOTE_ICONS_URL") {
        figment = figment.merge(("remote_icons_url", url));
    }

    if let Ok(ids) = env::var("REMOTE_ICONS") {
        figment = figment.merge(("remote_icons", ids.split(',').map(|s| s.trim().to_string()).collect::<Vec<String>>()));
    }

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // App config
    let config = figment.extract::<AppConfig>().expect("Invalid configuration");
    info!("Configuration loaded successfully");

    // Icons registered at runtime take precedence over the icon directory
    let registry = Arc::new(IconRegistry::new());
    let mut sources = IconSources::new().with(registry.clone());
    if let Some(dir) = &config.icons_dir {
        info!("Loading icons from directory {}", dir);
        sources = sources.with(Arc::new(IconDirectory::new(dir)));
    } else {
        warn!("No icons directory configured, only remote icons are available");
    }

    preload_remote_icons(&config, &registry).await;

    let source: Arc<dyn IconSource> = Arc::new(sources);
    let cache = Arc::new(MarkerCache::new(source).with_capacity(config.max_cached_markers));
    info!(
        "Marker cache initialized (up to {} entries)",
        config.max_cached_markers
    );

    info!(
        "Starting marker server on {}:{}",
        config.address, config.port
    );

    markerkit::build_rocket(figment, cache, registry)
}

async fn preload_remote_icons(config: &AppConfig, registry: &IconRegistry) {
    let (Some(url), Some(ids)) = (&config.remote_icons_url, &config.remote_icons) else {
        info!("Remote icon preloading disabled");
        return;
    };

    let fetcher = match IconFetcher::new(
        url.as_str(),
        config.timeout,
        &config.user_agent,
        RetryPolicy::from(&config.retry),
    ) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create icon fetcher: {}", e);
            return;
        }
    };

    // Ctrl-C during startup abandons the preload
    let token = CancellationToken::new();
    let canceller = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    match fetcher.preload(ids, registry, &token).await {
        Ok(report) if report.failed.is_empty() => {
            info!("Preloaded {} remote icons from {}", report.loaded, url)
        }
        Ok(report) => warn!(
            "Preloaded {} remote icons from {}, failed: {}",
            report.loaded,
            url,
            report.failed.join(", ")
        ),
        Err(e) => warn!("Remote icon preload interrupted: {}", e),
    }

    watcher.abort();
}
