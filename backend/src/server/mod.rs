//! Server bootstrap: adapter wiring and the Actix application factory.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use color_eyre::eyre::{Context, Result, eyre};
use reqwest::Url;
use tracing::info;

use crate::domain::cache::EnrichmentCache;
use crate::domain::enrichment::{EnrichmentPolicy, EnrichmentService};
use crate::domain::features::SpatialQueryService;
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{datasets, enrich};
use crate::outbound::openmeteo::OpenMeteoHttpSource;
use crate::outbound::overpass::OverpassHttpSource;
use crate::outbound::persistence::{
    DbPool, DieselEnrichmentStore, PoolConfig, PostgisSpatialStore,
};

use self::config::AppConfig;

/// Wire the pool, adapters, and domain services into the handler state.
///
/// # Errors
///
/// Fails when the database URL is missing, an endpoint URL does not parse,
/// or the pool or HTTP clients cannot be constructed.
pub async fn build_state(config: &AppConfig) -> Result<HttpState> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| eyre!("GEOSERVE_DATABASE_URL is required"))?;
    let pool = DbPool::new(
        PoolConfig::new(database_url).with_max_size(config.db_pool_max_size),
    )
    .await
    .wrap_err("building database pool")?;

    let timeout = Duration::from_secs(config.http_timeout_seconds.max(1));
    let overpass_url =
        Url::parse(config.overpass_url()).wrap_err("parsing Overpass endpoint URL")?;
    let openmeteo_url =
        Url::parse(config.openmeteo_url()).wrap_err("parsing Open-Meteo endpoint URL")?;

    let road_metrics = Arc::new(
        OverpassHttpSource::new(overpass_url, timeout).wrap_err("building Overpass client")?,
    );
    let weather = Arc::new(
        OpenMeteoHttpSource::new(openmeteo_url, timeout).wrap_err("building Open-Meteo client")?,
    );

    let cache = Arc::new(EnrichmentCache::new(
        Arc::new(DieselEnrichmentStore::new(pool.clone())),
        Arc::new(mockable::DefaultClock),
    ));
    let features = Arc::new(SpatialQueryService::new(
        Arc::new(PostgisSpatialStore::new(pool)),
        config.max_limit,
        config.default_limit,
    ));
    let enrichment = Arc::new(EnrichmentService::new(
        cache,
        road_metrics,
        weather,
        features.clone(),
        EnrichmentPolicy {
            road_metrics_ttl_days: config.road_metrics_ttl_days,
            weather_ttl_days: config.weather_ttl_days,
            max_radius_m: config.max_radius_m,
            max_weather_span_days: config.max_weather_span_days,
        },
    ));

    Ok(HttpState::new(enrichment, features))
}

/// Build the state, bind the server, and run until shutdown.
///
/// # Errors
///
/// Propagates wiring failures from [`build_state`] and bind or runtime
/// failures from Actix.
pub async fn run(config: AppConfig) -> Result<()> {
    let state = web::Data::new(build_state(&config).await?);
    let health = web::Data::new(HealthState::new());
    let server_health = health.clone();

    let bind_addr = config.bind_addr().to_owned();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_health.clone())
            .app_data(state.clone())
            .service(
                web::scope("/api/v1")
                    .service(live)
                    .service(ready)
                    .service(datasets::list_datasets)
                    .service(datasets::query_dataset)
                    .service(enrich::enrich_point),
            )
    })
    .bind(bind_addr.as_str())
    .wrap_err_with(|| format!("binding {bind_addr}"))?;

    health.mark_ready();
    info!(%bind_addr, "server ready");

    // Fail liveness as soon as the drain starts so orchestrators stop
    // routing to this instance while Actix finishes in-flight requests.
    let drain_health = health.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            drain_health.mark_unhealthy();
            info!("shutdown signal received; liveness marked down");
        }
    });

    server.run().await.wrap_err("running HTTP server")
}
