//! Dashboard orchestration
//!
//! Fans out provider calls concurrently, bounds each one by the configured
//! budget, and hands whatever came back to the reconciliation engine.

use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use futures::future::join_all;
use tracing::{debug, info, instrument};

use crate::cluster::{Cluster, cluster, singletons};
use crate::config::{AircastConfig, CountyEntry};
use crate::counties::CountyDirectory;
use crate::models::{AirQualitySummary, CountyMarker, Location, PollenPageResult, Provider};
use crate::providers::{
    AirNowClient, OpenAqClient, OpenMeteoClient, PollenPageClient, bounded, build_client,
};
use crate::reconcile::hour_key::local_date;
use crate::reconcile::{ReconcileContext, ReconcileInputs, reconcile};
use crate::{AircastError, Result};

const MARKER_UNIT: &str = "AQI";

pub struct Dashboard {
    config: AircastConfig,
    tz: Tz,
    counties: CountyDirectory,
    airnow: AirNowClient,
    openaq: OpenAqClient,
    open_meteo: OpenMeteoClient,
    pollen_page: PollenPageClient,
    budget: Duration,
}

impl Dashboard {
    /// Build all provider clients from a validated configuration
    pub fn new(config: AircastConfig) -> anyhow::Result<Self> {
        let tz = config.reconciliation.timezone()?;
        let client = build_client(&config.providers)?;

        Ok(Self {
            tz,
            counties: CountyDirectory::new(config.counties.clone()),
            airnow: AirNowClient::new(client.clone(), &config.providers, tz),
            openaq: OpenAqClient::new(client.clone(), &config.providers),
            open_meteo: OpenMeteoClient::new(
                client.clone(),
                &config.providers,
                tz,
                config.reconciliation.forecast_days,
            ),
            pollen_page: PollenPageClient::new(client, &config.providers),
            budget: config.providers.timeout(),
            config,
        })
    }

    #[must_use]
    pub fn counties(&self) -> &CountyDirectory {
        &self.counties
    }

    #[must_use]
    pub fn config(&self) -> &AircastConfig {
        &self.config
    }

    fn context(&self) -> ReconcileContext {
        ReconcileContext {
            now: Utc::now(),
            tz: self.tz,
            crowd_window: self.config.reconciliation.crowd_window(),
            forecast_days: self.config.reconciliation.forecast_days,
        }
    }

    /// Reconciled summary for a location. Never fails; providers that error
    /// or run out of time simply contribute nothing.
    #[instrument(skip(self), fields(name = %location.name))]
    pub async fn summary_for(&self, location: Location) -> AirQualitySummary {
        let ctx = self.context();
        let at = location.coordinates();
        debug!("Fetching providers for {}", location.format_coordinates());

        let (observations, station_forecast, crowd, gridded) = tokio::join!(
            bounded(
                Provider::AirNow,
                self.budget,
                self.airnow.observations(at),
                Ok(Vec::new())
            ),
            bounded(
                Provider::AirNow,
                self.budget,
                self.airnow.forecast(at, local_date(ctx.now, ctx.tz)),
                Vec::new()
            ),
            bounded(
                Provider::OpenAq,
                self.budget,
                self.openaq.measurements(at, ctx.now, ctx.crowd_window),
                Vec::new()
            ),
            bounded(
                Provider::OpenMeteo,
                self.budget,
                self.open_meteo.series(at),
                None
            ),
        );

        let inputs = ReconcileInputs {
            location,
            observations,
            station_forecast,
            crowd,
            gridded,
        };
        let summary = reconcile(&inputs, &ctx);
        info!(
            "Summary for {}: AQI {} from [{}]",
            summary.location.name, summary.overall_aqi, summary.data_source
        );
        summary
    }

    pub async fn summary_for_county(&self, name: &str) -> Result<AirQualitySummary> {
        let entry = self.county(name)?;
        Ok(self.summary_for(entry.location()).await)
    }

    /// Summary for a device position, named after the nearest county
    pub async fn summary_for_coordinates(&self, lat: f64, lon: f64) -> Result<AirQualitySummary> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(AircastError::validation(format!(
                "Coordinates out of range: {lat}, {lon}"
            )));
        }
        let name = self
            .counties
            .nearest(lat, lon)
            .map_or_else(
                || "Current location".to_string(),
                |entry| format!("Near {} County", entry.name),
            );
        Ok(self.summary_for(Location::new(lat, lon, name)).await)
    }

    /// One marker per configured county. Each county reconciles on its own
    /// so a slow or failing county never holds back the others.
    #[instrument(skip(self))]
    pub async fn county_markers(&self) -> Vec<CountyMarker> {
        let markers = join_all(
            self.counties
                .entries()
                .iter()
                .map(|entry| self.county_marker(entry)),
        )
        .await;
        info!("Refreshed {} county markers", markers.len());
        markers
    }

    async fn county_marker(&self, entry: &CountyEntry) -> CountyMarker {
        let ctx = self.context();
        let at = entry.coordinates();

        let (observations, gridded) = tokio::join!(
            bounded(
                Provider::AirNow,
                self.budget,
                self.airnow.observations(at),
                Ok(Vec::new())
            ),
            bounded(
                Provider::OpenMeteo,
                self.budget,
                self.open_meteo.series(at),
                None
            ),
        );

        let inputs = ReconcileInputs {
            observations,
            gridded,
            ..ReconcileInputs::empty(entry.location())
        };
        let summary = reconcile(&inputs, &ctx);
        let aqi = summary
            .pollutants
            .any_aqi()
            .then_some(summary.overall_aqi);
        debug!("Marker for {}: {:?}", entry.name, aqi);

        CountyMarker {
            lat: Some(entry.latitude),
            lon: Some(entry.longitude),
            aqi,
            unit: MARKER_UNIT.to_string(),
            county_name: entry.name.clone(),
        }
    }

    /// Group markers for a zoom level. Clustering applies at or below the
    /// configured zoom; above it every located marker stands alone.
    #[must_use]
    pub fn clusters(&self, markers: &[CountyMarker], zoom: u8) -> Vec<Cluster<CountyMarker>> {
        if zoom <= self.config.map.cluster_max_zoom {
            cluster(markers, self.config.map.cluster_threshold_degrees)
        } else {
            singletons(markers)
        }
    }

    /// Scraped pollen card for a county
    pub async fn pollen_card(&self, name: &str) -> Result<PollenPageResult> {
        let entry = self.county(name)?;
        let budget = self.budget;
        let result = bounded(
            Provider::PollenPage,
            budget,
            self.pollen_page
                .fetch(&entry.country, &entry.state, &entry.slug()),
            PollenPageResult::failure(format!("Pollen page timed out after {budget:?}")),
        )
        .await;
        Ok(result)
    }

    fn county(&self, name: &str) -> Result<&CountyEntry> {
        self.counties
            .lookup(name)
            .ok_or_else(|| AircastError::validation(format!("Unknown county '{name}'")))
    }
}
