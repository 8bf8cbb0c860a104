use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AircastError,
    cluster::Cluster,
    config::CountyEntry,
    dashboard::Dashboard,
    models::{AirQualitySummary, CountyMarker, PollenPageResult},
};

pub type AppState = Arc<Dashboard>;

#[derive(Serialize, Deserialize)]
pub struct ApiCounty {
    pub name: String,
    pub state: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub slug: String,
}

impl From<&CountyEntry> for ApiCounty {
    fn from(entry: &CountyEntry) -> Self {
        Self {
            name: entry.name.clone(),
            state: entry.state.clone(),
            country: entry.country.clone(),
            latitude: entry.latitude,
            longitude: entry.longitude,
            slug: entry.slug(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub county: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub zoom: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct PollenQuery {
    pub county: String,
}

/// Uniform `{success:false, error, timestamp}` error body
pub struct ApiError(AircastError);

impl From<AircastError> for ApiError {
    fn from(err: AircastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        tracing::warn!("Request failed: {}", self.0);
        let body = json!({
            "success": false,
            "error": self.0.user_message(),
            "timestamp": Utc::now(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(dashboard: AppState) -> Router {
    Router::new()
        .route("/counties", get(get_counties))
        .route("/summary", get(get_summary))
        .route("/markers", get(get_markers))
        .route("/clusters", get(get_clusters))
        .route("/pollen", get(get_pollen))
        .with_state(dashboard)
}

async fn get_counties(State(dashboard): State<AppState>) -> Json<Vec<ApiCounty>> {
    Json(
        dashboard
            .counties()
            .entries()
            .iter()
            .map(ApiCounty::from)
            .collect(),
    )
}

async fn get_summary(
    State(dashboard): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AirQualitySummary>, ApiError> {
    let summary = match (query.county, query.lat, query.lon) {
        (Some(county), _, _) => dashboard.summary_for_county(&county).await?,
        (None, Some(lat), Some(lon)) => dashboard.summary_for_coordinates(lat, lon).await?,
        _ => {
            return Err(AircastError::validation(
                "Provide either county or both lat and lon",
            )
            .into());
        }
    };
    Ok(Json(summary))
}

async fn get_markers(State(dashboard): State<AppState>) -> Json<Vec<CountyMarker>> {
    Json(dashboard.county_markers().await)
}

async fn get_clusters(
    State(dashboard): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Json<Vec<Cluster<CountyMarker>>> {
    let zoom = query.zoom.unwrap_or(dashboard.config().map.cluster_max_zoom);
    let markers = dashboard.county_markers().await;
    Json(dashboard.clusters(&markers, zoom))
}

async fn get_pollen(
    State(dashboard): State<AppState>,
    Query(query): Query<PollenQuery>,
) -> Result<Json<PollenPageResult>, ApiError> {
    Ok(Json(dashboard.pollen_card(&query.county).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_county_carries_slug() {
        let entry = CountyEntry {
            name: "Contra Costa".to_string(),
            state: "CA".to_string(),
            country: "US".to_string(),
            latitude: 37.9,
            longitude: -121.9,
        };
        let api = ApiCounty::from(&entry);
        assert_eq!(api.slug, "contra-costa");
        assert_eq!(api.name, "Contra Costa");
    }

    #[test]
    fn test_error_status_codes() {
        let response = ApiError::from(AircastError::validation("bad")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(AircastError::api("down")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
