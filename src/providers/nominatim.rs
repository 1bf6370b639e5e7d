use super::{Candidate, GeocodeError, Geocoder};
use crate::geo::Coordinate;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Geocoder backed by a Nominatim-compatible `/search` endpoint
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct Place {
    display_name: String,
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
        limit: usize,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limit,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<Candidate>, GeocodeError> {
        tracing::debug!("Geocoding {:?} via {}", query, self.base_url);

        let limit = self.limit.to_string();
        let response = self
            .client
            .get(self.search_url())
            .query(&[("q", query), ("format", "jsonv2"), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let candidates = parse_places(&body)?;

        tracing::debug!("Geocoder returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

/// Decode a jsonv2 search body, keeping provider ranking order
fn parse_places(body: &str) -> Result<Vec<Candidate>, GeocodeError> {
    let places: Vec<Place> =
        serde_json::from_str(body).map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

    places
        .into_iter()
        .map(|place| {
            let latitude = place.lat.parse::<f64>().map_err(|_| {
                GeocodeError::InvalidResponse(format!("bad latitude {:?}", place.lat))
            })?;
            let longitude = place.lon.parse::<f64>().map_err(|_| {
                GeocodeError::InvalidResponse(format!("bad longitude {:?}", place.lon))
            })?;

            Ok(Candidate {
                display_name: place.display_name,
                coordinate: Coordinate::new(latitude, longitude),
            })
        })
        .collect()
}
