//! Address search against a Nominatim-compatible geocoding service.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, RemoteError, Result};
use crate::models::location::{BoundingBox, Coordinates};

const MAX_CANDIDATES: &str = "5";
const MAX_QUERY_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Found {
        coordinates: Coordinates,
        display_name: String,
    },
    /// Nothing usable; `hint` is a message for the user.
    NotFound { hint: String },
}

impl GeocodeOutcome {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            GeocodeOutcome::Found { coordinates, .. } => Some(*coordinates),
            GeocodeOutcome::NotFound { .. } => None,
        }
    }
}

pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
    country_name: String,
    country_code: String,
    region: BoundingBox,
}

impl Geocoder {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        country_name: impl Into<String>,
        country_code: impl Into<String>,
        region: BoundingBox,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(RemoteError::from)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            country_name: country_name.into(),
            country_code: country_code.into(),
            region,
        })
    }

    /// Appends the country unless the query already names it.
    pub fn qualify(&self, query: &str) -> String {
        let query = query.trim();
        if query
            .to_lowercase()
            .contains(&self.country_name.to_lowercase())
        {
            query.to_string()
        } else {
            format!("{query}, {}", self.country_name)
        }
    }

    /// Resolves `query` to coordinates inside the configured region.
    ///
    /// An empty result set is `Ok(NotFound)`; transport and service failures
    /// are `Err(AppError::Network)` so the caller can tell them apart.
    pub async fn geocode_address(&self, query: &str) -> Result<GeocodeOutcome> {
        check_query(query)?;

        let qualified = self.qualify(query);
        info!("[GEOCODE] Searching '{}'", qualified);
        let places = self.search(&qualified).await.map_err(|err| {
            warn!("[GEOCODE] Search for '{}' failed: {}", qualified, err);
            AppError::Network(err)
        })?;
        Ok(resolve(query, &places, &self.region))
    }

    async fn search(&self, qualified: &str) -> std::result::Result<Vec<Place>, RemoteError> {
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("format", "json"),
                ("q", qualified),
                ("countrycodes", self.country_code.as_str()),
                ("limit", MAX_CANDIDATES),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp.json().await?)
    }
}

fn check_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(AppError::validation("query", "enter an address to search"));
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(AppError::validation(
            "query",
            format!("address is too long (max {MAX_QUERY_LEN} characters)"),
        ));
    }
    Ok(())
}

/// Picks the first candidate; empty or out-of-region results become `NotFound`.
pub fn resolve(query: &str, places: &[Place], region: &BoundingBox) -> GeocodeOutcome {
    let Some(first) = places.first() else {
        return GeocodeOutcome::NotFound {
            hint: format!(
                "No results for \"{}\". Try broader terms such as the district, canton or province.",
                query.trim()
            ),
        };
    };

    let coordinates = match (first.lat.trim().parse::<f64>(), first.lon.trim().parse::<f64>()) {
        (Ok(lat), Ok(lng)) => Coordinates::new(lat, lng),
        _ => {
            warn!("[GEOCODE] Unparseable coordinates '{}', '{}'", first.lat, first.lon);
            return GeocodeOutcome::NotFound {
                hint: "The search service returned an unreadable location. Try a different address.".to_string(),
            };
        }
    };

    if !region.contains(coordinates) {
        return GeocodeOutcome::NotFound {
            hint: format!(
                "\"{}\" is outside the supported area. Search for a place within the country.",
                query.trim()
            ),
        };
    }

    GeocodeOutcome::Found {
        coordinates,
        display_name: first.display_name.clone(),
    }
}
