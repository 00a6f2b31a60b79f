use crate::config::Config;
use crate::errors::AppError;
use crate::models::{PlaceCandidate, SearchTextRequest, SearchTextResponse};
use reqwest::Client;

const SEARCH_FIELD_MASK: &str =
    "places.id,places.displayName,places.formattedAddress,places.location";
const DETAILS_FIELD_MASK: &str =
    "id,displayName,formattedAddress,nationalPhoneNumber,websiteUri,types,addressComponents";

/// Client for the places provider (text search and place details).
///
/// Both calls return `ProviderError` on transport failure or a non-2xx status. The
/// importer decides how to degrade; nothing here retries.
#[derive(Clone)]
pub struct PlacesService {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl PlacesService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.provider_timeout())
            .build()
            .map_err(|e| {
                AppError::ProviderError(format!("Failed to create places client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.places_base_url.trim_end_matches('/').to_string(),
            api_key: config.google_maps_api_key.clone(),
            language: config.places_language.clone(),
        })
    }

    /// Text search for `"<query> in <location>"`, most relevant first.
    pub async fn search_places(
        &self,
        query: &str,
        location: &str,
    ) -> Result<Vec<PlaceCandidate>, AppError> {
        let url = format!("{}/places:searchText", self.base_url);
        let body = SearchTextRequest {
            text_query: format!("{} in {}", query, location),
            language_code: &self.language,
        };

        tracing::info!("Searching places for '{}'", body.text_query);

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ProviderError(format!("Places search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Places search returned error {}: {}", status, error_text);
            return Err(AppError::ProviderError(format!(
                "Places search returned status {}: {}",
                status, error_text
            )));
        }

        let result: SearchTextResponse = response.json().await.map_err(|e| {
            AppError::ProviderError(format!("Failed to parse places search response: {}", e))
        })?;

        tracing::info!(
            "📍 {} places found for '{} in {}'",
            result.places.len(),
            query,
            location
        );
        Ok(result.places)
    }

    /// Fetches the detail record for one place id.
    pub async fn get_place_details(&self, place_id: &str) -> Result<PlaceCandidate, AppError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AppError::ProviderError(format!("Failed to build URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::ProviderError(format!("Base URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("places")
            .push(place_id);

        tracing::debug!("Fetching place details for {}", place_id);

        let response = self
            .client
            .get(url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(|e| {
                AppError::ProviderError(format!(
                    "Place details request for {} failed: {}",
                    place_id, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ProviderError(format!(
                "Place details for {} returned status {}",
                place_id, status
            )));
        }

        let details: PlaceCandidate = response.json().await.map_err(|e| {
            AppError::ProviderError(format!(
                "Failed to parse place details for {}: {}",
                place_id, e
            ))
        })?;

        Ok(details)
    }
}
