use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use skyhold_core::{FlightInfo, InventoryClient, InventoryError};
use std::time::Duration;
use tracing::debug;

/// HTTP client for the flight inventory service.
///
/// - `GET /flights/{flight_ref}` returns capacity and unit price
/// - `PATCH /flights/{flight_ref}/seats` with `{"delta": n}` adjusts seats
///
/// Every request carries the configured timeout; any non-2xx answer is an error.
#[derive(Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct SeatAdjustment {
    delta: i64,
}

impl HttpInventoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InventoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| InventoryError::Request(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(InventoryError::Request(format!("invalid base url {}", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Request(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn flight_url(&self, flight_ref: &str, tail: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // Base is checked in `new`, so segments are always available
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("flights").push(flight_ref);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        url
    }
}

fn send_err(e: reqwest::Error) -> InventoryError {
    if e.is_timeout() {
        InventoryError::Timeout
    } else {
        InventoryError::Request(e.to_string())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, InventoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InventoryError::Status { status: status.as_u16(), body })
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn fetch_flight(&self, flight_ref: &str) -> Result<FlightInfo, InventoryError> {
        let url = self.flight_url(flight_ref, None);
        debug!(%url, "Fetching flight from inventory");

        let response = self.client.get(url).send().await.map_err(send_err)?;
        let response = ensure_success(response).await?;

        response.json::<FlightInfo>().await.map_err(|e| {
            if e.is_timeout() {
                InventoryError::Timeout
            } else {
                InventoryError::Decode(e.to_string())
            }
        })
    }

    async fn adjust_seats(&self, flight_ref: &str, delta: i64) -> Result<(), InventoryError> {
        let url = self.flight_url(flight_ref, Some("seats"));
        debug!(%url, delta, "Adjusting inventory seats");

        let response = self
            .client
            .patch(url)
            .json(&SeatAdjustment { delta })
            .send()
            .await
            .map_err(send_err)?;
        ensure_success(response).await?;
        Ok(())
    }
}
