// services/payments-dash/src/api.rs
//
// HTTP client for the read-only payments endpoint

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use reqwest::Url;
use svckit::{DashError, Payment, Result};
use tracing::{debug, info, warn};

use crate::fetcher::{PaymentsBackend, QueryKey};

pub const PAYMENTS_PATH: &str = "/api/payments";

/// Reachability of the endpoint as of the last finished request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// No request has finished yet
    Unknown,
    Connected,
    Disconnected,
}

impl Connection {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Connection::Connected,
            2 => Connection::Disconnected,
            _ => Connection::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Connection::Unknown => 0,
            Connection::Connected => 1,
            Connection::Disconnected => 2,
        }
    }
}

pub struct PaymentsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    connection: AtomicU8,
}

impl PaymentsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            connection: AtomicU8::new(Connection::Unknown.as_u8()),
        })
    }

    /// `{base}/api/payments?{params}`; with no filters the query is empty but present.
    pub fn request_url(&self, key: &QueryKey) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, PAYMENTS_PATH))
            .map_err(|e| DashError::Config(format!("invalid endpoint {}: {}", self.base_url, e)))?;

        url.query_pairs_mut().extend_pairs(key.query_pairs());
        Ok(url)
    }

    pub fn connection(&self) -> Connection {
        Connection::from_u8(self.connection.load(Ordering::Relaxed))
    }

    fn set_connection(&self, next: Connection) -> Connection {
        Connection::from_u8(self.connection.swap(next.as_u8(), Ordering::Relaxed))
    }
}

impl PaymentsBackend for PaymentsClient {
    fn fetch(&self, key: &QueryKey) -> Result<Vec<Payment>> {
        let url = self.request_url(key)?;
        debug!("GET {}", url);

        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                if self.set_connection(Connection::Disconnected) != Connection::Disconnected {
                    warn!("Cannot reach {}: {}", self.base_url, e);
                }
                return Err(DashError::Network(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.set_connection(Connection::Disconnected);
            return Err(DashError::Http(status.as_u16()));
        }
        if self.set_connection(Connection::Connected) != Connection::Connected {
            info!("Connected to {}", self.base_url);
        }

        let body = response
            .text()
            .map_err(|e| DashError::Network(e.to_string()))?;
        let payments: Vec<Payment> = serde_json::from_str(&body)?;
        Ok(payments)
    }
}
