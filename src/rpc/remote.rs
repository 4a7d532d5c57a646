//! HTTP-backed data endpoint.
//!
//! Lets a name node in one process drive a data service in another. A submitted
//! command is posted in the background and its ticket resolves when the remote
//! command completes; lane pushes are posted in order, one at a time.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::protocol::{
    ENDPOINT_LANE_CLEAR, ENDPOINT_LANE_IN, ENDPOINT_LANE_OUT, ENDPOINT_SUBMIT, SubmitRequest,
    SubmitResponse,
};
use crate::channel::mailbox::Ticket;
use crate::channel::types::LaneItem;
use crate::dataservice::endpoint::DataEndpoint;
use crate::dataservice::types::{DataCommand, DataReply, ServiceId};
use crate::error::{DfsError, Result};

const RETRY_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct RemoteDataService {
    id: ServiceId,
    base_url: String,
    http_client: reqwest::Client,
}

impl RemoteDataService {
    pub fn new(id: ServiceId, base_url: &str) -> Self {
        Self {
            id,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn unreachable(&self, e: impl std::fmt::Display) -> DfsError {
        DfsError::Unreachable(format!("{} ({})", self.id, e))
    }

    /// Sends the request built by `build`, retrying only failures to connect.
    ///
    /// A request that reached the server is never sent twice; lane pushes are not
    /// idempotent.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay_ms = 150u64;

        for attempt in 0..RETRY_ATTEMPTS {
            match build().send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => return Err(self.unreachable(resp.status())),
                Err(e) if e.is_connect() && attempt + 1 < RETRY_ATTEMPTS => {
                    tracing::debug!("{}: connect failed, retrying: {}", self.id, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
                Err(e) => return Err(self.unreachable(e)),
            }
        }

        Err(self.unreachable("retry attempts exhausted"))
    }
}

#[async_trait]
impl DataEndpoint for RemoteDataService {
    fn id(&self) -> &ServiceId {
        &self.id
    }

    fn storage_root(&self) -> Option<PathBuf> {
        None
    }

    async fn submit(&self, command: DataCommand) -> Result<Ticket<DataReply>> {
        let (reply, ticket) = Ticket::channel(&self.id.0);
        let this = self.clone();
        let url = format!("{}{}", self.base_url, ENDPOINT_SUBMIT);
        let payload = SubmitRequest { command };

        tokio::spawn(async move {
            let result = match this
                .send_with_retry(|| this.http_client.post(&url).json(&payload))
                .await
            {
                Ok(resp) => match resp.json::<SubmitResponse>().await {
                    Ok(body) => body.result,
                    Err(e) => Err(DfsError::Codec(e.to_string())),
                },
                Err(e) => Err(e),
            };
            let _ = reply.send(result);
        });

        Ok(ticket)
    }

    async fn push(&self, item: LaneItem) -> Result<()> {
        let body = bincode::serialize(&item)?;
        let url = format!("{}{}", self.base_url, ENDPOINT_LANE_IN);
        self.send_with_retry(|| self.http_client.post(&url).body(body.clone()))
            .await?;
        Ok(())
    }

    async fn pull(&self) -> LaneItem {
        let url = format!("{}{}", self.base_url, ENDPOINT_LANE_OUT);
        let resp = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        if !resp.status().is_success() {
            return Err(self.unreachable(resp.status()));
        }
        let bytes = resp.bytes().await.map_err(|e| self.unreachable(e))?;
        bincode::deserialize::<LaneItem>(&bytes)?
    }

    async fn clear_outbound(&self) -> Result<usize> {
        let url = format!("{}{}", self.base_url, ENDPOINT_LANE_CLEAR);
        let resp = self.send_with_retry(|| self.http_client.post(&url)).await?;
        resp.json::<usize>()
            .await
            .map_err(|e| DfsError::Codec(e.to_string()))
    }
}
