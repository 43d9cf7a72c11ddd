use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::AgentClient;
use crate::error::AgentError;
use crate::types::{
    BackupVolumeRequest, BackupVolumeResponse, CreateContainerRequest, CreateContainerResponse,
    CreateVolumeRequest, DkgFinalizeRequest, DkgFinalizeResponse, DkgInitRequest, DkgInitResponse,
    LeaderChangeRequest, PeerUpdateRequest, RestoreVolumeRequest,
};

/// Real node-agent client, backed by `reqwest` paired with `tokio` for
/// outbound HTTP.
pub struct HttpAgentClient {
    http: reqwest::Client,
    default_timeout: Duration,
    retry_count: u32,
}

impl HttpAgentClient {
    #[must_use]
    pub fn new(default_timeout: Duration, retry_count: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            default_timeout,
            retry_count,
        }
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Resp, AgentError> {
        let mut attempt = 0;
        loop {
            let result = self
                .http
                .post(url)
                .timeout(self.default_timeout)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.json::<Resp>().await.map_err(|source| AgentError::Decode {
                        endpoint: url.to_string(),
                        reason: source.to_string(),
                    });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if (400..500).contains(&status) || attempt >= self.retry_count {
                        return Err(AgentError::Rejected {
                            endpoint: url.to_string(),
                            status,
                            body,
                        });
                    }
                }
                Err(source) if source.is_timeout() => {
                    if attempt >= self.retry_count {
                        return Err(AgentError::Timeout {
                            endpoint: url.to_string(),
                        });
                    }
                }
                Err(source) => {
                    if attempt >= self.retry_count {
                        return Err(AgentError::Transport {
                            endpoint: url.to_string(),
                            source,
                        });
                    }
                }
            }
            attempt += 1;
        }
    }

    /// Posts `body` and only checks the status code; used for endpoints in
    /// the node-agent contract that return a bare 2xx with no payload.
    async fn post_status_only<Req: Serialize + ?Sized>(&self, url: &str, body: &Req) -> Result<(), AgentError> {
        let mut attempt = 0;
        loop {
            let result = self.http.post(url).timeout(self.default_timeout).json(body).send().await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if (400..500).contains(&status) || attempt >= self.retry_count {
                        return Err(AgentError::Rejected {
                            endpoint: url.to_string(),
                            status,
                            body,
                        });
                    }
                }
                Err(source) if source.is_timeout() => {
                    if attempt >= self.retry_count {
                        return Err(AgentError::Timeout {
                            endpoint: url.to_string(),
                        });
                    }
                }
                Err(source) => {
                    if attempt >= self.retry_count {
                        return Err(AgentError::Transport {
                            endpoint: url.to_string(),
                            source,
                        });
                    }
                }
            }
            attempt += 1;
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn create_volume(&self, endpoint: &str, req: CreateVolumeRequest) -> Result<(), AgentError> {
        self.post_status_only(&format!("{endpoint}/v1/volumes/create"), &req).await
    }

    async fn backup_volume(
        &self,
        endpoint: &str,
        req: BackupVolumeRequest,
    ) -> Result<BackupVolumeResponse, AgentError> {
        self.post_json(&format!("{endpoint}/v1/volumes/backup"), &req).await
    }

    async fn restore_volume(&self, endpoint: &str, req: RestoreVolumeRequest) -> Result<(), AgentError> {
        self.post_status_only(&format!("{endpoint}/v1/volumes/restore"), &req).await
    }

    async fn create_container(
        &self,
        endpoint: &str,
        req: CreateContainerRequest,
    ) -> Result<CreateContainerResponse, AgentError> {
        self.post_json(&format!("{endpoint}/v1/containers/create"), &req).await
    }

    async fn stop_container(&self, endpoint: &str, instance_id: &str) -> Result<(), AgentError> {
        let url = format!("{endpoint}/v1/containers/{instance_id}/stop");
        let response = self
            .http
            .post(&url)
            .timeout(self.default_timeout)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                endpoint: url.clone(),
                source,
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AgentError::Rejected {
                endpoint: url,
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn leader_change(&self, endpoint: &str, req: LeaderChangeRequest) -> Result<(), AgentError> {
        self.post_status_only(&format!("{endpoint}/consensus/leader-change"), &req).await
    }

    async fn peer_update(&self, endpoint: &str, req: PeerUpdateRequest) -> Result<(), AgentError> {
        self.post_status_only(&format!("{endpoint}/consensus/peer-update"), &req).await
    }

    async fn dkg_init(&self, endpoint: &str, req: DkgInitRequest) -> Result<DkgInitResponse, AgentError> {
        self.post_json(&format!("{endpoint}/mpc/dkg/init"), &req).await
    }

    async fn dkg_finalize(
        &self,
        endpoint: &str,
        req: DkgFinalizeRequest,
    ) -> Result<DkgFinalizeResponse, AgentError> {
        self.post_json(&format!("{endpoint}/mpc/dkg/finalize"), &req).await
    }

    async fn probe(&self, endpoint: &str, path: &str, timeout: Duration) -> Result<bool, AgentError> {
        let url = format!("{endpoint}{path}");
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(source) if source.is_timeout() => Ok(false),
            Err(source) => Err(AgentError::Transport { endpoint: url, source }),
        }
    }
}
