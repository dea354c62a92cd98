//! Optional public tunnel to the local dashboard.
//!
//! The tunnel agent is an external `ngrok` process; this module only starts
//! it, asks its local API for the public URL, and makes sure that happens at
//! most once. Failures are reported to the caller or logged, never fatal to
//! the dashboard itself.

use crate::config::TunnelConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

const API_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("missing tunnel credential: env var {var} not set")]
    MissingCredential { var: String },

    #[error("failed to start tunnel agent: {0}")]
    Spawn(String),

    #[error("tunnel agent API request failed: {0}")]
    Api(String),

    #[error("tunnel agent reported no public URL after {attempts} attempts")]
    NoPublicUrl { attempts: u32 },

    #[error("tunnel was already opened by this process")]
    AlreadyOpened,
}

/// A live tunnel. Dropping it stops the agent process.
#[derive(Debug)]
pub struct PublicTunnel {
    pub public_url: String,
    _agent: Option<Child>,
}

impl PublicTunnel {
    pub fn new(public_url: impl Into<String>, agent: Option<Child>) -> Self {
        Self {
            public_url: public_url.into(),
            _agent: agent,
        }
    }
}

#[async_trait]
pub trait TunnelProvider: Send + Sync {
    async fn open(&self, port: u16) -> Result<PublicTunnel, TunnelError>;
}

/// Allows a single tunnel open per guard. The flag is set before the provider
/// runs, so a failed attempt is not retried either.
#[derive(Debug, Default)]
pub struct TunnelGuard {
    opened: AtomicBool,
}

impl TunnelGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open_once(
        &self,
        provider: &dyn TunnelProvider,
        port: u16,
    ) -> Result<PublicTunnel, TunnelError> {
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(TunnelError::AlreadyOpened);
        }
        provider.open(port).await
    }
}

/// Opens the tunnel through `guard`, logging the outcome instead of
/// returning an error.
pub async fn open_tunnel_nonfatal(
    guard: &TunnelGuard,
    provider: &dyn TunnelProvider,
    port: u16,
) -> Option<PublicTunnel> {
    match guard.open_once(provider, port).await {
        Ok(tunnel) => {
            tracing::info!(public_url = %tunnel.public_url, "public tunnel open");
            Some(tunnel)
        }
        Err(e) => {
            tracing::warn!(error = %e, "public tunnel unavailable, serving locally only");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TunnelsResponse {
    pub tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct TunnelInfo {
    pub public_url: String,
    #[serde(default)]
    pub proto: String,
}

/// Prefers an https tunnel over any other.
pub fn select_public_url(response: &TunnelsResponse) -> Option<String> {
    response
        .tunnels
        .iter()
        .find(|t| t.proto == "https")
        .or_else(|| response.tunnels.first())
        .map(|t| t.public_url.clone())
}

pub struct NgrokTunnel {
    config: TunnelConfig,
    http: reqwest::Client,
}

impl NgrokTunnel {
    pub fn new(config: TunnelConfig) -> Result<Self, TunnelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .map_err(|e| TunnelError::Api(e.to_string()))?;
        Ok(Self { config, http })
    }

    async fn fetch_public_url(&self) -> Result<Option<String>, TunnelError> {
        let response = self
            .http
            .get(&self.config.api_url)
            .send()
            .await
            .map_err(|e| TunnelError::Api(e.to_string()))?
            .error_for_status()
            .map_err(|e| TunnelError::Api(e.to_string()))?;
        let tunnels: TunnelsResponse = response
            .json()
            .await
            .map_err(|e| TunnelError::Api(e.to_string()))?;
        Ok(select_public_url(&tunnels))
    }
}

#[async_trait]
impl TunnelProvider for NgrokTunnel {
    async fn open(&self, port: u16) -> Result<PublicTunnel, TunnelError> {
        let token = std::env::var(&self.config.authtoken_env).map_err(|_| TunnelError::MissingCredential {
            var: self.config.authtoken_env.clone(),
        })?;

        tracing::info!(binary = ?self.config.binary, port, "starting tunnel agent");
        let mut child = Command::new(&self.config.binary)
            .arg("http")
            .arg(port.to_string())
            .env("NGROK_AUTHTOKEN", token)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TunnelError::Spawn(e.to_string()))?;

        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for attempt in 1..=self.config.poll_attempts {
            tokio::time::sleep(interval).await;

            if let Ok(Some(status)) = child.try_wait() {
                return Err(TunnelError::Spawn(format!("agent exited early with {status}")));
            }

            match self.fetch_public_url().await {
                Ok(Some(url)) => return Ok(PublicTunnel::new(url, Some(child))),
                Ok(None) => tracing::debug!(attempt, "tunnel agent has no tunnels yet"),
                Err(e) => tracing::debug!(attempt, error = %e, "tunnel agent API not ready"),
            }
        }

        Err(TunnelError::NoPublicUrl {
            attempts: self.config.poll_attempts,
        })
    }
}

#[cfg(test)]
#[path = "tunnel_test.rs"]
mod tests;
