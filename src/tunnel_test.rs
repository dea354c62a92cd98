use super::*;
use std::sync::atomic::AtomicUsize;

struct CountingProvider {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingProvider {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }
}

#[async_trait]
impl TunnelProvider for CountingProvider {
    async fn open(&self, port: u16) -> Result<PublicTunnel, TunnelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TunnelError::Api("connection refused".into()));
        }
        Ok(PublicTunnel::new(format!("https://example.test:{port}"), None))
    }
}

#[tokio::test]
async fn guard_opens_at_most_once() {
    let guard = TunnelGuard::new();
    let provider = CountingProvider::new(false);

    let first = guard.open_once(&provider, 8501).await.unwrap();
    assert_eq!(first.public_url, "https://example.test:8501");

    let second = guard.open_once(&provider, 8501).await;
    assert!(matches!(second, Err(TunnelError::AlreadyOpened)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_open_is_not_retried() {
    let guard = TunnelGuard::new();
    let provider = CountingProvider::new(true);

    assert!(guard.open_once(&provider, 1).await.is_err());
    assert!(matches!(
        guard.open_once(&provider, 1).await,
        Err(TunnelError::AlreadyOpened)
    ));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn nonfatal_open_swallows_failure() {
    let guard = TunnelGuard::new();
    let provider = CountingProvider::new(true);
    assert!(open_tunnel_nonfatal(&guard, &provider, 8501).await.is_none());
}

#[tokio::test]
async fn nonfatal_open_returns_tunnel_on_success() {
    let guard = TunnelGuard::new();
    let provider = CountingProvider::new(false);
    let tunnel = open_tunnel_nonfatal(&guard, &provider, 9000).await.unwrap();
    assert_eq!(tunnel.public_url, "https://example.test:9000");
}

#[tokio::test]
async fn ngrok_without_credential_fails_before_spawning() {
    let config = TunnelConfig {
        authtoken_env: "DIASPORA_MAP_TEST_UNSET_TOKEN".into(),
        binary: "/nonexistent/ngrok".into(),
        ..TunnelConfig::default()
    };
    let provider = NgrokTunnel::new(config).unwrap();
    let err = provider.open(8501).await.unwrap_err();
    assert!(matches!(
        err,
        TunnelError::MissingCredential { ref var } if var == "DIASPORA_MAP_TEST_UNSET_TOKEN"
    ));
}

#[test]
fn select_public_url_prefers_https() {
    let response: TunnelsResponse = serde_json::from_str(
        r#"{"tunnels": [
            {"public_url": "http://abc.ngrok.io", "proto": "http"},
            {"public_url": "https://abc.ngrok.io", "proto": "https"}
        ]}"#,
    )
    .unwrap();
    assert_eq!(select_public_url(&response).as_deref(), Some("https://abc.ngrok.io"));
}

#[test]
fn select_public_url_falls_back_and_handles_empty() {
    let response: TunnelsResponse =
        serde_json::from_str(r#"{"tunnels": [{"public_url": "tcp://0.tcp.ngrok.io:1234"}]}"#).unwrap();
    assert_eq!(select_public_url(&response).as_deref(), Some("tcp://0.tcp.ngrok.io:1234"));

    let empty: TunnelsResponse = serde_json::from_str(r#"{"tunnels": []}"#).unwrap();
    assert_eq!(select_public_url(&empty), None);
}
