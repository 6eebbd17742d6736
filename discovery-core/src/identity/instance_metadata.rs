use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::settings::MetadataSettings;
use crate::error::{DiscoveryError, Result};
use crate::identity::{region_of_zone, SelfIdentity};
use crate::member::MemberId;

const INSTANCE_ID_PATH: &str = "latest/meta-data/instance-id";
const AVAILABILITY_ZONE_PATH: &str = "latest/meta-data/placement/availability-zone";

/// Resolves the local instance through the link-local instance metadata service.
#[derive(Debug, Clone)]
pub struct InstanceMetadata {
    endpoint: Url,
    client: reqwest::Client,
}

impl InstanceMetadata {
    pub fn new(settings: &MetadataSettings) -> Result<Self> {
        Self::with_timeout(&settings.endpoint, settings.timeout.to_std_duration())
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid metadata endpoint {}", endpoint))
            .map_err(DiscoveryError::IdentityUnavailable)?;
        // joined paths must stay below the configured prefix
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|error| DiscoveryError::IdentityUnavailable(error.into()))?;
        Ok(Self { endpoint, client })
    }

    async fn get_first_line(&self, path: &str) -> anyhow::Result<String> {
        let url = self.endpoint.join(path)?;
        debug!("query instance metadata {}", url);
        let body = self.client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let line = body.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return Err(anyhow!("empty metadata response from {}", url));
        }
        Ok(line.to_string())
    }

    pub async fn availability_zone(&self) -> Result<String> {
        self.get_first_line(AVAILABILITY_ZONE_PATH)
            .await
            .map_err(DiscoveryError::IdentityUnavailable)
    }
}

#[async_trait]
impl SelfIdentity for InstanceMetadata {
    async fn resolve_self_id(&self) -> Result<MemberId> {
        let id = self.get_first_line(INSTANCE_ID_PATH)
            .await
            .map_err(DiscoveryError::IdentityUnavailable)?;
        Ok(MemberId::from(id))
    }

    async fn resolve_region(&self) -> Result<String> {
        let zone = self.availability_zone().await?;
        region_of_zone(&zone)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::error::DiscoveryError;
    use crate::identity::instance_metadata::InstanceMetadata;
    use crate::identity::SelfIdentity;
    use crate::member::MemberId;

    async fn serve(routes: HashMap<&'static str, &'static str>) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut len = 0;
                    while !String::from_utf8_lossy(&buf[..len]).contains("\r\n\r\n") {
                        match stream.read(&mut buf[len..]).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => len += n,
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..len]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let response = match routes.get(path.as_str()) {
                        Some(body) => format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}", body.len(), body),
                        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        Ok(addr)
    }

    #[tokio::test]
    async fn test_resolve_identity() -> anyhow::Result<()> {
        let routes = HashMap::from([
            ("/latest/meta-data/instance-id", "i-0abc\n"),
            ("/latest/meta-data/placement/availability-zone", "eu-west-1b"),
        ]);
        let addr = serve(routes).await?;
        let metadata = InstanceMetadata::with_timeout(&format!("http://{}", addr), Duration::from_millis(1500))?;
        assert_eq!(metadata.resolve_self_id().await?, MemberId::from("i-0abc"));
        assert_eq!(metadata.availability_zone().await?, "eu-west-1b");
        assert_eq!(metadata.resolve_region().await?, "eu-west-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_endpoint_path_is_kept() -> anyhow::Result<()> {
        let routes = HashMap::from([("/proxy/latest/meta-data/instance-id", "i-0proxied")]);
        let addr = serve(routes).await?;
        for endpoint in [format!("http://{}/proxy", addr), format!("http://{}/proxy/", addr)] {
            let metadata = InstanceMetadata::with_timeout(&endpoint, Duration::from_millis(1500))?;
            assert_eq!(metadata.resolve_self_id().await?, MemberId::from("i-0proxied"));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_or_empty_metadata() -> anyhow::Result<()> {
        let routes = HashMap::from([("/latest/meta-data/instance-id", "")]);
        let addr = serve(routes).await?;
        let metadata = InstanceMetadata::with_timeout(&format!("http://{}", addr), Duration::from_millis(1500))?;
        let error = metadata.resolve_self_id().await.unwrap_err();
        assert!(matches!(error, DiscoveryError::IdentityUnavailable(_)));
        let error = metadata.resolve_region().await.unwrap_err();
        assert!(matches!(error, DiscoveryError::IdentityUnavailable(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unresponsive_metadata_times_out() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let _silent = tokio::spawn(async move {
            let mut held = vec![];
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        let metadata = InstanceMetadata::with_timeout(&format!("http://{}", addr), Duration::from_millis(200))?;
        let started = tokio::time::Instant::now();
        let error = metadata.resolve_self_id().await.unwrap_err();
        assert!(matches!(error, DiscoveryError::IdentityUnavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }
}
