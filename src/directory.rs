use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum DirectoryError {
    /// Connection failure, timeout, or a client that could not be built.
    Transport(String),
    /// The service answered with a non-success status.
    Status(u16),
    Decode(String),
    Offline,
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Transport(e) => write!(f, "directory transport error: {e}"),
            DirectoryError::Status(code) => write!(f, "directory returned status {code}"),
            DirectoryError::Decode(e) => write!(f, "directory response not understood: {e}"),
            DirectoryError::Offline => write!(f, "no directory service configured"),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<reqwest::Error> for DirectoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DirectoryError::Decode(e.to_string())
        } else {
            DirectoryError::Transport(e.to_string())
        }
    }
}

/// External system of record for vehicle registrations, consulted opportunistically.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Any failure, timeouts included, reads as unreachable.
    async fn health(&self) -> bool;

    async fn list_vehicles(&self) -> Result<Vec<String>, DirectoryError>;

    /// Returns whether the directory accepted the plate.
    async fn register_vehicle(&self, plate: &str) -> Result<bool, DirectoryError>;
}

/// Shared "is the directory reachable" flag. Written by the health poller, read by everyone.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStatus {
    reachable: Arc<AtomicBool>,
}

impl DirectoryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Store the new value, returning the previous one.
    pub fn set(&self, reachable: bool) -> bool {
        let previous = self.reachable.swap(reachable, Ordering::AcqRel);
        metrics::gauge!(crate::observability::DIRECTORY_REACHABLE).set(if reachable { 1.0 } else { 0.0 });
        previous
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDto {
    #[serde(rename = "licensePlate")]
    pub license_plate: String,
}

/// Directory reached over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    async fn health(&self) -> bool {
        match self.client.get(self.url("/api/vehicles/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("directory health check failed: {e}");
                false
            }
        }
    }

    async fn list_vehicles(&self) -> Result<Vec<String>, DirectoryError> {
        let response = self.client.get(self.url("/api/vehicles")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }
        let vehicles: Vec<VehicleDto> = response.json().await?;
        Ok(vehicles.into_iter().map(|v| v.license_plate).collect())
    }

    async fn register_vehicle(&self, plate: &str) -> Result<bool, DirectoryError> {
        let response = self
            .client
            .post(self.url("/api/vehicles"))
            // Form-encoded: a space goes out as `+`, not `%20`.
            .query(&[("licensePlate", plate)])
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

/// Stand-in when no directory is configured: never reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDirectory;

#[async_trait]
impl DirectoryService for OfflineDirectory {
    async fn health(&self) -> bool {
        false
    }

    async fn list_vehicles(&self) -> Result<Vec<String>, DirectoryError> {
        Err(DirectoryError::Offline)
    }

    async fn register_vehicle(&self, _plate: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer exactly one HTTP request with a canned response. The handle
    /// yields the request line that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let request = String::from_utf8_lossy(&request).into_owned();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    fn client(base: &str) -> HttpDirectory {
        HttpDirectory::new(base, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn vehicle_list_decodes_camel_case() {
        let body = r#"[{"licensePlate":"DL01AB1234"},{"licensePlate":"mh12cd5678","id":7}]"#;
        let vehicles: Vec<VehicleDto> = serde_json::from_str(body).unwrap();
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[1].license_plate, "mh12cd5678");
    }

    #[test]
    fn status_flag_shared_between_clones() {
        let status = DirectoryStatus::new();
        let reader = status.clone();
        assert!(!reader.is_reachable());

        assert!(!status.set(true));
        assert!(reader.is_reachable());
        assert!(status.set(false));
        assert!(!reader.is_reachable());
    }

    #[test]
    fn http_directory_trims_trailing_slash() {
        let dir = HttpDirectory::new("http://127.0.0.1:9/", Duration::from_millis(50)).unwrap();
        assert_eq!(dir.url("/api/vehicles"), "http://127.0.0.1:9/api/vehicles");
    }

    #[tokio::test]
    async fn unreachable_http_directory_reports_unhealthy() {
        // Port 9 (discard) is closed on test machines; the connect fails fast.
        let dir = HttpDirectory::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(!dir.health().await);
        assert!(dir.list_vehicles().await.is_err());
    }

    // ── Wire contract ────────────────────────────────────────────

    #[tokio::test]
    async fn health_probes_health_endpoint() {
        let (base, server) = serve_once("200 OK", "{}").await;
        assert!(client(&base).health().await);
        assert_eq!(server.await.unwrap(), "GET /api/vehicles/health HTTP/1.1");
    }

    #[tokio::test]
    async fn list_vehicles_decodes_plates() {
        let (base, server) = serve_once("200 OK", r#"[{"licensePlate":"abc"},{"licensePlate":"KA05EF9012"}]"#).await;
        let plates = client(&base).list_vehicles().await.unwrap();
        assert_eq!(plates, vec!["abc", "KA05EF9012"]);
        assert_eq!(server.await.unwrap(), "GET /api/vehicles HTTP/1.1");
    }

    #[tokio::test]
    async fn list_vehicles_maps_error_status() {
        let (base, server) = serve_once("503 Service Unavailable", "").await;
        let result = client(&base).list_vehicles().await;
        assert!(matches!(result, Err(DirectoryError::Status(503))), "got {result:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn register_posts_plate_as_query() {
        let (base, server) = serve_once("201 Created", "{}").await;
        assert!(client(&base).register_vehicle("AB 12&").await.unwrap());
        // Form encoding: space becomes `+`, reserved characters are escaped.
        assert_eq!(
            server.await.unwrap(),
            "POST /api/vehicles?licensePlate=AB+12%26 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn register_reports_rejection() {
        let (base, server) = serve_once("409 Conflict", "").await;
        assert!(!client(&base).register_vehicle("DL01AB1234").await.unwrap());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn offline_directory_never_reachable() {
        let dir = OfflineDirectory;
        assert!(!dir.health().await);
        assert!(matches!(dir.list_vehicles().await, Err(DirectoryError::Offline)));
        assert!(dir.register_vehicle("ABC").await.is_err());
    }
}
