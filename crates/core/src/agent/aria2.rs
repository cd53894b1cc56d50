//! aria2 JSON-RPC client.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::AgentConfig;

use super::{AgentError, AgentFile, AgentJobState, DownloadAgent, JobHandle, JobStatus};

/// Hand-overs followed in one lookup (magnet metadata -> payload).
const MAX_FOLLOW: usize = 4;

/// Attempts to drop a stopped result; `forceRemove` completes asynchronously.
const RESULT_REMOVAL_ATTEMPTS: usize = 5;

const METADATA_PREFIX: &str = "[METADATA]";

/// aria2 client implementation.
pub struct Aria2Client {
    client: Client,
    config: AgentConfig,
}

impl Aria2Client {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| AgentError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Positional params with the secret token first when one is configured.
    fn params(&self, args: Vec<Value>) -> Vec<Value> {
        if self.config.secret.is_empty() {
            args
        } else {
            let mut params = Vec::with_capacity(args.len() + 1);
            params.push(json!(format!("token:{}", self.config.secret)));
            params.extend(args);
            params
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, AgentError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": self.params(args),
        });

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(AgentError::from_reqwest)?;

        // aria2 reports RPC errors with a 4xx/5xx status and a JSON body
        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AgentError::ParseError(format!("{}: {}", method, e)))?;

        body.into_result()
    }

    async fn tell_status(&self, gid: &str) -> Result<RawStatus, AgentError> {
        self.call("aria2.tellStatus", vec![json!(gid)])
            .await
            .map_err(|e| not_found_for(e, gid))
    }

    async fn remove_result(&self, gid: &str) {
        for attempt in 1..=RESULT_REMOVAL_ATTEMPTS {
            match self
                .call::<String>("aria2.removeDownloadResult", vec![json!(gid)])
                .await
            {
                Ok(_) => return,
                Err(e) if attempt == RESULT_REMOVAL_ATTEMPTS => {
                    debug!(gid = %gid, error = %e, "Could not remove download result");
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(200)).await,
            }
        }
    }
}

#[async_trait]
impl DownloadAgent for Aria2Client {
    fn name(&self) -> &str {
        "aria2"
    }

    async fn add_magnet(&self, magnet_uri: &str) -> Result<JobHandle, AgentError> {
        let gid: String = self
            .call("aria2.addUri", vec![json!([magnet_uri])])
            .await?;

        let name = magnet_display_name(magnet_uri).unwrap_or_else(|| gid.clone());
        debug!(gid = %gid, name = %name, "Magnet added to aria2");

        Ok(JobHandle {
            external_id: gid,
            name,
        })
    }

    async fn get_job(&self, external_id: &str) -> Result<JobStatus, AgentError> {
        let mut gid = external_id.to_string();
        let mut raw = self.tell_status(&gid).await?;

        for _ in 0..MAX_FOLLOW {
            let Some(next) = raw.followed_by.last().cloned() else {
                break;
            };
            debug!(from = %gid, to = %next, "Following aria2 hand-over");
            gid = next;
            raw = self.tell_status(&gid).await?;
        }

        Ok(raw.into())
    }

    async fn remove_job(&self, external_id: &str, delete_files: bool) -> Result<(), AgentError> {
        let raw = self.tell_status(external_id).await?;
        let state = AgentJobState::parse(&raw.status);

        if matches!(
            state,
            AgentJobState::Active | AgentJobState::Waiting | AgentJobState::Paused
        ) {
            self.call::<String>("aria2.forceRemove", vec![json!(external_id)])
                .await
                .map_err(|e| not_found_for(e, external_id))?;
        }

        self.remove_result(external_id).await;
        if let Some(parent) = raw.following.as_deref().filter(|p| !p.is_empty()) {
            self.remove_result(parent).await;
        }

        if delete_files {
            let dir = raw.dir.as_deref().map(Path::new);
            let files: Vec<PathBuf> = raw
                .files
                .iter()
                .filter(|f| !f.path.is_empty() && !f.path.starts_with(METADATA_PREFIX))
                .map(|f| PathBuf::from(&f.path))
                .collect();
            let name = raw
                .bittorrent
                .as_ref()
                .and_then(|b| b.info.as_ref())
                .and_then(|i| i.name.as_deref());

            delete_job_files(dir, name, &files).await?;
        }

        debug!(gid = %external_id, delete_files = delete_files, "Removed aria2 job");
        Ok(())
    }
}

/// Map aria2's "GID ... is not found" error to [`AgentError::JobNotFound`].
fn not_found_for(e: AgentError, gid: &str) -> AgentError {
    match e {
        AgentError::Rpc { ref message, .. } if message.contains("is not found") => {
            AgentError::JobNotFound(gid.to_string())
        }
        other => other,
    }
}

/// `dn` parameter of a magnet URI, if present.
pub fn magnet_display_name(magnet_uri: &str) -> Option<String> {
    let query = magnet_uri.strip_prefix("magnet:?")?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "dn")
        .and_then(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(|name| name.into_owned())
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

async fn remove_file_if_exists(path: &Path) -> Result<(), AgentError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AgentError::Io(format!("{}: {}", path.display(), e))),
    }
}

/// Delete a job's files, their `.aria2` control files, and the torrent's
/// top-level directories under `dir`. `dir` itself is never removed.
pub async fn delete_job_files(
    dir: Option<&Path>,
    name: Option<&str>,
    files: &[PathBuf],
) -> Result<(), AgentError> {
    for file in files {
        remove_file_if_exists(file).await?;
        let mut control = file.clone().into_os_string();
        control.push(".aria2");
        remove_file_if_exists(Path::new(&control)).await?;
    }

    let Some(dir) = dir else {
        return Ok(());
    };

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        remove_file_if_exists(&dir.join(format!("{}.aria2", name))).await?;
    }

    let roots: BTreeSet<PathBuf> = files
        .iter()
        .filter_map(|f| f.strip_prefix(dir).ok())
        .filter(|rel| rel.components().count() > 1)
        .filter_map(|rel| rel.components().next())
        .map(|first| dir.join(first))
        .collect();

    for root in roots {
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Failed to remove download directory");
                return Err(AgentError::Io(format!("{}: {}", root.display(), e)));
            }
        }
    }

    Ok(())
}

// ============================================================================
// aria2 API response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<T, AgentError> {
        if let Some(err) = self.error {
            return Err(AgentError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| AgentError::ParseError("response has no result".to_string()))
    }
}

/// `tellStatus` reply. aria2 encodes every number as a string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    gid: String,
    status: String,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    num_seeders: Option<String>,
    /// `"true"` once a torrent has every piece and is seeding.
    #[serde(default)]
    seeder: Option<String>,
    #[serde(default)]
    followed_by: Vec<String>,
    #[serde(default)]
    following: Option<String>,
    #[serde(default)]
    dir: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    bittorrent: Option<RawBittorrent>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    path: String,
    #[serde(default)]
    length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    selected: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBittorrent {
    info: Option<RawInfo>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    name: Option<String>,
}

fn number(s: &str) -> u64 {
    s.parse().unwrap_or(0)
}

impl From<RawStatus> for JobStatus {
    fn from(raw: RawStatus) -> Self {
        let state = AgentJobState::parse(&raw.status);
        let total_length = number(&raw.total_length);
        let completed_length = number(&raw.completed_length);
        let download_speed = number(&raw.download_speed);

        // A finished torrent keeps seeding as "active" until the seed ratio is met
        let is_metadata = raw
            .files
            .iter()
            .any(|f| f.path.starts_with(METADATA_PREFIX));
        let is_complete = state == AgentJobState::Complete
            || (state == AgentJobState::Active
                && (raw.seeder.as_deref() == Some("true")
                    || (!is_metadata && total_length > 0 && completed_length == total_length)));

        let files: Vec<AgentFile> = raw
            .files
            .into_iter()
            .filter(|f| f.selected.as_deref() != Some("false"))
            .filter(|f| !f.path.is_empty() && !f.path.starts_with(METADATA_PREFIX))
            .map(|f| AgentFile {
                path: PathBuf::from(f.path),
                length: number(&f.length),
                completed_length: number(&f.completed_length),
            })
            .collect();

        let name = raw
            .bittorrent
            .and_then(|b| b.info)
            .and_then(|i| i.name)
            .filter(|n| !n.is_empty())
            .or_else(|| {
                files
                    .first()
                    .and_then(|f| f.path.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| raw.gid.clone());

        let progress_percent = if total_length > 0 {
            completed_length as f64 / total_length as f64 * 100.0
        } else {
            0.0
        };

        let eta_secs = if download_speed > 0 && total_length > 0 {
            Some(total_length.saturating_sub(completed_length) / download_speed)
        } else {
            None
        };

        JobStatus {
            external_id: raw.gid,
            name,
            state,
            is_complete,
            progress_percent,
            total_length,
            completed_length,
            download_speed,
            seeders: raw.num_seeders.as_deref().map(number).unwrap_or(0) as u32,
            eta_secs,
            files,
            error_message: raw.error_message.filter(|m| !m.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: &str = r#"{
        "id": "1",
        "jsonrpc": "2.0",
        "result": {
            "gid": "2089b05ecca3d829",
            "status": "active",
            "totalLength": "1000",
            "completedLength": "250",
            "downloadSpeed": "50",
            "numSeeders": "7",
            "dir": "/downloads",
            "files": [
                { "index": "1", "path": "/downloads/Show/Show - 01.mkv", "length": "600", "completedLength": "150", "selected": "true" },
                { "index": "2", "path": "/downloads/Show/extras.txt", "length": "400", "completedLength": "100", "selected": "false" }
            ],
            "bittorrent": { "info": { "name": "Show" } }
        }
    }"#;

    #[test]
    fn test_parse_active_status() {
        let response: RpcResponse<RawStatus> = serde_json::from_str(ACTIVE).unwrap();
        let status: JobStatus = response.into_result().unwrap().into();

        assert_eq!(status.external_id, "2089b05ecca3d829");
        assert_eq!(status.name, "Show");
        assert_eq!(status.state, AgentJobState::Active);
        assert!(!status.is_complete);
        assert_eq!(status.progress_percent, 25.0);
        assert_eq!(status.seeders, 7);
        assert_eq!(status.eta_secs, Some(15));
        assert_eq!(status.files.len(), 1);
        assert_eq!(status.files[0].path, PathBuf::from("/downloads/Show/Show - 01.mkv"));
        assert_eq!(status.files[0].length, 600);
    }

    #[test]
    fn test_parse_metadata_status() {
        let json = r#"{
            "result": {
                "gid": "aaaa",
                "status": "complete",
                "totalLength": "0",
                "completedLength": "0",
                "downloadSpeed": "0",
                "followedBy": ["bbbb"],
                "files": [{ "path": "[METADATA]abcdef", "length": "0", "completedLength": "0" }]
            }
        }"#;
        let response: RpcResponse<RawStatus> = serde_json::from_str(json).unwrap();
        let raw = response.into_result().unwrap();
        assert_eq!(raw.followed_by, vec!["bbbb"]);

        let status: JobStatus = raw.into();
        assert!(status.files.is_empty());
        assert_eq!(status.name, "aaaa");
        assert_eq!(status.eta_secs, None);
        assert_eq!(status.progress_percent, 0.0);
    }

    #[test]
    fn test_seeding_counts_as_complete() {
        let json = r#"{
            "result": {
                "gid": "cccc",
                "status": "active",
                "totalLength": "1000",
                "completedLength": "1000",
                "downloadSpeed": "0",
                "uploadSpeed": "120",
                "seeder": "true",
                "files": [{ "path": "/downloads/Show - 02.mkv", "length": "1000", "completedLength": "1000" }]
            }
        }"#;
        let response: RpcResponse<RawStatus> = serde_json::from_str(json).unwrap();
        let status: JobStatus = response.into_result().unwrap().into();

        assert_eq!(status.state, AgentJobState::Active);
        assert!(status.is_complete);
        assert_eq!(status.progress_percent, 100.0);
        assert_eq!(status.files.len(), 1);
    }

    #[test]
    fn test_fully_downloaded_without_seeder_flag_is_complete() {
        let json = r#"{
            "result": {
                "gid": "dddd",
                "status": "active",
                "totalLength": "500",
                "completedLength": "500",
                "downloadSpeed": "0",
                "files": [{ "path": "/downloads/Movie.mkv", "length": "500", "completedLength": "500" }]
            }
        }"#;
        let response: RpcResponse<RawStatus> = serde_json::from_str(json).unwrap();
        let status: JobStatus = response.into_result().unwrap().into();
        assert!(status.is_complete);

        // Only an active job counts as seeding.
        let paused = json.replace("\"active\"", "\"paused\"");
        let response: RpcResponse<RawStatus> = serde_json::from_str(&paused).unwrap();
        let status: JobStatus = response.into_result().unwrap().into();
        assert!(!status.is_complete);
    }

    #[test]
    fn test_rpc_error_not_found() {
        let json = r#"{ "id": "1", "jsonrpc": "2.0", "error": { "code": 1, "message": "GID 2089b05ecca3d829 is not found" } }"#;
        let response: RpcResponse<RawStatus> = serde_json::from_str(json).unwrap();
        let err = not_found_for(response.into_result().unwrap_err(), "2089b05ecca3d829");

        assert!(matches!(err, AgentError::JobNotFound(gid) if gid == "2089b05ecca3d829"));
    }

    #[test]
    fn test_rpc_error_other() {
        let json = r#"{ "error": { "code": 1, "message": "Unauthorized" } }"#;
        let response: RpcResponse<String> = serde_json::from_str(json).unwrap();
        let err = not_found_for(response.into_result().unwrap_err(), "x");

        assert!(matches!(err, AgentError::Rpc { code: 1, .. }));
    }

    #[test]
    fn test_magnet_display_name() {
        assert_eq!(
            magnet_display_name("magnet:?xt=urn:btih:abc&dn=%5BGroup%5D+Show+-+01.mkv&tr=udp"),
            Some("[Group] Show - 01.mkv".to_string())
        );
        assert_eq!(magnet_display_name("magnet:?xt=urn:btih:abc"), None);
        assert_eq!(magnet_display_name("https://example.org"), None);
    }

    #[test]
    fn test_secret_is_prepended() {
        let client = Aria2Client::new(AgentConfig {
            secret: "s3cret".to_string(),
            ..AgentConfig::default()
        })
        .unwrap();
        let params = client.params(vec![json!("gid")]);
        assert_eq!(params, vec![json!("token:s3cret"), json!("gid")]);

        let open = Aria2Client::new(AgentConfig::default()).unwrap();
        assert_eq!(open.params(vec![json!("gid")]), vec![json!("gid")]);
    }

    #[tokio::test]
    async fn test_delete_job_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path();

        let show = dir.join("Show");
        tokio::fs::create_dir_all(show.join("Extras")).await.unwrap();
        let episode = show.join("Show - 01.mkv");
        let extra = show.join("Extras").join("NCOP.mkv");
        let single = dir.join("Movie.mkv");
        let control = dir.join("Movie.mkv.aria2");
        let unrelated = dir.join("keep.mkv");
        for path in [&episode, &extra, &single, &control, &unrelated] {
            tokio::fs::write(path, b"data").await.unwrap();
        }

        delete_job_files(
            Some(dir),
            Some("Show"),
            &[episode.clone(), extra.clone(), single.clone()],
        )
        .await
        .unwrap();

        assert!(!show.exists());
        assert!(!single.exists());
        assert!(!control.exists());
        assert!(unrelated.exists());
        assert!(dir.exists());
    }

    #[tokio::test]
    async fn test_delete_job_files_missing_is_ok() {
        let temp = tempfile::tempdir().unwrap();
        let ghost = temp.path().join("ghost.mkv");

        delete_job_files(Some(temp.path()), None, &[ghost])
            .await
            .unwrap();
    }
}
