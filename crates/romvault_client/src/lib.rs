use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use romvault_core::prelude::*;
use romvault_library::{BiosStatus, DownloadReference, DuplicateGroup};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

#[derive(Error, Debug)]
pub enum RomvaultClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status} ({kind}): {message}")]
    ServerError {
        status: StatusCode,
        kind: String,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl RomvaultClientError {
    /// The server's machine-readable error kind, e.g. `invalid_slot`.
    pub fn kind(&self) -> Option<&str> {
        match self {
            RomvaultClientError::ServerError { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RomvaultClientError>;

#[derive(Deserialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

/// Metadata sent alongside a ROM upload.
#[derive(Debug, Clone, Default)]
pub struct RomMeta {
    pub system: String,
    pub title: Option<String>,
    pub region: Option<String>,
}

#[derive(Clone)]
pub struct RomvaultClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl RomvaultClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn auth_request(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            builder.header("Authorization", format!("Bearer {token}"))
        } else {
            builder
        }
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.kind, body.message),
            Err(_) => ("unknown".to_string(), text),
        };
        Err(RomvaultClientError::ServerError {
            status,
            kind,
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = Self::check(self.auth_request(builder).send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| RomvaultClientError::Validation(format!("Failed to parse response: {e}")))
    }

    /// Uploads a ROM file and checks the server computed the same digest.
    pub async fn upload_rom(&self, path: &Path, meta: &RomMeta) -> Result<Game> {
        let file_name = file_name(path)?;
        let data = tokio::fs::read(path).await?;
        let local_md5 = md5_hex(&data);

        let mut query = vec![("system", meta.system.clone()), ("fileName", file_name)];
        if let Some(title) = &meta.title {
            query.push(("title", title.clone()));
        }
        if let Some(region) = &meta.region {
            query.push(("region", region.clone()));
        }

        let game: Game = self
            .json(self.client.post(self.url("/games")).query(&query).body(data))
            .await?;
        if game.md5_hash != local_md5 {
            return Err(RomvaultClientError::Validation(format!(
                "digest mismatch: local {local_md5}, server {}",
                game.md5_hash
            )));
        }
        Ok(game)
    }

    pub async fn upload_bios(&self, path: &Path, system: &str, required: bool) -> Result<BiosFile> {
        let file_name = file_name(path)?;
        let data = tokio::fs::read(path).await?;
        let query = [
            ("system", system.to_string()),
            ("fileName", file_name),
            ("required", required.to_string()),
        ];
        self.json(self.client.post(self.url("/bios")).query(&query).body(data))
            .await
    }

    pub async fn verify_bios(&self, id: RecordId, md5: &str) -> Result<BiosFile> {
        self.json(
            self.client
                .post(self.url(&format!("/bios/{id}/verify")))
                .json(&serde_json::json!({ "md5": md5 })),
        )
        .await
    }

    pub async fn bios_status(&self, system: &str) -> Result<BiosStatus> {
        self.json(self.client.get(self.url(&format!("/systems/{system}/bios"))))
            .await
    }

    pub async fn upload_version(
        &self,
        game_id: RecordId,
        path: &Path,
        region: &str,
        revision: Option<&str>,
        preferred: bool,
    ) -> Result<GameVersion> {
        let data = tokio::fs::read(path).await?;
        let mut query = vec![
            ("region", region.to_string()),
            ("preferred", preferred.to_string()),
        ];
        if let Some(revision) = revision {
            query.push(("revision", revision.to_string()));
        }
        self.json(
            self.client
                .post(self.url(&format!("/games/{game_id}/versions")))
                .query(&query)
                .body(data),
        )
        .await
    }

    pub async fn set_preferred(&self, game_id: RecordId, version_id: RecordId) -> Result<GameVersion> {
        self.json(self.client.put(self.url(&format!(
            "/games/{game_id}/versions/{version_id}/preferred"
        ))))
        .await
    }

    /// Where to fetch the ROM a game should be played from.
    pub async fn download_reference(&self, game_id: RecordId) -> Result<DownloadReference> {
        self.json(self.client.get(self.url(&format!("/games/{game_id}/download"))))
            .await
    }

    /// Resolves the game's download reference and streams it to `output`.
    pub async fn download_rom(&self, game_id: RecordId, output: &Path) -> Result<u64> {
        let reference = self.download_reference(game_id).await?;
        let request = match &reference {
            // Signed URLs carry their own credentials.
            DownloadReference::Signed { url, .. } => self.client.get(url),
            DownloadReference::Proxy { url } if url.starts_with('/') => {
                self.auth_request(self.client.get(self.url(url)))
            }
            DownloadReference::Proxy { url } => self.auth_request(self.client.get(url)),
        };
        let response = Self::check(request.send().await?).await?;
        stream_to_file(response, output).await
    }

    pub async fn upload_save(
        &self,
        game_id: RecordId,
        slot: i64,
        state: &Path,
        screenshot: Option<&Path>,
        description: Option<&str>,
    ) -> Result<SaveState> {
        let mut form = Form::new()
            .text("gameId", game_id.to_string())
            .text("slot", slot.to_string())
            .part("state", Part::bytes(tokio::fs::read(state).await?));
        if let Some(path) = screenshot {
            form = form.part("screenshot", Part::bytes(tokio::fs::read(path).await?));
        }
        if let Some(description) = description {
            form = form.text("description", description.to_string());
        }
        self.json(self.client.post(self.url("/save-states")).multipart(form))
            .await
    }

    pub async fn list_saves(&self, game_id: Option<RecordId>) -> Result<Vec<SaveState>> {
        let mut request = self.client.get(self.url("/save-states"));
        if let Some(game_id) = game_id {
            request = request.query(&[("gameId", game_id)]);
        }
        self.json(request).await
    }

    pub async fn download_save(&self, id: RecordId, output: &Path) -> Result<u64> {
        let request = self.client.get(self.url(&format!("/save-states/{id}/download")));
        let response = Self::check(self.auth_request(request).send().await?).await?;
        stream_to_file(response, output).await
    }

    pub async fn delete_save(&self, id: RecordId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/save-states/{id}")));
        Self::check(self.auth_request(request).send().await?).await?;
        Ok(())
    }

    pub async fn duplicates(&self) -> Result<Vec<DuplicateGroup>> {
        self.json(self.client.get(self.url("/duplicates"))).await
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RomvaultClientError::Validation(format!("{path:?} has no file name")))
}

async fn stream_to_file(response: Response, output: &Path) -> Result<u64> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let stream = response.bytes_stream().map_err(std::io::Error::other);
    let mut reader = StreamReader::new(Box::pin(stream));
    let mut file = File::create(output).await?;
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = RomvaultClient::new("http://localhost:3000/", None);
        assert_eq!(client.url("/games"), "http://localhost:3000/games");
    }

    #[test]
    fn file_names_come_from_the_last_component() {
        assert_eq!(file_name(Path::new("roms/nes/zelda.nes")).unwrap(), "zelda.nes");
        assert!(file_name(Path::new("/")).is_err());
    }
}
