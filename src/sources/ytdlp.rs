use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{MusicError, Result},
    sources::{MediaResolver, RawMetadata},
};

/// Resolutor de medios sobre yt-dlp.
///
/// Cada llamada lanza un proceso `yt-dlp` y parsea su salida JSON; la
/// detección búsqueda-vs-URL la hace el propio yt-dlp (`--default-search
/// auto`). Los reintentos y la reconexión ante cortes de stream se delegan a
/// los flags del proceso, no al bucle de reproducción.
pub struct YtDlpResolver {
    audio_format: String,
    stream_retries: u32,
    socket_timeout: u64,
    max_playlist_size: usize,
    cache_dir: PathBuf,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            audio_format: config.audio_format.clone(),
            stream_retries: config.stream_retries,
            socket_timeout: config.socket_timeout,
            max_playlist_size: config.max_playlist_size,
            cache_dir: config.cache_dir.clone(),
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "--default-search".into(),
            "auto".into(),
            "--format".into(),
            self.audio_format.clone(),
            "--ignore-errors".into(),
            "--no-warnings".into(),
            "--quiet".into(),
            "--socket-timeout".into(),
            self.socket_timeout.to_string(),
            "--retries".into(),
            self.stream_retries.to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> std::result::Result<String, String> {
        debug!("🎬 yt-dlp {}", args.join(" "));

        let output = Command::new("yt-dlp")
            .args(&args)
            .output()
            .await
            .map_err(|e| format!("no se pudo lanzar yt-dlp: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("yt-dlp terminó con error: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Parsea un documento JSON de yt-dlp: un objeto suelto o una playlist
    /// con `entries`. Las entradas nulas (extracción individual fallida con
    /// `--ignore-errors`) se filtran explícitamente.
    fn parse_batch(payload: &str, limit: usize) -> std::result::Result<Vec<RawMetadata>, String> {
        let root: Value =
            serde_json::from_str(payload).map_err(|e| format!("JSON inválido: {e}"))?;

        let mut records = Vec::new();
        match root.get("entries").and_then(Value::as_array) {
            Some(entries) => {
                if entries.len() > limit {
                    warn!(
                        "📋 Playlist con {} entradas, se encolan sólo las primeras {}",
                        entries.len(),
                        limit
                    );
                }
                for entry in entries.iter().take(limit) {
                    if entry.is_null() {
                        debug!("🚫 Entrada de playlist descartada: extracción fallida");
                        continue;
                    }
                    match serde_json::from_value::<RawMetadata>(entry.clone()) {
                        Ok(meta) => records.push(meta),
                        Err(e) => warn!("🚫 Entrada de playlist descartada: {}", e),
                    }
                }
            }
            None => {
                let meta = serde_json::from_value::<RawMetadata>(root)
                    .map_err(|e| format!("metadatos inválidos: {e}"))?;
                records.push(meta);
            }
        }

        Ok(records)
    }

    /// Parsea la salida de una descarga (`--print-json`): un objeto JSON por
    /// línea, uno por cada entrada descargada.
    fn parse_lines(payload: &str, limit: usize) -> Vec<RawMetadata> {
        let mut records = Vec::new();
        for line in payload.lines().filter(|l| !l.trim().is_empty()) {
            if records.len() == limit {
                warn!("📋 Descarga truncada a {} entradas", limit);
                break;
            }
            match serde_json::from_str::<RawMetadata>(line) {
                Ok(meta) => records.push(meta),
                Err(e) => warn!("🚫 Entrada descargada descartada: {}", e),
            }
        }
        records
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, download: bool) -> Result<Vec<RawMetadata>> {
        info!("🔍 Resolviendo `{}` (descarga: {})", query, download);

        let mut args = self.base_args();
        let records = if download {
            args.push("--print-json".into());
            args.push("--output".into());
            args.push(
                self.cache_dir
                    .join("%(id)s.%(ext)s")
                    .to_string_lossy()
                    .into_owned(),
            );
            args.push(query.to_string());

            let stdout = self
                .run(args)
                .await
                .map_err(|reason| MusicError::resolution(query, reason))?;
            Self::parse_lines(&stdout, self.max_playlist_size)
        } else {
            args.push("--dump-single-json".into());
            args.push(query.to_string());

            let stdout = self
                .run(args)
                .await
                .map_err(|reason| MusicError::resolution(query, reason))?;
            Self::parse_batch(&stdout, self.max_playlist_size)
                .map_err(|reason| MusicError::resolution(query, reason))?
        };

        if records.is_empty() {
            return Err(MusicError::resolution(
                query,
                "la resolución no produjo ninguna entrada utilizable",
            ));
        }

        info!("✅ `{}` resuelto a {} entrada(s)", query, records.len());
        Ok(records)
    }

    async fn stream_url(&self, web_url: &str) -> Result<RawMetadata> {
        debug!("🔄 Re-resolviendo stream para {}", web_url);

        let mut args = self.base_args();
        args.push("--no-playlist".into());
        args.push("--dump-single-json".into());
        args.push(web_url.to_string());

        let stdout = self
            .run(args)
            .await
            .map_err(|reason| MusicError::resolution(web_url, reason))?;

        let mut records = Self::parse_batch(&stdout, 1)
            .map_err(|reason| MusicError::resolution(web_url, reason))?;

        let meta = records
            .pop()
            .ok_or_else(|| MusicError::resolution(web_url, "sin metadatos en la respuesta"))?;

        if meta.url.is_none() {
            return Err(MusicError::resolution(
                web_url,
                "la respuesta no incluye URL de stream",
            ));
        }

        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_single_entry() {
        let payload = r#"{
            "title": "Una canción",
            "webpage_url": "https://youtu.be/abc123",
            "url": "https://stream.example/abc123.webm",
            "duration": 215.0,
            "uploader": "Alguien"
        }"#;

        let records = YtDlpResolver::parse_batch(payload, 100).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Una canción"));
        assert_eq!(records[0].duration, Some(215.0));
    }

    #[test]
    fn playlist_drops_null_entries() {
        let payload = r#"{
            "title": "Mi playlist",
            "entries": [
                {"title": "una", "webpage_url": "https://youtu.be/a"},
                null,
                {"title": "dos", "webpage_url": "https://youtu.be/b"}
            ]
        }"#;

        let records = YtDlpResolver::parse_batch(payload, 100).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("una"));
        assert_eq!(records[1].title.as_deref(), Some("dos"));
    }

    #[test]
    fn playlist_respects_size_limit() {
        let payload = r#"{
            "entries": [
                {"title": "una"},
                {"title": "dos"},
                {"title": "tres"}
            ]
        }"#;

        let records = YtDlpResolver::parse_batch(payload, 2).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(YtDlpResolver::parse_batch("esto no es json", 100).is_err());
    }

    #[test]
    fn parses_downloaded_lines() {
        let payload = concat!(
            r#"{"title": "una", "_filename": "/cache/a.webm"}"#,
            "\n",
            r#"{"title": "dos", "_filename": "/cache/b.webm"}"#,
            "\n",
        );

        let records = YtDlpResolver::parse_lines(payload, 100);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].filename.as_deref(),
            Some(std::path::Path::new("/cache/a.webm"))
        );
    }
}
