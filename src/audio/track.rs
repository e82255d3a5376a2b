use chrono::NaiveDate;
use serenity::model::id::UserId;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::{
    error::{MusicError, Result},
    sources::RawMetadata,
};

/// Identidad del usuario que pidió la canción, capturada al encolar para que
/// el motor no tenga que volver a consultar la capa de chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    #[allow(dead_code)]
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Qué reproduce el sink de voz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// URL de stream efímera, resuelta justo antes de reproducir.
    Remote(String),
    /// Archivo de audio descargado por adelantado; se borra al liberar.
    Local(PathBuf),
}

/// Handle de audio de propiedad exclusiva de su [`PlaybackSource`].
///
/// Se libera exactamente una vez: `release` consume el interior vía
/// `Option::take` y `Drop` actúa de respaldo para los caminos de descarte,
/// así la doble liberación es irrepresentable.
#[derive(Debug)]
pub struct StreamHandle {
    kind: Option<StreamKind>,
}

impl StreamHandle {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            kind: Some(StreamKind::Remote(url.into())),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: Some(StreamKind::Local(path.into())),
        }
    }

    /// El stream aún no liberado, si existe.
    pub fn kind(&self) -> Option<&StreamKind> {
        self.kind.as_ref()
    }

    #[allow(dead_code)]
    pub fn is_released(&self) -> bool {
        self.kind.is_none()
    }

    /// Libera el recurso subyacente. Para streams locales borra el archivo.
    pub fn release(&mut self) {
        if let Some(StreamKind::Local(path)) = self.kind.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("🧹 Archivo de audio borrado: {}", path.display()),
                Err(e) => warn!("No se pudo borrar {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pista materializada y lista para reproducir: metadatos + stream de audio
/// + control de ganancia independiente.
#[derive(Debug)]
pub struct PlaybackSource {
    pub title: String,
    pub description: Option<String>,
    pub web_url: Option<String>,
    #[allow(dead_code)]
    pub view_count: Option<u64>,
    pub is_live: bool,
    #[allow(dead_code)]
    pub like_count: Option<u64>,
    #[allow(dead_code)]
    pub dislike_count: Option<u64>,
    /// Duración en segundos; ausente para streams en vivo.
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    #[allow(dead_code)]
    pub upload_date: Option<NaiveDate>,
    pub requester: Requester,
    volume: f32,
    stream: StreamHandle,
}

impl PlaybackSource {
    /// Construye la pista a partir de un registro crudo del resolutor.
    ///
    /// Los campos opcionales ausentes nunca hacen fallar la construcción; la
    /// fecha de subida se parsea como `%Y%m%d` y queda ausente si no parsea.
    /// Sí es un error que el registro no traiga ni archivo local ni URL de
    /// stream: no habría nada que reproducir.
    pub fn from_metadata(meta: RawMetadata, requester: Requester) -> Result<Self> {
        let stream = match (meta.filename, meta.url) {
            (Some(path), _) => StreamHandle::local(path),
            (None, Some(url)) => StreamHandle::remote(url),
            (None, None) => {
                return Err(MusicError::resolution(
                    meta.title.as_deref().unwrap_or("<sin título>"),
                    "el registro no incluye stream ni archivo local",
                ))
            }
        };

        let upload_date = meta
            .upload_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y%m%d").ok());

        Ok(Self {
            title: meta.title.unwrap_or_else(|| "Desconocido".to_string()),
            description: meta.description,
            web_url: meta.webpage_url,
            view_count: meta.view_count,
            is_live: meta.is_live.unwrap_or(false),
            like_count: meta.like_count,
            dislike_count: meta.dislike_count,
            duration: meta.duration.map(|secs| secs as u64),
            uploader: meta.uploader,
            thumbnail: meta.thumbnail,
            upload_date,
            requester,
            volume: 0.5,
            stream,
        })
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Ajusta la ganancia con la que arrancará (o sigue) la reproducción.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }

    /// Libera el stream de audio. Idempotente sólo a nivel de tipos: el
    /// interior ya consumido no puede liberarse de nuevo.
    pub fn release(&mut self) {
        self.stream.release();
    }
}

/// Entrada pendiente en la cola de una guild.
#[derive(Debug)]
pub enum QueueEntry {
    /// Referencia perezosa: la URL de stream se resuelve justo antes de
    /// reproducir porque expira.
    Lazy {
        url: String,
        title: String,
        requester: Requester,
    },
    /// Pista ya materializada (audio descargado por adelantado).
    Materialized(PlaybackSource),
}

impl QueueEntry {
    pub fn title(&self) -> &str {
        match self {
            Self::Lazy { title, .. } => title,
            Self::Materialized(source) => &source.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn requester() -> Requester {
        Requester {
            id: UserId::new(42),
            name: "tester".to_string(),
            avatar_url: None,
        }
    }

    fn remote_meta() -> RawMetadata {
        RawMetadata {
            title: Some("Canción".to_string()),
            url: Some("https://stream.example/a.webm".to_string()),
            webpage_url: Some("https://youtu.be/a".to_string()),
            upload_date: Some("20240131".to_string()),
            duration: Some(215.7),
            ..RawMetadata::default()
        }
    }

    #[test]
    fn builds_from_remote_metadata() {
        let source = PlaybackSource::from_metadata(remote_meta(), requester()).unwrap();
        assert_eq!(source.title, "Canción");
        assert_eq!(source.duration, Some(215));
        assert_eq!(
            source.upload_date,
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert!(matches!(
            source.stream().kind(),
            Some(StreamKind::Remote(_))
        ));
    }

    #[test]
    fn invalid_upload_date_is_absent_not_fatal() {
        let meta = RawMetadata {
            upload_date: Some("no-es-fecha".to_string()),
            ..remote_meta()
        };
        let source = PlaybackSource::from_metadata(meta, requester()).unwrap();
        assert_eq!(source.upload_date, None);
    }

    #[test]
    fn missing_optionals_default_to_absent() {
        let meta = RawMetadata {
            title: None,
            description: None,
            view_count: None,
            upload_date: None,
            duration: None,
            ..remote_meta()
        };
        let source = PlaybackSource::from_metadata(meta, requester()).unwrap();
        assert_eq!(source.title, "Desconocido");
        assert_eq!(source.view_count, None);
        assert!(!source.is_live);
    }

    #[test]
    fn rejects_record_without_stream() {
        let meta = RawMetadata {
            url: None,
            filename: None,
            ..remote_meta()
        };
        assert!(PlaybackSource::from_metadata(meta, requester()).is_err());
    }

    #[test]
    fn local_release_removes_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pista.webm");
        std::fs::write(&path, b"audio").unwrap();

        let mut handle = StreamHandle::local(&path);
        assert!(!handle.is_released());

        handle.release();
        assert!(handle.is_released());
        assert!(!path.exists());

        // La segunda liberación no tiene interior que consumir
        handle.release();
        assert!(handle.is_released());
    }

    #[test]
    fn drop_releases_local_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pista.webm");
        std::fs::write(&path, b"audio").unwrap();

        {
            let _handle = StreamHandle::local(&path);
        }
        assert!(!path.exists());
    }
}
