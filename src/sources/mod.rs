pub mod ytdlp;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::Result;

pub use ytdlp::YtDlpResolver;

/// Registro crudo de metadatos tal como lo entrega el servicio de resolución.
///
/// Todos los campos opcionales pueden faltar sin que la construcción de la
/// pista falle; `url` es la URL de stream de corta vida y sólo es confiable
/// inmediatamente después de resolver.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub webpage_url: Option<String>,
    /// URL de stream efímera para el formato de audio seleccionado.
    pub url: Option<String>,
    pub view_count: Option<u64>,
    pub is_live: Option<bool>,
    pub like_count: Option<u64>,
    pub dislike_count: Option<u64>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    /// Fecha de subida en formato `%Y%m%d`.
    pub upload_date: Option<String>,
    /// Ruta local del audio cuando la entrada se descargó por adelantado.
    #[serde(rename = "_filename")]
    pub filename: Option<PathBuf>,
}

/// Contrato con el servicio externo de resolución de medios.
///
/// Las dos operaciones lanzan procesos hijos y pueden tardar; nunca deben
/// invocarse desde dentro de un lock ni bloquear el task coordinador de otra
/// guild.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resuelve una URL o un término de búsqueda a uno o más registros de
    /// metadatos. Una playlist produce varios, en orden de aparición; las
    /// entradas cuya extracción individual falla se descartan sin abortar el
    /// lote. Con `download` el audio queda materializado en disco.
    async fn resolve(&self, query: &str, download: bool) -> Result<Vec<RawMetadata>>;

    /// Re-resuelve una sola entrada para obtener una URL de stream fresca.
    /// Las URLs de stream expiran: esta llamada ocurre justo antes de
    /// reproducir, nunca al encolar.
    async fn stream_url(&self, web_url: &str) -> Result<RawMetadata>;
}
