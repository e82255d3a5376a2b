//! # Motor de reproducción
//!
//! El corazón del bot: una cola FIFO por guild ([`queue::TrackQueue`]), la
//! máquina de estados de reproducción ([`player::MusicPlayer`]) y el registro
//! de players ([`registry::PlayerRegistry`]).
//!
//! ## Arquitectura
//!
//! Cada guild tiene como máximo un player, que corre como un task de tokio de
//! larga vida. Los comandos son tasks cortos que se comunican con el bucle
//! sólo a través de la cola (push) y del estado sincronizado del player. El
//! transporte de voz queda detrás del trait [`VoiceSink`]: el bucle dispara
//! la reproducción y espera la señal de fin por un canal one-shot, nunca por
//! polling. [`voice::SongbirdVoice`] es la implementación de producción.

pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod voice;

use async_trait::async_trait;
use serenity::model::id::ChannelId;
use tokio::sync::oneshot;

use crate::{audio::track::StreamHandle, error::Result};

/// Señal de fin de pista. El sink la dispara cuando la pista termina por
/// cualquier motivo: fin natural, `stop`, skip o error de transporte.
pub type PlaybackDone = oneshot::Sender<()>;

/// Transporte de voz de una guild.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// Conecta al canal de voz; si ya hay conexión, se mueve al canal dado.
    async fn connect(&self, channel: ChannelId) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn is_connected(&self) -> bool;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    /// Arranca la reproducción del stream con la ganancia dada. La llamada
    /// retorna de inmediato; `done` se dispara al terminar la pista.
    async fn play(&self, stream: &StreamHandle, volume: f32, done: PlaybackDone) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Corta la pista en curso. Debe disparar la señal de fin pendiente.
    async fn stop(&self) -> Result<()>;

    /// Ganancia en vivo sobre la pista en curso.
    async fn set_volume(&self, volume: f32) -> Result<()>;
}
