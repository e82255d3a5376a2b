use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    audio::{
        track::{StreamHandle, StreamKind},
        PlaybackDone, VoiceSink,
    },
    error::{MusicError, Result},
};

/// Transporte de voz de producción sobre songbird.
///
/// La reconexión ante cortes del stream HTTP la maneja el propio driver; acá
/// sólo se traduce entre [`StreamHandle`] y los inputs de songbird y se
/// convierte el evento de fin de pista en la señal one-shot que espera el
/// bucle de reproducción.
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId) -> Self {
        Self {
            manager,
            guild_id,
            http: reqwest::Client::new(),
            current: Mutex::new(None),
        }
    }

    fn current_handle(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let handle = self.current_handle()?;
        match handle.get_info().await {
            Ok(info) => Some(info.playing),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl VoiceSink for SongbirdVoice {
    async fn connect(&self, channel: ChannelId) -> Result<()> {
        // join mueve la conexión si ya existe una para esta guild
        self.manager
            .join(self.guild_id, channel)
            .await
            .map(|_| ())
            .map_err(|e| MusicError::Playback(format!("no se pudo conectar a voz: {e}")))
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.current.lock().take() {
            let _ = handle.stop();
        }

        if self.manager.get(self.guild_id).is_some() {
            self.manager
                .remove(self.guild_id)
                .await
                .map_err(|e| MusicError::Playback(format!("no se pudo desconectar: {e}")))?;
            debug!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.manager.get(self.guild_id).is_some()
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn play(&self, stream: &StreamHandle, volume: f32, done: PlaybackDone) -> Result<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or_else(|| MusicError::Playback("sin conexión de voz".to_string()))?;

        let input: Input = match stream.kind() {
            Some(StreamKind::Remote(url)) => {
                HttpRequest::new(self.http.clone(), url.clone()).into()
            }
            Some(StreamKind::Local(path)) => File::new(path.clone()).into(),
            None => {
                return Err(MusicError::Playback(
                    "el stream de audio ya fue liberado".to_string(),
                ))
            }
        };

        let mut handler = call.lock().await;
        let handle = handler.play_input(input);
        let _ = handle.set_volume(volume);

        // La señal de fin se dispara tanto por fin/stop como por error del
        // driver; el Arc compartido garantiza un solo disparo.
        let done = Arc::new(Mutex::new(Some(done)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    PlaybackEndNotifier { done: done.clone() },
                )
                .map_err(|e| {
                    MusicError::Playback(format!("no se pudo registrar el evento de fin: {e}"))
                })?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if let Some(handle) = self.current_handle() {
            handle
                .pause()
                .map_err(|e| MusicError::Playback(format!("no se pudo pausar: {e}")))?;
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        if let Some(handle) = self.current_handle() {
            handle
                .play()
                .map_err(|e| MusicError::Playback(format!("no se pudo reanudar: {e}")))?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(handle) = self.current.lock().take() {
            handle
                .stop()
                .map_err(|e| MusicError::Playback(format!("no se pudo detener: {e}")))?;
        }
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        if let Some(handle) = self.current_handle() {
            let _ = handle.set_volume(volume);
        }
        Ok(())
    }
}

/// Traduce el evento de fin de pista de songbird a la señal one-shot del
/// bucle de reproducción.
struct PlaybackEndNotifier {
    done: Arc<Mutex<Option<PlaybackDone>>>,
}

#[async_trait]
impl VoiceEventHandler for PlaybackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in *tracks {
                if state.playing.is_done() {
                    debug!("🏁 Pista terminada ({:?})", state.playing);
                }
            }
        }

        if let Some(done) = self.done.lock().take() {
            if done.send(()).is_err() {
                error!("El bucle de reproducción ya no espera la señal de fin");
            }
        }

        None
    }
}
