use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::GuildId;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::TrackQueue,
        registry::PlayerRegistry,
        track::{PlaybackSource, QueueEntry, Requester},
        VoiceSink,
    },
    chat::{ChatContent, ChatSink, MessageRef},
    error::{MusicError, Result},
    sources::MediaResolver,
    ui::embeds,
};

/// Estado mutable compartido entre el bucle y los comandos.
struct PlayerState {
    volume: f32,
    current: Option<PlaybackSource>,
    now_playing: Option<MessageRef>,
}

/// Motor de reproducción de una guild.
///
/// Corre como un task de fondo que consume la cola, materializa las entradas
/// perezosas justo antes de reproducir y conduce al sink de voz por el ciclo
/// reproducir → esperar fin → liberar. Se auto-destruye cuando la cola no
/// entrega nada dentro de la ventana de inactividad, o cuando se lo cancela
/// explícitamente (`/leave`, desconexión forzada).
///
/// Reglas de concurrencia: exactamente una pista suena a la vez por guild, y
/// el estado `Playing` sólo se abandona por la señal de fin del sink de voz,
/// nunca por polling. Cualquier fallo al resolver o reproducir una entrada se
/// reporta al chat y el bucle sigue con la siguiente; una entrada mala nunca
/// tumba el bucle.
pub struct MusicPlayer {
    guild_id: GuildId,
    queue: TrackQueue,
    state: Mutex<PlayerState>,
    chat: Arc<dyn ChatSink>,
    voice: Arc<dyn VoiceSink>,
    resolver: Arc<dyn MediaResolver>,
    registry: Weak<PlayerRegistry>,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl MusicPlayer {
    /// Crea el player y lanza su bucle de reproducción en segundo plano.
    pub fn spawn(
        guild_id: GuildId,
        chat: Arc<dyn ChatSink>,
        voice: Arc<dyn VoiceSink>,
        resolver: Arc<dyn MediaResolver>,
        registry: Weak<PlayerRegistry>,
        default_volume: f32,
        idle_timeout: Duration,
    ) -> Arc<Self> {
        let player = Arc::new(Self {
            guild_id,
            queue: TrackQueue::new(),
            state: Mutex::new(PlayerState {
                volume: default_volume,
                current: None,
                now_playing: None,
            }),
            chat,
            voice,
            resolver,
            registry,
            idle_timeout,
            cancel: CancellationToken::new(),
        });

        let task = player.clone();
        tokio::spawn(async move { task.player_loop().await });

        info!("🎶 Player creado para guild {}", guild_id);
        player
    }

    /// Bucle principal: espera en la cola, materializa, reproduce, espera la
    /// señal de fin y libera, hasta el timeout de inactividad o cancelación.
    async fn player_loop(self: Arc<Self>) {
        loop {
            let entry = tokio::select! {
                _ = self.cancel.cancelled() => break,
                popped = self.queue.pop(self.idle_timeout) => match popped {
                    Ok(entry) => entry,
                    Err(MusicError::QueueTimeout) => {
                        info!("💤 Guild {} sin actividad, cerrando player", self.guild_id);
                        break;
                    }
                    Err(e) => {
                        error!("Error inesperado esperando la cola: {}", e);
                        break;
                    }
                },
            };

            let mut source = match self.materialize(entry).await {
                Ok(source) => source,
                Err(e) => {
                    // Entrada fallida: se reporta y se descarta, sin reintentos
                    self.report_error(&e).await;
                    continue;
                }
            };

            source.set_volume(self.state.lock().volume);

            let (done_tx, done_rx) = oneshot::channel();
            if let Err(e) = self.voice.play(source.stream(), source.volume(), done_tx).await {
                self.report_error(&e).await;
                continue;
            }

            self.state.lock().current = Some(source);
            self.update_now_playing().await;

            let interrupted = tokio::select! {
                _ = self.cancel.cancelled() => true,
                _ = done_rx => false,
            };

            if interrupted {
                let _ = self.voice.stop().await;
                break;
            }

            self.finish_track().await;
        }

        self.teardown().await;

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.guild_id, &self);
        }

        info!("👋 Player de guild {} destruido", self.guild_id);
    }

    /// Convierte una entrada de cola en una pista reproducible. Las entradas
    /// perezosas se re-resuelven aquí porque sus URLs de stream expiran.
    async fn materialize(&self, entry: QueueEntry) -> Result<PlaybackSource> {
        match entry {
            QueueEntry::Materialized(source) => Ok(source),
            QueueEntry::Lazy {
                url,
                title,
                requester,
            } => {
                debug!("🔄 Materializando `{}`", title);
                let meta = self.resolver.stream_url(&url).await?;
                PlaybackSource::from_metadata(meta, requester)
            }
        }
    }

    /// Resuelve una consulta y encola el resultado, publicando el progreso en
    /// el chat. Con `download` las entradas quedan materializadas en disco;
    /// si no, se encolan perezosas y se resuelven al reproducir.
    pub async fn enqueue_query(
        &self,
        query: &str,
        requester: Requester,
        download: bool,
    ) -> Result<usize> {
        let progress = self
            .chat
            .send(ChatContent::Text(
                "⏳ Buscando la(s) canción(es) pedida(s)...".to_string(),
            ))
            .await
            .ok();

        let metas = match self.resolver.resolve(query, download).await {
            Ok(metas) => metas,
            Err(e) => {
                if let Some(msg) = progress {
                    let text = format!("❌ No se pudo resolver `{query}`.");
                    let _ = self.chat.edit(msg, ChatContent::Text(text)).await;
                }
                return Err(e);
            }
        };

        let several = metas.len() > 1;
        let mut summary = "📋 Agregando canciones a la cola...".to_string();
        if several {
            if let Some(msg) = progress {
                let _ = self.chat.edit(msg, ChatContent::Text(summary.clone())).await;
            }
        }

        let mut added = 0;
        for meta in metas {
            let title = meta
                .title
                .clone()
                .unwrap_or_else(|| "Desconocido".to_string());

            let entry = if download {
                match PlaybackSource::from_metadata(meta, requester.clone()) {
                    Ok(source) => QueueEntry::Materialized(source),
                    Err(e) => {
                        warn!("🚫 Entrada descartada: {}", e);
                        continue;
                    }
                }
            } else {
                match meta.webpage_url {
                    Some(url) => QueueEntry::Lazy {
                        url,
                        title: title.clone(),
                        requester: requester.clone(),
                    },
                    None => {
                        warn!("🚫 Entrada sin webpage_url descartada: {}", title);
                        continue;
                    }
                }
            };

            self.queue.push(entry);
            added += 1;

            if let Some(msg) = progress {
                if several {
                    summary.push_str(&format!("\n    **+** `{title}`"));
                    let _ = self.chat.edit(msg, ChatContent::Text(summary.clone())).await;
                } else {
                    let text = format!("✅ `{title}` agregada a la cola.");
                    let _ = self.chat.edit(msg, ChatContent::Text(text)).await;
                }
            }
        }

        Ok(added)
    }

    /// Publica (o reemplaza) el embed de estado de la pista en curso.
    pub async fn update_now_playing(&self) {
        self.delete_last_playing(None).await;

        let playing = self.voice.is_playing().await;
        let embed = {
            let state = self.state.lock();
            match state.current.as_ref() {
                Some(source) => embeds::create_now_playing_embed(source, playing),
                None => return,
            }
        };

        match self.chat.send(ChatContent::Embed(embed)).await {
            Ok(msg) => self.state.lock().now_playing = Some(msg),
            Err(e) => warn!("No se pudo publicar el estado de reproducción: {}", e),
        }
    }

    /// Borra el embed de estado anterior y, si corresponde, lo reemplaza por
    /// el resumen de pista reproducida.
    async fn delete_last_playing(&self, played: Option<&PlaybackSource>) {
        let previous = self.state.lock().now_playing.take();
        let Some(previous) = previous else { return };

        if let Err(e) = self.chat.delete(previous).await {
            warn!("No se pudo borrar el mensaje de estado: {}", e);
            return;
        }

        if let Some(source) = played {
            let embed = embeds::create_played_embed(source);
            if let Err(e) = self.chat.send(ChatContent::Embed(embed)).await {
                warn!("No se pudo publicar el resumen de reproducción: {}", e);
            }
        }
    }

    /// Transición `Playing → Finished`: resumen al chat, stream liberado,
    /// pista en curso despejada.
    async fn finish_track(&self) {
        let source = self.state.lock().current.take();
        if let Some(mut source) = source {
            self.delete_last_playing(Some(&source)).await;
            source.release();
            debug!("🧹 Pista finalizada y stream liberado: {}", source.title);
        }
    }

    /// Desarme final: corta la voz, vacía la cola y libera la pista en curso.
    /// Es la única salida del bucle; la baja del registro la hace el propio
    /// bucle al terminar.
    async fn teardown(&self) {
        self.cancel.cancel();

        if let Err(e) = self.voice.stop().await {
            debug!("stop durante teardown: {}", e);
        }
        if let Err(e) = self.voice.disconnect().await {
            debug!("disconnect durante teardown: {}", e);
        }

        let cleared = self.queue.clear();
        if cleared > 0 {
            debug!("🗑️ {} entrada(s) descartada(s) al destruir", cleared);
        }

        if let Some(mut source) = self.state.lock().current.take() {
            source.release();
        }
        self.delete_last_playing(None).await;
    }

    async fn report_error(&self, err: &MusicError) {
        warn!(
            "⚠️ Error en el bucle de reproducción de guild {}: {}",
            self.guild_id, err
        );
        let text = format!("❌ Hubo un error procesando tu canción... ```\n{err}\n```");
        if let Err(e) = self.chat.send(ChatContent::Text(text)).await {
            error!("Tampoco se pudo reportar el error al chat: {}", e);
        }
    }

    // --- API para la capa de comandos ---

    /// Pide la destrucción del player. El bucle observa la cancelación, corta
    /// la pista en curso y ejecuta el desarme completo.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn has_current(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn current_title(&self) -> Option<String> {
        self.state.lock().current.as_ref().map(|s| s.title.clone())
    }

    /// Volumen del player como porcentaje entero.
    pub fn volume_pct(&self) -> u8 {
        (self.state.lock().volume * 100.0).round() as u8
    }

    /// Fija el volumen del player: afecta la pista en curso (ganancia en
    /// vivo) y las que se materialicen después.
    pub async fn set_volume(&self, pct: u8) -> Result<()> {
        let volume = f32::from(pct) / 100.0;
        {
            let mut state = self.state.lock();
            state.volume = volume;
            if let Some(current) = state.current.as_mut() {
                current.set_volume(volume);
            }
        }
        self.voice.set_volume(volume).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.voice.pause().await?;
        self.update_now_playing().await;
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.voice.resume().await?;
        self.update_now_playing().await;
        Ok(())
    }

    /// Salta la pista en curso cortándola; la señal de fin hace avanzar al
    /// bucle de forma natural.
    pub async fn skip(&self) -> Result<()> {
        self.voice.stop().await
    }

    /// Detiene la reproducción y vacía la cola. Devuelve cuántas entradas se
    /// descartaron.
    pub async fn stop_and_clear(&self) -> usize {
        let cleared = self.queue.clear();
        let _ = self.voice.stop().await;
        cleared
    }

    pub fn queue_titles(&self) -> Vec<String> {
        self.queue.snapshot()
    }

    pub async fn is_connected(&self) -> bool {
        self.voice.is_connected().await
    }

    pub async fn is_playing(&self) -> bool {
        self.voice.is_playing().await
    }

    pub async fn is_paused(&self) -> bool {
        self.voice.is_paused().await
    }
}
