use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::{
    audio::{player::MusicPlayer, VoiceSink},
    chat::ChatSink,
    config::Config,
    sources::MediaResolver,
};

/// Mapa global guild → player, único dueño de los players.
///
/// Las dos únicas mutaciones son `get_or_create` (capa de comandos) y
/// `remove` (auto-destrucción del player); ambas son seguras bajo flujos de
/// comandos concurrentes de varias guilds.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<MusicPlayer>>,
    resolver: Arc<dyn MediaResolver>,
    default_volume: f32,
    idle_timeout: Duration,
}

impl PlayerRegistry {
    pub fn new(resolver: Arc<dyn MediaResolver>, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            players: DashMap::new(),
            resolver,
            default_volume: config.default_volume,
            idle_timeout: Duration::from_secs(config.idle_timeout),
        })
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<MusicPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Devuelve el player de la guild, creándolo (y lanzando su bucle) si no
    /// existe. Un player ya cancelado cuya baja del registro aún no se aplicó
    /// se reemplaza por uno fresco.
    pub fn get_or_create(
        self: &Arc<Self>,
        guild_id: GuildId,
        chat: Arc<dyn ChatSink>,
        voice: Arc<dyn VoiceSink>,
    ) -> Arc<MusicPlayer> {
        match self.players.entry(guild_id) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_destroyed() {
                    let player = self.spawn_player(guild_id, chat, voice);
                    slot.insert(player.clone());
                    player
                } else {
                    slot.get().clone()
                }
            }
            Entry::Vacant(slot) => {
                let player = self.spawn_player(guild_id, chat, voice);
                slot.insert(player.clone());
                player
            }
        }
    }

    fn spawn_player(
        self: &Arc<Self>,
        guild_id: GuildId,
        chat: Arc<dyn ChatSink>,
        voice: Arc<dyn VoiceSink>,
    ) -> Arc<MusicPlayer> {
        MusicPlayer::spawn(
            guild_id,
            chat,
            voice,
            self.resolver.clone(),
            Arc::downgrade(self),
            self.default_volume,
            self.idle_timeout,
        )
    }

    /// Da de baja a un player. La llama el propio player durante su desarme;
    /// compara identidad para no arrastrar a un reemplazo ya registrado.
    pub fn remove(&self, guild_id: GuildId, player: &Arc<MusicPlayer>) {
        let removed = self
            .players
            .remove_if(&guild_id, |_, existing| Arc::ptr_eq(existing, player));
        if removed.is_some() {
            info!("🗑️ Player de guild {} dado de baja del registro", guild_id);
        }
    }

    /// Pide la destrucción del player de una guild, si existe.
    pub fn destroy(&self, guild_id: GuildId) -> bool {
        match self.get(guild_id) {
            Some(player) => {
                player.destroy();
                true
            }
            None => false,
        }
    }

    /// Cancela todos los players. Usado en el apagado del proceso.
    pub fn destroy_all(&self) {
        for entry in self.players.iter() {
            entry.value().destroy();
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::StreamHandle;
    use crate::audio::PlaybackDone;
    use crate::chat::{ChatContent, MessageRef};
    use crate::error::Result;
    use crate::sources::MockMediaResolver;
    use async_trait::async_trait;
    use serenity::model::id::{ChannelId, MessageId};

    struct NullChat;

    #[async_trait]
    impl ChatSink for NullChat {
        async fn send(&self, _content: ChatContent) -> Result<MessageRef> {
            Ok(MessageRef {
                channel: ChannelId::new(1),
                message: MessageId::new(1),
            })
        }

        async fn edit(&self, _target: MessageRef, _content: ChatContent) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _target: MessageRef) -> Result<()> {
            Ok(())
        }
    }

    struct NullVoice;

    #[async_trait]
    impl VoiceSink for NullVoice {
        async fn connect(&self, _channel: ChannelId) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn is_playing(&self) -> bool {
            false
        }

        async fn is_paused(&self) -> bool {
            false
        }

        async fn play(
            &self,
            _stream: &StreamHandle,
            _volume: f32,
            _done: PlaybackDone,
        ) -> Result<()> {
            Ok(())
        }

        async fn pause(&self) -> Result<()> {
            Ok(())
        }

        async fn resume(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }

        async fn set_volume(&self, _volume: f32) -> Result<()> {
            Ok(())
        }
    }

    fn registry() -> Arc<PlayerRegistry> {
        // El mock no recibe llamadas en estos tests: la cola queda vacía
        let resolver: Arc<dyn MediaResolver> = Arc::new(MockMediaResolver::new());
        PlayerRegistry::new(resolver, &Config::default())
    }

    #[tokio::test]
    async fn get_or_create_returns_same_instance_per_guild() {
        let registry = registry();
        let guild = GuildId::new(10);

        let first = registry.get_or_create(guild, Arc::new(NullChat), Arc::new(NullVoice));
        let second = registry.get_or_create(guild, Arc::new(NullChat), Arc::new(NullVoice));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        first.destroy();
    }

    #[tokio::test]
    async fn destroyed_player_removes_itself_from_registry() {
        let registry = registry();
        let guild = GuildId::new(11);

        let player = registry.get_or_create(guild, Arc::new(NullChat), Arc::new(NullVoice));
        assert!(registry.get(guild).is_some());

        player.destroy();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert!(registry.get(guild).is_none());
    }

    #[tokio::test]
    async fn stale_cancelled_player_is_replaced() {
        let registry = registry();
        let guild = GuildId::new(12);

        let first = registry.get_or_create(guild, Arc::new(NullChat), Arc::new(NullVoice));
        first.destroy();

        // Sin ceder el scheduler, la baja del registro puede no haberse
        // aplicado todavía; get_or_create debe entregar un player fresco.
        let second = registry.get_or_create(guild, Arc::new(NullChat), Arc::new(NullVoice));
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_destroyed());

        second.destroy();
    }
}
