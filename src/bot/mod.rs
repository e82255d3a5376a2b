//! # Bot Module
//!
//! Main Discord-facing layer for Melodía Bot.
//!
//! This module owns the thin glue between Discord and the playback engine:
//! - Slash command registration and dispatch
//! - Per-guild player lookup through [`PlayerRegistry`]
//! - Gateway events that affect player lifecycle (forced voice disconnects)
//!
//! Everything with real state lives in [`crate::audio`]; the handlers here
//! only validate preconditions and translate interactions into player calls.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::registry::PlayerRegistry, config::Config};

/// Handler principal del bot: configuración más el registro de players.
pub struct MelodiaBot {
    config: Arc<Config>,
    pub registry: Arc<PlayerRegistry>,
}

impl MelodiaBot {
    pub fn new(config: Config, registry: Arc<PlayerRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("🌐 Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MelodiaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si alguien desconecta al bot del canal de voz por fuera de `/leave`,
    /// el player de esa guild se destruye por el mismo camino de desarme.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado de voz en guild {}", guild_id);
                if self.registry.destroy(guild_id) {
                    info!("🛑 Player de guild {} destruido por desconexión", guild_id);
                }
            }
        }
    }
}
