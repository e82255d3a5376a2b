use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{player::MusicPlayer, track::Requester, voice::SongbirdVoice, VoiceSink},
    bot::{commands::VolumeRequest, MelodiaBot},
    chat::DiscordChat,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "join" => handle_join(ctx, command, guild_id).await?,
        "play" => handle_play(ctx, command, bot, guild_id, false).await?,
        "fplay" => handle_play(ctx, command, bot, guild_id, true).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "status" => handle_status(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        _ => {
            respond(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, command: CommandInteraction, guild_id: GuildId) -> Result<()> {
    let Some(channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, &command, "🔇 Debes estar en un canal de voz").await;
    };

    let voice = voice_sink(ctx, guild_id).await?;
    voice.connect(channel).await?;

    respond(ctx, &command, "🔊 Conectado al canal de voz").await
}

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
    download: bool,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    // La resolución puede tardar: defer y editar la respuesta al final
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Sin query, `play` reanuda audio pausado en lugar de encolar
    if query.is_empty() {
        let resumed = match bot.registry.get(guild_id) {
            Some(player) if player.has_current() && player.is_paused().await => {
                player.resume().await.is_ok()
            }
            _ => false,
        };

        let text = if resumed {
            "▶️ Reproducción reanudada"
        } else {
            "🤷 Nada estaba pausado"
        };
        return edit_response(ctx, &command, text).await;
    }

    let voice = voice_sink(ctx, guild_id).await?;
    if !voice.is_connected().await {
        let Some(channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
            return edit_response(ctx, &command, "🔇 Debes estar en un canal de voz").await;
        };
        voice.connect(channel).await?;
    }

    let chat = Arc::new(DiscordChat::new(ctx.http.clone(), command.channel_id));
    let player = bot.registry.get_or_create(guild_id, chat, voice);

    match player
        .enqueue_query(&query, requester_from(&command), download)
        .await
    {
        Ok(added) => {
            let text = format!("🎵 {added} canción(es) agregada(s) a la cola");
            edit_response(ctx, &command, text).await
        }
        Err(e) => edit_response(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = connected_player(bot, guild_id).await else {
        return respond(ctx, &command, "🔇 No estaba sonando nada").await;
    };

    if player.is_paused().await {
        return respond(ctx, &command, "🤷 Ya está pausado").await;
    }
    if !player.is_playing().await {
        return respond(ctx, &command, "🔇 No estaba sonando nada").await;
    }

    player.pause().await?;
    respond(ctx, &command, "⏸️ Reproducción pausada").await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = connected_player(bot, guild_id).await else {
        return respond(ctx, &command, "🔇 No estaba sonando nada").await;
    };

    let cleared = player.stop_and_clear().await;
    respond(
        ctx,
        &command,
        format!("⏹️ Playlist detenida ({cleared} entrada(s) descartada(s))"),
    )
    .await
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = connected_player(bot, guild_id).await else {
        return respond(ctx, &command, "🔇 No estoy en un canal de voz").await;
    };

    let raw = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default();

    let request = match VolumeRequest::parse(raw) {
        Ok(request) => request,
        Err(e) => return respond(ctx, &command, format!("❓ {e}")).await,
    };

    let new_pct = request.apply(player.volume_pct());
    player.set_volume(new_pct).await?;

    respond(
        ctx,
        &command,
        format!(
            "🔊 **{}**: volumen ajustado al **{}%**",
            command.user.name, new_pct
        ),
    )
    .await
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = connected_player(bot, guild_id).await else {
        return respond(ctx, &command, "🔇 No estaba sonando nada").await;
    };

    // Una pista pausada también se puede saltar
    if !player.is_playing().await && !player.is_paused().await {
        return respond(ctx, &command, "🤷 No hay nada que saltar").await;
    }

    player.skip().await?;
    respond(ctx, &command, "⏭️ Canción saltada").await
}

async fn handle_status(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = connected_player(bot, guild_id).await else {
        return respond(ctx, &command, "🔇 No estoy conectado a un canal de voz").await;
    };

    if !player.has_current() {
        return respond(ctx, &command, "🤷 No estoy reproduciendo nada").await;
    }

    player.update_now_playing().await;
    respond(ctx, &command, "📻 Estado actualizado").await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond(ctx, &command, "😴 La cola está vacía").await;
    };

    let current = player.current_title();
    let pending = player.queue_titles();
    let embed = embeds::create_queue_embed(current.as_deref(), &pending);

    respond_embed(ctx, &command, embed).await
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> Result<()> {
    if bot.registry.destroy(guild_id) {
        return respond(ctx, &command, "👋 Desconectado del canal de voz").await;
    }

    // Sin player: desconecta la voz directamente si quedó una conexión suelta
    let voice = voice_sink(ctx, guild_id).await?;
    if voice.is_connected().await {
        voice.disconnect().await?;
        respond(ctx, &command, "👋 Desconectado del canal de voz").await
    } else {
        respond(ctx, &command, "🔇 No estoy conectado a un canal de voz").await
    }
}

// Funciones auxiliares

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn edit_response(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

/// Player de la guild, sólo si además sigue conectado a voz.
async fn connected_player(bot: &MelodiaBot, guild_id: GuildId) -> Option<Arc<MusicPlayer>> {
    let player = bot.registry.get(guild_id)?;
    if player.is_connected().await {
        Some(player)
    } else {
        None
    }
}

async fn voice_sink(ctx: &Context, guild_id: GuildId) -> Result<Arc<SongbirdVoice>> {
    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

    Ok(Arc::new(SongbirdVoice::new(manager, guild_id)))
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn requester_from(command: &CommandInteraction) -> Requester {
    Requester {
        id: command.user.id,
        name: command.user.name.clone(),
        avatar_url: command.user.avatar_url(),
    }
}
