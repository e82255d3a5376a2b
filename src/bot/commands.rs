use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

use crate::error::MusicError;

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        play_command(),
        fplay_command(),
        pause_command(),
        stop_command(),
        volume_command(),
        skip_command(),
        status_command(),
        queue_command(),
        leave_command(),
    ]
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot y descarta la cola")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist; sin query reanuda lo pausado")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "query",
            "URL o término de búsqueda",
        ))
}

fn fplay_command() -> CreateCommand {
    CreateCommand::new("fplay")
        .description("Descarga el audio por adelantado y lo encola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la canción actual")
}

// Comandos de estado

fn status_command() -> CreateCommand {
    CreateCommand::new("status").description("Muestra el estado de la canción actual")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "level",
                "`up`, `down` o un número entre 1 y 100",
            )
            .required(true),
        )
}

/// Cambio de volumen pedido por el usuario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeRequest {
    Up,
    Down,
    Absolute(u8),
}

impl VolumeRequest {
    /// Parsea el argumento del comando. Los valores absolutos fuera de
    /// [1, 100] se rechazan antes de tocar el player.
    pub fn parse(raw: &str) -> Result<Self, MusicError> {
        match raw.trim() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => other
                .parse::<i64>()
                .ok()
                .filter(|v| (1..=100).contains(v))
                .map(|v| Self::Absolute(v as u8))
                .ok_or_else(|| {
                    MusicError::Precondition(
                        "El volumen debe ser `up`, `down` o un número entre 1 y 100".to_string(),
                    )
                }),
        }
    }

    /// Aplica el cambio sobre el porcentaje actual: `up`/`down` mueven de a 5
    /// con piso 1 y techo 100.
    pub fn apply(self, current_pct: u8) -> u8 {
        match self {
            Self::Up => current_pct.saturating_add(5).min(100),
            Self::Down => current_pct.saturating_sub(5).max(1),
            Self::Absolute(pct) => pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn up_moves_five_with_ceiling() {
        assert_eq!(VolumeRequest::Up.apply(50), 55);
        assert_eq!(VolumeRequest::Up.apply(98), 100);
        assert_eq!(VolumeRequest::Up.apply(100), 100);
    }

    #[test]
    fn down_moves_five_with_floor() {
        assert_eq!(VolumeRequest::Down.apply(50), 45);
        assert_eq!(VolumeRequest::Down.apply(2), 1);
        assert_eq!(VolumeRequest::Down.apply(1), 1);
    }

    #[test]
    fn parses_tokens_and_absolute_values() {
        assert_eq!(VolumeRequest::parse("up").unwrap(), VolumeRequest::Up);
        assert_eq!(VolumeRequest::parse(" down ").unwrap(), VolumeRequest::Down);
        assert_eq!(
            VolumeRequest::parse("73").unwrap(),
            VolumeRequest::Absolute(73)
        );
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(VolumeRequest::parse("0").is_err());
        assert!(VolumeRequest::parse("150").is_err());
        assert!(VolumeRequest::parse("-10").is_err());
        assert!(VolumeRequest::parse("fuerte").is_err());
    }
}
