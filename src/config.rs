use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub idle_timeout: u64, // En segundos; la ventana antes de auto-destruir un player

    // Resolución de medios (yt-dlp)
    pub audio_format: String,
    pub stream_retries: u32,
    pub socket_timeout: u64,
    pub max_playlist_size: usize,

    // Paths
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            idle_timeout: std::env::var("IDLE_TIMEOUT")
                .unwrap_or_else(|_| "300".to_string()) // 5 minutos
                .parse()?,

            // Resolución de medios
            audio_format: std::env::var("AUDIO_FORMAT")
                .unwrap_or_else(|_| "webm[abr>0]/bestaudio/best".to_string()),
            stream_retries: std::env::var("STREAM_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            socket_timeout: std::env::var("SOCKET_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            // Paths
            cache_dir: std::env::var("CACHE_DIR")
                .unwrap_or_else(|_| "/app/cache".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.cache_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Valida los valores de configuración antes de arrancar el bot.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 1.0, se recibió: {}",
                self.default_volume
            );
        }

        if self.idle_timeout == 0 {
            anyhow::bail!("La ventana de inactividad debe ser mayor a 0 segundos");
        }

        if self.audio_format.trim().is_empty() {
            anyhow::bail!("El formato de audio no puede estar vacío");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("El tamaño máximo de playlist debe ser mayor a 0");
        }

        Ok(())
    }

    /// Resumen de la configuración activa para los logs, sin datos sensibles.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {}s idle timeout\n  \
            Resolver: formato `{}`, {} reintentos, {}s socket timeout\n  \
            Límites: {} canciones por playlist",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.idle_timeout,
            self.audio_format,
            self.stream_retries,
            self.socket_timeout,
            self.max_playlist_size,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults - deben proveerse)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio
            default_volume: 0.5,
            idle_timeout: 300, // 5 minutos

            // Resolución de medios
            audio_format: "webm[abr>0]/bestaudio/best".to_string(),
            stream_retries: 3,
            socket_timeout: 30,
            max_playlist_size: 100,

            // Paths
            cache_dir: "/app/cache".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let config = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_idle_timeout() {
        let config = Config {
            idle_timeout: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
