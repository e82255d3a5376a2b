use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter},
};

use crate::audio::track::PlaybackSource;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const BLURPLE: Colour = Colour::from_rgb(114, 137, 218);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const PROJECT_URL: &str = "https://github.com/melodia-bot/melodia";

/// Ancho máximo de la descripción en el embed de estado.
const DESCRIPTION_WIDTH: usize = 157;

/// Embed de estado "Now Playing"/"Now Streaming"/"Paused" de la pista en
/// curso.
pub fn create_now_playing_embed(source: &PlaybackSource, playing: bool) -> CreateEmbed {
    let author = if !playing {
        "Paused"
    } else if source.is_live {
        "Now Streaming"
    } else {
        "Now Playing"
    };

    let mut embed = CreateEmbed::default()
        .title(&source.title)
        .colour(colors::BLURPLE)
        .author(CreateEmbedAuthor::new(author).url(PROJECT_URL))
        .timestamp(Timestamp::now());

    if let Some(url) = &source.web_url {
        embed = embed.url(url);
    }
    if let Some(description) = &source.description {
        embed = embed.description(shorten(description, DESCRIPTION_WIDTH));
    }
    if let Some(thumbnail) = &source.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    let mut footer = CreateEmbedFooter::new(format!("Requested by: {}", source.requester.name));
    if let Some(avatar) = &source.requester.avatar_url {
        footer = footer.icon_url(avatar);
    }
    embed = embed.footer(footer);

    if let Some(uploader) = &source.uploader {
        embed = embed.field("Uploaded by", uploader, true);
    }
    if let Some(duration) = source.duration {
        embed = embed.field("Duration", format_duration(duration), true);
    }

    embed
}

/// Resumen de una pista que ya terminó de sonar.
pub fn create_played_embed(source: &PlaybackSource) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(&source.title)
        .colour(colors::BLURPLE)
        .author(CreateEmbedAuthor::new("Played"));

    if let Some(url) = &source.web_url {
        embed = embed.url(url);
    }

    embed
}

/// Listado de la cola: pista en curso más las pendientes en orden.
pub fn create_queue_embed(current: Option<&str>, pending: &[String]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .colour(colors::INFO_BLUE)
        .timestamp(Timestamp::now());

    if current.is_none() && pending.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .colour(colors::NEUTRAL_GRAY);
    }

    if let Some(title) = current {
        embed = embed.field("▶️ Reproduciendo", format!("**{title}**"), false);
    }

    if !pending.is_empty() {
        let listing = pending
            .iter()
            .enumerate()
            .map(|(i, title)| format!("**{}**. {}", i + 1, title))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Próximas canciones", listing, false);
    }

    embed
}

/// Formatea una duración en segundos como `H:MM:SS`, u `MM:SS` si no llega a
/// la hora.
pub fn format_duration(total_seconds: u64) -> String {
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Acorta un texto a `width` caracteres colapsando espacios y cortando en
/// límite de palabra, con `...` como marcador de recorte.
pub fn shorten(text: &str, width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    const PLACEHOLDER: &str = "...";
    let mut result = String::new();
    for word in collapsed.split(' ') {
        let word_len = word.chars().count();
        let candidate = if result.is_empty() {
            word_len
        } else {
            result.chars().count() + 1 + word_len
        };
        if candidate + PLACEHOLDER.len() > width {
            break;
        }
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }

    result.push_str(PLACEHOLDER);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_sub_hour_durations_as_mm_ss() {
        assert_eq!(format_duration(45), "00:45");
        assert_eq!(format_duration(125), "02:05");
        assert_eq!(format_duration(3599), "59:59");
    }

    #[test]
    fn formats_hour_durations_as_h_mm_ss() {
        assert_eq!(format_duration(3661), "1:01:01");
        assert_eq!(format_duration(7322), "2:02:02");
    }

    #[test]
    fn shorten_keeps_short_text_intact() {
        assert_eq!(shorten("hola mundo", 157), "hola mundo");
    }

    #[test]
    fn shorten_collapses_whitespace() {
        assert_eq!(shorten("hola   \n  mundo", 157), "hola mundo");
    }

    #[test]
    fn shorten_truncates_on_word_boundary_with_ellipsis() {
        let text = "palabra ".repeat(50);
        let short = shorten(&text, 157);

        assert!(short.chars().count() <= 157);
        assert!(short.ends_with("..."));
        // Nunca corta una palabra por la mitad
        let body = short.trim_end_matches("...");
        assert!(body.split(' ').all(|w| w == "palabra"));
    }
}
