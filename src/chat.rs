//! Salida de chat del bot.
//!
//! El motor de reproducción nunca habla con la API de Discord directamente:
//! publica texto y embeds a través del trait [`ChatSink`], lo que permite
//! probar el bucle del player contra un canal en memoria. [`DiscordChat`] es
//! la implementación de producción, ligada al canal donde se pidió la música.

use async_trait::async_trait;
use serenity::{
    builder::{CreateEmbed, CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;

use crate::error::{MusicError, Result};

/// Referencia a un mensaje ya publicado, suficiente para editarlo o borrarlo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// Contenido publicable: texto plano o un embed de estado.
#[derive(Clone)]
pub enum ChatContent {
    Text(String),
    Embed(CreateEmbed),
}

#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Publica un mensaje nuevo y devuelve su referencia.
    async fn send(&self, content: ChatContent) -> Result<MessageRef>;

    /// Reemplaza el contenido de un mensaje existente.
    async fn edit(&self, target: MessageRef, content: ChatContent) -> Result<()>;

    /// Borra un mensaje. Un mensaje ya borrado cuenta como éxito.
    async fn delete(&self, target: MessageRef) -> Result<()>;
}

/// Sink de producción sobre la API HTTP de serenity.
pub struct DiscordChat {
    http: Arc<Http>,
    channel: ChannelId,
}

impl DiscordChat {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }
}

#[async_trait]
impl ChatSink for DiscordChat {
    async fn send(&self, content: ChatContent) -> Result<MessageRef> {
        let builder = match content {
            ChatContent::Text(text) => CreateMessage::new().content(text),
            ChatContent::Embed(embed) => CreateMessage::new().embed(embed),
        };

        let sent = self
            .channel
            .send_message(&self.http, builder)
            .await
            .map_err(|e| MusicError::Chat(e.to_string()))?;

        Ok(MessageRef {
            channel: sent.channel_id,
            message: sent.id,
        })
    }

    async fn edit(&self, target: MessageRef, content: ChatContent) -> Result<()> {
        let builder = match content {
            ChatContent::Text(text) => EditMessage::new().content(text),
            ChatContent::Embed(embed) => EditMessage::new().embed(embed),
        };

        target
            .channel
            .edit_message(&self.http, target.message, builder)
            .await
            .map_err(|e| MusicError::Chat(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, target: MessageRef) -> Result<()> {
        match target
            .channel
            .delete_message(&self.http, target.message)
            .await
        {
            Ok(()) => Ok(()),
            // Mensaje ya borrado: no es un error
            Err(ref e) if is_unknown_message(e) => Ok(()),
            Err(e) => Err(MusicError::Chat(e.to_string())),
        }
    }
}

fn is_unknown_message(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(resp)) => {
            resp.status_code.as_u16() == 404
        }
        _ => false,
    }
}
