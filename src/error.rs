use thiserror::Error;

/// Errores del motor de reproducción.
///
/// Todos los fallos por entrada (resolución, transporte) se contienen dentro
/// de la iteración del bucle que los produjo; `QueueTimeout` dispara la
/// auto-destrucción del player y nunca se muestra al usuario.
#[derive(Error, Debug)]
pub enum MusicError {
    /// El servicio de resolución no pudo procesar una entrada.
    #[error("no se pudo resolver `{query}`: {reason}")]
    Resolution { query: String, reason: String },

    /// La cola no entregó entradas dentro de la ventana de inactividad.
    #[error("la cola no entregó entradas dentro del tiempo de espera")]
    QueueTimeout,

    /// El transporte de voz falló durante la reproducción.
    #[error("fallo de transporte de voz: {0}")]
    Playback(String),

    /// Un comando se invocó sin el estado requerido. Se rechaza en la capa
    /// de comandos con un mensaje al usuario y nunca llega al player.
    #[error("{0}")]
    Precondition(String),

    /// El canal de texto rechazó una operación de mensajería.
    #[error("fallo del canal de texto: {0}")]
    Chat(String),
}

impl MusicError {
    pub fn resolution(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MusicError>;
