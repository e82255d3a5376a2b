use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::{
    audio::track::QueueEntry,
    error::{MusicError, Result},
};

/// Cola FIFO sin límite de una guild.
///
/// `push` nunca bloquea y despierta a un `pop` en espera; `pop` suspende sólo
/// al task que lo llama, nunca a las colas de otras guilds. Sin prioridades
/// ni deduplicación: el orden de inserción es el orden de salida.
#[derive(Default)]
pub struct TrackQueue {
    items: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encola una entrada y despierta a un consumidor en espera.
    pub fn push(&self, entry: QueueEntry) {
        info!("➕ Agregado a la cola: {}", entry.title());
        self.items.lock().push_back(entry);
        self.notify.notify_one();
    }

    /// Espera la próxima entrada hasta `wait` como máximo.
    ///
    /// Devuelve [`MusicError::QueueTimeout`] si la ventana expira con la cola
    /// vacía; ese es el disparador de la auto-destrucción del player.
    pub async fn pop(&self, wait: Duration) -> Result<QueueEntry> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            if let Some(entry) = self.items.lock().pop_front() {
                debug!("➡️ Siguiente en cola: {}", entry.title());
                return Ok(entry);
            }

            let notified = self.notify.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(MusicError::QueueTimeout);
            }
        }
    }

    /// Vacía la cola de forma atómica, liberando el stream de cada entrada ya
    /// materializada. Devuelve cuántas entradas se descartaron.
    pub fn clear(&self) -> usize {
        let drained: Vec<QueueEntry> = {
            let mut items = self.items.lock();
            items.drain(..).collect()
        };

        let count = drained.len();
        for entry in drained {
            if let QueueEntry::Materialized(mut source) = entry {
                source.release();
            }
        }

        if count > 0 {
            info!("🗑️ Cola limpiada: {} entrada(s) descartada(s)", count);
        }
        count
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Títulos de las entradas pendientes, en orden de reproducción.
    pub fn snapshot(&self) -> Vec<String> {
        self.items
            .lock()
            .iter()
            .map(|entry| entry.title().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{PlaybackSource, Requester};
    use crate::sources::RawMetadata;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn requester() -> Requester {
        Requester {
            id: UserId::new(7),
            name: "tester".to_string(),
            avatar_url: None,
        }
    }

    fn lazy(title: &str) -> QueueEntry {
        QueueEntry::Lazy {
            url: format!("https://youtu.be/{title}"),
            title: title.to_string(),
            requester: requester(),
        }
    }

    fn materialized(path: &std::path::Path) -> QueueEntry {
        let meta = RawMetadata {
            title: Some("local".to_string()),
            filename: Some(path.to_path_buf()),
            ..RawMetadata::default()
        };
        let source = PlaybackSource::from_metadata(meta, requester()).unwrap();
        QueueEntry::Materialized(source)
    }

    #[tokio::test]
    async fn pop_returns_entries_in_push_order() {
        let queue = TrackQueue::new();
        queue.push(lazy("a"));
        queue.push(lazy("b"));
        queue.push(lazy("c"));

        for expected in ["a", "b", "c"] {
            let entry = queue.pop(Duration::from_millis(50)).await.unwrap();
            assert_eq!(entry.title(), expected);
        }
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_queue() {
        let queue = TrackQueue::new();
        let result = queue.pop(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(MusicError::QueueTimeout)));
    }

    #[tokio::test]
    async fn push_wakes_waiting_pop() {
        let queue = Arc::new(TrackQueue::new());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(lazy("despierta"));

        let entry = waiter.await.unwrap().unwrap();
        assert_eq!(entry.title(), "despierta");
    }

    #[tokio::test]
    async fn clear_releases_materialized_streams_and_empties_queue() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("pista-{i}.webm"));
                std::fs::write(&path, b"audio").unwrap();
                path
            })
            .collect();

        let queue = TrackQueue::new();
        for path in &paths {
            queue.push(materialized(path));
        }
        queue.push(lazy("pendiente"));

        assert_eq!(queue.clear(), 4);
        assert!(queue.is_empty());
        for path in &paths {
            assert!(!path.exists(), "{} debería haberse borrado", path.display());
        }

        // Tras limpiar, pop vuelve a bloquear hasta el timeout
        let result = queue.pop(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(MusicError::QueueTimeout)));
    }

    #[tokio::test]
    async fn snapshot_preserves_order() {
        let queue = TrackQueue::new();
        queue.push(lazy("uno"));
        queue.push(lazy("dos"));
        assert_eq!(queue.snapshot(), vec!["uno".to_string(), "dos".to_string()]);
    }
}
