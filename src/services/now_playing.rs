use crate::error::Result;
use crate::providers::{MediaSession, NowPlayingItem};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const UNKNOWN_SONG: &str = "Unknown Song";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
}

impl Default for TrackInfo {
    fn default() -> Self {
        Self {
            title: UNKNOWN_SONG.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
        }
    }
}

impl From<Option<NowPlayingItem>> for TrackInfo {
    fn from(item: Option<NowPlayingItem>) -> Self {
        let Some(item) = item else {
            return Self::default();
        };

        Self {
            title: item.title.unwrap_or_else(|| UNKNOWN_SONG.to_string()),
            artist: item.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        }
    }
}

/// Local read-through copy of the platform's now playing item
///
/// The subscription task owns the notification stream. `release()` waits for
/// it to end, so no update lands after it returns. Dropping the mirror only
/// aborts the task; teardown happens once the runtime gets to it.
pub struct NowPlayingMirror {
    track: watch::Receiver<TrackInfo>,
    task: Option<JoinHandle<()>>,
}

impl NowPlayingMirror {
    pub async fn start(session: Arc<dyn MediaSession>) -> Result<Self> {
        let mut notifications = session.notifications()?;

        let initial = read_track(session.as_ref()).await;
        tracing::info!("Now playing: {} - {}", initial.title, initial.artist);
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while notifications.next().await.is_some() {
                let track = read_track(session.as_ref()).await;
                tracing::debug!("Now playing changed: {} - {}", track.title, track.artist);
                tx.send_replace(track);
            }
            tracing::debug!("Media session notifications ended");
        });

        Ok(Self {
            track: rx,
            task: Some(task),
        })
    }

    pub fn current(&self) -> TrackInfo {
        self.track.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackInfo> {
        self.track.clone()
    }

    /// Stop mirroring; no notification delivered after this returns changes state
    pub async fn release(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!("Now playing mirror released");
    }
}

impl Drop for NowPlayingMirror {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn read_track(session: &dyn MediaSession) -> TrackInfo {
    match session.now_playing().await {
        Ok(item) => TrackInfo::from(item),
        Err(e) => {
            tracing::warn!("Failed to read now playing item: {}", e);
            TrackInfo::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SimulatedMediaSession;

    fn item(title: &str, artist: &str) -> Option<NowPlayingItem> {
        Some(NowPlayingItem {
            title: Some(title.to_string()),
            artist: Some(artist.to_string()),
        })
    }

    #[tokio::test]
    async fn test_placeholder_when_nothing_playing() {
        let session = Arc::new(SimulatedMediaSession::new());
        let mirror = NowPlayingMirror::start(session).await.unwrap();

        assert_eq!(
            mirror.current(),
            TrackInfo {
                title: "Unknown Song".to_string(),
                artist: "Unknown Artist".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_initial_refresh_reads_current_item() {
        let session = Arc::new(SimulatedMediaSession::new());
        session.set_now_playing(item("Ride", "Twenty One Pilots"));

        let mirror = NowPlayingMirror::start(session).await.unwrap();
        assert_eq!(mirror.current().title, "Ride");
    }

    #[tokio::test]
    async fn test_notification_republishes_track() {
        let session = Arc::new(SimulatedMediaSession::new());
        let mirror = NowPlayingMirror::start(session.clone()).await.unwrap();
        let mut track = mirror.subscribe();

        session.set_now_playing(item("Highway Star", "Deep Purple"));
        track.changed().await.unwrap();
        assert_eq!(track.borrow().artist, "Deep Purple");

        session.set_now_playing(None);
        track.changed().await.unwrap();
        assert_eq!(*track.borrow(), TrackInfo::default());
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let track = TrackInfo::from(Some(NowPlayingItem {
            title: Some("Untitled".to_string()),
            artist: None,
        }));
        assert_eq!(track.title, "Untitled");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
    }

    #[tokio::test]
    async fn test_release_unregisters() {
        let session = Arc::new(SimulatedMediaSession::new());
        let mirror = NowPlayingMirror::start(session.clone()).await.unwrap();
        let mut track = mirror.subscribe();
        assert_eq!(session.subscriber_count(), 1);

        mirror.release().await;
        assert_eq!(session.subscriber_count(), 0);

        session.set_now_playing(item("Late", "Nobody"));
        assert_eq!(*track.borrow_and_update(), TrackInfo::default());
        // publisher is gone, so nothing can change it any more
        assert!(track.changed().await.is_err());
    }

    #[tokio::test]
    async fn test_drop_unregisters_eventually() {
        let session = Arc::new(SimulatedMediaSession::new());
        let mirror = NowPlayingMirror::start(session.clone()).await.unwrap();
        drop(mirror);

        // abort lands on the next scheduler turn
        tokio::task::yield_now().await;
        assert_eq!(session.subscriber_count(), 0);
    }
}
