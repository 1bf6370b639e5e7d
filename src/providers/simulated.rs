use super::{
    LocationProvider, LocationUpdates, MediaSession, Notifications, NowPlayingItem,
    PermissionStatus,
};
use crate::error::{Error, Result};
use crate::geo::LocationFix;
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;

/// In-process media session driven by `set_now_playing`
///
/// Used by the console binary and by tests in place of a platform session.
#[derive(Default)]
pub struct SimulatedMediaSession {
    item: Mutex<Option<NowPlayingItem>>,
    subscribers: Mutex<Vec<UnboundedSender<()>>>,
}

impl SimulatedMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current item and notify every live subscriber
    pub fn set_now_playing(&self, item: Option<NowPlayingItem>) {
        *self.item.lock() = item;

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.unbounded_send(()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

#[async_trait]
impl MediaSession for SimulatedMediaSession {
    async fn now_playing(&self) -> Result<Option<NowPlayingItem>> {
        Ok(self.item.lock().clone())
    }

    fn notifications(&self) -> Result<Notifications> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        Ok(rx.boxed())
    }
}

/// In-process location service driven by `push_fix`
pub struct SimulatedLocation {
    permission: PermissionStatus,
    subscribers: Mutex<Vec<UnboundedSender<LocationFix>>>,
}

impl SimulatedLocation {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            permission,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn push_fix(&self, fix: LocationFix) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.unbounded_send(fix).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn updates(&self) -> Result<LocationUpdates> {
        if self.permission == PermissionStatus::Denied {
            return Err(Error::PermissionDenied);
        }

        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        Ok(rx.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    #[tokio::test]
    async fn test_media_session_notifies_subscribers() {
        let session = SimulatedMediaSession::new();
        let mut notifications = session.notifications().unwrap();
        assert_eq!(session.subscriber_count(), 1);

        session.set_now_playing(Some(NowPlayingItem {
            title: Some("Song".to_string()),
            artist: None,
        }));

        assert_eq!(notifications.next().await, Some(()));
        let item = session.now_playing().await.unwrap().unwrap();
        assert_eq!(item.title.as_deref(), Some("Song"));

        drop(notifications);
        assert_eq!(session.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_location_refuses_updates() {
        let location = SimulatedLocation::new(PermissionStatus::Denied);
        assert_eq!(location.request_permission().await, PermissionStatus::Denied);
        assert!(matches!(location.updates(), Err(Error::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_location_pushes_fixes() {
        let location = SimulatedLocation::new(PermissionStatus::Granted);
        let mut updates = location.updates().unwrap();

        let fix = LocationFix::new(Coordinate::new(1.0, 2.0));
        location.push_fix(fix);

        assert_eq!(updates.next().await, Some(fix));
    }
}
