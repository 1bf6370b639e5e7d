use crate::error::Result;
use crate::geo::LocationFix;
use crate::providers::{LocationProvider, PermissionStatus};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Most recent location fix, if the platform lets us have one
pub struct LocationTracker {
    permission: PermissionStatus,
    fix: watch::Receiver<Option<LocationFix>>,
    task: Option<JoinHandle<()>>,
}

impl LocationTracker {
    pub async fn start(provider: Arc<dyn LocationProvider>) -> Result<Self> {
        let permission = provider.request_permission().await;
        let (tx, rx) = watch::channel(None);

        if permission == PermissionStatus::Denied {
            tracing::info!("Location permission denied, distance will stay unknown");
            return Ok(Self {
                permission,
                fix: rx,
                task: None,
            });
        }

        let mut updates = provider.updates()?;
        tracing::info!("Location updates started");

        let task = tokio::spawn(async move {
            while let Some(fix) = updates.next().await {
                tracing::debug!(
                    "Location fix: {:.5}, {:.5}",
                    fix.coordinate.latitude,
                    fix.coordinate.longitude
                );
                tx.send_replace(Some(fix));
            }
            tracing::debug!("Location update stream ended");
        });

        Ok(Self {
            permission,
            fix: rx,
            task: Some(task),
        })
    }

    pub fn permission(&self) -> PermissionStatus {
        self.permission
    }

    pub fn current(&self) -> Option<LocationFix> {
        *self.fix.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LocationFix>> {
        self.fix.clone()
    }

    /// Stop updates and wait for the update task to finish
    ///
    /// Dropping the tracker aborts the task without waiting, so a fix may
    /// still be published shortly after the drop.
    pub async fn release(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!("Location tracker released");
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::providers::SimulatedLocation;

    #[tokio::test]
    async fn test_latest_fix_wins() {
        let provider = Arc::new(SimulatedLocation::new(PermissionStatus::Granted));
        let tracker = LocationTracker::start(provider.clone()).await.unwrap();
        assert_eq!(tracker.current(), None);

        let mut fix = tracker.subscribe();
        let first = LocationFix::new(Coordinate::new(37.0, -122.0));
        let second = LocationFix::new(Coordinate::new(37.1, -122.1));
        provider.push_fix(first);
        provider.push_fix(second);

        fix.wait_for(|f| *f == Some(second)).await.unwrap();
        assert_eq!(tracker.current(), Some(second));
    }

    #[tokio::test]
    async fn test_denied_permission_leaves_fix_absent() {
        let provider = Arc::new(SimulatedLocation::new(PermissionStatus::Denied));
        let tracker = LocationTracker::start(provider.clone()).await.unwrap();

        assert_eq!(tracker.permission(), PermissionStatus::Denied);
        assert_eq!(provider.subscriber_count(), 0);

        provider.push_fix(LocationFix::new(Coordinate::new(1.0, 1.0)));
        tokio::task::yield_now().await;
        assert_eq!(tracker.current(), None);
    }

    #[tokio::test]
    async fn test_release_stops_updates() {
        let provider = Arc::new(SimulatedLocation::new(PermissionStatus::Granted));
        let tracker = LocationTracker::start(provider.clone()).await.unwrap();
        let fix = tracker.subscribe();

        tracker.release().await;
        assert_eq!(provider.subscriber_count(), 0);

        provider.push_fix(LocationFix::new(Coordinate::new(2.0, 2.0)));
        assert_eq!(*fix.borrow(), None);
    }
}
