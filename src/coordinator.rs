use crate::geo::Coordinate;
use crate::messages::ConnectionState;
use crate::services::now_playing::TrackInfo;
use crate::services::resolver::{Navigation, SearchStatus};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Red,
    Orange,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIndicator {
    pub label: &'static str,
    pub color: StatusColor,
}

impl From<ConnectionState> for StatusIndicator {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self {
                label: "Disconnected",
                color: StatusColor::Red,
            },
            ConnectionState::Connecting => Self {
                label: "Connecting...",
                color: StatusColor::Orange,
            },
            ConnectionState::Connected => Self {
                label: "Connected",
                color: StatusColor::Green,
            },
        }
    }
}

/// Destination pin on the map
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: Uuid,
    pub title: String,
    pub coordinate: Coordinate,
}

/// Everything the rendering layer binds to, always taken from one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub connection: ConnectionState,
    pub status: StatusIndicator,
    pub track: TrackInfo,
    pub rider: Option<Coordinate>,
    pub map_center: Coordinate,
    pub marker: Option<Marker>,
    pub distance_label: Option<String>,
    pub search: SearchStatus,
}

/// Upstream channels the coordinator fans in
///
/// The rider position arrives inside `navigation`, together with the distance
/// measured from it, rather than from the location channel directly.
pub struct ViewportInputs {
    pub connection: watch::Receiver<ConnectionState>,
    pub track: watch::Receiver<TrackInfo>,
    pub navigation: watch::Receiver<Navigation>,
}

/// Folds the service channels into one `ViewModel`
///
/// Runs on a single task; every upstream change produces exactly one
/// recomputation, so readers never observe half-applied updates. The map
/// center is the only state of its own: it follows new destinations and is
/// never reset.
pub struct ViewportCoordinator {
    inputs: ViewportInputs,
    connection_open: bool,
    track_open: bool,
    navigation_open: bool,
    map_center: Coordinate,
    centered_on: Option<Uuid>,
    view_tx: watch::Sender<ViewModel>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl ViewportCoordinator {
    pub fn spawn(inputs: ViewportInputs, fallback_center: Coordinate) -> ViewportHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let mut coordinator = Self {
            inputs,
            connection_open: true,
            track_open: true,
            navigation_open: true,
            map_center: fallback_center,
            centered_on: None,
            view_tx: watch::Sender::new(placeholder_view(fallback_center)),
            shutdown_rx,
        };
        coordinator.recompute();

        let view = coordinator.view_tx.subscribe();
        let task = tokio::spawn(coordinator.run());

        ViewportHandle {
            view,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => break,

                changed = self.inputs.connection.changed(), if self.connection_open => {
                    self.connection_open = source_alive(changed, "connection");
                }

                changed = self.inputs.track.changed(), if self.track_open => {
                    self.track_open = source_alive(changed, "now playing");
                }

                changed = self.inputs.navigation.changed(), if self.navigation_open => {
                    self.navigation_open = source_alive(changed, "navigation");
                }
            }

            self.recompute();
        }

        tracing::debug!("Viewport coordinator stopped");
    }

    fn recompute(&mut self) {
        let connection = *self.inputs.connection.borrow_and_update();
        let track = self.inputs.track.borrow_and_update().clone();
        let navigation = self.inputs.navigation.borrow_and_update().clone();

        let marker = navigation.destination().map(|destination| Marker {
            id: destination.id,
            title: destination.display_name.clone(),
            coordinate: destination.coordinate,
        });

        if let Some(marker) = &marker {
            if self.centered_on != Some(marker.id) {
                tracing::debug!("Centering map on {}", marker.title);
                self.centered_on = Some(marker.id);
                self.map_center = marker.coordinate;
            }
        }

        let view = ViewModel {
            connection,
            status: StatusIndicator::from(connection),
            track,
            rider: navigation.rider(),
            map_center: self.map_center,
            marker,
            distance_label: navigation.distance().map(|d| d.label()),
            search: navigation.search().clone(),
        };

        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

fn placeholder_view(map_center: Coordinate) -> ViewModel {
    ViewModel {
        connection: ConnectionState::Disconnected,
        status: StatusIndicator::from(ConnectionState::Disconnected),
        track: TrackInfo::default(),
        rider: None,
        map_center,
        marker: None,
        distance_label: None,
        search: SearchStatus::Idle,
    }
}

fn source_alive(changed: Result<(), watch::error::RecvError>, name: &str) -> bool {
    if changed.is_err() {
        tracing::debug!("{} source closed, keeping its last value", name);
        return false;
    }
    true
}

/// Read side of the coordinator
pub struct ViewportHandle {
    view: watch::Receiver<ViewModel>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ViewportHandle {
    pub fn current(&self) -> ViewModel {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view.clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Viewport coordinator ended abnormally: {}", e);
        }
    }
}
