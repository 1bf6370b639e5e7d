use crate::console::{self, ConsoleCommand};

use anyhow::{Context, Result};
use helmet::config::{Config, ConnectPolicy};
use helmet::coordinator::{ViewModel, ViewportCoordinator, ViewportHandle, ViewportInputs};
use helmet::geo::LocationFix;
use helmet::messages::SearchOutcome;
use helmet::providers::{
    NominatimGeocoder, NowPlayingItem, PermissionStatus, SimulatedLocation, SimulatedMediaSession,
};
use helmet::services::{
    ConnectionHandle, ConnectionLink, DestinationResolver, LocationTracker, NowPlayingMirror,
    ResolverHandle,
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct App {
    config: Config,
    media: Arc<SimulatedMediaSession>,
    location: Arc<SimulatedLocation>,
    connection: ConnectionHandle,
    now_playing: NowPlayingMirror,
    tracker: LocationTracker,
    resolver: ResolverHandle,
    viewport: ViewportHandle,
    console_rx: mpsc::Receiver<ConsoleCommand>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let media = Arc::new(SimulatedMediaSession::new());
        let permission = if config.location_permission {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        let location = Arc::new(SimulatedLocation::new(permission));

        let geocoder = NominatimGeocoder::new(
            &config.geocoder_url,
            &config.user_agent,
            config.request_timeout(),
            config.max_candidates,
        )
        .context("Failed to create geocoder client")?;

        let connection = ConnectionLink::spawn(config.connect_delay());
        let now_playing = NowPlayingMirror::start(media.clone())
            .await
            .context("Failed to subscribe to media session")?;
        let tracker = LocationTracker::start(location.clone())
            .await
            .context("Failed to start location updates")?;
        let resolver = DestinationResolver::spawn(Arc::new(geocoder), tracker.subscribe());

        let viewport = ViewportCoordinator::spawn(
            ViewportInputs {
                connection: connection.subscribe(),
                track: now_playing.subscribe(),
                navigation: resolver.subscribe(),
            },
            config.fallback_center,
        );

        let console_rx = Self::setup_console();

        tracing::info!(
            "Ready! Type `button` to connect ({:?} policy), `search <place>`, `fix <lat> <lon>`",
            config.connect_policy
        );

        Ok(Self {
            config,
            media,
            location,
            connection,
            now_playing,
            tracker,
            resolver,
            viewport,
            console_rx,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let mut view = self.viewport.subscribe();
        log_view(&view.borrow_and_update());

        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                cmd = self.console_rx.recv() => match cmd {
                    Some(ConsoleCommand::Quit) | None => break,
                    Some(cmd) => {
                        if let Err(e) = self.handle_command(cmd).await {
                            tracing::error!("Error handling command: {}", e);
                        }
                    }
                },

                changed = view.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    log_view(&view.borrow_and_update());
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
        tracing::info!("Helmet companion shutdown complete");
        Ok(())
    }

    async fn handle_command(&mut self, cmd: ConsoleCommand) -> Result<()> {
        match cmd {
            ConsoleCommand::Button => match self.config.connect_policy {
                ConnectPolicy::Delayed => {
                    self.connection.connect().await?;
                }
                ConnectPolicy::Instant => {
                    self.connection.toggle().await?;
                }
            },
            ConsoleCommand::Connect => {
                self.connection.connect().await?;
            }
            ConsoleCommand::Toggle => {
                self.connection.toggle().await?;
            }
            ConsoleCommand::Disconnect => {
                self.connection.disconnect().await?;
            }
            ConsoleCommand::Search(query) => self.spawn_search(query),
            ConsoleCommand::Clear => self.resolver.clear().await?,
            ConsoleCommand::Fix(coordinate) => self.location.push_fix(LocationFix::new(coordinate)),
            ConsoleCommand::Play { title, artist } => {
                self.media.set_now_playing(Some(NowPlayingItem {
                    title: Some(title),
                    artist,
                }));
            }
            ConsoleCommand::Stop => self.media.set_now_playing(None),
            ConsoleCommand::Status => log_view(&self.viewport.current()),
            ConsoleCommand::Quit => {}
        }

        Ok(())
    }

    /// Searches run detached so the loop keeps serving input while the geocoder works
    fn spawn_search(&self, query: String) {
        let resolver = self.resolver.clone();
        tokio::spawn(async move {
            match resolver.search(query).await {
                Ok(SearchOutcome::Found(destination)) => {
                    tracing::info!("Heading to {}", destination.display_name);
                }
                Ok(SearchOutcome::NotFound) => tracing::info!("No matching places"),
                Ok(SearchOutcome::Superseded) => {
                    tracing::debug!("Search result dropped, a newer search is running");
                }
                Ok(SearchOutcome::Ignored) => tracing::info!("Type something to search for"),
                Err(e) => tracing::warn!("Search failed: {} ({})", e.user_message(), e),
            }
        });
    }

    async fn shutdown(self) {
        self.viewport.shutdown().await;
        self.now_playing.release().await;
        self.tracker.release().await;
    }

    fn setup_console() -> mpsc::Receiver<ConsoleCommand> {
        let (console_tx, console_rx) = mpsc::channel(10);
        tokio::spawn(async move {
            if let Err(e) = console::monitor_stdin(console_tx).await {
                tracing::error!("Console input failed: {}", e);
            }
        });
        console_rx
    }
}

fn log_view(view: &ViewModel) {
    let destination = match (&view.marker, &view.distance_label) {
        (Some(marker), Some(distance)) => format!("{} ({})", marker.title, distance),
        (Some(marker), None) => format!("{} (distance unknown)", marker.title),
        _ => "no destination".to_string(),
    };

    tracing::info!(
        "[{} / {:?}] {} - {} | map {:.4}, {:.4} | {} | search: {:?}",
        view.status.label,
        view.status.color,
        view.track.title,
        view.track.artist,
        view.map_center.latitude,
        view.map_center.longitude,
        destination,
        view.search
    );
}
