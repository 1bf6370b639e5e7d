use crate::error::{Error, Result};
use crate::geo::{Coordinate, DistanceReading, LocationFix};
use crate::messages::{ResolverCommand, SearchOutcome};
use crate::providers::{Candidate, GeocodeError, Geocoder};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// The place the rider is heading to
///
/// Every committed search gets a fresh `id`, even when it resolves to the
/// same place, so viewers can tell a new destination from a re-render.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub id: Uuid,
    pub display_name: String,
    pub coordinate: Coordinate,
}

impl From<Candidate> for Destination {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: candidate.display_name,
            coordinate: candidate.coordinate,
        }
    }
}

/// Progress of the most recently issued search
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching(String),
    NotFound(String),
    Failed(String),
}

/// Destination, rider position and derived distance, as published by the resolver
///
/// `rider` is the fix `distance` was measured from. Both are set in the same
/// publish, so a reader never sees a position without the matching distance;
/// `distance` is present iff `destination` and `rider` are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Navigation {
    destination: Option<Destination>,
    rider: Option<Coordinate>,
    distance: Option<DistanceReading>,
    search: SearchStatus,
}

impl Navigation {
    pub(crate) fn new(
        destination: Option<Destination>,
        fix: Option<&LocationFix>,
        search: SearchStatus,
    ) -> Self {
        let distance = match (&destination, fix) {
            (Some(destination), Some(fix)) => Some(DistanceReading::between(
                &fix.coordinate,
                &destination.coordinate,
            )),
            _ => None,
        };

        Self {
            destination,
            rider: fix.map(|fix| fix.coordinate),
            distance,
            search,
        }
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    pub fn rider(&self) -> Option<Coordinate> {
        self.rider
    }

    pub fn distance(&self) -> Option<DistanceReading> {
        self.distance
    }

    pub fn search(&self) -> &SearchStatus {
        &self.search
    }
}

/// A finished geocoder call on its way back to the resolver task
struct Lookup {
    seq: u64,
    query: String,
    result: std::result::Result<Vec<Candidate>, GeocodeError>,
    reply: oneshot::Sender<Result<SearchOutcome>>,
}

/// Resolves free-text destinations and keeps the distance to them current
///
/// The resolver is the only reader of the location channel on the way to the
/// view, so position and distance always come out of one publish.
///
/// Lookups run on their own tasks so a new search never waits for an old one.
/// Each lookup carries the sequence number it was issued with; only the most
/// recently issued one may commit when it comes back.
pub struct DestinationResolver {
    geocoder: Arc<dyn Geocoder>,
    cmd_rx: mpsc::Receiver<ResolverCommand>,
    lookup_tx: mpsc::UnboundedSender<Lookup>,
    lookup_rx: mpsc::UnboundedReceiver<Lookup>,
    location: watch::Receiver<Option<LocationFix>>,
    location_open: bool,
    state_tx: watch::Sender<Navigation>,
    latest_issued: u64,
}

impl DestinationResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        cmd_rx: mpsc::Receiver<ResolverCommand>,
        location: watch::Receiver<Option<LocationFix>>,
        state_tx: watch::Sender<Navigation>,
    ) -> Self {
        let (lookup_tx, lookup_rx) = mpsc::unbounded_channel();

        Self {
            geocoder,
            cmd_rx,
            lookup_tx,
            lookup_rx,
            location,
            location_open: true,
            state_tx,
            latest_issued: 0,
        }
    }

    /// Create the resolver, spawn it, and return its handle
    pub fn spawn(
        geocoder: Arc<dyn Geocoder>,
        location: watch::Receiver<Option<LocationFix>>,
    ) -> ResolverHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(10);
        let (state_tx, state_rx) = watch::channel(Navigation::default());
        let resolver = Self::new(geocoder, cmd_rx, location, state_tx);
        tokio::spawn(resolver.run());
        ResolverHandle::new(cmd_tx, state_rx)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },

                Some(lookup) = self.lookup_rx.recv() => {
                    self.handle_lookup(lookup);
                }

                changed = self.location.changed(), if self.location_open => match changed {
                    Ok(()) => self.refresh_rider(),
                    Err(_) => {
                        tracing::debug!("Location source closed, distance frozen to last fix");
                        self.location_open = false;
                    }
                },
            }
        }

        tracing::debug!("Destination resolver stopped");
    }

    fn handle_command(&mut self, cmd: ResolverCommand) {
        match cmd {
            ResolverCommand::Search { query, reply } => {
                let query = query.trim().to_string();
                if query.is_empty() {
                    tracing::debug!("Ignoring blank search");
                    let _ = reply.send(Ok(SearchOutcome::Ignored));
                    return;
                }

                self.latest_issued += 1;
                let seq = self.latest_issued;
                tracing::info!("Searching for {:?} (#{})", query, seq);

                let destination = self.state_tx.borrow().destination.clone();
                self.publish(destination, SearchStatus::Searching(query.clone()));

                let geocoder = self.geocoder.clone();
                let lookup_tx = self.lookup_tx.clone();
                tokio::spawn(async move {
                    let result = geocoder.geocode(&query).await;
                    let _ = lookup_tx.send(Lookup {
                        seq,
                        query,
                        result,
                        reply,
                    });
                });
            }

            ResolverCommand::Clear(reply) => {
                // anything still in flight must not bring the old destination back
                self.latest_issued += 1;
                tracing::info!("Destination cleared");
                self.publish(None, SearchStatus::Idle);
                let _ = reply.send(());
            }
        }
    }

    fn handle_lookup(&mut self, lookup: Lookup) {
        let Lookup {
            seq,
            query,
            result,
            reply,
        } = lookup;

        if seq != self.latest_issued {
            tracing::debug!(
                "Discarding result for {:?} (#{}), #{} is current",
                query,
                seq,
                self.latest_issued
            );
            let _ = reply.send(Ok(SearchOutcome::Superseded));
            return;
        }

        let previous = self.state_tx.borrow().destination.clone();

        let outcome = match result {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(best) => {
                    let destination = Destination::from(best);
                    tracing::info!(
                        "Destination set: {} ({:.5}, {:.5})",
                        destination.display_name,
                        destination.coordinate.latitude,
                        destination.coordinate.longitude
                    );
                    self.publish(Some(destination.clone()), SearchStatus::Idle);
                    Ok(SearchOutcome::Found(destination))
                }
                None => {
                    tracing::info!("No places found for {:?}", query);
                    self.publish(previous, SearchStatus::NotFound(query));
                    Ok(SearchOutcome::NotFound)
                }
            },
            Err(e) => {
                tracing::warn!("Geocoding {:?} failed: {}", query, e);
                let error = Error::from(e);
                self.publish(previous, SearchStatus::Failed(error.user_message()));
                Err(error)
            }
        };

        let _ = reply.send(outcome);
    }

    /// Republish with the latest fix so rider and distance move together
    fn refresh_rider(&mut self) {
        let (destination, search) = {
            let current = self.state_tx.borrow();
            (current.destination.clone(), current.search.clone())
        };

        self.publish(destination, search);
    }

    fn publish(&self, destination: Option<Destination>, search: SearchStatus) {
        let fix = *self.location.borrow();
        let navigation = Navigation::new(destination, fix.as_ref(), search);
        self.state_tx.send_if_modified(|current| {
            if *current == navigation {
                false
            } else {
                *current = navigation;
                true
            }
        });
    }
}

/// Handle for communicating with the DestinationResolver
#[derive(Clone)]
pub struct ResolverHandle {
    tx: mpsc::Sender<ResolverCommand>,
    state: watch::Receiver<Navigation>,
}

impl ResolverHandle {
    pub fn new(tx: mpsc::Sender<ResolverCommand>, state: watch::Receiver<Navigation>) -> Self {
        Self { tx, state }
    }

    /// Look up `query` and make the best match the destination
    ///
    /// Resolves once this search's own lookup has come back. Provider
    /// failures are returned as `Error::ProviderUnavailable`.
    pub async fn search(&self, query: impl Into<String>) -> Result<SearchOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ResolverCommand::Search {
                query: query.into(),
                reply,
            })
            .await
            .map_err(|_| Error::ServiceStopped("resolver"))?;

        rx.await.map_err(|_| Error::ServiceStopped("resolver"))?
    }

    pub async fn clear(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ResolverCommand::Clear(reply))
            .await
            .map_err(|_| Error::ServiceStopped("resolver"))?;

        rx.await.map_err(|_| Error::ServiceStopped("resolver"))
    }

    pub fn current(&self) -> Navigation {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Navigation> {
        self.state.clone()
    }
}
