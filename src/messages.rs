use crate::error::Result;
use crate::services::resolver::Destination;
use tokio::sync::oneshot;

/// Commands for the ConnectionLink service
pub enum ConnectionCommand {
    Connect(oneshot::Sender<ConnectionState>),
    Toggle(oneshot::Sender<ConnectionState>),
    Disconnect(oneshot::Sender<ConnectionState>),
}

/// Commands for the DestinationResolver service
pub enum ResolverCommand {
    Search {
        query: String,
        reply: oneshot::Sender<Result<SearchOutcome>>,
    },
    Clear(oneshot::Sender<()>),
}

/// Helmet link state (observable via watch channel)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// What became of a single `search()` call
#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    /// The query was blank, nothing was looked up
    Ignored,
    /// The first-ranked candidate is now the destination
    Found(Destination),
    /// The provider answered with no candidates
    NotFound,
    /// A later search was issued before this one answered
    Superseded,
}
