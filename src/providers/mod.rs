pub mod nominatim;
pub mod simulated;

pub use nominatim::NominatimGeocoder;
pub use simulated::{SimulatedLocation, SimulatedMediaSession};

use crate::error::Result;
use crate::geo::{Coordinate, LocationFix};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// "Now playing item changed" ticks; dropping the stream unregisters
pub type Notifications = BoxStream<'static, ()>;

/// Continuous location samples; dropping the stream stops delivery
pub type LocationUpdates = BoxStream<'static, LocationFix>;

/// Metadata for the item the platform media session is playing
///
/// Either field may be missing; the mirror substitutes placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingItem {
    pub title: Option<String>,
    pub artist: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A ranked geocoding result
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub display_name: String,
    pub coordinate: Coordinate,
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoder returned status {0}")]
    Status(u16),

    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(String),
}

impl From<GeocodeError> for crate::error::Error {
    fn from(e: GeocodeError) -> Self {
        crate::error::Error::ProviderUnavailable(e.to_string())
    }
}

/// Platform media session (system-wide now playing)
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Current item, `None` when nothing is playing
    async fn now_playing(&self) -> Result<Option<NowPlayingItem>>;

    /// Register for change notifications
    fn notifications(&self) -> Result<Notifications>;
}

/// Platform location service
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    /// Start the update stream. Only called after permission was granted.
    fn updates(&self) -> Result<LocationUpdates>;
}

/// Free text to ranked places
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> std::result::Result<Vec<Candidate>, GeocodeError>;
}
