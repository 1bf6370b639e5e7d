use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the helmet services
///
/// Missing permission, empty search results and superseded lookups are not
/// errors; they show up as absent values or as a `SearchOutcome`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The geocoding provider could not be reached or answered garbage
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The platform refused access to location updates
    #[error("Location permission denied")]
    PermissionDenied,

    /// The actor behind a handle has shut down
    #[error("{0} service stopped")]
    ServiceStopped(&'static str),
}

impl Error {
    /// Message suitable for showing to the rider
    pub fn user_message(&self) -> String {
        match self {
            Error::ProviderUnavailable(_) => {
                "Search is unavailable right now. Please try again.".to_string()
            }
            Error::PermissionDenied => {
                "Location access is off. Distance to destination is unavailable.".to_string()
            }
            Error::ServiceStopped(_) => "The companion app needs a restart.".to_string(),
        }
    }
}
