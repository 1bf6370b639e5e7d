pub mod connection;
pub mod location;
pub mod now_playing;
pub mod resolver;

pub use connection::{ConnectionHandle, ConnectionLink};
pub use location::LocationTracker;
pub use now_playing::{NowPlayingMirror, TrackInfo};
pub use resolver::{Destination, DestinationResolver, Navigation, ResolverHandle, SearchStatus};
