mod connection_wrapper;
mod data_channel_wrapper;
mod media;
mod peer_connection;
mod transport_event;

pub use connection_wrapper::*;
pub use data_channel_wrapper::*;
pub use media::*;
pub use peer_connection::*;
pub use transport_event::*;
