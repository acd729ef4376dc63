pub use roomlink_core::model::PeerId;
pub use roomlink_core::{Error, Result, RoomConfig, RoomOptions};

pub mod model {
    pub use roomlink_core::model::*;
}

pub mod config {
    pub use roomlink_core::config::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use roomlink_client::*;
}
