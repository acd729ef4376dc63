mod message_reactor;
mod room;
mod room_command;
mod room_state;
mod runtime;
mod tie_breaker;

pub use room::{RoomDeps, RoomSession};
pub use room_command::RoomCommand;
pub use room_state::{RoomState, filter_ice_servers};
pub use tie_breaker::{Contender, initial_tie_breaker, is_offerer};
