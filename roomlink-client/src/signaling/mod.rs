mod gateway;
mod message_constructor;
mod ws_gateway;

pub use gateway::{GatewayEvent, SignalingGateway};
pub use message_constructor::MessageConstructor;
pub use ws_gateway::WsSignalingGateway;
