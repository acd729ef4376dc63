pub mod config;
pub mod error;
pub mod model;
pub mod utils;

pub use config::{
    Bandwidth, CandidateFilter, HealthSettings, RoomConfig, RoomOptions, TransferSettings,
};
pub use error::{ConfigError, Error, FieldError, Result, TransferError};
pub use model::*;
