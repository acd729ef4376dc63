mod channel;
mod chunk;
mod transfer;

pub use channel::{DataTransferChannel, TransferRequest, UploadRequest};
pub use chunk::{Chunk, TransferData, assemble, chunk, expected_chunks};
pub use transfer::{Transfer, TransferPhase};
