use crate::transfer::chunk::{Chunk, TransferData, chunk, expected_chunks};
use roomlink_core::{TransferDataType, TransferDirection, TransferId, TransferInfo};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Upload queued until its transient channel opens.
    AwaitingOpen,
    /// `WRQ` sent, waiting for `ACK 0`.
    AwaitingAck,
    /// `WRQ` received, waiting for the local user to accept or reject.
    AwaitingResponse,
    Active,
}

/// The single in-flight transfer of a channel.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: TransferId,
    pub name: String,
    pub direction: TransferDirection,
    pub data_type: TransferDataType,
    pub size: u64,
    pub chunk_size: usize,
    /// Prepared chunks on upload, received chunks on download.
    pub chunks: Vec<Chunk>,
    /// Last acknowledgement received (upload) or sent (download).
    pub ack_n: i64,
    pub received_bytes: u64,
    pub timeout: Duration,
    pub is_private: bool,
    pub phase: TransferPhase,
}

impl Transfer {
    pub fn upload(
        id: TransferId,
        name: String,
        data: &TransferData,
        chunk_size: usize,
        timeout: Duration,
        is_private: bool,
    ) -> Self {
        Self {
            id,
            name,
            direction: TransferDirection::Upload,
            data_type: data.data_type(),
            size: data.size(),
            chunk_size,
            chunks: chunk(data, chunk_size),
            ack_n: -1,
            received_bytes: 0,
            timeout,
            is_private,
            phase: TransferPhase::AwaitingOpen,
        }
    }

    pub fn download(
        id: TransferId,
        name: String,
        data_type: TransferDataType,
        size: u64,
        chunk_size: usize,
        timeout: Duration,
        is_private: bool,
    ) -> Self {
        Self {
            id,
            name,
            direction: TransferDirection::Download,
            data_type,
            size,
            chunk_size,
            chunks: Vec::new(),
            ack_n: -1,
            received_bytes: 0,
            timeout,
            is_private,
            phase: TransferPhase::AwaitingResponse,
        }
    }

    pub fn is_upload(&self) -> bool {
        self.direction == TransferDirection::Upload
    }

    /// Number of chunks the transfer is made of.
    pub fn total_chunks(&self) -> u64 {
        match self.direction {
            TransferDirection::Upload => self.chunks.len() as u64,
            TransferDirection::Download => expected_chunks(self.size, self.chunk_size),
        }
    }

    pub fn is_download_complete(&self) -> bool {
        let total = self.total_chunks();
        (total > 0 && self.ack_n >= total as i64) || self.received_bytes >= self.size
    }

    pub fn percentage(&self) -> u8 {
        let total = self.total_chunks();
        if total == 0 {
            return 0;
        }
        let done = self.ack_n.max(0) as u64;
        ((done.min(total) * 100) / total) as u8
    }

    pub fn info(&self) -> TransferInfo {
        TransferInfo {
            name: self.name.clone(),
            size: self.size,
            data_type: self.data_type,
            direction: self.direction,
            chunk_size: self.chunk_size as u64,
            is_private: self.is_private,
            percentage: self.percentage(),
        }
    }
}
