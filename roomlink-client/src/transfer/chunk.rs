use bytes::{Bytes, BytesMut};
use roomlink_core::TransferDataType;

/// Payload of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferData {
    Blob(Bytes),
    DataUrl(String),
}

impl TransferData {
    pub fn data_type(&self) -> TransferDataType {
        match self {
            Self::Blob(_) => TransferDataType::Blob,
            Self::DataUrl(_) => TransferDataType::DataUrl,
        }
    }

    /// Declared size: bytes for blobs, characters for data URLs.
    pub fn size(&self) -> u64 {
        match self {
            Self::Blob(bytes) => bytes.len() as u64,
            Self::DataUrl(url) => url.chars().count() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// One frame of a transfer. Blob chunks travel as binary frames, data URL
/// chunks as text frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Binary(Bytes),
    Text(String),
}

impl Chunk {
    pub fn size(&self) -> u64 {
        match self {
            Self::Binary(bytes) => bytes.len() as u64,
            Self::Text(text) => text.chars().count() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Binary(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }
}

pub fn expected_chunks(size: u64, chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64)
}

/// Splits `data` into chunks of at most `chunk_size` units.
pub fn chunk(data: &TransferData, chunk_size: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    match data {
        TransferData::Blob(bytes) => {
            let mut chunks = Vec::with_capacity(bytes.len().div_ceil(chunk_size));
            let mut offset = 0;
            while offset < bytes.len() {
                let end = (offset + chunk_size).min(bytes.len());
                chunks.push(Chunk::Binary(bytes.slice(offset..end)));
                offset = end;
            }
            chunks
        }
        TransferData::DataUrl(url) => {
            let chars: Vec<char> = url.chars().collect();
            chars
                .chunks(chunk_size)
                .map(|part| Chunk::Text(part.iter().collect()))
                .collect()
        }
    }
}

/// Concatenates chunks in order. Chunks of the wrong kind are skipped.
pub fn assemble(data_type: TransferDataType, chunks: &[Chunk]) -> TransferData {
    match data_type {
        TransferDataType::Blob => {
            let mut buf = BytesMut::new();
            for chunk in chunks {
                if let Chunk::Binary(bytes) = chunk {
                    buf.extend_from_slice(bytes);
                }
            }
            TransferData::Blob(buf.freeze())
        }
        TransferDataType::DataUrl => {
            let mut url = String::new();
            for chunk in chunks {
                if let Chunk::Text(text) = chunk {
                    url.push_str(text);
                }
            }
            TransferData::DataUrl(url)
        }
    }
}
