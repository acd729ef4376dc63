use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use roomlink::client::TransferData;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads a file as a blob, or as a base64 data URL when `as_data_url` is set.
pub fn load(path: &Path, as_data_url: bool) -> Result<(String, TransferData)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let data = if as_data_url {
        TransferData::DataUrl(encode_data_url(mime_for(&name), &bytes))
    } else {
        TransferData::Blob(Bytes::from(bytes))
    };
    Ok((name, data))
}

/// Writes a completed download under `dir`, returning the final path.
pub fn save(dir: &Path, name: &str, data: &TransferData) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download".into());
    let path = dir.join(file_name);

    let bytes = match data {
        TransferData::Blob(bytes) => bytes.to_vec(),
        TransferData::DataUrl(url) => decode_data_url(url)?,
    };
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .context("not a data URL")?;
    if header.ends_with(";base64") {
        STANDARD
            .decode(payload)
            .context("data URL payload is not valid base64")
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

fn mime_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("txt") | Some("md") => "text/plain",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
