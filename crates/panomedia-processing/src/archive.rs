//! Source extraction: zip archives and boundary-delimited frame buffers.

use std::io::{Cursor, Read};

use crate::error::{ProcessingError, Result};

/// Reads every file entry of a zip archive, sorted by entry name.
pub fn unzip_entries(data: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() || file.name().starts_with("__MACOSX") {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        entries.push((name, buf));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Extracts the single image a zipped panorama upload carries.
pub fn unzip_single(data: &[u8]) -> Result<Vec<u8>> {
    unzip_entries(data)?
        .into_iter()
        .next()
        .map(|(_, bytes)| bytes)
        .ok_or_else(|| ProcessingError::Decompress("archive contains no files".to_string()))
}

/// Splits concatenated frames on `boundary`. Empty segments are dropped.
pub fn split_frames(data: &[u8], boundary: &[u8]) -> Vec<Vec<u8>> {
    if boundary.is_empty() {
        return if data.is_empty() {
            Vec::new()
        } else {
            vec![data.to_vec()]
        };
    }

    let mut frames = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + boundary.len() <= data.len() {
        if &data[i..i + boundary.len()] == boundary {
            if i > start {
                frames.push(data[start..i].to_vec());
            }
            i += boundary.len();
            start = i;
        } else {
            i += 1;
        }
    }
    if start < data.len() {
        frames.push(data[start..].to_vec());
    }
    frames
}

/// Frames of a live-photo upload.
///
/// A zipped upload holding several files yields one frame per file. A single
/// buffer (zipped or not) is split on the boundary marker.
pub fn extract_frames(data: &[u8], zipped: bool, boundary: Option<&str>) -> Result<Vec<Vec<u8>>> {
    let buffer = if zipped {
        let mut entries = unzip_entries(data)?;
        match entries.len() {
            0 => {
                return Err(ProcessingError::Decompress(
                    "archive contains no files".to_string(),
                ))
            }
            1 => entries.remove(0).1,
            _ => return Ok(entries.into_iter().map(|(_, bytes)| bytes).collect()),
        }
    } else {
        data.to_vec()
    };

    let frames = match boundary {
        Some(marker) => split_frames(&buffer, marker.as_bytes()),
        None => vec![buffer],
    };

    if frames.is_empty() {
        return Err(ProcessingError::InvalidPayload(
            "live photo contains no frames".to_string(),
        ));
    }
    Ok(frames)
}
