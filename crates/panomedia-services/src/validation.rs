//! Upload validation.
//!
//! Presence is checked before values: any absent required field fails with
//! "missing properties", then the first bad value fails with
//! "invalid <field> value".

use bytes::Bytes;
use panomedia_core::models::{Dimension, LiveAction, MediaType, Orientation};
use panomedia_core::AppError;

use crate::request::{UploadRequest, MIME_JPEG, MIME_ZIP};

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub dimension: Dimension,
    pub image: Bytes,
    pub has_zipped: bool,
    pub img_arr_boundary: Option<String>,
    pub thumbnail: Bytes,
}

fn present(buffer: &Option<Bytes>) -> Option<&Bytes> {
    buffer.as_ref().filter(|b| !b.is_empty())
}

fn present_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn validate_upload(
    media_type: MediaType,
    request: &UploadRequest,
) -> Result<ValidatedUpload, AppError> {
    let image = &request.image;
    let thumbnail = &request.thumbnail;

    let (
        Some(image_buffer),
        Some(image_mime),
        Some(width),
        Some(height),
        Some(thumbnail_buffer),
        Some(thumbnail_mime),
    ) = (
        present(&image.buffer),
        present_str(&image.mimetype),
        image.width,
        image.height,
        present(&thumbnail.buffer),
        present_str(&thumbnail.mimetype),
    )
    else {
        return Err(AppError::missing_properties());
    };

    let has_zipped = match image_mime {
        MIME_ZIP => true,
        MIME_JPEG => false,
        _ => return Err(AppError::invalid_value("mimetype")),
    };
    if thumbnail_mime != MIME_JPEG {
        return Err(AppError::invalid_value("thumbnail mimetype"));
    }
    if width == 0 {
        return Err(AppError::invalid_value("width"));
    }
    if height == 0 {
        return Err(AppError::invalid_value("height"));
    }

    let (dimension, img_arr_boundary) = match media_type {
        MediaType::PanoPhoto => {
            let (Some(lat), Some(lng)) = (thumbnail.lat, thumbnail.lng) else {
                return Err(AppError::missing_properties());
            };
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::invalid_value("lat"));
            }
            if !(-180.0..=180.0).contains(&lng) {
                return Err(AppError::invalid_value("lng"));
            }
            (
                Dimension::Pano {
                    width,
                    height,
                    lat,
                    lng,
                },
                None,
            )
        }
        MediaType::LivePhoto => {
            let (Some(orientation), Some(action), Some(boundary)) = (
                present_str(&image.orientation),
                present_str(&image.action),
                image.img_arr_boundary.as_deref().filter(|b| !b.is_empty()),
            ) else {
                return Err(AppError::missing_properties());
            };
            let orientation: Orientation = orientation.parse()?;
            let action: LiveAction = action.parse()?;
            (
                Dimension::Live {
                    width,
                    height,
                    orientation,
                    action,
                },
                Some(boundary.to_string()),
            )
        }
    };

    Ok(ValidatedUpload {
        dimension,
        image: image_buffer.clone(),
        has_zipped,
        img_arr_boundary,
        thumbnail: thumbnail_buffer.clone(),
    })
}
