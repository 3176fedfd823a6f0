//! Upload fixtures.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use panomedia_core::models::ShareTarget;
use panomedia_services::{ImageUpload, ThumbnailUpload, UploadRequest, MIME_JPEG};

pub const FRAME_BOUNDARY: &str = "--panomedia-frame--";

pub fn jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 120, 200]));
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 80)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    Bytes::from(buffer)
}

pub fn pano_request(width: u32, height: u32) -> UploadRequest {
    UploadRequest {
        owner_id: "user-1".to_string(),
        image: ImageUpload {
            buffer: Some(jpeg(width, height)),
            mimetype: Some(MIME_JPEG.to_string()),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        },
        thumbnail: ThumbnailUpload {
            buffer: Some(jpeg(64, 32)),
            mimetype: Some(MIME_JPEG.to_string()),
            lat: Some(45.83),
            lng: Some(6.86),
        },
        caption: Some("Mont Blanc".to_string()),
        tags: vec!["alps".to_string()],
        ..Default::default()
    }
}

pub fn live_request(frames: usize) -> UploadRequest {
    let mut buffer = Vec::new();
    for _ in 0..frames {
        buffer.extend_from_slice(&jpeg(32, 48));
        buffer.extend_from_slice(FRAME_BOUNDARY.as_bytes());
    }

    UploadRequest {
        owner_id: "user-2".to_string(),
        image: ImageUpload {
            buffer: Some(Bytes::from(buffer)),
            mimetype: Some(MIME_JPEG.to_string()),
            width: Some(32),
            height: Some(48),
            orientation: Some("portrait".to_string()),
            action: Some("horizontal".to_string()),
            img_arr_boundary: Some(FRAME_BOUNDARY.to_string()),
        },
        thumbnail: ThumbnailUpload {
            buffer: Some(jpeg(16, 24)),
            mimetype: Some(MIME_JPEG.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn share_target(name: &str) -> ShareTarget {
    ShareTarget {
        name: name.to_string(),
        access_token: "token".to_string(),
    }
}
