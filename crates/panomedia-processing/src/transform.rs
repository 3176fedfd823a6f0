//! Decode, crop, downsample and JPEG-encode operations used by the tile worker.
//!
//! These are CPU bound; async callers run them through `spawn_blocking`.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::sync::Arc;

use crate::error::Result;
use crate::tiling::TileGeometry;

pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(data)?)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut buffer = Vec::with_capacity((width * height / 4) as usize);
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).write_image(
        rgb.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(Bytes::from(buffer))
}

pub fn crop_tile(img: &DynamicImage, tile: &TileGeometry) -> DynamicImage {
    img.crop_imm(tile.x, tile.y, tile.width, tile.height)
}

pub fn downsample(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    img.resize_exact(width, height, FilterType::Triangle)
}

pub async fn decode_blocking(data: Bytes) -> Result<DynamicImage> {
    tokio::task::spawn_blocking(move || decode(&data)).await?
}

pub async fn crop_and_encode(
    source: Arc<DynamicImage>,
    tile: TileGeometry,
    quality: u8,
) -> Result<Bytes> {
    tokio::task::spawn_blocking(move || encode_jpeg(&crop_tile(&source, &tile), quality)).await?
}

pub async fn downsample_blocking(
    source: Arc<DynamicImage>,
    width: u32,
    height: u32,
) -> Result<DynamicImage> {
    Ok(tokio::task::spawn_blocking(move || downsample(&source, width, height)).await?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tiling::compute_tiles;
    use image::{GenericImageView, Rgb, RgbImage};

    pub(crate) fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        encode_jpeg(&DynamicImage::ImageRgb8(img), 90).unwrap().to_vec()
    }

    #[test]
    fn crop_matches_tile_geometry() {
        let img = decode(&gradient_jpeg(103, 51)).unwrap();
        let tiles = compute_tiles(103, 51).unwrap();
        let last = crop_tile(&img, &tiles[7]);
        assert_eq!(last.dimensions(), (28, 26));
    }

    #[test]
    fn encoded_tile_decodes_back() {
        let img = decode(&gradient_jpeg(64, 32)).unwrap();
        let tile = compute_tiles(64, 32).unwrap()[2];
        let bytes = encode_jpeg(&crop_tile(&img, &tile), 80).unwrap();
        assert_eq!(decode(&bytes).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn downsample_is_exact() {
        let img = decode(&gradient_jpeg(200, 100)).unwrap();
        assert_eq!(downsample(&img, 40, 20).dimensions(), (40, 20));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(decode(b"not an image").is_err());
    }
}
