//! Equirectangular tile grid.
//!
//! A panorama is cut into a 4x2 grid. Tiles `0..4` form the top row and `4..8` the
//! bottom row. The last column and the last row absorb the remainder of the integer
//! division so the tiles exactly cover the source.

use crate::error::{ProcessingError, Result};

pub const TILE_COLUMNS: u32 = 4;
pub const TILE_ROWS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub index: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub fn compute_tiles(width: u32, height: u32) -> Result<Vec<TileGeometry>> {
    if width < TILE_COLUMNS || height < TILE_ROWS {
        return Err(ProcessingError::InvalidDimensions { width, height });
    }

    let tile_width = width / TILE_COLUMNS;
    let tile_height = height / TILE_ROWS;

    let tiles = (0..TILE_COLUMNS * TILE_ROWS)
        .map(|index| {
            let column = index % TILE_COLUMNS;
            let row = index / TILE_COLUMNS;
            let x = column * tile_width;
            let y = row * tile_height;
            TileGeometry {
                index,
                x,
                y,
                width: if column == TILE_COLUMNS - 1 {
                    width - x
                } else {
                    tile_width
                },
                height: if row == TILE_ROWS - 1 {
                    height - y
                } else {
                    tile_height
                },
            }
        })
        .collect();

    Ok(tiles)
}
