use anyhow::{Context, Result};
use hilbert_2d::{Variant, h2xy_discrete, xy2h_discrete};

use crate::error::CodecError;
use crate::model::{Coordinate, TileId};

pub const MAX_ZOOM: u8 = 15;
pub const DEFAULT_ZOOM: u8 = 12;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

pub trait TileScheme {
    fn tile_of(&self, coordinate: Coordinate) -> TileId;
}

impl<F> TileScheme for F
where
    F: Fn(Coordinate) -> TileId,
{
    fn tile_of(&self, coordinate: Coordinate) -> TileId {
        self(coordinate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HilbertGrid {
    zoom: u8,
}

impl HilbertGrid {
    pub fn new(zoom: u8) -> Result<Self> {
        if zoom > MAX_ZOOM {
            return Err(CodecError::InvalidZoom(zoom).into());
        }
        Ok(Self { zoom })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }
}

impl Default for HilbertGrid {
    fn default() -> Self {
        Self { zoom: DEFAULT_ZOOM }
    }
}

impl TileScheme for HilbertGrid {
    fn tile_of(&self, coordinate: Coordinate) -> TileId {
        let (x, y) = mercator_xy(coordinate, self.zoom);
        tile_id_from_xyz(self.zoom, x, y) as TileId
    }
}

pub fn mercator_xy(coordinate: Coordinate, zoom: u8) -> (u32, u32) {
    let n = (1u64 << zoom) as f64;
    let max_index = (1u64 << zoom) - 1;
    let lon = coordinate.longitude.clamp(-180.0, 180.0);
    let lat = coordinate
        .latitude
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * n).floor();

    // NaN casts to 0; the upper clamp covers lon == 180 and the pole edge.
    let x = (x.max(0.0) as u64).min(max_index) as u32;
    let y = (y.max(0.0) as u64).min(max_index) as u32;
    (x, y)
}

pub fn tile_id_from_xyz(z: u8, x: u32, y: u32) -> u64 {
    if z == 0 {
        return 0;
    }
    let order = z as usize;
    let hilbert = xy2h_discrete(x as usize, y as usize, order, Variant::Hilbert) as u64;
    let base_id = (pow4(z) - 1) / 3;
    base_id + hilbert
}

pub fn tile_id_to_xyz(tile_id: u64) -> (u8, u32, u32) {
    if tile_id == 0 {
        return (0, 0, 0);
    }
    let mut z = 1u8;
    loop {
        let base_id = (pow4(z) - 1) / 3;
        let next_base = (pow4(z + 1) - 1) / 3;
        if tile_id < next_base {
            let idx = tile_id - base_id;
            let (x, y) = h2xy_discrete(idx as usize, z as usize, Variant::Hilbert);
            return (z, x as u32, y as u32);
        }
        z += 1;
    }
}

pub fn parse_tile_spec(value: &str) -> Result<TileId> {
    let trimmed = value.trim();
    if !trimmed.contains('/') {
        return trimmed.parse().context("invalid tile id");
    }
    let mut parts = trimmed.split('/');
    let zoom_str = parts.next().context("tile must be an id or z/x/y")?;
    let x_str = parts.next().context("tile must be an id or z/x/y")?;
    let y_str = parts.next().context("tile must be an id or z/x/y")?;
    if parts.next().is_some() {
        anyhow::bail!("tile must be an id or z/x/y");
    }
    let zoom: u8 = zoom_str.parse().context("invalid tile zoom")?;
    let x: u32 = x_str.parse().context("invalid tile x")?;
    let y: u32 = y_str.parse().context("invalid tile y")?;
    if zoom > MAX_ZOOM {
        return Err(CodecError::InvalidZoom(zoom).into());
    }
    if u64::from(x) >= 1u64 << zoom || u64::from(y) >= 1u64 << zoom {
        anyhow::bail!("tile {zoom}/{x}/{y} is outside the grid");
    }
    Ok(tile_id_from_xyz(zoom, x, y) as TileId)
}

pub fn pow4(z: u8) -> u64 {
    1u64 << (2 * (z as u64))
}
