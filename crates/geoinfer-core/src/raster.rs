use std::fmt;
use std::str::FromStr;

use crate::{ModelError, ModelResult};

/// A spatial extent in pixels: receptive fields, expression fields, image sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldSize {
    pub width: usize,
    pub height: usize,
}

impl FieldSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FieldSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for FieldSize {
    type Err = ModelError;

    /// Parses `WxH`, or a single `N` for a square field.
    fn from_str(s: &str) -> ModelResult<Self> {
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| ModelError::configuration(format!("invalid field size `{s}`")))
        };
        match s.split_once(['x', 'X']) {
            Some((w, h)) => Ok(Self::new(parse(w)?, parse(h)?)),
            None => {
                let n = parse(s)?;
                Ok(Self::new(n, n))
            }
        }
    }
}

/// A rectangle of pixels, in the index space of some raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn whole(size: FieldSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> FieldSize {
        FieldSize::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_in(&self, size: FieldSize) -> bool {
        self.x + self.width <= size.width && self.y + self.height <= size.height
    }
}

/// Multi-band raster with f32 samples, pixel-interleaved (band varies fastest).
///
/// `origin` is the physical position of the upper-left corner of pixel (0, 0);
/// `spacing` is the physical size of one pixel along x and y.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: usize,
    origin: [f64; 2],
    spacing: [f64; 2],
    data: Vec<f32>,
}

impl Raster {
    pub fn new(width: usize, height: usize, bands: usize, data: Vec<f32>) -> ModelResult<Self> {
        if bands == 0 {
            return Err(ModelError::configuration("raster must have at least one band"));
        }
        let expected = width * height * bands;
        if data.len() != expected {
            return Err(ModelError::configuration(format!(
                "raster {width}x{height}x{bands} needs {expected} samples, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bands,
            origin: [0.0, 0.0],
            spacing: [1.0, 1.0],
            data,
        })
    }

    pub fn filled(width: usize, height: usize, bands: usize, value: f32) -> Self {
        Self {
            width,
            height,
            bands: bands.max(1),
            origin: [0.0, 0.0],
            spacing: [1.0, 1.0],
            data: vec![value; width * height * bands.max(1)],
        }
    }

    pub fn with_geometry(mut self, origin: [f64; 2], spacing: [f64; 2]) -> Self {
        self.origin = origin;
        self.spacing = spacing;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn bands(&self) -> usize {
        self.bands
    }
    pub fn size(&self) -> FieldSize {
        FieldSize::new(self.width, self.height)
    }
    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }
    pub fn spacing(&self) -> [f64; 2] {
        self.spacing
    }
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Physical size of the raster along x and y.
    pub fn extent(&self) -> [f64; 2] {
        [
            self.width as f64 * self.spacing[0],
            self.height as f64 * self.spacing[1],
        ]
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let start = (y * self.width + x) * self.bands;
        &self.data[start..start + self.bands]
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let start = (y * self.width + x) * self.bands;
        &mut self.data[start..start + self.bands]
    }

    /// Pixel at a signed index, or `None` outside the raster.
    pub fn checked_pixel(&self, x: i64, y: i64) -> Option<&[f32]> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.pixel(x as usize, y as usize))
    }

    /// Index of the pixel containing a physical point.
    pub fn index_of(&self, point: [f64; 2]) -> [i64; 2] {
        [
            ((point[0] - self.origin[0]) / self.spacing[0]).floor() as i64,
            ((point[1] - self.origin[1]) / self.spacing[1]).floor() as i64,
        ]
    }

    pub fn crop(&self, region: Region) -> ModelResult<Raster> {
        if !region.fits_in(self.size()) {
            return Err(ModelError::configuration(format!(
                "region {}x{} at ({}, {}) exceeds raster {}",
                region.width,
                region.height,
                region.x,
                region.y,
                self.size()
            )));
        }
        let mut data = Vec::with_capacity(region.width * region.height * self.bands);
        for y in region.y..region.y + region.height {
            let start = (y * self.width + region.x) * self.bands;
            data.extend_from_slice(&self.data[start..start + region.width * self.bands]);
        }
        let origin = [
            self.origin[0] + region.x as f64 * self.spacing[0],
            self.origin[1] + region.y as f64 * self.spacing[1],
        ];
        Ok(Raster {
            width: region.width,
            height: region.height,
            bands: self.bands,
            origin,
            spacing: self.spacing,
            data,
        })
    }

    /// Copies `tile` into `self` with its upper-left pixel at `(x, y)`.
    pub fn paste(&mut self, x: usize, y: usize, tile: &Raster) -> ModelResult<()> {
        if tile.bands != self.bands {
            return Err(ModelError::configuration(format!(
                "cannot paste a {}-band tile into a {}-band raster",
                tile.bands, self.bands
            )));
        }
        if !Region::new(x, y, tile.width, tile.height).fits_in(self.size()) {
            return Err(ModelError::configuration(format!(
                "tile {} at ({x}, {y}) exceeds raster {}",
                tile.size(),
                self.size()
            )));
        }
        let row = tile.width * self.bands;
        for ty in 0..tile.height {
            let dst = ((y + ty) * self.width + x) * self.bands;
            let src = ty * row;
            self.data[dst..dst + row].copy_from_slice(&tile.data[src..src + row]);
        }
        Ok(())
    }
}
