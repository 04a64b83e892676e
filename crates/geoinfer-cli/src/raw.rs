use std::path::Path;

use anyhow::{ensure, Context, Result};
use geoinfer_core::{FieldSize, Raster};

/// Reads a headerless raster of little-endian f32 samples, pixel-interleaved.
pub fn read_raster(path: &Path, size: FieldSize, bands: usize) -> Result<Raster> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let expected = size.area() * bands * 4;
    ensure!(
        bytes.len() == expected,
        "{} holds {} bytes, a {size}x{bands} f32 raster needs {expected}",
        path.display(),
        bytes.len()
    );
    let data = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Raster::new(size.width, size.height, bands, data)?)
}

pub fn write_raster(path: &Path, raster: &Raster) -> Result<()> {
    let mut bytes = Vec::with_capacity(raster.data().len() * 4);
    for v in raster.data() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() -> Result<()> {
        let path = std::env::temp_dir().join(format!("geoinfer-raw-{}.f32", std::process::id()));
        let raster = Raster::new(2, 1, 2, vec![1.0, -2.5, 3.25, 0.0])?;
        write_raster(&path, &raster)?;
        let back = read_raster(&path, FieldSize::new(2, 1), 2)?;
        std::fs::remove_file(&path)?;
        assert_eq!(back, raster);
        Ok(())
    }

    #[test]
    fn rejects_short_files() -> Result<()> {
        let path = std::env::temp_dir().join(format!("geoinfer-short-{}.f32", std::process::id()));
        std::fs::write(&path, [0u8; 6])?;
        let err = read_raster(&path, FieldSize::new(1, 1), 2).unwrap_err();
        std::fs::remove_file(&path)?;
        assert!(err.to_string().contains("needs 8"), "{err}");
        Ok(())
    }
}
