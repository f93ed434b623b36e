//! Windowed GeoTIFF output.

use super::window::Window;
use super::{RasterSpec, TileOutcome};
use crate::config::defaults::NODATA;
use crate::error::Result;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Internal I/O block layout of an output GeoTIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    /// GDAL's default long single-row stripes.
    RowStripes,
    /// Fixed-size square blocks of the given edge, for aggregation input.
    Square(usize),
}

impl BlockLayout {
    fn creation_options(&self) -> Result<CslStringList> {
        let mut options = CslStringList::new();
        options.add_string("COMPRESS=DEFLATE")?;
        if let BlockLayout::Square(edge) = self {
            options.add_string("TILED=YES")?;
            options.add_string(&format!("BLOCKXSIZE={}", edge))?;
            options.add_string(&format!("BLOCKYSIZE={}", edge))?;
        }
        Ok(options)
    }
}

/// Streams windows into a new single-band GeoTIFF.
///
/// The writer tracks whether any non-nodata value was written; on
/// [`finish`](TileWriter::finish) an output that holds only nodata is
/// deleted rather than promoted to a final tile, and the caller learns which
/// happened through [`TileOutcome`].
pub struct TileWriter<T: GdalType + Copy + Default + PartialEq> {
    dataset: Dataset,
    path: PathBuf,
    has_data: bool,
    _pixel: PhantomData<T>,
}

impl<T: GdalType + Copy + Default + PartialEq> TileWriter<T> {
    /// Creates the output raster on the same grid as `spec`.
    ///
    /// The band type is `T`, nodata is 0, and the projection and
    /// geotransform are inherited from the stage's inputs.
    pub fn create(path: &Path, spec: &RasterSpec, layout: BlockLayout) -> Result<Self> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let options = layout.creation_options()?;
        let mut dataset = driver.create_with_band_type_with_options::<T, _>(
            path,
            spec.width,
            spec.height,
            1,
            &options,
        )?;
        dataset.set_geo_transform(&spec.geo_transform)?;
        dataset.set_projection(&spec.projection)?;
        let mut band = dataset.rasterband(1)?;
        band.set_no_data_value(Some(NODATA))?;
        drop(band);

        debug!(path = %path.display(), width = spec.width, height = spec.height, "created output raster");
        Ok(Self {
            dataset,
            path: path.to_path_buf(),
            has_data: false,
            _pixel: PhantomData,
        })
    }

    /// Writes one window. The array shape must match the window.
    pub fn write_window(&mut self, window: &Window, data: &Array2<T>) -> Result<()> {
        debug_assert_eq!(data.dim(), window.dim());
        let nodata = T::default();
        if !self.has_data && data.iter().any(|v| *v != nodata) {
            self.has_data = true;
        }

        let values: Vec<T> = data.iter().copied().collect();
        let mut buffer = Buffer::new(window.size(), values);
        let mut band = self.dataset.rasterband(1)?;
        band.write(window.offset(), window.size(), &mut buffer)?;
        Ok(())
    }

    /// Finalizes the output.
    ///
    /// If every written pixel was nodata the file is deleted and
    /// [`TileOutcome::DeletedEmpty`] is returned.
    pub fn finish(self) -> Result<TileOutcome> {
        let Self {
            dataset,
            path,
            has_data,
            ..
        } = self;
        // Close the dataset before touching the file.
        drop(dataset);

        if has_data {
            Ok(TileOutcome::Written(path))
        } else {
            info!(path = %path.display(), "output contained only nodata, deleting");
            std::fs::remove_file(&path)?;
            Ok(TileOutcome::DeletedEmpty(path))
        }
    }

    /// Path of the output being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{InputSpec, TileSetReader, WindowPlan};

    fn test_spec(width: usize, height: usize) -> RasterSpec {
        RasterSpec {
            width,
            height,
            geo_transform: [110.0, 0.00025, 0.0, 0.0, 0.0, -0.00025],
            projection: String::new(),
            nodata: Some(NODATA),
        }
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("00N_110E_test.tif");
        let spec = test_spec(8, 8);

        let plan = WindowPlan::stripes(8, 8, 3);
        let mut writer = TileWriter::<f32>::create(&path, &spec, BlockLayout::RowStripes).unwrap();
        for window in plan.iter() {
            let data = Array2::from_shape_fn(window.dim(), |(r, c)| {
                ((window.y_off + r) * 8 + window.x_off + c) as f32
            });
            writer.write_window(&window, &data).unwrap();
        }
        let outcome = writer.finish().unwrap();
        assert_eq!(outcome, TileOutcome::Written(path.clone()));

        let reader = TileSetReader::open(&[InputSpec::required(&path)]).unwrap();
        assert_eq!(reader.spec().width, 8);
        let full = Window {
            x_off: 0,
            y_off: 0,
            width: 8,
            height: 8,
        };
        let data = reader.read_window::<f32>(0, &full).unwrap();
        assert_eq!(data[[0, 0]], 0.0);
        assert_eq!(data[[7, 7]], 63.0);
        assert_eq!(data[[3, 2]], 26.0);
    }

    #[test]
    fn test_all_nodata_output_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("00N_110E_empty.tif");
        let spec = test_spec(4, 4);

        let mut writer = TileWriter::<f32>::create(&path, &spec, BlockLayout::RowStripes).unwrap();
        let window = Window {
            x_off: 0,
            y_off: 0,
            width: 4,
            height: 4,
        };
        writer
            .write_window(&window, &Array2::zeros(window.dim()))
            .unwrap();
        let outcome = writer.finish().unwrap();

        assert_eq!(outcome, TileOutcome::DeletedEmpty(path.clone()));
        assert!(!path.exists(), "empty output must not remain on disk");
    }

    #[test]
    fn test_missing_required_input() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("00N_110E_absent.tif");
        let err = TileSetReader::open(&[InputSpec::required(&absent)]).unwrap_err();
        assert!(matches!(err, crate::error::FluxError::MissingInputTile { .. }));
    }

    #[test]
    fn test_missing_optional_input_reads_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("00N_110E_present.tif");
        let absent = dir.path().join("00N_110E_absent.tif");

        let spec = test_spec(4, 4);
        let mut writer =
            TileWriter::<u8>::create(&present, &spec, BlockLayout::RowStripes).unwrap();
        let window = Window {
            x_off: 0,
            y_off: 0,
            width: 4,
            height: 4,
        };
        writer
            .write_window(&window, &Array2::from_elem(window.dim(), 7u8))
            .unwrap();
        writer.finish().unwrap();

        let reader = TileSetReader::open(&[
            InputSpec::required(&present),
            InputSpec::optional(&absent),
        ])
        .unwrap();
        assert!(reader.is_present(0));
        assert!(!reader.is_present(1));

        let zeros = reader.read_window::<u8>(1, &window).unwrap();
        assert!(zeros.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tif");
        let b = dir.path().join("b.tif");
        let window = Window {
            x_off: 0,
            y_off: 0,
            width: 4,
            height: 4,
        };

        let mut writer = TileWriter::<u8>::create(&a, &test_spec(4, 4), BlockLayout::RowStripes).unwrap();
        writer
            .write_window(&window, &Array2::from_elem(window.dim(), 1u8))
            .unwrap();
        writer.finish().unwrap();

        let mut shifted = test_spec(4, 4);
        shifted.geo_transform[0] = 120.0;
        let mut writer = TileWriter::<u8>::create(&b, &shifted, BlockLayout::RowStripes).unwrap();
        writer
            .write_window(&window, &Array2::from_elem(window.dim(), 1u8))
            .unwrap();
        writer.finish().unwrap();

        let err =
            TileSetReader::open(&[InputSpec::required(&a), InputSpec::required(&b)]).unwrap_err();
        assert!(matches!(err, crate::error::FluxError::SpatialMismatch { .. }));
    }
}
