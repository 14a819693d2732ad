//! Pure-Rust vision runtime
//!
//! Pixel matrices are `ndarray::Array3<u8>` in (rows, cols, channels) layout.
//! Morphology delegates to `imageproc`; segmentation runs the GMM/ICM
//! refinement from [`super::grabcut`].

use super::gmm::Gmm;
use super::grabcut::{self, ColorModels};
use super::{ColorConversion, MatId, VisionRuntime};
use crate::config::SegmentationConfig;
use crate::error::{CutoutError, Result};
use image::{DynamicImage, GrayImage, RgbaImage};
use imageproc::distance_transform::Norm;
use ndarray::{s, Array3};
use std::collections::HashMap;

enum Buffer {
    Pixels(Array3<u8>),
    Model(Option<Gmm>),
}

/// Runtime owning its buffers in a handle-indexed table
pub struct NativeRuntime {
    buffers: HashMap<u64, Buffer>,
    next_id: u64,
    segmentation: SegmentationConfig,
}

impl NativeRuntime {
    #[must_use]
    pub fn new(segmentation: SegmentationConfig) -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 0,
            segmentation,
        }
    }

    fn insert(&mut self, buffer: Buffer) -> MatId {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, buffer);
        MatId(id)
    }

    fn pixels(&self, mat: MatId) -> Result<&Array3<u8>> {
        match self.buffers.get(&mat.0) {
            Some(Buffer::Pixels(pixels)) => Ok(pixels),
            Some(Buffer::Model(_)) => Err(CutoutError::runtime(format!(
                "{} is a model buffer, not a pixel matrix",
                mat
            ))),
            None => Err(unknown(mat)),
        }
    }

    fn pixels_mut(&mut self, mat: MatId) -> Result<&mut Array3<u8>> {
        match self.buffers.get_mut(&mat.0) {
            Some(Buffer::Pixels(pixels)) => Ok(pixels),
            Some(Buffer::Model(_)) => Err(CutoutError::runtime(format!(
                "{} is a model buffer, not a pixel matrix",
                mat
            ))),
            None => Err(unknown(mat)),
        }
    }

    fn take_model(&mut self, mat: MatId) -> Result<Option<Gmm>> {
        match self.buffers.get_mut(&mat.0) {
            Some(Buffer::Model(model)) => Ok(model.take()),
            Some(Buffer::Pixels(_)) => Err(CutoutError::runtime(format!(
                "{} is a pixel matrix, not a model buffer",
                mat
            ))),
            None => Err(unknown(mat)),
        }
    }

    fn single_channel(&self, mat: MatId, role: &'static str) -> Result<GrayImage> {
        let pixels = self.pixels(mat)?;
        let (rows, cols, channels) = pixels.dim();
        if channels != 1 {
            return Err(CutoutError::UnsupportedChannels { role, channels });
        }
        GrayImage::from_raw(cols as u32, rows as u32, pixels.iter().copied().collect())
            .ok_or_else(|| CutoutError::runtime(format!("{} has inconsistent dimensions", mat)))
    }

    fn morphology(
        &mut self,
        src: MatId,
        kernel: MatId,
        op: fn(&GrayImage, Norm, u8) -> GrayImage,
    ) -> Result<MatId> {
        let gray = self.single_channel(src, "Morphology input")?;
        let (size, _, _) = self.pixels(kernel)?.dim();
        // Square element of side k is the L-infinity ball of radius k / 2
        let radius = u8::try_from(size / 2).unwrap_or(u8::MAX);
        let out = op(&gray, Norm::LInf, radius);
        let (cols, rows) = out.dimensions();
        let array = Array3::from_shape_vec((rows as usize, cols as usize, 1), out.into_raw())
            .map_err(|e| CutoutError::runtime(e.to_string()))?;
        Ok(self.insert(Buffer::Pixels(array)))
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new(SegmentationConfig::default())
    }
}

fn unknown(mat: MatId) -> CutoutError {
    CutoutError::runtime(format!("{} is unknown or already released", mat))
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let value = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    value.round().clamp(0.0, 255.0) as u8
}

impl VisionRuntime for NativeRuntime {
    fn is_available(&self) -> bool {
        true
    }

    fn decode(&mut self, bitmap: &DynamicImage) -> Result<MatId> {
        let (cols, rows) = (bitmap.width() as usize, bitmap.height() as usize);
        let raw = match bitmap {
            DynamicImage::ImageRgba8(img) => img.as_raw().clone(),
            other => other.to_rgba8().into_raw(),
        };
        let array = Array3::from_shape_vec((rows, cols, 4), raw)
            .map_err(|e| CutoutError::runtime(e.to_string()))?;
        Ok(self.insert(Buffer::Pixels(array)))
    }

    fn dims(&self, mat: MatId) -> Result<(usize, usize)> {
        let (rows, cols, _) = self.pixels(mat)?.dim();
        Ok((rows, cols))
    }

    fn channels(&self, mat: MatId) -> Result<usize> {
        Ok(self.pixels(mat)?.dim().2)
    }

    fn convert_color(&mut self, src: MatId, conversion: ColorConversion) -> Result<MatId> {
        let pixels = self.pixels(src)?;
        let (rows, cols, channels) = pixels.dim();
        let (expected, output) = conversion.channels();
        if channels != expected {
            return Err(CutoutError::UnsupportedChannels {
                role: "Conversion input",
                channels,
            });
        }
        let converted = Array3::from_shape_fn((rows, cols, output), |(r, c, k)| match conversion {
            ColorConversion::RgbToRgba => {
                if k == 3 {
                    255
                } else {
                    pixels[[r, c, k]]
                }
            },
            ColorConversion::GrayToRgba => {
                if k == 3 {
                    255
                } else {
                    pixels[[r, c, 0]]
                }
            },
            ColorConversion::RgbaToGray | ColorConversion::RgbToGray => {
                luma(pixels[[r, c, 0]], pixels[[r, c, 1]], pixels[[r, c, 2]])
            },
        });
        Ok(self.insert(Buffer::Pixels(converted)))
    }

    fn resize(&mut self, src: MatId, rows: usize, cols: usize) -> Result<MatId> {
        let pixels = self.pixels(src)?;
        let (src_rows, src_cols, channels) = pixels.dim();
        if src_rows == 0 || src_cols == 0 {
            return Err(CutoutError::runtime(format!("cannot resize empty {}", src)));
        }
        let resized = Array3::from_shape_fn((rows, cols, channels), |(r, c, k)| {
            pixels[[r * src_rows / rows, c * src_cols / cols, k]]
        });
        Ok(self.insert(Buffer::Pixels(resized)))
    }

    fn threshold(&mut self, src: MatId, thresh: u8, max_value: u8) -> Result<MatId> {
        let binary = self
            .pixels(src)?
            .mapv(|v| if v > thresh { max_value } else { 0 });
        Ok(self.insert(Buffer::Pixels(binary)))
    }

    fn structuring_element(&mut self, size: usize) -> Result<MatId> {
        if size == 0 || size % 2 == 0 {
            return Err(CutoutError::runtime(format!(
                "structuring element size must be odd and positive, got {}",
                size
            )));
        }
        Ok(self.insert(Buffer::Pixels(Array3::ones((size, size, 1)))))
    }

    fn erode(&mut self, src: MatId, kernel: MatId) -> Result<MatId> {
        self.morphology(src, kernel, imageproc::morphology::erode)
    }

    fn dilate(&mut self, src: MatId, kernel: MatId) -> Result<MatId> {
        self.morphology(src, kernel, imageproc::morphology::dilate)
    }

    fn new_mat(&mut self, rows: usize, cols: usize, channels: usize, fill: u8) -> Result<MatId> {
        Ok(self.insert(Buffer::Pixels(Array3::from_elem(
            (rows, cols, channels),
            fill,
        ))))
    }

    fn new_model(&mut self) -> Result<MatId> {
        Ok(self.insert(Buffer::Model(None)))
    }

    fn grab_cut(
        &mut self,
        image: MatId,
        labels: MatId,
        bgd_model: MatId,
        fgd_model: MatId,
        iterations: u32,
    ) -> Result<()> {
        let (rows, cols, channels) = self.pixels(image)?.dim();
        if channels < 3 {
            return Err(CutoutError::UnsupportedChannels {
                role: "Segmentation input",
                channels,
            });
        }
        let (label_rows, label_cols, label_channels) = self.pixels(labels)?.dim();
        if (label_rows, label_cols, label_channels) != (rows, cols, 1) {
            return Err(CutoutError::runtime(format!(
                "label matrix {}x{}x{} does not match image {}x{}",
                label_rows, label_cols, label_channels, rows, cols
            )));
        }

        let mut models = ColorModels {
            background: self.take_model(bgd_model)?,
            foreground: self.take_model(fgd_model)?,
        };

        // Move the label matrix out so the image can stay borrowed
        let Some(Buffer::Pixels(mut trimap)) = self.buffers.remove(&labels.0) else {
            return Err(unknown(labels));
        };
        let outcome = self.pixels(image).and_then(|pixels| {
            let pixel_data = pixels
                .as_slice()
                .ok_or_else(|| CutoutError::runtime("image matrix is not contiguous"))?;
            let label_data = trimap
                .as_slice_mut()
                .ok_or_else(|| CutoutError::runtime("label matrix is not contiguous"))?;
            grabcut::refine(
                pixel_data,
                channels,
                label_data,
                rows,
                cols,
                iterations,
                &self.segmentation,
                &mut models,
            )
        });
        self.buffers.insert(labels.0, Buffer::Pixels(trimap));
        self.buffers
            .insert(bgd_model.0, Buffer::Model(models.background));
        self.buffers
            .insert(fgd_model.0, Buffer::Model(models.foreground));
        let stats = outcome?;

        tracing::debug!(
            passes = stats.passes,
            changed = stats.changed,
            "Segmentation refinement finished"
        );
        Ok(())
    }

    fn split(&mut self, src: MatId) -> Result<Vec<MatId>> {
        let pixels = self.pixels(src)?;
        let planes: Vec<Array3<u8>> = (0..pixels.dim().2)
            .map(|k| pixels.slice(s![.., .., k..=k]).to_owned())
            .collect();
        Ok(planes
            .into_iter()
            .map(|plane| self.insert(Buffer::Pixels(plane)))
            .collect())
    }

    fn merge(&mut self, channels: &[MatId]) -> Result<MatId> {
        let planes = channels
            .iter()
            .map(|&mat| self.pixels(mat))
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = planes.first() else {
            return Err(CutoutError::runtime("cannot merge zero channels"));
        };
        let (rows, cols, _) = first.dim();
        for plane in &planes {
            let (r, c, k) = plane.dim();
            if k != 1 {
                return Err(CutoutError::UnsupportedChannels {
                    role: "Merge input",
                    channels: k,
                });
            }
            if (r, c) != (rows, cols) {
                return Err(CutoutError::runtime(format!(
                    "cannot merge {}x{} plane into {}x{} matrix",
                    r, c, rows, cols
                )));
            }
        }
        let merged =
            Array3::from_shape_fn((rows, cols, planes.len()), |(r, c, k)| planes[k][[r, c, 0]]);
        Ok(self.insert(Buffer::Pixels(merged)))
    }

    fn data(&self, mat: MatId) -> Result<&[u8]> {
        self.pixels(mat)?
            .as_slice()
            .ok_or_else(|| CutoutError::runtime(format!("{} is not contiguous", mat)))
    }

    fn data_mut(&mut self, mat: MatId) -> Result<&mut [u8]> {
        self.pixels_mut(mat)?
            .as_slice_mut()
            .ok_or_else(|| CutoutError::runtime(format!("{} is not contiguous", mat)))
    }

    fn to_rgba_image(&self, mat: MatId) -> Result<RgbaImage> {
        let pixels = self.pixels(mat)?;
        let (rows, cols, channels) = pixels.dim();
        if channels != 4 {
            return Err(CutoutError::InvalidBuffer {
                channels,
                empty: rows == 0 || cols == 0,
            });
        }
        RgbaImage::from_raw(cols as u32, rows as u32, pixels.iter().copied().collect())
            .ok_or_else(|| CutoutError::runtime(format!("{} has inconsistent dimensions", mat)))
    }

    fn release(&mut self, mat: MatId) -> Result<()> {
        self.buffers
            .remove(&mat.0)
            .map(|_| ())
            .ok_or_else(|| unknown(mat))
    }

    fn live_count(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgb, RgbImage};

    fn runtime() -> NativeRuntime {
        NativeRuntime::default()
    }

    #[test]
    fn test_decode_always_yields_rgba() {
        let mut rt = runtime();
        let rgb = rt
            .decode(&DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 3, Rgb([1, 2, 3]))))
            .unwrap();
        assert_eq!(rt.dims(rgb).unwrap(), (3, 5));
        assert_eq!(rt.channels(rgb).unwrap(), 4);
        assert_eq!(&rt.data(rgb).unwrap()[..4], &[1, 2, 3, 255]);

        let gray = rt
            .decode(&DynamicImage::ImageLuma8(GrayImage::new(2, 2)))
            .unwrap();
        assert_eq!(rt.channels(gray).unwrap(), 4);

        let gray_alpha = rt
            .decode(&DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(
                2,
                2,
                LumaA([200, 128]),
            )))
            .unwrap();
        assert_eq!(rt.channels(gray_alpha).unwrap(), 4);
        assert_eq!(&rt.data(gray_alpha).unwrap()[..4], &[200, 200, 200, 128]);

        let rgba16 = rt
            .decode(&DynamicImage::new_rgba16(2, 2))
            .unwrap();
        assert_eq!(rt.channels(rgba16).unwrap(), 4);
    }

    #[test]
    fn test_convert_and_threshold() {
        let mut rt = runtime();
        let rgb = rt
            .decode(&DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]))))
            .unwrap();
        let rgba = rt.convert_color(rgb, ColorConversion::RgbToRgba).unwrap();
        assert_eq!(&rt.data(rgba).unwrap()[..4], &[10, 20, 30, 255]);

        let gray = rt.convert_color(rgba, ColorConversion::RgbaToGray).unwrap();
        assert_eq!(rt.data(gray).unwrap()[0], luma(10, 20, 30));

        let mask = rt.new_mat(1, 3, 1, 0).unwrap();
        rt.data_mut(mask).unwrap().copy_from_slice(&[0, 1, 2]);
        let binary = rt.threshold(mask, 1, 255).unwrap();
        assert_eq!(rt.data(binary).unwrap(), &[0, 0, 255]);

        assert!(matches!(
            rt.convert_color(gray, ColorConversion::RgbToRgba),
            Err(CutoutError::UnsupportedChannels { channels: 1, .. })
        ));
    }

    #[test]
    fn test_erode_and_dilate_use_square_element() {
        let mut rt = runtime();
        let mask = rt.new_mat(9, 9, 1, 0).unwrap();
        let data = rt.data_mut(mask).unwrap();
        for y in 2..7 {
            data[y * 9 + 2..y * 9 + 7].fill(255);
        }
        let kernel = rt.structuring_element(3).unwrap();

        let eroded = rt.erode(mask, kernel).unwrap();
        let eroded_on: usize = rt.data(eroded).unwrap().iter().filter(|&&v| v > 0).count();
        assert_eq!(eroded_on, 9);

        let dilated = rt.dilate(mask, kernel).unwrap();
        let dilated_on: usize = rt.data(dilated).unwrap().iter().filter(|&&v| v > 0).count();
        assert_eq!(dilated_on, 49);

        assert!(rt.structuring_element(4).is_err());
    }

    #[test]
    fn test_split_merge_round_trip() {
        let mut rt = runtime();
        let src = rt.new_mat(2, 3, 4, 9).unwrap();
        let planes = rt.split(src).unwrap();
        assert_eq!(planes.len(), 4);
        rt.data_mut(planes[3]).unwrap().fill(0);
        let merged = rt.merge(&planes).unwrap();
        let image = rt.to_rgba_image(merged).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert!(image.pixels().all(|p| p.0 == [9, 9, 9, 0]));
    }

    #[test]
    fn test_release_rejects_double_release() {
        let mut rt = runtime();
        let mat = rt.new_model().unwrap();
        assert_eq!(rt.live_count(), 1);
        rt.release(mat).unwrap();
        assert!(matches!(rt.release(mat), Err(CutoutError::Runtime(_))));
        assert_eq!(rt.live_count(), 0);
    }

    #[test]
    fn test_zero_component_config_fails_segmentation() {
        let mut rt = NativeRuntime::new(SegmentationConfig {
            components: 0,
            ..SegmentationConfig::default()
        });
        let image = rt
            .decode(&DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))))
            .unwrap();
        let labels = rt.new_mat(4, 4, 1, crate::vision::labels::PROBABLE_BACKGROUND).unwrap();
        rt.data_mut(labels).unwrap()[5] = crate::vision::labels::FOREGROUND;
        let bgd = rt.new_model().unwrap();
        let fgd = rt.new_model().unwrap();

        let result = rt.grab_cut(image, labels, bgd, fgd, 2);
        assert!(matches!(result, Err(CutoutError::Runtime(_))));
        // Buffers survive the failed call
        assert_eq!(rt.live_count(), 4);
        assert!(rt.release(labels).is_ok());
    }

    #[test]
    fn test_resize_nearest() {
        let mut rt = runtime();
        let src = rt.new_mat(2, 2, 1, 0).unwrap();
        rt.data_mut(src).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        let resized = rt.resize(src, 4, 4).unwrap();
        assert_eq!(
            rt.data(resized).unwrap(),
            &[1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]
        );
    }
}
