//! Scoped acquisition of runtime buffers

use super::{ColorConversion, MatId, VisionRuntime};
use crate::error::Result;
use image::{DynamicImage, RgbaImage};

/// Arena over a [`VisionRuntime`] for one pipeline invocation
///
/// Every handle allocated through the scope is recorded and released exactly
/// once when the scope is dropped, whichever branch allocated it and however
/// the invocation ends.
pub struct MatScope<'rt> {
    runtime: &'rt mut dyn VisionRuntime,
    owned: Vec<MatId>,
}

impl<'rt> MatScope<'rt> {
    pub fn new(runtime: &'rt mut dyn VisionRuntime) -> Self {
        Self {
            runtime,
            owned: Vec::new(),
        }
    }

    fn track(&mut self, mat: MatId) -> MatId {
        self.owned.push(mat);
        mat
    }

    /// Number of handles currently owned by this scope
    #[must_use]
    pub fn owned(&self) -> usize {
        self.owned.len()
    }

    pub fn is_available(&self) -> bool {
        self.runtime.is_available()
    }

    pub fn decode(&mut self, bitmap: &DynamicImage) -> Result<MatId> {
        let mat = self.runtime.decode(bitmap)?;
        Ok(self.track(mat))
    }

    pub fn dims(&self, mat: MatId) -> Result<(usize, usize)> {
        self.runtime.dims(mat)
    }

    pub fn channels(&self, mat: MatId) -> Result<usize> {
        self.runtime.channels(mat)
    }

    pub fn is_empty(&self, mat: MatId) -> Result<bool> {
        self.runtime.is_empty(mat)
    }

    pub fn convert_color(&mut self, src: MatId, conversion: ColorConversion) -> Result<MatId> {
        let mat = self.runtime.convert_color(src, conversion)?;
        Ok(self.track(mat))
    }

    pub fn resize(&mut self, src: MatId, rows: usize, cols: usize) -> Result<MatId> {
        let mat = self.runtime.resize(src, rows, cols)?;
        Ok(self.track(mat))
    }

    pub fn threshold(&mut self, src: MatId, thresh: u8, max_value: u8) -> Result<MatId> {
        let mat = self.runtime.threshold(src, thresh, max_value)?;
        Ok(self.track(mat))
    }

    pub fn structuring_element(&mut self, size: usize) -> Result<MatId> {
        let mat = self.runtime.structuring_element(size)?;
        Ok(self.track(mat))
    }

    pub fn erode(&mut self, src: MatId, kernel: MatId) -> Result<MatId> {
        let mat = self.runtime.erode(src, kernel)?;
        Ok(self.track(mat))
    }

    pub fn dilate(&mut self, src: MatId, kernel: MatId) -> Result<MatId> {
        let mat = self.runtime.dilate(src, kernel)?;
        Ok(self.track(mat))
    }

    pub fn new_mat(&mut self, rows: usize, cols: usize, channels: usize, fill: u8) -> Result<MatId> {
        let mat = self.runtime.new_mat(rows, cols, channels, fill)?;
        Ok(self.track(mat))
    }

    pub fn new_model(&mut self) -> Result<MatId> {
        let mat = self.runtime.new_model()?;
        Ok(self.track(mat))
    }

    pub fn grab_cut(
        &mut self,
        image: MatId,
        labels: MatId,
        bgd_model: MatId,
        fgd_model: MatId,
        iterations: u32,
    ) -> Result<()> {
        self.runtime
            .grab_cut(image, labels, bgd_model, fgd_model, iterations)
    }

    pub fn split(&mut self, src: MatId) -> Result<Vec<MatId>> {
        let channels = self.runtime.split(src)?;
        self.owned.extend(channels.iter().copied());
        Ok(channels)
    }

    pub fn merge(&mut self, channels: &[MatId]) -> Result<MatId> {
        let mat = self.runtime.merge(channels)?;
        Ok(self.track(mat))
    }

    pub fn data(&self, mat: MatId) -> Result<&[u8]> {
        self.runtime.data(mat)
    }

    pub fn data_mut(&mut self, mat: MatId) -> Result<&mut [u8]> {
        self.runtime.data_mut(mat)
    }

    pub fn to_rgba_image(&self, mat: MatId) -> Result<RgbaImage> {
        self.runtime.to_rgba_image(mat)
    }

    /// Release every owned handle, newest first; returns how many were released
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        while let Some(mat) = self.owned.pop() {
            match self.runtime.release(mat) {
                Ok(()) => released += 1,
                Err(e) => tracing::warn!(%mat, error = %e, "Failed to release runtime buffer"),
            }
        }
        released
    }
}

impl Drop for MatScope<'_> {
    fn drop(&mut self) {
        let released = self.release_all();
        tracing::trace!(released, "Released runtime buffers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;
    use crate::error::CutoutError;
    use crate::vision::NativeRuntime;

    #[test]
    fn test_scope_releases_on_drop() {
        let mut runtime = NativeRuntime::new(SegmentationConfig::default());
        {
            let mut scope = MatScope::new(&mut runtime);
            let a = scope.new_mat(4, 4, 4, 0).unwrap();
            scope.split(a).unwrap();
            scope.structuring_element(3).unwrap();
            assert_eq!(scope.owned(), 6);
        }
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn test_scope_releases_on_early_return() {
        fn failing_stage(scope: &mut MatScope<'_>) -> Result<()> {
            let mat = scope.new_mat(2, 2, 3, 7)?;
            scope.new_model()?;
            // Merging a 3-channel matrix is rejected by the runtime
            scope.merge(&[mat])?;
            Ok(())
        }

        let mut runtime = NativeRuntime::new(SegmentationConfig::default());
        let result = {
            let mut scope = MatScope::new(&mut runtime);
            failing_stage(&mut scope)
        };
        assert!(matches!(result, Err(CutoutError::UnsupportedChannels { .. })));
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let mut runtime = NativeRuntime::new(SegmentationConfig::default());
        let mut scope = MatScope::new(&mut runtime);
        scope.new_mat(1, 1, 1, 0).unwrap();
        assert_eq!(scope.release_all(), 1);
        assert_eq!(scope.release_all(), 0);
        drop(scope);
        assert_eq!(runtime.live_count(), 0);
    }
}
