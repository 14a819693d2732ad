//! Test utilities for exercising the vision runtime seam
//!
//! [`RecordingRuntime`] wraps the native runtime, records every call, and can
//! be configured to simulate an unloaded library, empty decodes, or a
//! segmentation step that fails or produces a fixed pattern.

use super::{labels, ColorConversion, MatId, NativeRuntime, VisionRuntime};
use crate::config::SegmentationConfig;
use crate::error::{CutoutError, Result};
use image::{DynamicImage, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What `grab_cut` does in a [`RecordingRuntime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabCutBehaviour {
    /// Run the real refinement
    Native,
    /// Overwrite labels: even pixel indices foreground, odd background
    Alternating,
    /// Return an error without touching the labels
    Fail,
}

/// Shared view of a [`RecordingRuntime`] that survives moving the runtime
#[derive(Debug, Clone, Default)]
pub struct RuntimeProbe {
    call_history: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
    allocations: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl RuntimeProbe {
    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.get_call_history()
            .iter()
            .filter(|call| call.as_str() == method)
            .count()
    }

    /// Buffers allocated and not released
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Recording wrapper around [`NativeRuntime`]
pub struct RecordingRuntime {
    inner: NativeRuntime,
    available: bool,
    empty_decode_at: Option<usize>,
    grab_cut: GrabCutBehaviour,
    decodes: usize,
    probe: RuntimeProbe,
}

impl RecordingRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: NativeRuntime::new(SegmentationConfig::default()),
            available: true,
            empty_decode_at: None,
            grab_cut: GrabCutBehaviour::Native,
            decodes: 0,
            probe: RuntimeProbe::default(),
        }
    }

    /// Runtime that reports itself as not loaded
    #[must_use]
    pub fn new_unavailable() -> Self {
        let mut runtime = Self::new();
        runtime.available = false;
        runtime
    }

    /// Make the `index`-th decode (0-based) yield an empty matrix
    #[must_use]
    pub fn with_empty_decode_at(mut self, index: usize) -> Self {
        self.empty_decode_at = Some(index);
        self
    }

    #[must_use]
    pub fn with_grab_cut(mut self, behaviour: GrabCutBehaviour) -> Self {
        self.grab_cut = behaviour;
        self
    }

    #[must_use]
    pub fn probe(&self) -> RuntimeProbe {
        self.probe.clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.probe.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn allocated<T>(&self, result: Result<T>, count: usize) -> Result<T> {
        if result.is_ok() {
            self.probe.allocations.fetch_add(count, Ordering::SeqCst);
        }
        self.probe
            .live
            .store(self.inner.live_count(), Ordering::SeqCst);
        result
    }
}

impl Default for RecordingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionRuntime for RecordingRuntime {
    fn is_available(&self) -> bool {
        self.record_call("is_available");
        self.available
    }

    fn decode(&mut self, bitmap: &DynamicImage) -> Result<MatId> {
        self.record_call("decode");
        let index = self.decodes;
        self.decodes += 1;
        let result = if self.empty_decode_at == Some(index) {
            self.inner.new_mat(0, 0, 4, 0)
        } else {
            self.inner.decode(bitmap)
        };
        self.allocated(result, 1)
    }

    fn dims(&self, mat: MatId) -> Result<(usize, usize)> {
        self.inner.dims(mat)
    }

    fn channels(&self, mat: MatId) -> Result<usize> {
        self.inner.channels(mat)
    }

    fn convert_color(&mut self, src: MatId, conversion: ColorConversion) -> Result<MatId> {
        self.record_call("convert_color");
        let result = self.inner.convert_color(src, conversion);
        self.allocated(result, 1)
    }

    fn resize(&mut self, src: MatId, rows: usize, cols: usize) -> Result<MatId> {
        self.record_call("resize");
        let result = self.inner.resize(src, rows, cols);
        self.allocated(result, 1)
    }

    fn threshold(&mut self, src: MatId, thresh: u8, max_value: u8) -> Result<MatId> {
        self.record_call("threshold");
        let result = self.inner.threshold(src, thresh, max_value);
        self.allocated(result, 1)
    }

    fn structuring_element(&mut self, size: usize) -> Result<MatId> {
        self.record_call(&format!("structuring_element:{}", size));
        let result = self.inner.structuring_element(size);
        self.allocated(result, 1)
    }

    fn erode(&mut self, src: MatId, kernel: MatId) -> Result<MatId> {
        self.record_call("erode");
        let result = self.inner.erode(src, kernel);
        self.allocated(result, 1)
    }

    fn dilate(&mut self, src: MatId, kernel: MatId) -> Result<MatId> {
        self.record_call("dilate");
        let result = self.inner.dilate(src, kernel);
        self.allocated(result, 1)
    }

    fn new_mat(&mut self, rows: usize, cols: usize, channels: usize, fill: u8) -> Result<MatId> {
        self.record_call("new_mat");
        let result = self.inner.new_mat(rows, cols, channels, fill);
        self.allocated(result, 1)
    }

    fn new_model(&mut self) -> Result<MatId> {
        self.record_call("new_model");
        let result = self.inner.new_model();
        self.allocated(result, 1)
    }

    fn grab_cut(
        &mut self,
        image: MatId,
        labels_mat: MatId,
        bgd_model: MatId,
        fgd_model: MatId,
        iterations: u32,
    ) -> Result<()> {
        self.record_call(&format!("grab_cut:{}", iterations));
        match self.grab_cut {
            GrabCutBehaviour::Native => {
                self.inner
                    .grab_cut(image, labels_mat, bgd_model, fgd_model, iterations)
            },
            GrabCutBehaviour::Alternating => {
                for (index, label) in self.inner.data_mut(labels_mat)?.iter_mut().enumerate() {
                    *label = if index % 2 == 0 {
                        labels::FOREGROUND
                    } else {
                        labels::BACKGROUND
                    };
                }
                Ok(())
            },
            GrabCutBehaviour::Fail => Err(CutoutError::runtime("simulated segmentation failure")),
        }
    }

    fn split(&mut self, src: MatId) -> Result<Vec<MatId>> {
        self.record_call("split");
        let result = self.inner.split(src);
        let count = result.as_ref().map_or(0, Vec::len);
        self.allocated(result, count)
    }

    fn merge(&mut self, channels: &[MatId]) -> Result<MatId> {
        self.record_call("merge");
        let result = self.inner.merge(channels);
        self.allocated(result, 1)
    }

    fn data(&self, mat: MatId) -> Result<&[u8]> {
        self.inner.data(mat)
    }

    fn data_mut(&mut self, mat: MatId) -> Result<&mut [u8]> {
        self.inner.data_mut(mat)
    }

    fn to_rgba_image(&self, mat: MatId) -> Result<RgbaImage> {
        self.record_call("to_rgba_image");
        self.inner.to_rgba_image(mat)
    }

    fn release(&mut self, mat: MatId) -> Result<()> {
        let result = self.inner.release(mat);
        if result.is_ok() {
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
        self.probe
            .live
            .store(self.inner.live_count(), Ordering::SeqCst);
        result
    }

    fn live_count(&self) -> usize {
        self.inner.live_count()
    }
}
