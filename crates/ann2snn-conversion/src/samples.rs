// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calibration sample sets

use crate::error::{ConversionError, ConversionResult};
use ndarray::{ArrayD, ArrayViewD, Axis};

/// Samples along axis 0, consumed in contiguous batches
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    data: ArrayD<f32>,
    batch_size: usize,
}

impl SampleSet {
    /// # Errors
    /// `EmptySampleSet` when `data` holds no samples, `InvalidInput` for a
    /// zero batch size.
    pub fn new(data: ArrayD<f32>, batch_size: usize) -> ConversionResult<Self> {
        if data.ndim() == 0 || data.shape()[0] == 0 {
            return Err(ConversionError::EmptySampleSet);
        }
        if batch_size == 0 {
            return Err(ConversionError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self { data, batch_size })
    }

    pub fn len(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shape of a single sample
    pub fn sample_shape(&self) -> &[usize] {
        &self.data.shape()[1..]
    }

    pub fn data(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// Batches of the configured size; the last one holds the remainder
    pub fn batches(&self) -> impl Iterator<Item = ArrayViewD<'_, f32>> + '_ {
        self.batches_of(self.batch_size)
    }

    /// Batches of an explicit size (at least 1)
    pub fn batches_of(&self, batch_size: usize) -> impl Iterator<Item = ArrayViewD<'_, f32>> + '_ {
        self.data.axis_chunks_iter(Axis(0), batch_size.max(1))
    }
}
