// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Convolution geometry derivation.

Shapes are (height, width, channels). Kernels are laid out as
`[kernel_h, kernel_w, in_c, out_c]`, row-major.
*/

use crate::error::{ConnectivityError, ConnectivityResult};
use serde::{Deserialize, Serialize};

/// Padding mode of a convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    /// No padding, partial windows are dropped
    #[default]
    Valid,
    /// Kernel centred with `(k - 1) / 2` padding, output = ceil(input / stride)
    Same,
}

impl PadMode {
    /// Padding applied before the first row/column along one axis
    pub fn padding(self, kernel: usize) -> usize {
        match self {
            PadMode::Valid => 0,
            PadMode::Same => kernel.saturating_sub(1) / 2,
        }
    }

    /// Output extent along one axis
    pub fn output_extent(self, input: usize, kernel: usize, stride: usize) -> usize {
        match self {
            PadMode::Valid => {
                if kernel > input {
                    0
                } else {
                    (input - kernel + 1).div_ceil(stride)
                }
            }
            PadMode::Same => input.div_ceil(stride),
        }
    }
}

/// Complete geometry of one 2-D convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvGeometry {
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub in_c: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub out_c: usize,
}

impl ConvGeometry {
    /// Derive the geometry of a convolution applied to `input_shape`
    ///
    /// # Arguments
    /// * `input_shape` - Source shape (height, width, channels)
    /// * `filters` - Number of output channels
    /// * `kernel_size` - (kernel_h, kernel_w)
    /// * `strides` - (stride_h, stride_w)
    /// * `padding` - Padding mode
    ///
    /// # Errors
    /// `InvalidGeometry` for zero extents, zero strides, or a kernel larger
    /// than the input under `valid` padding.
    pub fn derive(
        input_shape: (usize, usize, usize),
        filters: usize,
        kernel_size: (usize, usize),
        strides: (usize, usize),
        padding: PadMode,
    ) -> ConnectivityResult<Self> {
        let (in_h, in_w, in_c) = input_shape;
        let (kernel_h, kernel_w) = kernel_size;
        let (stride_h, stride_w) = strides;

        if in_h == 0 || in_w == 0 || in_c == 0 {
            return Err(ConnectivityError::InvalidGeometry(format!(
                "input shape {:?} has a zero extent",
                input_shape
            )));
        }
        if filters == 0 {
            return Err(ConnectivityError::InvalidGeometry(
                "convolution must have at least one filter".to_string(),
            ));
        }
        if kernel_h == 0 || kernel_w == 0 {
            return Err(ConnectivityError::InvalidGeometry(format!(
                "kernel size {:?} has a zero extent",
                kernel_size
            )));
        }
        if stride_h == 0 || stride_w == 0 {
            return Err(ConnectivityError::InvalidGeometry(format!(
                "strides {:?} must be positive",
                strides
            )));
        }
        if padding == PadMode::Valid && (kernel_h > in_h || kernel_w > in_w) {
            return Err(ConnectivityError::InvalidGeometry(format!(
                "kernel {:?} larger than input {:?} with valid padding",
                kernel_size,
                (in_h, in_w)
            )));
        }

        Ok(Self {
            kernel_h,
            kernel_w,
            stride_h,
            stride_w,
            pad_h: padding.padding(kernel_h),
            pad_w: padding.padding(kernel_w),
            in_h,
            in_w,
            in_c,
            out_h: padding.output_extent(in_h, kernel_h, stride_h),
            out_w: padding.output_extent(in_w, kernel_w, stride_w),
            out_c: filters,
        })
    }

    /// Derive the geometry and check it against an already-fixed target shape
    pub fn derive_for_target(
        input_shape: (usize, usize, usize),
        filters: usize,
        kernel_size: (usize, usize),
        strides: (usize, usize),
        padding: PadMode,
        target_shape: Option<(usize, usize, usize)>,
    ) -> ConnectivityResult<Self> {
        let geometry = Self::derive(input_shape, filters, kernel_size, strides, padding)?;
        if let Some(target) = target_shape {
            if target != geometry.output_shape() {
                return Err(ConnectivityError::ShapeMismatch {
                    derived: geometry.output_shape(),
                    target,
                });
            }
        }
        Ok(geometry)
    }

    pub fn input_shape(&self) -> (usize, usize, usize) {
        (self.in_h, self.in_w, self.in_c)
    }

    pub fn output_shape(&self) -> (usize, usize, usize) {
        (self.out_h, self.out_w, self.out_c)
    }

    pub fn num_pre(&self) -> usize {
        self.in_h * self.in_w * self.in_c
    }

    pub fn num_post(&self) -> usize {
        self.out_h * self.out_w * self.out_c
    }

    /// Fan-out bound used for sizing connectivity buffers
    ///
    /// A unit is covered by at most `ceil(kernel / stride)` windows per axis;
    /// this equals `kernel / stride` whenever the stride divides the kernel.
    pub fn max_row_length(&self) -> usize {
        self.kernel_h.div_ceil(self.stride_h) * self.kernel_w.div_ceil(self.stride_w) * self.out_c
    }

    /// Kernel extents `[kernel_h, kernel_w, in_c, out_c]`
    pub fn kernel_size(&self) -> [usize; 4] {
        [self.kernel_h, self.kernel_w, self.in_c, self.out_c]
    }

    pub fn kernel_len(&self) -> usize {
        self.kernel_h * self.kernel_w * self.in_c * self.out_c
    }

    /// Flatten a kernel coordinate into the row-major kernel array
    #[inline]
    pub fn kernel_index(
        &self,
        kernel_row: usize,
        kernel_col: usize,
        in_channel: usize,
        out_channel: usize,
    ) -> usize {
        ((kernel_row * self.kernel_w + kernel_col) * self.in_c + in_channel) * self.out_c
            + out_channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_padding_kernel5_input28() {
        let g = ConvGeometry::derive((28, 28, 1), 16, (5, 5), (1, 1), PadMode::Valid).unwrap();
        assert_eq!(g.output_shape(), (24, 24, 16));
        assert_eq!((g.pad_h, g.pad_w), (0, 0));
    }

    #[test]
    fn test_same_padding_stride1_preserves_dimensions() {
        for (h, w, k) in [(12, 12, 5), (7, 9, 3), (5, 5, 1), (10, 3, 4)] {
            let g = ConvGeometry::derive((h, w, 2), 8, (k, k), (1, 1), PadMode::Same).unwrap();
            assert_eq!((g.out_h, g.out_w), (h, w));
            assert_eq!(g.pad_h, (k - 1) / 2);
        }
    }

    #[test]
    fn test_valid_padding_truncates_uneven_stride() {
        // 10 - 3 + 1 = 8 windows, stride 3 -> ceil(8/3) = 3
        let g = ConvGeometry::derive((10, 10, 1), 1, (3, 3), (3, 3), PadMode::Valid).unwrap();
        assert_eq!((g.out_h, g.out_w), (3, 3));
    }

    #[test]
    fn test_same_padding_stride2() {
        let g = ConvGeometry::derive((7, 8, 3), 4, (3, 3), (2, 2), PadMode::Same).unwrap();
        assert_eq!(g.output_shape(), (4, 4, 4));
    }

    #[test]
    fn test_target_shape_mismatch() {
        let err = ConvGeometry::derive_for_target(
            (28, 28, 1),
            16,
            (5, 5),
            (1, 1),
            PadMode::Valid,
            Some((28, 28, 16)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConnectivityError::ShapeMismatch {
                derived: (24, 24, 16),
                target: (28, 28, 16)
            }
        );

        assert!(ConvGeometry::derive_for_target(
            (28, 28, 1),
            16,
            (5, 5),
            (1, 1),
            PadMode::Valid,
            Some((24, 24, 16)),
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(ConvGeometry::derive((4, 4, 1), 1, (5, 5), (1, 1), PadMode::Valid).is_err());
        assert!(ConvGeometry::derive((4, 4, 1), 1, (3, 3), (0, 1), PadMode::Valid).is_err());
        assert!(ConvGeometry::derive((4, 4, 1), 0, (3, 3), (1, 1), PadMode::Valid).is_err());
        // Same padding tolerates a kernel larger than the input
        assert!(ConvGeometry::derive((4, 4, 1), 1, (5, 5), (1, 1), PadMode::Same).is_ok());
    }

    #[test]
    fn test_kernel_index_row_major() {
        let g = ConvGeometry::derive((5, 5, 2), 3, (3, 3), (1, 1), PadMode::Valid).unwrap();
        assert_eq!(g.kernel_index(0, 0, 0, 0), 0);
        assert_eq!(g.kernel_index(0, 0, 0, 2), 2);
        assert_eq!(g.kernel_index(0, 0, 1, 0), 3);
        assert_eq!(g.kernel_index(0, 1, 0, 0), 6);
        assert_eq!(g.kernel_index(1, 0, 0, 0), 18);
        assert_eq!(g.kernel_index(2, 2, 1, 2), g.kernel_len() - 1);
    }
}
