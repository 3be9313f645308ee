// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Procedural 2-D convolution connectivity.

For a presynaptic unit at (inRow, inCol, inChan) the rule enumerates every
output position whose receptive field covers it. The output row range is

```text
[max(0, 1 + floor((inRow + pad_h - kernel_h) / stride_h)),
 min(out_h, 1 + floor((inRow + pad_h) / stride_h)))
```

and symmetrically for columns: exactly the outputs whose window places the
unit at a kernel row in `[0, kernel_h)`. Each (outRow, outCol, outChan)
yields one synapse with kernel coordinate
`(inRow - (outRow * stride_h - pad_h), inCol - (outCol * stride_w - pad_w), inChan, outChan)`.
*/

use crate::geometry::ConvGeometry;
use std::ops::Range;

/// One synapse produced by the convolution rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConvSynapse {
    /// Postsynaptic unit index
    pub post: usize,
    pub kernel_row: usize,
    pub kernel_col: usize,
    pub in_channel: usize,
    pub out_channel: usize,
}

impl ConvSynapse {
    /// Index of this synapse's weight in the flattened kernel
    #[inline]
    pub fn kernel_index(&self, geometry: &ConvGeometry) -> usize {
        geometry.kernel_index(
            self.kernel_row,
            self.kernel_col,
            self.in_channel,
            self.out_channel,
        )
    }
}

/// Convolution connectivity rule, evaluated per presynaptic unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2DRule {
    geometry: ConvGeometry,
}

impl Conv2DRule {
    pub fn new(geometry: ConvGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &ConvGeometry {
        &self.geometry
    }

    /// Maximum synapses emitted for any presynaptic unit
    pub fn max_row_length(&self) -> usize {
        self.geometry.max_row_length()
    }

    /// Kernel extents `[kernel_h, kernel_w, in_c, out_c]`
    pub fn kernel_size(&self) -> [usize; 4] {
        self.geometry.kernel_size()
    }

    /// Output rows reached by presynaptic row `in_row`
    pub fn output_rows(&self, in_row: usize) -> Range<usize> {
        let g = &self.geometry;
        output_range(in_row, g.pad_h, g.kernel_h, g.stride_h, g.out_h)
    }

    /// Output columns reached by presynaptic column `in_col`
    pub fn output_cols(&self, in_col: usize) -> Range<usize> {
        let g = &self.geometry;
        output_range(in_col, g.pad_w, g.kernel_w, g.stride_w, g.out_w)
    }

    /// Enumerate the synapses leaving `id_pre` in (row, col, channel) order
    ///
    /// `id_pre` must be below `geometry().num_pre()`.
    #[inline]
    pub fn for_each_synapse<F: FnMut(ConvSynapse)>(&self, id_pre: usize, mut f: F) {
        let g = &self.geometry;
        debug_assert!(id_pre < g.num_pre());

        let in_row = (id_pre / g.in_c) / g.in_w;
        let in_col = (id_pre / g.in_c) % g.in_w;
        let in_chan = id_pre % g.in_c;

        for out_row in self.output_rows(in_row) {
            // In range by construction: 0 <= kernel_row < kernel_h
            let kernel_row = in_row + g.pad_h - out_row * g.stride_h;
            for out_col in self.output_cols(in_col) {
                let kernel_col = in_col + g.pad_w - out_col * g.stride_w;
                let base = out_row * g.out_w * g.out_c + out_col * g.out_c;
                for out_channel in 0..g.out_c {
                    f(ConvSynapse {
                        post: base + out_channel,
                        kernel_row,
                        kernel_col,
                        in_channel: in_chan,
                        out_channel,
                    });
                }
            }
        }
    }

    /// Number of synapses leaving `id_pre`
    pub fn row_len(&self, id_pre: usize) -> usize {
        let g = &self.geometry;
        let in_row = (id_pre / g.in_c) / g.in_w;
        let in_col = (id_pre / g.in_c) % g.in_w;
        self.output_rows(in_row).len() * self.output_cols(in_col).len() * g.out_c
    }

    /// Collect the synapses leaving `id_pre`
    pub fn row(&self, id_pre: usize) -> Vec<ConvSynapse> {
        let mut row = Vec::with_capacity(self.max_row_length());
        self.for_each_synapse(id_pre, |syn| row.push(syn));
        row
    }
}

fn output_range(
    in_pos: usize,
    pad: usize,
    kernel: usize,
    stride: usize,
    out_extent: usize,
) -> Range<usize> {
    let shifted = in_pos as i64 + pad as i64;
    let stride = stride as i64;
    let out_extent = out_extent as i64;

    let min_out = (1 + floor_div(shifted - kernel as i64, stride)).clamp(0, out_extent);
    let max_out = (1 + floor_div(shifted, stride)).clamp(0, out_extent);

    min_out as usize..max_out.max(min_out) as usize
}

#[inline]
fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PadMode;

    #[test]
    fn test_div_helpers() {
        assert_eq!(floor_div(-3, 2), -2);
        assert_eq!(floor_div(-4, 2), -2);
        assert_eq!(floor_div(3, 2), 1);
    }

    #[test]
    fn test_corner_unit_valid_padding() {
        // 3x3 kernel over 5x5 input: unit (0, 0) only feeds output (0, 0)
        let g = ConvGeometry::derive((5, 5, 1), 2, (3, 3), (1, 1), PadMode::Valid).unwrap();
        let rule = Conv2DRule::new(g);
        let row = rule.row(0);
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].post, 0);
        assert_eq!(row[1].post, 1);
        assert_eq!((row[0].kernel_row, row[0].kernel_col), (0, 0));
        assert_eq!(row[1].out_channel, 1);
    }

    #[test]
    fn test_centre_unit_full_fan_out() {
        let g = ConvGeometry::derive((5, 5, 1), 1, (3, 3), (1, 1), PadMode::Valid).unwrap();
        let rule = Conv2DRule::new(g);
        // Input (2, 2) is covered by all 9 output positions of the 3x3 output
        let row = rule.row(2 * 5 + 2);
        assert_eq!(row.len(), 9);
        assert_eq!(row.len(), rule.max_row_length());
        assert_eq!(rule.row_len(2 * 5 + 2), 9);
        // Output (0, 0) sees it at kernel (2, 2); output (2, 2) at kernel (0, 0)
        assert_eq!((row[0].post, row[0].kernel_row, row[0].kernel_col), (0, 2, 2));
        assert_eq!((row[8].post, row[8].kernel_row, row[8].kernel_col), (8, 0, 0));
    }

    #[test]
    fn test_same_padding_border_unit() {
        let g = ConvGeometry::derive((4, 4, 1), 1, (3, 3), (1, 1), PadMode::Same).unwrap();
        let rule = Conv2DRule::new(g);
        // Top-left unit reaches outputs (0,0), (0,1), (1,0), (1,1)
        let posts: Vec<usize> = rule.row(0).iter().map(|s| s.post).collect();
        assert_eq!(posts, vec![0, 1, 4, 5]);
        let first = rule.row(0)[0];
        assert_eq!((first.kernel_row, first.kernel_col), (1, 1));
    }

    #[test]
    fn test_multi_channel_decomposition() {
        let g = ConvGeometry::derive((3, 3, 2), 1, (3, 3), (1, 1), PadMode::Valid).unwrap();
        let rule = Conv2DRule::new(g);
        // id 5 -> (row 0, col 2, chan 1)
        let row = rule.row(5);
        assert_eq!(row.len(), 1);
        assert_eq!(row[0].in_channel, 1);
        assert_eq!((row[0].kernel_row, row[0].kernel_col), (0, 2));
    }

    #[test]
    fn test_stride_not_dividing_kernel_reaches_every_window() {
        // 3x3 kernel, stride 2 over 7x7: input row 4 sits at kernel row 2 of
        // output row 1 and kernel row 0 of output row 2
        let g = ConvGeometry::derive((7, 7, 1), 1, (3, 3), (2, 2), PadMode::Valid).unwrap();
        let rule = Conv2DRule::new(g);
        assert_eq!((g.out_h, g.out_w), (3, 3));
        assert_eq!(rule.output_rows(4), 1..3);
        assert_eq!(rule.max_row_length(), 2 * 2);

        let total: usize = (0..g.num_pre()).map(|pre| rule.row(pre).len()).sum();
        assert_eq!(total, g.num_post() * g.kernel_h * g.kernel_w);

        let row = rule.row(4 * 7 + 4);
        let hits: Vec<(usize, usize, usize)> =
            row.iter().map(|s| (s.post, s.kernel_row, s.kernel_col)).collect();
        assert_eq!(hits, vec![(4, 2, 2), (5, 2, 0), (7, 0, 2), (8, 0, 0)]);
    }

    #[test]
    fn test_stride_two_respects_fan_out_bound() {
        let g = ConvGeometry::derive((8, 8, 1), 2, (4, 4), (2, 2), PadMode::Valid).unwrap();
        let rule = Conv2DRule::new(g);
        assert_eq!(rule.max_row_length(), 2 * 2 * 2);
        for pre in 0..g.num_pre() {
            let row = rule.row(pre);
            assert!(row.len() <= rule.max_row_length());
            for syn in row {
                assert!(syn.kernel_row < g.kernel_h && syn.kernel_col < g.kernel_w);
                assert!(syn.post < g.num_post());
            }
        }
    }
}
