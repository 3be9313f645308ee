// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Explicit sparse connectivity (CSR).

Produced by expanding a procedural rule once. Each synapse keeps the index of
the kernel weight it was generated from, so individual weights can be
initialised from the kernel.
*/

use crate::conv2d::Conv2DRule;
use tracing::debug;

/// One CSR row
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub posts: &'a [u32],
    pub kernel_indices: &'a [u32],
}

/// Row-compressed synapse list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseConnectivity {
    num_pre: usize,
    num_post: usize,
    max_row_length: usize,
    row_starts: Vec<usize>,
    posts: Vec<u32>,
    kernel_indices: Vec<u32>,
}

impl SparseConnectivity {
    /// Expand a convolution rule for every presynaptic unit
    pub fn from_conv_rule(rule: &Conv2DRule) -> Self {
        let geometry = rule.geometry();
        let num_pre = geometry.num_pre();

        let mut row_starts = Vec::with_capacity(num_pre + 1);
        let mut posts = Vec::with_capacity(num_pre * rule.max_row_length());
        let mut kernel_indices = Vec::with_capacity(num_pre * rule.max_row_length());

        row_starts.push(0);
        for pre in 0..num_pre {
            rule.for_each_synapse(pre, |syn| {
                posts.push(syn.post as u32);
                kernel_indices.push(syn.kernel_index(geometry) as u32);
            });
            row_starts.push(posts.len());
        }

        debug!(
            num_pre,
            num_post = geometry.num_post(),
            synapses = posts.len(),
            "Expanded convolution rule into sparse connectivity"
        );

        Self {
            num_pre,
            num_post: geometry.num_post(),
            max_row_length: rule.max_row_length(),
            row_starts,
            posts,
            kernel_indices,
        }
    }

    pub fn num_pre(&self) -> usize {
        self.num_pre
    }

    pub fn num_post(&self) -> usize {
        self.num_post
    }

    pub fn max_row_length(&self) -> usize {
        self.max_row_length
    }

    pub fn num_synapses(&self) -> usize {
        self.posts.len()
    }

    /// Offset of `pre`'s first synapse in the flat synapse arrays
    #[inline]
    pub fn row_start(&self, pre: usize) -> usize {
        self.row_starts[pre]
    }

    #[inline]
    pub fn row(&self, pre: usize) -> SparseRow<'_> {
        let range = self.row_starts[pre]..self.row_starts[pre + 1];
        SparseRow {
            posts: &self.posts[range.clone()],
            kernel_indices: &self.kernel_indices[range],
        }
    }

    /// Longest row actually present
    pub fn longest_row(&self) -> usize {
        self.row_starts
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Per-synapse weights initialised from a flattened kernel
    pub fn individual_weights(&self, kernel: &[f32]) -> Vec<f32> {
        self.kernel_indices
            .iter()
            .map(|&k| kernel[k as usize])
            .collect()
    }
}
