// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
All-to-all connectivity for dense layers.

Weights are the flattened `[num_pre, num_post]` matrix of the analog layer.
*/

/// All-to-all connectivity between two flat populations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseConnectivity {
    num_pre: usize,
    num_post: usize,
}

impl DenseConnectivity {
    pub fn new(num_pre: usize, num_post: usize) -> Self {
        Self { num_pre, num_post }
    }

    pub fn num_pre(&self) -> usize {
        self.num_pre
    }

    pub fn num_post(&self) -> usize {
        self.num_post
    }

    #[inline]
    pub fn weight_index(&self, pre: usize, post: usize) -> usize {
        pre * self.num_post + post
    }
}
