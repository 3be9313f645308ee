// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# ann2snn Connectivity

Synapse connectivity for converted layers:
- **Convolution**: receptive-field index arithmetic evaluated per presynaptic
  unit (`Conv2DRule`), either on demand (procedural) or expanded once into an
  explicit CSR list (`SparseConnectivity`)
- **Dense**: all-to-all wiring over a flattened weight matrix

All generators are pure functions of the layer geometry. Unit indices are
row-major over (height, width, channel).
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod conv2d;
pub mod dense;
pub mod error;
pub mod geometry;
pub mod sparse;

pub use conv2d::{Conv2DRule, ConvSynapse};
pub use dense::DenseConnectivity;
pub use error::{ConnectivityError, ConnectivityResult};
pub use geometry::{ConvGeometry, PadMode};
pub use sparse::{SparseConnectivity, SparseRow};

use serde::{Deserialize, Serialize};

/// How convolution connectivity is handed to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMode {
    /// Rule evaluated at simulation time, kernel weights shared by all synapses
    #[default]
    Procedural,
    /// Rule expanded once into explicit indices with individual weights
    Sparse,
}

/// Connectivity of one synapse projection
#[derive(Debug, Clone, PartialEq)]
pub enum Connectivity {
    Procedural(Conv2DRule),
    Sparse(SparseConnectivity),
    Dense(DenseConnectivity),
}

impl Connectivity {
    /// Build convolution connectivity in the requested mode
    pub fn conv2d(geometry: ConvGeometry, mode: ConnectivityMode) -> Self {
        let rule = Conv2DRule::new(geometry);
        match mode {
            ConnectivityMode::Procedural => Connectivity::Procedural(rule),
            ConnectivityMode::Sparse => Connectivity::Sparse(SparseConnectivity::from_conv_rule(&rule)),
        }
    }

    pub fn dense(num_pre: usize, num_post: usize) -> Self {
        Connectivity::Dense(DenseConnectivity::new(num_pre, num_post))
    }

    pub fn num_pre(&self) -> usize {
        match self {
            Connectivity::Procedural(rule) => rule.geometry().num_pre(),
            Connectivity::Sparse(sparse) => sparse.num_pre(),
            Connectivity::Dense(dense) => dense.num_pre(),
        }
    }

    pub fn num_post(&self) -> usize {
        match self {
            Connectivity::Procedural(rule) => rule.geometry().num_post(),
            Connectivity::Sparse(sparse) => sparse.num_post(),
            Connectivity::Dense(dense) => dense.num_post(),
        }
    }

    /// Upper bound on synapses per presynaptic unit
    pub fn max_row_length(&self) -> usize {
        match self {
            Connectivity::Procedural(rule) => rule.max_row_length(),
            Connectivity::Sparse(sparse) => sparse.max_row_length(),
            Connectivity::Dense(dense) => dense.num_post(),
        }
    }

    /// Number of weight values the projection expects
    ///
    /// Procedural: kernel size. Sparse: one individual weight per synapse.
    /// Dense: `num_pre * num_post`.
    pub fn weight_len(&self) -> usize {
        match self {
            Connectivity::Procedural(rule) => rule.geometry().kernel_len(),
            Connectivity::Sparse(sparse) => sparse.num_synapses(),
            Connectivity::Dense(dense) => dense.num_pre() * dense.num_post(),
        }
    }

    /// Total number of synapses the connectivity describes
    pub fn num_synapses(&self) -> usize {
        match self {
            Connectivity::Procedural(rule) => (0..rule.geometry().num_pre())
                .map(|pre| rule.row_len(pre))
                .sum(),
            Connectivity::Sparse(sparse) => sparse.num_synapses(),
            Connectivity::Dense(dense) => dense.num_pre() * dense.num_post(),
        }
    }

    /// Visit every synapse leaving `pre` as `(post, weight_index)`
    ///
    /// `weight_index` indexes the array described by [`Connectivity::weight_len`].
    #[inline]
    pub fn for_each_synapse<F: FnMut(usize, usize)>(&self, pre: usize, mut f: F) {
        match self {
            Connectivity::Procedural(rule) => {
                let geometry = rule.geometry();
                rule.for_each_synapse(pre, |syn| f(syn.post, syn.kernel_index(geometry)));
            }
            Connectivity::Sparse(sparse) => {
                let start = sparse.row_start(pre);
                for (j, &post) in sparse.row(pre).posts.iter().enumerate() {
                    f(post as usize, start + j);
                }
            }
            Connectivity::Dense(dense) => {
                for post in 0..dense.num_post() {
                    f(post, dense.weight_index(pre, post));
                }
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Connectivity::Procedural(_) => "procedural",
            Connectivity::Sparse(_) => "sparse",
            Connectivity::Dense(_) => "dense",
        }
    }
}
