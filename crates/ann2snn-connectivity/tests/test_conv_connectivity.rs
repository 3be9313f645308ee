// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property tests for convolution connectivity
//!
//! - procedural rule and expanded sparse list are identical
//! - fan-out never exceeds the declared maximum row length
//! - every emitted synapse is a genuine receptive-field connection
//! - every receptive-field connection is emitted, for any stride

use ann2snn_connectivity::{
    Connectivity, ConnectivityMode, Conv2DRule, ConvGeometry, PadMode, SparseConnectivity,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn geometry_strategy() -> impl Strategy<Value = ConvGeometry> {
    (
        1usize..10,
        1usize..10,
        1usize..4,
        1usize..4,
        1usize..6,
        1usize..6,
        1usize..4,
        1usize..4,
        prop_oneof![Just(PadMode::Valid), Just(PadMode::Same)],
    )
        .prop_filter_map(
            "kernel must fit input under valid padding",
            |(in_h, in_w, in_c, out_c, kh, kw, sh, sw, padding)| {
                ConvGeometry::derive((in_h, in_w, in_c), out_c, (kh, kw), (sh, sw), padding).ok()
            },
        )
}

/// Brute-force check that output `post` sees input `pre` at kernel (kr, kc)
fn is_receptive_field_member(g: &ConvGeometry, pre: usize, post: usize, kr: usize, kc: usize) -> bool {
    let in_row = (pre / g.in_c) / g.in_w;
    let in_col = (pre / g.in_c) % g.in_w;
    let out_row = (post / g.out_c) / g.out_w;
    let out_col = (post / g.out_c) % g.out_w;
    let row_origin = (out_row * g.stride_h) as i64 - g.pad_h as i64;
    let col_origin = (out_col * g.stride_w) as i64 - g.pad_w as i64;
    in_row as i64 - row_origin == kr as i64 && in_col as i64 - col_origin == kc as i64
}

/// Every (pre, post, kernel_row, kernel_col, out_channel) a dense convolution sums
fn receptive_field(g: &ConvGeometry) -> HashSet<(usize, usize, usize, usize, usize)> {
    let mut pairs = HashSet::new();
    for out_row in 0..g.out_h {
        for out_col in 0..g.out_w {
            for kr in 0..g.kernel_h {
                for kc in 0..g.kernel_w {
                    let in_row = (out_row * g.stride_h + kr) as i64 - g.pad_h as i64;
                    let in_col = (out_col * g.stride_w + kc) as i64 - g.pad_w as i64;
                    if in_row < 0 || in_col < 0 || in_row >= g.in_h as i64 || in_col >= g.in_w as i64 {
                        continue;
                    }
                    for in_chan in 0..g.in_c {
                        let pre = (in_row as usize * g.in_w + in_col as usize) * g.in_c + in_chan;
                        for out_channel in 0..g.out_c {
                            let post = (out_row * g.out_w + out_col) * g.out_c + out_channel;
                            pairs.insert((pre, post, kr, kc, out_channel));
                        }
                    }
                }
            }
        }
    }
    pairs
}

proptest! {
    #[test]
    fn procedural_and_sparse_rows_identical(g in geometry_strategy()) {
        let rule = Conv2DRule::new(g);
        let sparse = SparseConnectivity::from_conv_rule(&rule);
        for pre in 0..g.num_pre() {
            let procedural: Vec<(usize, usize)> = rule
                .row(pre)
                .iter()
                .map(|s| (s.post, s.kernel_index(&g)))
                .collect();
            let row = sparse.row(pre);
            let expanded: Vec<(usize, usize)> = row
                .posts
                .iter()
                .zip(row.kernel_indices)
                .map(|(&p, &k)| (p as usize, k as usize))
                .collect();
            prop_assert_eq!(procedural, expanded);
        }
    }

    #[test]
    fn fan_out_never_exceeds_bound(g in geometry_strategy()) {
        let rule = Conv2DRule::new(g);
        let bound = g.kernel_h.div_ceil(g.stride_h) * g.kernel_w.div_ceil(g.stride_w) * g.out_c;
        prop_assert_eq!(rule.max_row_length(), bound);
        for pre in 0..g.num_pre() {
            prop_assert!(rule.row(pre).len() <= bound);
        }
    }

    #[test]
    fn synapses_are_receptive_field_members(g in geometry_strategy()) {
        let rule = Conv2DRule::new(g);
        for pre in 0..g.num_pre() {
            let mut seen = HashSet::new();
            for syn in rule.row(pre) {
                prop_assert!(syn.post < g.num_post());
                prop_assert!(syn.kernel_row < g.kernel_h);
                prop_assert!(syn.kernel_col < g.kernel_w);
                prop_assert_eq!(syn.in_channel, pre % g.in_c);
                prop_assert!(is_receptive_field_member(&g, pre, syn.post, syn.kernel_row, syn.kernel_col));
                // No duplicate targets within a row
                prop_assert!(seen.insert(syn.post));
            }
        }
    }

    #[test]
    fn rule_emits_exact_receptive_field(g in geometry_strategy()) {
        let rule = Conv2DRule::new(g);
        let emitted: HashSet<(usize, usize, usize, usize, usize)> = (0..g.num_pre())
            .flat_map(|pre| {
                rule.row(pre)
                    .into_iter()
                    .map(move |s| (pre, s.post, s.kernel_row, s.kernel_col, s.out_channel))
            })
            .collect();
        prop_assert_eq!(emitted, receptive_field(&g));
    }

    #[test]
    fn connectivity_modes_visit_same_targets(g in geometry_strategy()) {
        let procedural = Connectivity::conv2d(g, ConnectivityMode::Procedural);
        let sparse = Connectivity::conv2d(g, ConnectivityMode::Sparse);
        prop_assert_eq!(procedural.max_row_length(), sparse.max_row_length());
        for pre in 0..g.num_pre() {
            let mut a = Vec::new();
            let mut b = Vec::new();
            procedural.for_each_synapse(pre, |post, _| a.push(post));
            sparse.for_each_synapse(pre, |post, _| b.push(post));
            prop_assert_eq!(a, b);
        }
    }
}

#[test]
fn uneven_stride_covers_every_window() {
    // Stride 2 does not divide the 3x3 kernel: neighbouring windows share a row
    let g = ConvGeometry::derive((7, 7, 1), 1, (3, 3), (2, 2), PadMode::Valid).unwrap();
    let rule = Conv2DRule::new(g);
    let total: usize = (0..g.num_pre()).map(|pre| rule.row(pre).len()).sum();
    assert_eq!(total, g.num_post() * g.kernel_h * g.kernel_w);
    assert_eq!(receptive_field(&g).len(), total);
}

#[test]
fn stride_one_covers_every_window() {
    let g = ConvGeometry::derive((7, 6, 2), 3, (3, 3), (1, 1), PadMode::Same).unwrap();
    let rule = Conv2DRule::new(g);
    let total: usize = (0..g.num_pre()).map(|pre| rule.row(pre).len()).sum();
    assert_eq!(total, receptive_field(&g).len());
}
