// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Feed-forward reference implementation of [`AnnModel`]
//!
//! Evaluates the analog network sample by sample; samples of a batch run in
//! parallel on the rayon pool.

use super::{AnnModel, LayerKind, LayerSpec, Shape};
use crate::error::{ConversionError, ConversionResult};
use ann2snn_connectivity::ConvGeometry;
use ndarray::{stack, Array1, Array3, ArrayD, ArrayViewD, Axis, Ix2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sequential stack of layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialAnn {
    layers: Vec<LayerSpec>,
}

impl SequentialAnn {
    /// Create a network from its layers
    ///
    /// The first layer must be the only `Input` layer and every layer's
    /// input shape must match its predecessor's output shape.
    pub fn new(layers: Vec<LayerSpec>) -> ConversionResult<Self> {
        let first = layers
            .first()
            .ok_or_else(|| ConversionError::InvalidModel("network has no layers".to_string()))?;
        if first.kind != LayerKind::Input {
            return Err(ConversionError::InvalidModel(format!(
                "first layer '{}' is not an input layer",
                first.name
            )));
        }
        if let Some(extra) = layers[1..].iter().find(|l| l.kind == LayerKind::Input) {
            return Err(ConversionError::InvalidModel(format!(
                "layer '{}' is a second input layer",
                extra.name
            )));
        }
        for pair in layers.windows(2) {
            let (prev, layer) = (&pair[0], &pair[1]);
            if prev.output_shape.len() != layer.input_shape.len() {
                return Err(ConversionError::ShapeMismatch {
                    layer: layer.name.clone(),
                    reason: format!(
                        "input shape {} does not match '{}' output {}",
                        layer.input_shape, prev.name, prev.output_shape
                    ),
                });
            }
        }
        Ok(Self { layers })
    }

    pub fn from_json(json: &str) -> ConversionResult<Self> {
        let parsed: SequentialAnn = serde_json::from_str(json)?;
        Self::new(parsed.layers)
    }

    pub fn to_json(&self) -> ConversionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Weighted layer outputs for a single sample
    pub fn forward_sample(&self, sample: ArrayViewD<'_, f32>) -> ConversionResult<Vec<ArrayD<f32>>> {
        let input_shape = self.input_shape();
        if sample.len() != input_shape.len() {
            return Err(ConversionError::InvalidInput(format!(
                "sample has {} values, input layer expects {}",
                sample.len(),
                input_shape.len()
            )));
        }

        let mut x = sample.to_owned();
        let mut outputs = Vec::new();
        for layer in self.layers.iter().skip(1) {
            let weights = layer.weights.as_ref().ok_or_else(|| {
                ConversionError::InvalidModel(format!("layer '{}' has no weights", layer.name))
            })?;
            let mut y = match layer.kind {
                LayerKind::Input => continue,
                LayerKind::Dense { .. } => dense_forward(layer, &x, weights)?,
                LayerKind::Conv2D { .. } => conv_forward(layer, &x, weights)?,
            };
            layer.activation.apply(&mut y);
            outputs.push(y.clone());
            x = y;
        }
        Ok(outputs)
    }
}

impl AnnModel for SequentialAnn {
    fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    fn weighted_layer_outputs(&self, batch: ArrayViewD<'_, f32>) -> ConversionResult<Vec<ArrayD<f32>>> {
        if batch.ndim() == 0 || batch.shape()[0] == 0 {
            return Err(ConversionError::EmptySampleSet);
        }
        let samples: Vec<ArrayViewD<'_, f32>> = batch.outer_iter().collect();
        debug!("Forward pass over {} samples", samples.len());

        let per_sample = samples
            .par_iter()
            .map(|sample| self.forward_sample(sample.view()))
            .collect::<ConversionResult<Vec<_>>>()?;

        let num_weighted = per_sample.first().map(Vec::len).unwrap_or(0);
        let mut stacked = Vec::with_capacity(num_weighted);
        for layer in 0..num_weighted {
            let views: Vec<ArrayViewD<'_, f32>> = per_sample.iter().map(|o| o[layer].view()).collect();
            let joined = stack(Axis(0), &views)
                .map_err(|e| ConversionError::InvalidInput(e.to_string()))?;
            stacked.push(joined);
        }
        Ok(stacked)
    }
}

fn dense_forward(layer: &LayerSpec, x: &ArrayD<f32>, weights: &ArrayD<f32>) -> ConversionResult<ArrayD<f32>> {
    let matrix = weights
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| shape_error(layer, e))?;
    if matrix.nrows() != x.len() {
        return Err(ConversionError::ShapeMismatch {
            layer: layer.name.clone(),
            reason: format!(
                "weight matrix expects {} inputs, source has {}",
                matrix.nrows(),
                x.len()
            ),
        });
    }
    let flat: Array1<f32> = x.iter().copied().collect();
    Ok(flat.dot(&matrix).into_dyn())
}

fn conv_forward(layer: &LayerSpec, x: &ArrayD<f32>, weights: &ArrayD<f32>) -> ConversionResult<ArrayD<f32>> {
    let input_shape = match layer.input_shape {
        Shape::Spatial(..) => layer.input_shape,
        Shape::Flat(_) => {
            return Err(ConversionError::InvalidModel(format!(
                "conv2d layer '{}' needs a spatial input",
                layer.name
            )))
        }
    };
    let geometry: ConvGeometry = layer.kind.conv_geometry(&input_shape)?.ok_or_else(|| {
        ConversionError::InvalidModel(format!("layer '{}' is not a convolution", layer.name))
    })?;
    let kernel = weights
        .view()
        .into_shape_with_order((
            geometry.kernel_h,
            geometry.kernel_w,
            geometry.in_c,
            geometry.out_c,
        ))
        .map_err(|e| shape_error(layer, e))?;
    let input = x
        .to_shape((geometry.in_h, geometry.in_w, geometry.in_c))
        .map_err(|e| shape_error(layer, e))?;

    let mut out = Array3::<f32>::zeros(geometry.output_shape());
    for ((out_row, out_col, out_chan), value) in out.indexed_iter_mut() {
        let row_origin = (out_row * geometry.stride_h) as isize - geometry.pad_h as isize;
        let col_origin = (out_col * geometry.stride_w) as isize - geometry.pad_w as isize;
        let mut acc = 0.0f32;
        for kr in 0..geometry.kernel_h {
            let in_row = row_origin + kr as isize;
            if in_row < 0 || in_row >= geometry.in_h as isize {
                continue;
            }
            for kc in 0..geometry.kernel_w {
                let in_col = col_origin + kc as isize;
                if in_col < 0 || in_col >= geometry.in_w as isize {
                    continue;
                }
                for in_chan in 0..geometry.in_c {
                    acc += input[[in_row as usize, in_col as usize, in_chan]]
                        * kernel[[kr, kc, in_chan, out_chan]];
                }
            }
        }
        *value = acc;
    }
    Ok(out.into_dyn())
}

fn shape_error(layer: &LayerSpec, err: ndarray::ShapeError) -> ConversionError {
    ConversionError::ShapeMismatch {
        layer: layer.name.clone(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ann2snn_connectivity::PadMode;
    use ndarray::{arr2, Array4, IxDyn};

    fn two_layer_dense() -> SequentialAnn {
        let w1 = arr2(&[[1.0f32, -1.0], [0.5, 2.0]]).into_dyn();
        let w2 = arr2(&[[1.0f32], [1.0]]).into_dyn();
        SequentialAnn::new(vec![
            LayerSpec::input("in", Shape::Flat(2)),
            LayerSpec::dense("hidden", w1).unwrap(),
            LayerSpec::dense("out", w2).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_dense_forward_applies_relu() {
        let ann = two_layer_dense();
        let batch = arr2(&[[1.0f32, 1.0], [2.0, 0.0]]).into_dyn();
        let outputs = ann.weighted_layer_outputs(batch.view()).unwrap();
        assert_eq!(outputs.len(), 2);
        // Sample 0: hidden = relu([1.5, 1.0]); sample 1: relu([2.0, -2.0])
        assert_eq!(outputs[0].shape(), &[2, 2]);
        assert_eq!(outputs[0][[0, 0]], 1.5);
        assert_eq!(outputs[0][[0, 1]], 1.0);
        assert_eq!(outputs[0][[1, 1]], 0.0);
        assert_eq!(outputs[1][[0, 0]], 2.5);
        assert_eq!(outputs[1][[1, 0]], 2.0);
    }

    #[test]
    fn test_conv_forward_same_padding() {
        // 3x3 all-ones kernel over a 3x3 all-ones image counts in-bounds neighbours
        let kernel = Array4::<f32>::ones((3, 3, 1, 1)).into_dyn();
        let ann = SequentialAnn::new(vec![
            LayerSpec::input("in", Shape::Spatial(3, 3, 1)),
            LayerSpec::conv2d("conv", Shape::Spatial(3, 3, 1), kernel, (1, 1), PadMode::Same).unwrap(),
        ])
        .unwrap();
        let batch = ArrayD::<f32>::ones(IxDyn(&[1, 3, 3, 1]));
        let out = ann.weighted_layer_outputs(batch.view()).unwrap();
        assert_eq!(out[0].shape(), &[1, 3, 3, 1]);
        assert_eq!(out[0][[0, 0, 0, 0]], 4.0);
        assert_eq!(out[0][[0, 1, 1, 0]], 9.0);
        assert_eq!(out[0][[0, 2, 1, 0]], 6.0);
    }

    #[test]
    fn test_rejects_missing_input_layer() {
        let w = arr2(&[[1.0f32]]).into_dyn();
        let err = SequentialAnn::new(vec![LayerSpec::dense("fc", w).unwrap()]).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidModel(_)));
        assert!(SequentialAnn::new(Vec::new()).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let ann = two_layer_dense();
        let json = ann.to_json().unwrap();
        assert_eq!(SequentialAnn::from_json(&json).unwrap(), ann);
    }

    #[test]
    fn test_wrong_sample_size() {
        let ann = two_layer_dense();
        let batch = ArrayD::<f32>::zeros(IxDyn(&[1, 3]));
        assert!(matches!(
            ann.weighted_layer_outputs(batch.view()),
            Err(ConversionError::InvalidInput(_))
        ));
    }
}
