// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Analog network description.

An ANN is an ordered list of [`LayerSpec`]s starting with a single `Input`
layer. Shapes are (height, width, channels) for spatial layers and a plain
length for flat ones; both flatten row-major into population indices.
*/

pub mod sequential;

pub use sequential::SequentialAnn;

use crate::error::{ConversionError, ConversionResult};
use ann2snn_connectivity::{Connectivity, ConnectivityMode, ConvGeometry, PadMode};
use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output shape of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Flat(usize),
    Spatial(usize, usize, usize),
}

impl Shape {
    /// Number of units once flattened
    pub fn len(&self) -> usize {
        match *self {
            Shape::Flat(n) => n,
            Shape::Spatial(h, w, c) => h * w * c,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_spatial(&self) -> Option<(usize, usize, usize)> {
        match *self {
            Shape::Spatial(h, w, c) => Some((h, w, c)),
            Shape::Flat(_) => None,
        }
    }

    /// Dimensions in ndarray order
    pub fn dims(&self) -> Vec<usize> {
        match *self {
            Shape::Flat(n) => vec![n],
            Shape::Spatial(h, w, c) => vec![h, w, c],
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Flat(n) => write!(f, "({})", n),
            Shape::Spatial(h, w, c) => write!(f, "({}, {}, {})", h, w, c),
        }
    }
}

/// Layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Linear,
    Softmax,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Linear => "linear",
            Activation::Softmax => "softmax",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        }
    }

    /// Apply the activation in place
    pub fn apply(&self, values: &mut ArrayD<f32>) {
        match self {
            Activation::Relu => values.mapv_inplace(|v| v.max(0.0)),
            Activation::Linear => {}
            Activation::Sigmoid => values.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => values.mapv_inplace(f32::tanh),
            Activation::Softmax => {
                let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                values.mapv_inplace(|v| (v - max).exp());
                let sum = values.sum();
                if sum > 0.0 {
                    values.mapv_inplace(|v| v / sum);
                }
            }
        }
    }
}

/// Kind of layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Input,
    Dense {
        units: usize,
    },
    #[serde(rename = "conv2d")]
    Conv2D {
        filters: usize,
        kernel_size: (usize, usize),
        strides: (usize, usize),
        #[serde(default)]
        padding: PadMode,
    },
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Input => "input",
            LayerKind::Dense { .. } => "dense",
            LayerKind::Conv2D { .. } => "conv2d",
        }
    }

    /// Whether the layer carries weights and takes part in calibration
    pub fn is_weighted(&self) -> bool {
        !matches!(self, LayerKind::Input)
    }

    /// Convolution geometry over `input`
    pub fn conv_geometry(&self, input: &Shape) -> ConversionResult<Option<ConvGeometry>> {
        match *self {
            LayerKind::Conv2D {
                filters,
                kernel_size,
                strides,
                padding,
            } => {
                let spatial = input.as_spatial().ok_or_else(|| {
                    ConversionError::InvalidModel(format!(
                        "conv2d needs a spatial input, got {}",
                        input
                    ))
                })?;
                Ok(Some(ConvGeometry::derive(
                    spatial,
                    filters,
                    kernel_size,
                    strides,
                    padding,
                )?))
            }
            _ => Ok(None),
        }
    }

    /// Output shape this layer produces from `input`
    pub fn derive_output_shape(&self, input: &Shape) -> ConversionResult<Shape> {
        match *self {
            LayerKind::Input => Ok(*input),
            LayerKind::Dense { units } => Ok(Shape::Flat(units)),
            LayerKind::Conv2D { .. } => {
                let geometry = self.conv_geometry(input)?.ok_or_else(|| {
                    ConversionError::InvalidModel("missing convolution geometry".to_string())
                })?;
                let (h, w, c) = geometry.output_shape();
                Ok(Shape::Spatial(h, w, c))
            }
        }
    }

    /// Expected weight array dimensions for a layer fed by `input`
    pub fn weight_dims(&self, input: &Shape) -> ConversionResult<Option<Vec<usize>>> {
        match *self {
            LayerKind::Input => Ok(None),
            LayerKind::Dense { units } => Ok(Some(vec![input.len(), units])),
            LayerKind::Conv2D { .. } => Ok(self
                .conv_geometry(input)?
                .map(|g| g.kernel_size().to_vec())),
        }
    }

    /// Connectivity from a population of shape `input` to one of shape `output`
    ///
    /// A spatial `output` is a target that is already fixed: the derived
    /// convolution shape must match it.
    pub fn build_connectivity(
        &self,
        input: &Shape,
        output: &Shape,
        mode: ConnectivityMode,
    ) -> ConversionResult<Connectivity> {
        match *self {
            LayerKind::Input => Err(ConversionError::InvalidModel(
                "input layers have no incoming connectivity".to_string(),
            )),
            LayerKind::Dense { units } => {
                if output.len() != units {
                    return Err(ConversionError::ShapeMismatch {
                        layer: self.name().to_string(),
                        reason: format!("{} units but output shape {}", units, output),
                    });
                }
                Ok(Connectivity::dense(input.len(), units))
            }
            LayerKind::Conv2D {
                filters,
                kernel_size,
                strides,
                padding,
            } => {
                let spatial = input.as_spatial().ok_or_else(|| {
                    ConversionError::InvalidModel(format!(
                        "conv2d needs a spatial input, got {}",
                        input
                    ))
                })?;
                let geometry = ConvGeometry::derive_for_target(
                    spatial,
                    filters,
                    kernel_size,
                    strides,
                    padding,
                    output.as_spatial(),
                )?;
                Ok(Connectivity::conv2d(geometry, mode))
            }
        }
    }
}

/// One layer of an analog network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub kind: LayerKind,
    pub input_shape: Shape,
    pub output_shape: Shape,
    /// `[kh, kw, ic, oc]` for convolutions, `[in, out]` for dense, none for input
    #[serde(default)]
    pub weights: Option<ArrayD<f32>>,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default)]
    pub use_bias: bool,
}

impl LayerSpec {
    pub fn input(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Input,
            input_shape: shape,
            output_shape: shape,
            weights: None,
            activation: Activation::Linear,
            use_bias: false,
        }
    }

    /// Dense ReLU layer without bias; weights are `[in, out]`
    pub fn dense(name: impl Into<String>, weights: ArrayD<f32>) -> ConversionResult<Self> {
        let name = name.into();
        if weights.ndim() != 2 {
            return Err(ConversionError::ShapeMismatch {
                layer: name,
                reason: format!("dense weights must be 2-D, got {:?}", weights.shape()),
            });
        }
        let (inputs, units) = (weights.shape()[0], weights.shape()[1]);
        Ok(Self {
            name,
            kind: LayerKind::Dense { units },
            input_shape: Shape::Flat(inputs),
            output_shape: Shape::Flat(units),
            weights: Some(weights),
            activation: Activation::Relu,
            use_bias: false,
        })
    }

    /// Convolutional ReLU layer without bias; weights are `[kh, kw, ic, oc]`
    pub fn conv2d(
        name: impl Into<String>,
        input_shape: Shape,
        weights: ArrayD<f32>,
        strides: (usize, usize),
        padding: PadMode,
    ) -> ConversionResult<Self> {
        let name = name.into();
        if weights.ndim() != 4 {
            return Err(ConversionError::ShapeMismatch {
                layer: name,
                reason: format!("conv2d weights must be 4-D, got {:?}", weights.shape()),
            });
        }
        let dims = weights.shape();
        let kind = LayerKind::Conv2D {
            filters: dims[3],
            kernel_size: (dims[0], dims[1]),
            strides,
            padding,
        };
        let output_shape = kind.derive_output_shape(&input_shape)?;
        Ok(Self {
            name,
            kind,
            input_shape,
            output_shape,
            weights: Some(weights),
            activation: Activation::Relu,
            use_bias: false,
        })
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    /// Largest weight value, or 0 for unweighted layers
    pub fn max_weight(&self) -> f32 {
        self.weights
            .as_ref()
            .map(|w| w.iter().copied().fold(f32::NEG_INFINITY, f32::max))
            .filter(|m| m.is_finite())
            .unwrap_or(0.0)
    }
}

/// Source of layer structure and analog activations for conversion
pub trait AnnModel {
    /// Layers in order, starting with the input layer
    fn layers(&self) -> &[LayerSpec];

    fn input_shape(&self) -> Shape {
        self.layers()
            .first()
            .map(|l| l.output_shape)
            .unwrap_or(Shape::Flat(0))
    }

    /// Analog output of every weighted layer for a batch
    ///
    /// `batch` has samples along axis 0. Returns one array per weighted layer,
    /// each with the batch along axis 0.
    fn weighted_layer_outputs(&self, batch: ArrayViewD<'_, f32>) -> ConversionResult<Vec<ArrayD<f32>>>;

    fn weighted_layers(&self) -> Vec<&LayerSpec> {
        self.layers().iter().filter(|l| l.kind.is_weighted()).collect()
    }
}
