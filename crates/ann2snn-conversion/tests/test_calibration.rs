// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calibration strategies against the CPU runtime

use ann2snn_config::FewSpikeConfig;
use ann2snn_conversion::{
    BuildOptions, CalibrationResult, Calibrator, ConversionError, DataNorm, FewSpike, LayerSpec,
    NetworkBuilder, SampleSet, SequentialAnn, Shape, SpikeNorm, SpikingNetwork,
};
use ann2snn_neural::ModelRegistry;
use ann2snn_runtime::{CpuRuntime, SpikingRuntime};
use ndarray::{arr2, ArrayD, IxDyn};

fn two_layer_ann(w1: [[f32; 2]; 2], w2: [[f32; 1]; 2]) -> SequentialAnn {
    SequentialAnn::new(vec![
        LayerSpec::input("in", Shape::Flat(2)),
        LayerSpec::dense("hidden", arr2(&w1).into_dyn()).unwrap(),
        LayerSpec::dense("out", arr2(&w2).into_dyn()).unwrap(),
    ])
    .unwrap()
}

fn build(
    ann: &SequentialAnn,
    options: &BuildOptions,
    runtime: &mut CpuRuntime,
) -> SpikingNetwork {
    let registry = ModelRegistry::with_builtin_models();
    NetworkBuilder::new(&registry, options).build(ann, runtime).unwrap()
}

fn if_options(batch_size: usize) -> BuildOptions {
    BuildOptions {
        neuron_model: "if".to_string(),
        input_model: "spike_input".to_string(),
        batch_size,
        ..BuildOptions::default()
    }
}

#[test]
fn test_data_norm_sets_applied_factors_as_thresholds() {
    let ann = two_layer_ann([[1.0, 0.0], [0.0, 2.0]], [[1.0], [1.0]]);
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &if_options(2), &mut runtime);

    // hidden: [1, 2] and [2, 1]; out: 3 and 3
    let samples = SampleSet::new(arr2(&[[1.0f32, 1.0], [2.0, 0.5]]).into_dyn(), 1).unwrap();
    let result = DataNorm::new(&ann)
        .calibrate(&network, &mut runtime, &samples)
        .unwrap();
    let CalibrationResult::DataNorm(ref data_norm) = result else {
        panic!("expected a data-norm result");
    };
    assert_eq!(data_norm.max_activations, vec![2.0, 3.0]);
    assert_eq!(data_norm.max_weights, vec![2.0, 1.0]);
    assert_eq!(data_norm.applied, vec![2.0, 1.5]);

    result.apply(&network, &mut runtime).unwrap();
    for (layer, expected) in [(1, 2.0f32), (2, 1.5)] {
        assert_eq!(network.threshold(&runtime, layer).unwrap(), expected);
        for &pop in &network.layers()[layer].replicas {
            assert_eq!(runtime.extra_global_param(pop, "Vthr").unwrap(), expected);
        }
    }

    let normalized = data_norm.normalized_weights(&ann).unwrap();
    assert_eq!(normalized[0][[1, 1]], 1.0);
    assert_eq!(normalized[1][[0, 0]], 1.0 / 1.5);
}

#[test]
fn test_data_norm_degenerate_scale_surfaces() {
    // Negative weights and inputs leave the output layer silent
    let ann = two_layer_ann([[1.0, 0.0], [0.0, 1.0]], [[-1.0], [-1.0]]);
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &if_options(1), &mut runtime);
    let samples = SampleSet::new(arr2(&[[1.0f32, 1.0]]).into_dyn(), 1).unwrap();
    let err = DataNorm::new(&ann)
        .calibrate(&network, &mut runtime, &samples)
        .unwrap_err();
    assert!(matches!(err, ConversionError::DegenerateScale { ref layer, .. } if layer == "out"));
    assert_eq!(network.threshold(&runtime, 2).unwrap(), 1.0);
}

#[test]
fn test_spike_norm_calibrates_layers_in_order() {
    let ann = two_layer_ann([[0.5, 0.0], [0.25, 0.0]], [[2.0], [0.0]]);
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &if_options(2), &mut runtime);

    let samples = SampleSet::new(arr2(&[[1.0f32, 1.0], [0.0, 1.0], [1.0, 0.0]]).into_dyn(), 2).unwrap();
    let result = SpikeNorm::new(10.0)
        .calibrate(&network, &mut runtime, &samples)
        .unwrap();
    let CalibrationResult::SpikeNorm(spike_norm) = result else {
        panic!("expected a spike-norm result");
    };
    // hidden unit 0 peaks at 0.5 + 0.25 per step; calibrated hidden then
    // fires every step, so the output sees 2.0 per step
    assert_eq!(spike_norm.layers, vec!["hidden", "out"]);
    assert_eq!(spike_norm.thresholds, vec![0.75, 2.0]);
    assert_eq!(network.threshold(&runtime, 1).unwrap(), 0.75);
    assert_eq!(network.threshold(&runtime, 2).unwrap(), 2.0);
}

#[test]
fn test_spike_norm_silent_layer_is_degenerate() {
    let ann = two_layer_ann([[1.0, 0.0], [1.0, 0.0]], [[1.0], [0.0]]);
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &if_options(1), &mut runtime);
    let samples = SampleSet::new(ArrayD::<f32>::zeros(IxDyn(&[2, 2])), 1).unwrap();
    let err = SpikeNorm::new(5.0)
        .calibrate(&network, &mut runtime, &samples)
        .unwrap_err();
    assert!(matches!(err, ConversionError::DegenerateScale { ref layer, .. } if layer == "hidden"));
}

fn few_spike_options(k: u32) -> BuildOptions {
    BuildOptions {
        neuron_model: "fs_relu".to_string(),
        input_model: "fs_relu_input".to_string(),
        batch_size: 1,
        few_spike: FewSpikeConfig {
            k,
            alpha: 1.0,
            input_alpha: 1.0,
        },
        ..BuildOptions::default()
    }
}

#[test]
fn test_few_spike_network_decodes_binary_expansion() {
    let ann = SequentialAnn::new(vec![
        LayerSpec::input("in", Shape::Flat(1)),
        LayerSpec::dense("out", arr2(&[[0.5f32, 1.0]]).into_dyn()).unwrap(),
    ])
    .unwrap();
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &few_spike_options(4), &mut runtime);
    assert_eq!(network.pipeline_length(), Some(4));
    assert_eq!(network.presentation_steps(&runtime, 0.0), 4);

    // 0.75 = 0.5 + 0.25 is exact in a 4-step expansion
    let input = arr2(&[[0.75f32]]).into_dyn();
    let predictions = network.present_batch(&mut runtime, input.view(), 0.0).unwrap();
    assert_eq!(predictions, vec![1]);

    let out = network.layers()[1].replicas[0];
    runtime.pull_var_from_device(out, "Fx").unwrap();
    assert_eq!(runtime.var(out, "Fx").unwrap(), &[0.375, 0.75]);
}

#[test]
fn test_few_spike_threshold_not_settable() {
    let ann = two_layer_ann([[1.0, 0.0], [0.0, 1.0]], [[1.0], [1.0]]);
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &few_spike_options(8), &mut runtime);
    let pop = network.layers()[1].replicas[0];
    let params_before = runtime.population_params(pop).unwrap().to_vec();

    let err = network.set_threshold(&mut runtime, 1, 0.5).unwrap_err();
    assert!(matches!(err, ConversionError::ThresholdNotSettable { ref model, .. } if model == "fs_relu"));
    assert_eq!(runtime.population_params(pop).unwrap(), params_before.as_slice());

    // Spike-norm needs settable thresholds and fails before simulating
    let samples = SampleSet::new(arr2(&[[1.0f32, 1.0]]).into_dyn(), 1).unwrap();
    assert!(SpikeNorm::new(5.0).calibrate(&network, &mut runtime, &samples).is_err());
    assert_eq!(runtime.timestep(), 0);
}

#[test]
fn test_few_spike_calibration_checks_schedules() {
    let ann = two_layer_ann([[1.0, 0.0], [0.0, 1.0]], [[1.0], [1.0]]);
    let mut runtime = CpuRuntime::new(1.0).unwrap();
    let network = build(&ann, &few_spike_options(10), &mut runtime);
    let samples = SampleSet::new(arr2(&[[1.0f32, 1.0]]).into_dyn(), 1).unwrap();

    let calibrator = FewSpike::new(10, 1.0, 1.0);
    let result = calibrator.calibrate(&network, &mut runtime, &samples).unwrap();
    result.apply(&network, &mut runtime).unwrap();
    let CalibrationResult::FewSpike(schedules) = result else {
        panic!("expected a few-spike result");
    };
    assert_eq!(schedules.schedules.len(), 3);
    assert_eq!(schedules.schedule("hidden").unwrap().k(), 10);

    let mismatched = FewSpike::new(10, 25.0, 1.0)
        .calibrate(&network, &mut runtime, &samples)
        .unwrap();
    assert!(mismatched.apply(&network, &mut runtime).is_err());

    // IF networks have no schedule to derive
    let mut if_runtime = CpuRuntime::new(1.0).unwrap();
    let if_network = build(&ann, &if_options(1), &mut if_runtime);
    assert!(calibrator.calibrate(&if_network, &mut if_runtime, &samples).is_err());
}
