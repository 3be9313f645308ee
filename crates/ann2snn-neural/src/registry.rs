// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Model registry
//!
//! An explicit, caller-owned table of neuron models keyed by name. The
//! builder resolves every population's model through it.

use crate::error::{NeuralError, NeuralResult};
use crate::models::{
    few_spike::FewSpikeReluModel,
    input::{FewSpikeInputModel, IfInputModel, PoissonInputModel, SpikeInputModel},
    integrate_fire::IntegrateFireModel,
    NeuronModel,
};
use ahash::AHashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    neuron_models: AHashMap<String, Arc<dyn NeuronModel>>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in neuron model
    pub fn with_builtin_models() -> Self {
        let mut registry = Self::new();
        registry.register_neuron_model(Arc::new(IntegrateFireModel::new()));
        registry.register_neuron_model(Arc::new(FewSpikeReluModel::new()));
        registry.register_neuron_model(Arc::new(SpikeInputModel::new()));
        registry.register_neuron_model(Arc::new(SpikeInputModel::signed()));
        registry.register_neuron_model(Arc::new(PoissonInputModel::new()));
        registry.register_neuron_model(Arc::new(PoissonInputModel::signed()));
        registry.register_neuron_model(Arc::new(IfInputModel::new()));
        registry.register_neuron_model(Arc::new(FewSpikeInputModel::new()));
        registry
    }

    /// Register a model under its descriptor name, returning any model it replaces
    pub fn register_neuron_model(
        &mut self,
        model: Arc<dyn NeuronModel>,
    ) -> Option<Arc<dyn NeuronModel>> {
        self.neuron_models
            .insert(model.model_name().to_string(), model)
    }

    pub fn neuron_model(&self, name: &str) -> NeuralResult<Arc<dyn NeuronModel>> {
        self.neuron_models
            .get(name)
            .cloned()
            .ok_or_else(|| NeuralError::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.neuron_models.contains_key(name)
    }

    /// Registered model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.neuron_models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
