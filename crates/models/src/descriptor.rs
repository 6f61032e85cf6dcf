//! Persisted model form: JSON architecture descriptor + Burn record bytes.

use crate::{MarkerRegressor, MarkerRegressorConfig, MarkerRegressorRecord, ModelError, ModelResult};
use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

pub const DESCRIPTOR_FORMAT: &str = "marker-regressor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDescriptor {
    pub format: String,
    pub version: u32,
    pub config: MarkerRegressorConfig,
}

impl ArchitectureDescriptor {
    pub const VERSION: u32 = 1;

    pub fn new(config: MarkerRegressorConfig) -> Self {
        Self {
            format: DESCRIPTOR_FORMAT.to_string(),
            version: Self::VERSION,
            config,
        }
    }

    pub fn to_json(&self) -> ModelResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> ModelResult<Self> {
        let desc: Self = serde_json::from_slice(bytes)?;
        if desc.format != DESCRIPTOR_FORMAT {
            return Err(ModelError::ShapeMismatch {
                expected: format!("format {DESCRIPTOR_FORMAT}"),
                found: desc.format,
            });
        }
        desc.config.validate()?;
        Ok(desc)
    }

    /// Fresh, untrained model with this architecture.
    pub fn build<B: Backend>(&self, device: &B::Device) -> ModelResult<MarkerRegressor<B>> {
        MarkerRegressor::new(self.config, device)
    }
}

pub fn model_to_bytes<B: Backend>(model: &MarkerRegressor<B>) -> ModelResult<Vec<u8>> {
    BinBytesRecorder::<FullPrecisionSettings>::default()
        .record(model.clone().into_record(), ())
        .map_err(|e| ModelError::Record(e.to_string()))
}

/// Rebuild a model from its descriptor and weight bytes.
pub fn model_from_bytes<B: Backend>(
    descriptor: &ArchitectureDescriptor,
    weights: &[u8],
    device: &B::Device,
) -> ModelResult<MarkerRegressor<B>> {
    if weights.is_empty() {
        return Err(ModelError::MissingWeights("weight buffer is empty".to_string()));
    }
    let model = descriptor.build::<B>(device)?;
    let record: MarkerRegressorRecord<B> = BinBytesRecorder::<FullPrecisionSettings>::default()
        .load(weights.to_vec(), device)
        .map_err(|e| ModelError::Record(e.to_string()))?;
    let expected = model.num_params();
    let model = model.load_record(record);
    // Burn loads records without shape checks; compare parameter counts instead.
    if model.num_params() != expected {
        return Err(ModelError::ShapeMismatch {
            expected: format!("{expected} parameters"),
            found: format!("{} parameters", model.num_params()),
        });
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;

    type B = NdArray<f32>;

    #[test]
    fn weights_survive_bytes() {
        let device = Default::default();
        let desc = ArchitectureDescriptor::new(MarkerRegressorConfig::new(16, 16, 4));
        let model = desc.build::<B>(&device).unwrap();
        let bytes = model_to_bytes(&model).unwrap();
        let restored = model_from_bytes::<B>(&desc, &bytes, &device).unwrap();

        let input = Tensor::<B, 4>::ones([1, 3, 16, 16], &device);
        let a = model.forward(input.clone()).into_data().to_vec::<f32>().unwrap();
        let b = restored.forward(input).into_data().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_weights_are_missing() {
        let device = Default::default();
        let desc = ArchitectureDescriptor::new(MarkerRegressorConfig::new(16, 16, 4));
        let err = model_from_bytes::<B>(&desc, &[], &device).unwrap_err();
        assert!(matches!(err, ModelError::MissingWeights(_)));
    }

    #[test]
    fn weights_for_other_head_are_rejected() {
        let device = Default::default();
        let small = ArchitectureDescriptor::new(MarkerRegressorConfig::new(16, 16, 4));
        let wide = ArchitectureDescriptor::new(MarkerRegressorConfig::new(16, 16, 10));
        let bytes = model_to_bytes(&wide.build::<B>(&device).unwrap()).unwrap();
        let err = model_from_bytes::<B>(&small, &bytes, &device).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn descriptor_rejects_foreign_format() {
        let json = br#"{"format":"other","version":1,"config":{"input_width":16,"input_height":16,"output_dim":4,"dropout_hidden":0.4,"dropout_head":0.3}}"#;
        assert!(ArchitectureDescriptor::from_json(json).is_err());
    }
}
