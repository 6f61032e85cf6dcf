use crate::{ModelError, ModelResult};
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use data_contracts::LabelLayout;
use serde::{Deserialize, Serialize};

/// Filter counts of the three conv blocks.
pub const BLOCK_FILTERS: [usize; 3] = [32, 64, 128];

/// Shape and head configuration; also serialized as the architecture descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerRegressorConfig {
    pub input_width: usize,
    pub input_height: usize,
    /// 4 for a single box, 10 for two stick endpoints.
    pub output_dim: usize,
    pub dropout_hidden: f64,
    pub dropout_head: f64,
}

impl Default for MarkerRegressorConfig {
    fn default() -> Self {
        Self {
            input_width: 128,
            input_height: 128,
            output_dim: 4,
            dropout_hidden: 0.4,
            dropout_head: 0.3,
        }
    }
}

impl MarkerRegressorConfig {
    pub fn new(input_width: usize, input_height: usize, output_dim: usize) -> Self {
        Self {
            input_width,
            input_height,
            output_dim,
            ..Self::default()
        }
    }

    pub fn for_layout(input_width: usize, input_height: usize, layout: LabelLayout) -> Self {
        Self::new(input_width, input_height, layout.output_dim())
    }

    /// Spatial size after the three 2x2 pools.
    pub fn pooled_dims(&self) -> (usize, usize) {
        (self.input_width / 8, self.input_height / 8)
    }

    pub fn flatten_dim(&self) -> usize {
        let (w, h) = self.pooled_dims();
        w * h * BLOCK_FILTERS[2]
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.input_width < 8 || self.input_height < 8 {
            return Err(ModelError::ShapeMismatch {
                expected: "input of at least 8x8".to_string(),
                found: format!("{}x{}", self.input_width, self.input_height),
            });
        }
        if LabelLayout::from_output_dim(self.output_dim).is_none() {
            return Err(ModelError::ShapeMismatch {
                expected: "output_dim 4 or 10".to_string(),
                found: self.output_dim.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    fn new(channels: [usize; 2], kernel: usize, device: &B::Device) -> Self {
        let pad = kernel / 2;
        let conv = Conv2dConfig::new(channels, [kernel, kernel])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .init(device);
        let norm = BatchNormConfig::new(channels[1]).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self { conv, norm, pool }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = relu(self.norm.forward(x));
        self.pool.forward(x)
    }
}

/// `[B, 3, H, W]` in [0, 1] to `[B, output_dim]` in (0, 1).
#[derive(Module, Debug)]
pub struct MarkerRegressor<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    dense1: Linear<B>,
    drop1: Dropout,
    dense2: Linear<B>,
    drop2: Dropout,
    head: Linear<B>,
    pub config: Ignored<MarkerRegressorConfig>,
}

impl<B: Backend> MarkerRegressor<B> {
    pub fn new(config: MarkerRegressorConfig, device: &B::Device) -> ModelResult<Self> {
        config.validate()?;
        let [f1, f2, f3] = BLOCK_FILTERS;
        Ok(Self {
            // 5x5 first to cover colour-blob scale features.
            block1: ConvBlock::new([3, f1], 5, device),
            block2: ConvBlock::new([f1, f2], 3, device),
            block3: ConvBlock::new([f2, f3], 3, device),
            dense1: LinearConfig::new(config.flatten_dim(), 256).init(device),
            drop1: DropoutConfig::new(config.dropout_hidden).init(),
            dense2: LinearConfig::new(256, 128).init(device),
            drop2: DropoutConfig::new(config.dropout_head).init(),
            head: LinearConfig::new(128, config.output_dim).init(device),
            config: Ignored(config),
        })
    }

    pub fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    pub fn input_size(&self) -> (usize, usize) {
        (self.config.input_width, self.config.input_height)
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block1.forward(input);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.drop1.forward(relu(self.dense1.forward(x)));
        let x = self.drop2.forward(relu(self.dense2.forward(x)));
        sigmoid(self.head.forward(x))
    }

    /// Forward with an input shape check.
    pub fn try_forward(&self, input: Tensor<B, 4>) -> ModelResult<Tensor<B, 2>> {
        let [_, c, h, w] = input.dims();
        if c != 3 || h != self.config.input_height || w != self.config.input_width {
            return Err(ModelError::ShapeMismatch {
                expected: format!("[_, 3, {}, {}]", self.config.input_height, self.config.input_width),
                found: format!("[_, {c}, {h}, {w}]"),
            });
        }
        Ok(self.forward(input))
    }

    /// Approximate resident size of the parameters.
    pub fn param_bytes(&self) -> usize {
        self.num_params() * std::mem::size_of::<f32>()
    }
}
