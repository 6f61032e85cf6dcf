use burn::nn::loss::{MseLoss, Reduction};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

pub const DEFAULT_HUBER_DELTA: f32 = 1.0;

/// Mean Huber loss: quadratic for residuals under `delta`, linear above.
pub fn huber_loss<B: Backend>(pred: Tensor<B, 2>, target: Tensor<B, 2>, delta: f32) -> Tensor<B, 1> {
    let diff = (pred - target).abs();
    let quad = diff.clone().clamp_max(delta);
    let linear = diff - quad.clone();
    (quad.powf_scalar(2.0) * 0.5 + linear * delta).mean()
}

/// Mean squared error, tracked for reporting only.
pub fn mse_metric<B: Backend>(pred: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    MseLoss::new().forward(pred, target, Reduction::Mean)
}
