//! Pretrained engine wiring from `[tracking]` config.

use anyhow::bail;
use cli_support::{PoseBackend, TrackerConfig};
use inference::{DetectorFactory, InferenceBackend};
use model_registry::ModelStore;

#[cfg(feature = "onnx")]
pub fn configure(factory: DetectorFactory, cfg: &TrackerConfig) -> anyhow::Result<DetectorFactory> {
    use inference::onnx::{MoveNetEngine, YoloV8Engine};
    use inference::{ObjectEngine, PoseEngine};

    let mut factory = factory;
    if cfg.tracking.pose_backend == PoseBackend::Movenet {
        let Some(path) = cfg.tracking.pose_model.clone() else {
            bail!("tracking.pose_backend = \"movenet\" needs tracking.pose_model");
        };
        factory = factory.with_pose_engine(move || Ok(Box::new(MoveNetEngine::new(path.clone())) as Box<dyn PoseEngine>));
    }
    if let Some(path) = cfg.tracking.object_model.clone() {
        let classes = cfg.tracking.object_classes.clone();
        factory = factory.with_object_engine(move || {
            Ok(Box::new(YoloV8Engine::new(path.clone(), classes.clone())) as Box<dyn ObjectEngine>)
        });
    }
    Ok(factory)
}

#[cfg(not(feature = "onnx"))]
pub fn configure(factory: DetectorFactory, cfg: &TrackerConfig) -> anyhow::Result<DetectorFactory> {
    if cfg.tracking.pose_backend != PoseBackend::None || cfg.tracking.object_model.is_some() {
        bail!("pretrained engines need a build with `--features onnx`");
    }
    Ok(factory)
}

pub fn factory(store: &ModelStore<InferenceBackend>, cfg: &TrackerConfig) -> anyhow::Result<DetectorFactory> {
    let settings = inference::DetectorSettings {
        min_confidence: cfg.tracking.detection_min_confidence,
        ..Default::default()
    };
    configure(
        DetectorFactory::new(store.active_handle(), store.ledger().clone()).with_settings(settings),
        cfg,
    )
}
