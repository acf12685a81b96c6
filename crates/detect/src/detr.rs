use crate::labels::label_name;
use crate::preprocess::PreProcessor;
use capture::RgbFrame;
use ndarray::{Array, ArrayViewD, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use session::{Detection, Detector};

/// DETR-family ONNX detector.
///
/// Expects a model taking `images` (normalized NCHW f32) and
/// `orig_target_sizes` (i64 `[1, 2]` as height, width) and emitting
/// `labels`/`boxes`/`scores`, with boxes already in original pixel
/// coordinates.
pub struct DetrDetector {
    session: Session,
    preprocessor: PreProcessor,
    threshold: f32,
}

impl DetrDetector {
    pub fn load(model_path: &str, threshold: f32) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        #[cfg(feature = "cuda")]
        let builder = {
            tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
            builder.with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()
                    .error_on_failure(),
            ])?
        };
        #[cfg(not(feature = "cuda"))]
        tracing::info!("Initializing ONNX Runtime with CPU execution provider");

        let session = builder.commit_from_file(model_path)?;
        tracing::info!("Detection model loaded from {}", model_path);

        Ok(Self {
            session,
            preprocessor: PreProcessor::new((640, 640)),
            threshold,
        })
    }
}

impl Detector for DetrDetector {
    fn detect(&mut self, frame: &RgbFrame) -> anyhow::Result<Vec<Detection>> {
        let images = self.preprocessor.preprocess_frame(frame)?;
        let orig_sizes = Array::<i64, _>::from_shape_vec(
            IxDyn(&[1, 2]),
            vec![frame.height as i64, frame.width as i64],
        )?;

        let outputs = self.session.run(ort::inputs![
            "images" => TensorRef::from_array_view(images.view())?,
            "orig_target_sizes" => TensorRef::from_array_view(orig_sizes.view())?
        ])?;

        let labels: ArrayViewD<i64> = outputs["labels"].try_extract_array()?;
        let boxes: ArrayViewD<f32> = outputs["boxes"].try_extract_array()?;
        let scores: ArrayViewD<f32> = outputs["scores"].try_extract_array()?;

        let detections = parse_detections(
            &labels,
            &boxes,
            &scores,
            self.threshold,
            frame.width,
            frame.height,
        );

        tracing::trace!(count = detections.len(), "detection pass complete");
        Ok(detections)
    }
}

/// Filter raw model outputs by the confidence cutoff and clamp boxes to the
/// frame bounds.
pub fn parse_detections(
    labels: &ArrayViewD<i64>,
    boxes: &ArrayViewD<f32>,
    scores: &ArrayViewD<f32>,
    threshold: f32,
    width: u32,
    height: u32,
) -> Vec<Detection> {
    let mut detections = Vec::new();
    let num_queries = scores.shape()[1];

    for i in 0..num_queries {
        let score = scores[[0, i]];
        if score < threshold {
            continue;
        }

        let x1 = boxes[[0, i, 0]].clamp(0.0, width as f32);
        let y1 = boxes[[0, i, 1]].clamp(0.0, height as f32);
        let x2 = boxes[[0, i, 2]].clamp(0.0, width as f32);
        let y2 = boxes[[0, i, 3]].clamp(0.0, height as f32);

        detections.push(Detection {
            label: label_name(labels[[0, i]]).to_string(),
            score,
            bbox: [x1, y1, x2, y2],
        });
    }

    detections
}
