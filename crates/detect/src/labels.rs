/// COCO class names indexed by the 91-category detection ids the DETR
/// family emits. "N/A" slots are category ids COCO defines but never
/// annotates; the model should not predict them above threshold.
#[rustfmt::skip]
pub const COCO_LABELS: [&str; 91] = [
    "N/A", "person", "bicycle", "car", "motorcycle", "airplane", "bus",
    "train", "truck", "boat", "traffic light", "fire hydrant", "N/A",
    "stop sign", "parking meter", "bench", "bird", "cat", "dog", "horse",
    "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "N/A",
    "backpack", "umbrella", "N/A", "N/A", "handbag", "tie", "suitcase",
    "frisbee", "skis", "snowboard", "sports ball", "kite", "baseball bat",
    "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "N/A", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana",
    "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza",
    "donut", "cake", "chair", "couch", "potted plant", "bed", "N/A",
    "dining table", "N/A", "N/A", "toilet", "N/A", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster",
    "sink", "refrigerator", "N/A", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Human-readable name for a class id; out-of-range ids degrade to "N/A".
pub fn label_name(class_id: i64) -> &'static str {
    usize::try_from(class_id)
        .ok()
        .and_then(|id| COCO_LABELS.get(id))
        .copied()
        .unwrap_or("N/A")
}
