pub mod detr;
pub mod labels;
pub mod preprocess;

pub use detr::DetrDetector;
