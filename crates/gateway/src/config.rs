use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub device_id: u32,
    pub capture_fps: u32,
    pub detection_interval: u64,
    pub jpeg_quality: u8,
    pub confidence_threshold: f32,
    pub model_path: String,
    pub caption_url: String,
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    config::Config::builder()
        .set_default("host", "127.0.0.1")?
        .set_default("port", 8000)?
        .set_default("device_id", 0)?
        .set_default("capture_fps", 5)?
        .set_default("detection_interval", 3)?
        .set_default("jpeg_quality", 70)?
        .set_default("confidence_threshold", 0.9)?
        .set_default("model_path", "models/detr.onnx")?
        .set_default("caption_url", "http://localhost:8080/caption")
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = defaults()?
        .add_source(
            config::Environment::with_prefix("WEBCAM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
