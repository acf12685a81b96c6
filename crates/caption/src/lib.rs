//! HTTP captioning client.
//!
//! Posts a JPEG snapshot to an image-to-text inference endpoint and pulls
//! the generated caption out of the response.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, bail};
use capture::RgbFrame;
use image::{ImageFormat, RgbImage};
use session::Captioner;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpCaptioner {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpCaptioner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl Captioner for HttpCaptioner {
    fn describe(&self, frame: &RgbFrame) -> anyhow::Result<String> {
        let jpeg = encode_snapshot(frame)?;

        tracing::debug!(bytes = jpeg.len(), endpoint = %self.endpoint, "requesting caption");
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "image/jpeg")
            .send_bytes(&jpeg)
            .context("caption request failed")?;

        let body: serde_json::Value = response
            .into_json()
            .context("caption response was not valid json")?;

        parse_caption(&body)
    }
}

fn encode_snapshot(frame: &RgbFrame) -> anyhow::Result<Vec<u8>> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .context("frame buffer does not match its dimensions")?;
    let mut jpeg = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .context("snapshot jpeg encoding failed")?;
    Ok(jpeg)
}

/// Extract `generated_text` from an image-to-text response of the form
/// `[{"generated_text": "..."}]`.
pub fn parse_caption(body: &serde_json::Value) -> anyhow::Result<String> {
    let Some(first) = body.as_array().and_then(|items| items.first()) else {
        bail!("caption response contained no results: {body}");
    };
    match first.get("generated_text").and_then(|text| text.as_str()) {
        Some(text) => Ok(text.trim().to_string()),
        None => bail!("caption result missing generated_text: {first}"),
    }
}
