//! Turning an image payload into a context fragment.

use std::sync::Arc;

use vassago_core::{Error, ImageMode, Result};

use crate::decode::decode_base64;
use crate::model::VisionModel;

/// Decodes `image_base64` and interprets it per `mode`, producing text for the
/// prompt context.
///
/// This never fails. Decoding or model errors become an explanatory fragment
/// so the query can still be answered from documents alone.
pub async fn interpret(
    vision: Arc<dyn VisionModel>,
    image_base64: &str,
    mode: ImageMode,
    query: &str,
) -> String {
    match run(vision, image_base64, mode, query).await {
        Ok(fragment) => fragment,
        Err(e) => {
            tracing::warn!(error = %e, ?mode, "Image could not be processed");
            format!("[Image could not be processed: {e}]")
        }
    }
}

async fn run(
    vision: Arc<dyn VisionModel>,
    image_base64: &str,
    mode: ImageMode,
    query: &str,
) -> Result<String> {
    let payload = image_base64.to_string();
    let image = tokio::task::spawn_blocking(move || decode_base64(&payload))
        .await
        .map_err(|e| Error::decode(format!("decoder crashed: {e}")))??;
    let image = Arc::new(image);

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        backend = vision.name(),
        "Interpreting image"
    );

    Ok(match mode {
        ImageMode::Captioning => {
            let caption = vision.caption(image, None).await?;
            format!("Image description: {caption}")
        }
        ImageMode::QuestionAnswering => {
            let answer = vision.answer(image, query).await?;
            format!("Image analysis: {answer}")
        }
    })
}
