use async_trait::async_trait;
use lexia_core::markers::wrap_image;
use lexia_core::{
    ImageRequest, LoadingKind, Tool, ToolContext, ToolDefinition, ToolResult, schema_object,
};
use tracing::{error, info};

pub const GENERATE_IMAGE: &str = "generate_image";

/// Image generation through the request's provider.
pub struct GenerateImageTool;

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &'static str {
        GENERATE_IMAGE
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Generate an image using DALL-E 3 based on a text description"
                .to_string(),
            parameters: schema_object(
                serde_json::json!({
                    "prompt": {
                        "type": "string",
                        "description": "A detailed description of the image you want to generate. Be specific about style, colors, composition, and mood."
                    },
                    "size": {
                        "type": "string",
                        "enum": ["1024x1024", "1792x1024", "1024x1792"],
                        "description": "The size of the generated image. 1024x1024 is square, 1792x1024 is landscape, 1024x1792 is portrait."
                    },
                    "quality": {
                        "type": "string",
                        "enum": ["standard", "hd"],
                        "description": "Image quality. HD is higher quality but costs more."
                    },
                    "style": {
                        "type": "string",
                        "enum": ["vivid", "natural"],
                        "description": "Image style. Vivid is more dramatic, natural is more realistic."
                    }
                }),
                &["prompt"],
            ),
        }
    }

    fn loading_kind(&self) -> Option<LoadingKind> {
        Some(LoadingKind::Image)
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult {
        let Some(prompt) = input.get("prompt").and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required parameter: prompt");
        };
        if prompt.trim().is_empty() {
            return ToolResult::error("Parameter 'prompt' must not be empty");
        }

        let request: ImageRequest = match serde_json::from_value(input.clone()) {
            Ok(r) => r,
            Err(e) => return ToolResult::error(format!("Invalid image parameters: {e}")),
        };

        info!(
            "Generating image for thread {}: {}",
            ctx.thread_id, request.prompt
        );

        match ctx.provider.generate_image(&request).await {
            Ok(url) => {
                info!("Image generated successfully: {url}");
                ToolResult::success(wrap_image(&url)).with_file_url(url)
            }
            Err(e) => {
                error!("Error generating image: {e}");
                ToolResult::error(format!("Error generating image: {e}"))
            }
        }
    }
}
