use std::path::Path;
use colored::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::response::InferenceResult;
use crate::server::{ApiResponse, InferRequest};
use crate::session::Modality;
use super::display::{display_error, display_init_report, display_result, display_status};

/// Attachments staged for the next prompt
#[derive(Debug, Default)]
pub(super) struct Attachments {
    pub image: Option<String>,
    pub audio: Option<String>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.audio.is_none()
    }

    pub fn clear(&mut self) {
        self.image = None;
        self.audio = None;
    }

    /// Short prompt decoration, e.g. `image+audio`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.image.is_some() {
            parts.push("image");
        }
        if self.audio.is_some() {
            parts.push("audio");
        }
        parts.join("+")
    }
}

/// Represents the context for chat command operations
///
/// # Fields
///
/// * `client` - HTTP client used for making API requests to the server
/// * `server_url` - Base URL of the server API
/// * `staged` - Attachments that ride along with the next prompt
pub(super) struct ChatContext<'a> {
    pub client: &'a Client,
    pub server_url: &'a str,
    pub staged: &'a mut Attachments,
}

pub(super) async fn handle_init(context: &ChatContext<'_>) {
    println!("{}", "Loading model, this can take a while...".bright_black());
    let url = format!("{}/api/v1/init", context.server_url);
    match send::<Value>(context.client.post(url)).await {
        Ok(response) if response.ok => match response.result {
            Some(report) => display_init_report(&report),
            None => println!("{}", "Model ready".green()),
        },
        Ok(response) => display_error(response.error.as_ref()),
        Err(e) => println!("Error sending init request: {}", e),
    }
}

pub(super) async fn handle_status(context: &ChatContext<'_>) {
    let url = format!("{}/api/v1/status", context.server_url);
    match send::<Value>(context.client.get(url)).await {
        Ok(response) if response.ok => match response.result {
            Some(status) => display_status(&status),
            None => println!("Empty status response"),
        },
        Ok(response) => display_error(response.error.as_ref()),
        Err(e) => println!("Error requesting status: {}", e),
    }
}

/// Stages a file path; the server reads it when the next prompt is sent.
pub(super) fn handle_attach(context: &mut ChatContext<'_>, modality: Modality, path: &str) {
    if !Path::new(path).is_file() {
        println!("{}", format!("Warning: {} does not exist here, the server may still read it", path).yellow());
    }
    let slot = match modality {
        Modality::Image => &mut context.staged.image,
        Modality::Audio => &mut context.staged.audio,
        Modality::Text => return,
    };
    *slot = Some(path.to_string());
    println!("{} attached: {}", modality, path);
}

pub(super) async fn handle_infer(context: &mut ChatContext<'_>, text: &str) {
    let request = InferRequest {
        text: Some(text.to_string()),
        image_path: context.staged.image.clone(),
        audio_path: context.staged.audio.clone(),
    };
    let url = format!("{}/api/v1/infer", context.server_url);

    match send::<InferenceResult>(context.client.post(url).json(&request)).await {
        Ok(response) if response.ok => {
            context.staged.clear();
            match response.result {
                Some(result) => display_result(&result),
                None => println!("Empty inference response"),
            }
        }
        Ok(response) => {
            let not_ready = response
                .error
                .as_ref()
                .is_some_and(|e| e.kind == "MODEL_NOT_INITIALIZED");
            display_error(response.error.as_ref());
            if not_ready {
                println!("Type 'init' to load the model first.");
            }
        }
        Err(e) => println!("Error sending inference request: {}", e),
    }
}

async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<ApiResponse<T>, reqwest::Error> {
    request.send().await?.json::<ApiResponse<T>>().await
}
