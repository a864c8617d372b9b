//! Status model and page rendering for the conversion form.

use kinema_core::ModelType;
use serde::{Deserialize, Serialize};

const PAGE: &str = include_str!("page.html");

/// What the form shows while and after a conversion runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormStatus {
    /// Submitted, waiting on the vendor
    Processing,
    /// Finished; `video` is the URL the player loads
    Done { video: String },
    Failed { message: String },
}

impl FormStatus {
    pub fn status_text(&self) -> String {
        match self {
            FormStatus::Processing => "Processing...".to_string(),
            FormStatus::Done { .. } => String::new(),
            FormStatus::Failed { message } => format!("Error during conversion: {message}"),
        }
    }

    pub fn video(&self) -> Option<&str> {
        match self {
            FormStatus::Done { video } => Some(video),
            _ => None,
        }
    }

    /// The JSON payload of one server-sent event.
    pub fn update(&self) -> StatusUpdate {
        StatusUpdate {
            status: self.status_text(),
            video: self.video().map(String::from),
        }
    }
}

/// One server-sent event: `{"status": ..., "video": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub video: Option<String>,
}

/// The form page with the model dropdown filled in.
pub fn render_page(default_model: &str) -> String {
    let options: String = ModelType::ALL
        .iter()
        .map(|model| {
            let name = model.to_string();
            let selected = if name.eq_ignore_ascii_case(default_model) {
                " selected"
            } else {
                ""
            };
            format!("<option value=\"{name}\"{selected}>{name}</option>")
        })
        .collect::<Vec<_>>()
        .join("\n          ");
    PAGE.replace("{{MODEL_OPTIONS}}", &options)
}
