//! Alert requests and the Bot API methods they map to.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Source of an alert.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Still image from the camera.
    Camera,
    /// Audio clip from the microphone.
    Microphone,
    /// Video clip from the camera.
    CameraVideo,
    #[default]
    Other,
}

impl EventType {
    /// Bot API upload method used for media attached to this event.
    pub fn upload_method(&self) -> ApiMethod {
        match self {
            Self::Camera => ApiMethod::SendPhoto,
            Self::Microphone => ApiMethod::SendAudio,
            Self::CameraVideo => ApiMethod::SendVideo,
            Self::Other => ApiMethod::SendDocument,
        }
    }
}

/// Telegram Bot API methods used by the alert channel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum ApiMethod {
    SendMessage,
    SendPhoto,
    SendAudio,
    SendVideo,
    SendDocument,
}

impl ApiMethod {
    /// Method name as it appears in the request path.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Multipart field carrying the uploaded file, `None` for text-only methods.
    pub fn part_name(&self) -> Option<&'static str> {
        match self {
            Self::SendMessage => None,
            Self::SendPhoto => Some("photo"),
            Self::SendAudio => Some("audio"),
            Self::SendVideo => Some("video"),
            Self::SendDocument => Some("document"),
        }
    }
}

/// A single alert to deliver. Built per event and consumed by one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub message: String,
    pub media_path: Option<PathBuf>,
    pub event_type: EventType,
}

impl AlertRequest {
    /// Text-only alert.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            media_path: None,
            event_type: EventType::Other,
        }
    }

    /// Alert with a media attachment classified by `event_type`.
    pub fn with_media(
        message: impl Into<String>,
        media_path: impl Into<PathBuf>,
        event_type: EventType,
    ) -> Self {
        Self {
            message: message.into(),
            media_path: Some(media_path.into()),
            event_type,
        }
    }

    /// Attached media that exists on disk, if any.
    ///
    /// An empty or dangling path counts as no attachment.
    pub fn existing_media(&self) -> Option<&Path> {
        self.media_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty() && path.exists())
    }
}
