//! Telegram Bot API alert channel.
//!
//! Text alerts go to `POST /bot<token>/sendMessage` as JSON. Alerts with a
//! media file on disk are uploaded as `multipart/form-data` to the method
//! matching the event type (`sendPhoto`, `sendAudio`, `sendVideo` or
//! `sendDocument`). Exactly one request is made per alert; only the status
//! line of the response is consulted.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use super::AlertChannel;
use crate::event::{AlertRequest, ApiMethod};
use crate::multipart::MultipartBody;
use crate::store::{SettingsStore, TelegramSettingsUpdate};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport, RequestBody};
use crate::{Error, Result};

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const CHANNEL_NAME: &str = "Telegram";

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram alert channel.
pub struct TelegramChannel {
    store: Arc<dyn SettingsStore>,
    transport: Arc<dyn HttpTransport>,
    api_base: String,
}

impl TelegramChannel {
    /// Create a channel that talks to the public Bot API over `reqwest`.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_transport(store, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(store: Arc<dyn SettingsStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            store,
            transport,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Overwrite the stored settings named in `update`.
    ///
    /// Values are stored as given; token and chat id formats are not checked.
    pub fn configure(&self, update: TelegramSettingsUpdate) -> Result<()> {
        if let Some(token) = &update.bot_token {
            self.store.set_telegram_bot_token(token)?;
        }
        if let Some(chat_id) = &update.chat_id {
            self.store.set_telegram_chat_id(chat_id)?;
        }
        if let Some(enabled) = update.enabled {
            self.store.set_telegram_enabled(enabled)?;
        }
        Ok(())
    }

    /// Send `alert` and return the Bot API method that accepted it.
    ///
    /// Credentials are re-read from the store on every call. Missing
    /// credentials fail before any network I/O, regardless of the enabled
    /// flag. A media path that is empty or does not exist falls back to a
    /// text message.
    pub async fn dispatch(&self, alert: &AlertRequest) -> Result<ApiMethod> {
        let settings = self.store.snapshot();
        if !settings.has_credentials() {
            return Err(Error::config("Telegram Bot Token or Chat ID not configured"));
        }

        match alert.existing_media() {
            Some(path) => {
                let method = alert.event_type.upload_method();
                self.send_file(&settings.bot_token, &settings.chat_id, &alert.message, path, method)
                    .await?;
                Ok(method)
            }
            None => {
                if alert.media_path.is_some() {
                    debug!(
                        path = ?alert.media_path,
                        "Media file missing, sending text alert instead"
                    );
                }
                self.send_text(&settings.bot_token, &settings.chat_id, &alert.message)
                    .await?;
                Ok(ApiMethod::SendMessage)
            }
        }
    }

    fn method_url(&self, token: &str, method: ApiMethod) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method.as_str())
    }

    async fn send_text(&self, token: &str, chat_id: &str, text: &str) -> Result<()> {
        let method = ApiMethod::SendMessage;
        let payload = serde_json::to_vec(&SendMessagePayload { chat_id, text })
            .map_err(|e| Error::Transport {
                method,
                reason: format!("failed to encode payload: {e}"),
            })?;

        let request = HttpRequest {
            url: self.method_url(token, method),
            headers: vec![
                ("Content-Type", "application/json; charset=utf-8".to_string()),
                ("Accept", "application/json".to_string()),
            ],
            content_length: Some(payload.len() as u64),
            body: RequestBody::Bytes(Bytes::from(payload)),
        };

        let status = self
            .transport
            .post(request)
            .await
            .map_err(|e| transport_failure(method, e.0))?;
        check_status(method, status)?;

        debug!("Telegram message sent successfully");
        Ok(())
    }

    async fn send_file(
        &self,
        token: &str,
        chat_id: &str,
        caption: &str,
        path: &Path,
        method: ApiMethod,
    ) -> Result<()> {
        let file_access = |source: io::Error| Error::FileAccess {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(file_access)?;
        let file_len = file.metadata().await.map_err(file_access)?.len();

        let part_name = method.part_name().unwrap_or("document");
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut body = MultipartBody::new(part_name, file_name).text("chat_id", chat_id);
        if !caption.is_empty() {
            body = body.text("caption", caption);
        }
        let content_type = body.content_type();
        let content_length = body.encoded_len(file_len);

        // Keep the original read error so it is not reported as a transport failure.
        let read_failure: Arc<Mutex<Option<io::Error>>> = Arc::default();
        let slot = Arc::clone(&read_failure);
        // Content-Length is fixed above; bytes appended after that are not sent.
        let stream = body.into_stream(file.take(file_len)).map_err(move |e| {
            let surfaced = io::Error::new(e.kind(), e.to_string());
            *slot.lock() = Some(e);
            surfaced
        });

        let request = HttpRequest {
            url: self.method_url(token, method),
            headers: vec![("Content-Type", content_type)],
            content_length: Some(content_length),
            body: RequestBody::Stream(Box::pin(stream)),
        };

        let status = match self.transport.post(request).await {
            Ok(status) => status,
            Err(e) => {
                if let Some(source) = read_failure.lock().take() {
                    warn!(method = %method, error = %source, "Reading media file failed mid-upload");
                    return Err(file_access(source));
                }
                return Err(transport_failure(method, e.0));
            }
        };
        check_status(method, status)?;

        debug!(method = %method, bytes = file_len, "Telegram file sent successfully");
        Ok(())
    }
}

fn transport_failure(method: ApiMethod, reason: String) -> Error {
    warn!(method = %method, error = %reason, "Telegram request failed");
    Error::Transport { method, reason }
}

fn check_status(method: ApiMethod, status: StatusCode) -> Result<()> {
    if status == StatusCode::OK {
        return Ok(());
    }
    warn!(method = %method, status = status.as_u16(), "Telegram rejected the request");
    Err(Error::RemoteRejection { method, status })
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn channel_name(&self) -> &'static str {
        CHANNEL_NAME
    }

    fn is_enabled(&self) -> bool {
        let settings = self.store.snapshot();
        settings.enabled && settings.has_credentials()
    }

    fn is_available(&self) -> bool {
        true
    }

    fn requires_configuration(&self) -> bool {
        !self.store.snapshot().has_credentials()
    }

    async fn send_alert(&self, alert: &AlertRequest) -> Result<()> {
        self.dispatch(alert).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::store::{MemorySettingsStore, TelegramSettings};
    use crate::transport::TransportError;
    use tempfile::TempDir;

    struct RecordedRequest {
        url: String,
        headers: Vec<(&'static str, String)>,
        content_length: Option<u64>,
        body: Vec<u8>,
    }

    impl RecordedRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    struct StubTransport {
        status: StatusCode,
        failure: Option<String>,
        requests: tokio::sync::Mutex<Vec<RecordedRequest>>,
    }

    impl StubTransport {
        fn responding(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                status,
                failure: None,
                requests: tokio::sync::Mutex::new(Vec::new()),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::OK,
                failure: Some(reason.to_string()),
                requests: tokio::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn post(&self, request: HttpRequest) -> std::result::Result<StatusCode, TransportError> {
            let body = match request.body {
                RequestBody::Bytes(bytes) => bytes.to_vec(),
                RequestBody::Stream(stream) => stream
                    .try_collect::<Vec<Bytes>>()
                    .await
                    .map_err(|e| TransportError(format!("body stream failed: {e}")))?
                    .concat(),
            };

            self.requests.lock().await.push(RecordedRequest {
                url: request.url,
                headers: request.headers,
                content_length: request.content_length,
                body,
            });

            match &self.failure {
                Some(reason) => Err(TransportError(reason.clone())),
                None => Ok(self.status),
            }
        }
    }

    fn settings(token: &str, chat_id: &str, enabled: bool) -> TelegramSettings {
        TelegramSettings {
            bot_token: token.to_string(),
            chat_id: chat_id.to_string(),
            enabled,
        }
    }

    fn channel_with(
        settings: TelegramSettings,
        transport: Arc<StubTransport>,
    ) -> (TelegramChannel, Arc<MemorySettingsStore>) {
        let store = Arc::new(MemorySettingsStore::new(settings));
        let channel = TelegramChannel::with_transport(store.clone(), transport);
        (channel, store)
    }

    fn configured(transport: Arc<StubTransport>) -> TelegramChannel {
        channel_with(settings("123:ABC", "456", true), transport).0
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    /// Bytes of the file part in a recorded multipart body.
    fn file_part<'a>(request: &'a RecordedRequest) -> &'a [u8] {
        let content_type = request.header("Content-Type").unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let marker = b"Content-Type: application/octet-stream\r\n\r\n";
        let start = request
            .body
            .windows(marker.len())
            .position(|window| window == marker)
            .unwrap()
            + marker.len();
        let tail = format!("\r\n--{boundary}--\r\n");
        assert!(request.body.ends_with(tail.as_bytes()));
        &request.body[start..request.body.len() - tail.len()]
    }

    #[test]
    fn test_is_enabled_requires_flag_and_credentials() {
        let cases = [
            (settings("T", "C", true), true),
            (settings("T", "C", false), false),
            (settings("", "C", true), false),
            (settings("T", "", true), false),
            (settings("", "", true), false),
            (settings("", "", false), false),
        ];

        for (config, expected) in cases {
            let (channel, _) = channel_with(config.clone(), StubTransport::responding(StatusCode::OK));
            assert_eq!(channel.is_enabled(), expected, "{config:?}");
        }
    }

    #[test]
    fn test_requires_configuration_ignores_enabled_flag() {
        let cases = [
            (settings("T", "C", true), false),
            (settings("T", "C", false), false),
            (settings("", "C", true), true),
            (settings("T", "", false), true),
            (settings("", "", false), true),
        ];

        for (config, expected) in cases {
            let (channel, _) = channel_with(config.clone(), StubTransport::responding(StatusCode::OK));
            assert_eq!(channel.requires_configuration(), expected, "{config:?}");
        }
    }

    #[test]
    fn test_channel_identity() {
        let (channel, _) = channel_with(TelegramSettings::default(), StubTransport::responding(StatusCode::OK));
        assert_eq!(channel.channel_name(), "Telegram");
        assert!(channel.is_available());
        assert_eq!(channel.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_configure_credentials_keeps_enabled() {
        let (channel, store) = channel_with(settings("", "", false), StubTransport::responding(StatusCode::OK));

        channel
            .configure(TelegramSettingsUpdate {
                bot_token: Some("T".to_string()),
                chat_id: Some("C".to_string()),
                enabled: None,
            })
            .unwrap();

        assert_eq!(store.snapshot(), settings("T", "C", false));
    }

    #[test]
    fn test_configure_enabled_only() {
        let (channel, store) = channel_with(settings("T", "C", false), StubTransport::responding(StatusCode::OK));

        channel
            .configure(TelegramSettingsUpdate {
                enabled: Some(true),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.snapshot(), settings("T", "C", true));
        assert!(channel.is_enabled());
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_network() {
        let transport = StubTransport::responding(StatusCode::OK);
        let (channel, _) = channel_with(settings("", "456", true), transport.clone());

        let err = channel.dispatch(&AlertRequest::text("hi")).await.unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(transport.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_chat_id_fails_even_when_disabled() {
        let transport = StubTransport::responding(StatusCode::OK);
        let (channel, _) = channel_with(settings("123:ABC", "", false), transport.clone());

        let err = channel.send_alert(&AlertRequest::text("hi")).await.unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(transport.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_text_dispatch() {
        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone());

        let method = channel
            .dispatch(&AlertRequest::text("Motion detected \"front door\""))
            .await
            .unwrap();
        assert_eq!(method, ApiMethod::SendMessage);

        let requests = transport.requests.lock().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "https://api.telegram.org/bot123:ABC/sendMessage");
        assert_eq!(
            request.header("Content-Type"),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.content_length, Some(request.body.len() as u64));

        let json: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"chat_id": "456", "text": "Motion detected \"front door\""})
        );
    }

    #[tokio::test]
    async fn test_text_dispatch_keeps_unicode() {
        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone());

        channel
            .dispatch(&AlertRequest::text("Geräusch erkannt 🔊"))
            .await
            .unwrap();

        let requests = transport.requests.lock().await;
        assert_eq!(
            requests[0].body,
            r#"{"chat_id":"456","text":"Geräusch erkannt 🔊"}"#.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_camera_event_uploads_photo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motion_0001.jpg");
        let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &contents).unwrap();

        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone());

        let method = channel
            .dispatch(&AlertRequest::with_media("Motion detected", &path, EventType::Camera))
            .await
            .unwrap();
        assert_eq!(method, ApiMethod::SendPhoto);

        let requests = transport.requests.lock().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "https://api.telegram.org/bot123:ABC/sendPhoto");
        assert!(
            request
                .header("Content-Type")
                .unwrap()
                .starts_with("multipart/form-data; boundary=")
        );
        assert_eq!(request.content_length, Some(request.body.len() as u64));

        assert!(contains(
            &request.body,
            b"Content-Disposition: form-data; name=\"chat_id\"\r\n\r\n456\r\n"
        ));
        assert!(contains(
            &request.body,
            b"Content-Disposition: form-data; name=\"caption\"\r\n\r\nMotion detected\r\n"
        ));
        assert!(contains(
            &request.body,
            b"Content-Disposition: form-data; name=\"photo\"; filename=\"motion_0001.jpg\"\r\n"
        ));
        assert_eq!(file_part(request), contents.as_slice());
    }

    /// Appends to the media file before the body is read, then delegates.
    struct GrowingFileTransport {
        path: std::path::PathBuf,
        inner: Arc<StubTransport>,
    }

    #[async_trait]
    impl HttpTransport for GrowingFileTransport {
        async fn post(&self, request: HttpRequest) -> std::result::Result<StatusCode, TransportError> {
            use std::io::Write;

            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&self.path)
                .unwrap();
            file.write_all(&[0xAB; 1000]).unwrap();
            self.inner.post(request).await
        }
    }

    #[tokio::test]
    async fn test_upload_matches_declared_length_when_file_grows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recording.m4a");
        let contents = vec![0x11u8; 887];
        std::fs::write(&path, &contents).unwrap();

        let recorder = StubTransport::responding(StatusCode::OK);
        let transport = Arc::new(GrowingFileTransport {
            path: path.clone(),
            inner: recorder.clone(),
        });
        let store = Arc::new(MemorySettingsStore::new(settings("123:ABC", "456", true)));
        let channel = TelegramChannel::with_transport(store, transport);

        channel
            .dispatch(&AlertRequest::with_media("Sound detected", &path, EventType::Microphone))
            .await
            .unwrap();

        let requests = recorder.requests.lock().await;
        let request = &requests[0];
        assert_eq!(request.content_length, Some(request.body.len() as u64));
        // file_part also checks the closing boundary is present.
        assert_eq!(file_part(request), contents.as_slice());
    }

    #[tokio::test]
    async fn test_upload_method_follows_event_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.bin");
        std::fs::write(&path, b"data").unwrap();

        let cases = [
            (EventType::Microphone, "sendAudio", "audio"),
            (EventType::CameraVideo, "sendVideo", "video"),
            (EventType::Other, "sendDocument", "document"),
        ];

        for (event_type, method, part) in cases {
            let transport = StubTransport::responding(StatusCode::OK);
            let channel = configured(transport.clone());

            channel
                .dispatch(&AlertRequest::with_media("alert", &path, event_type))
                .await
                .unwrap();

            let requests = transport.requests.lock().await;
            assert!(requests[0].url.ends_with(&format!("/{method}")));
            let disposition =
                format!("name=\"{part}\"; filename=\"capture.bin\"");
            assert!(contains(&requests[0].body, disposition.as_bytes()));
        }
    }

    #[tokio::test]
    async fn test_empty_message_omits_caption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.m4a");
        std::fs::write(&path, b"audio").unwrap();

        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone());

        channel
            .dispatch(&AlertRequest::with_media("", &path, EventType::Microphone))
            .await
            .unwrap();

        let requests = transport.requests.lock().await;
        assert!(!contains(&requests[0].body, b"name=\"caption\""));
        assert_eq!(file_part(&requests[0]), b"audio");
    }

    #[tokio::test]
    async fn test_missing_media_falls_back_to_text() {
        let dir = TempDir::new().unwrap();
        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone());

        let method = channel
            .dispatch(&AlertRequest::with_media(
                "Sound detected",
                dir.path().join("deleted.wav"),
                EventType::Microphone,
            ))
            .await
            .unwrap();
        assert_eq!(method, ApiMethod::SendMessage);

        let requests = transport.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.ends_with("/sendMessage"));
    }

    #[tokio::test]
    async fn test_non_200_is_remote_rejection() {
        let transport = StubTransport::responding(StatusCode::INTERNAL_SERVER_ERROR);
        let channel = configured(transport.clone());

        let err = channel.dispatch(&AlertRequest::text("hi")).await.unwrap_err();

        match err {
            Error::RemoteRejection { method, status } => {
                assert_eq!(method, ApiMethod::SendMessage);
                assert_eq!(status.as_u16(), 500);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.requests.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_other_success_codes_are_rejections() {
        let transport = StubTransport::responding(StatusCode::NO_CONTENT);
        let channel = configured(transport);

        let err = channel.dispatch(&AlertRequest::text("hi")).await.unwrap_err();
        assert_eq!(err.status_code(), Some(204));
    }

    #[tokio::test]
    async fn test_file_rejection_carries_method() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"video").unwrap();

        let transport = StubTransport::responding(StatusCode::BAD_REQUEST);
        let channel = configured(transport);

        let err = channel
            .dispatch(&AlertRequest::with_media("m", &path, EventType::CameraVideo))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteRejection {
                method: ApiMethod::SendVideo,
                status
            } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = StubTransport::failing("connection refused");
        let channel = configured(transport);

        let err = channel.dispatch(&AlertRequest::text("hi")).await.unwrap_err();
        match err {
            Error::Transport { method, reason } => {
                assert_eq!(method, ApiMethod::SendMessage);
                assert_eq!(reason, "connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_media_is_file_access_error() {
        // Opening a directory succeeds on unix, reading it does not.
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("not_a_file");
        std::fs::create_dir(&media).unwrap();

        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone());

        let err = channel
            .dispatch(&AlertRequest::with_media("m", &media, EventType::Camera))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FileAccess { .. }), "{err:?}");
        assert!(transport.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_settings_reloaded_per_dispatch() {
        let transport = StubTransport::responding(StatusCode::OK);
        let (channel, store) = channel_with(settings("1:A", "456", true), transport.clone());

        channel.dispatch(&AlertRequest::text("first")).await.unwrap();
        store.set_telegram_bot_token("2:B").unwrap();
        channel.dispatch(&AlertRequest::text("second")).await.unwrap();

        let requests = transport.requests.lock().await;
        assert!(requests[0].url.contains("/bot1:A/"));
        assert!(requests[1].url.contains("/bot2:B/"));
    }

    #[tokio::test]
    async fn test_custom_api_base() {
        let transport = StubTransport::responding(StatusCode::OK);
        let channel = configured(transport.clone()).with_api_base("http://127.0.0.1:8081/");

        channel.dispatch(&AlertRequest::text("hi")).await.unwrap();

        let requests = transport.requests.lock().await;
        assert_eq!(requests[0].url, "http://127.0.0.1:8081/bot123:ABC/sendMessage");
    }
}
