//! Image-to-video conversion routed by model type.
//!
//! The converter owns one [`JobClient`] per [`ModelType`] and dispatches each
//! request to exactly one of them. Clients hold no per-job state, so a single
//! converter can serve concurrent requests behind an `Arc`.

use crate::config::Config;
use crate::error::ConvertError;
use crate::job::{JobClient, JobInput};
use crate::media::MediaInput;
use crate::tasks::MediaTasks;
use crate::vendor::{PiApiVendor, ReplicateVendor, StabilityVendor};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// The image-to-video backends a conversion can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelType {
    PiApi,
    Replicate,
    Stability,
}

impl ModelType {
    /// Every model type, in the order the form lists them.
    pub const ALL: [ModelType; 3] = [ModelType::PiApi, ModelType::Replicate, ModelType::Stability];
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelType::PiApi => "PiAPI",
            ModelType::Replicate => "Replicate",
            ModelType::Stability => "Stability",
        };
        f.write_str(s)
    }
}

impl FromStr for ModelType {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "piapi" => Ok(ModelType::PiApi),
            "replicate" => Ok(ModelType::Replicate),
            "stability" => Ok(ModelType::Stability),
            _ => Err(ConvertError::UnsupportedModel(s.to_string())),
        }
    }
}

/// What a successful conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub model: ModelType,
    pub job_id: String,
    pub output_path: PathBuf,
    /// Size of the written artifact
    pub bytes: usize,
    /// Prompt actually sent, after any auto-captioning
    pub prompt: String,
}

/// Anything that can turn an image into a video file.
///
/// The form server depends on this rather than on [`Converter`] so it can be
/// exercised without vendor stubs.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn convert(
        &self,
        image: &str,
        prompt: &str,
        output: &Path,
        model_type: Option<&str>,
    ) -> Result<ConversionReport, ConvertError>;
}

/// Routes image-to-video requests to a vendor job client.
#[derive(Default)]
pub struct Converter {
    clients: HashMap<ModelType, Arc<JobClient>>,
    captioner: Option<MediaTasks>,
}

impl Converter {
    /// An empty converter; every model type is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// All three vendors plus Replicate BLIP captioning for blank prompts.
    pub fn from_config(config: &Config) -> Self {
        let download_timeout = config.general.download_timeout();
        let replicate = Arc::new(
            JobClient::new(Box::new(ReplicateVendor::new(&config.replicate)))
                .with_download_timeout(download_timeout),
        );

        Self::new()
            .with_client(
                ModelType::PiApi,
                JobClient::new(Box::new(PiApiVendor::new(&config.piapi)))
                    .with_download_timeout(download_timeout),
            )
            .with_client(
                ModelType::Stability,
                JobClient::new(Box::new(StabilityVendor::new(&config.stability)))
                    .with_download_timeout(download_timeout),
            )
            .with_shared_client(ModelType::Replicate, replicate.clone())
            .with_captioner(MediaTasks::new(replicate))
    }

    pub fn with_client(self, model: ModelType, client: JobClient) -> Self {
        self.with_shared_client(model, Arc::new(client))
    }

    pub fn with_shared_client(mut self, model: ModelType, client: Arc<JobClient>) -> Self {
        self.clients.insert(model, client);
        self
    }

    /// Caption images whose prompt is blank.
    pub fn with_captioner(mut self, captioner: MediaTasks) -> Self {
        self.captioner = Some(captioner);
        self
    }

    pub fn client(&self, model: ModelType) -> Option<Arc<JobClient>> {
        self.clients.get(&model).cloned()
    }

    /// Model types that have a client, in display order.
    pub fn models(&self) -> Vec<ModelType> {
        ModelType::ALL
            .into_iter()
            .filter(|m| self.clients.contains_key(m))
            .collect()
    }

    /// Resolve the model tag to a client before anything touches the network.
    fn route(&self, model_type: Option<&str>) -> Result<(ModelType, &JobClient), ConvertError> {
        let tag = model_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConvertError::ModelNotSpecified)?;
        let model: ModelType = tag.parse()?;
        let client = self
            .clients
            .get(&model)
            .ok_or_else(|| ConvertError::UnsupportedModel(tag.to_string()))?;
        Ok((model, client.as_ref()))
    }

    async fn resolve_prompt(&self, image: &MediaInput, prompt: &str) -> String {
        if !prompt.trim().is_empty() {
            return prompt.to_string();
        }
        let Some(captioner) = &self.captioner else {
            return String::new();
        };
        match captioner.caption(image).await {
            Ok(caption) => caption,
            Err(e) => {
                tracing::warn!("Auto-caption failed, continuing with an empty prompt: {e}");
                String::new()
            }
        }
    }

    async fn convert_inner(
        &self,
        image: &str,
        prompt: &str,
        output: &Path,
        model_type: Option<&str>,
    ) -> Result<ConversionReport, ConvertError> {
        let (model, client) = self.route(model_type)?;

        let media = MediaInput::load(image)
            .await
            .map_err(|source| ConvertError::Input {
                path: image.to_string(),
                source,
            })?;
        let prompt = self.resolve_prompt(&media, prompt).await;

        tracing::info!(
            %model,
            vendor = client.vendor_name(),
            "Converting {} → {}",
            media.describe(),
            output.display()
        );
        let (job, asset) = client
            .run(&JobInput::image_to_video(media, prompt.clone()), output)
            .await?;

        Ok(ConversionReport {
            model,
            job_id: job.id,
            output_path: asset.path,
            bytes: asset.bytes.len(),
            prompt,
        })
    }
}

#[async_trait]
impl ConversionService for Converter {
    async fn convert(
        &self,
        image: &str,
        prompt: &str,
        output: &Path,
        model_type: Option<&str>,
    ) -> Result<ConversionReport, ConvertError> {
        let result = self.convert_inner(image, prompt, output, model_type).await;
        match &result {
            Ok(report) => tracing::info!(
                model = %report.model,
                job_id = %report.job_id,
                "Video saved to {} ({} bytes)",
                report.output_path.display(),
                report.bytes
            ),
            // Job errors were already logged by the client
            Err(ConvertError::Job(_)) => {}
            Err(e) => tracing::error!("{e}"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReplicateConfig, StabilityConfig};
    use crate::job::PollPolicy;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{any, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KLING: &str = "/v1/models/kwaivgi/kling-v1.6-standard/predictions";

    fn fast() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(10), Duration::from_millis(300))
            .with_read_timeout(Duration::from_secs(2))
    }

    fn replicate(server: &MockServer) -> Arc<JobClient> {
        let config = ReplicateConfig {
            api_token: "r8_test".to_string(),
            base_url: server.uri(),
            ..Default::default()
        };
        Arc::new(JobClient::new(Box::new(
            ReplicateVendor::new(&config).with_poll(fast()),
        )))
    }

    fn stability(server: &MockServer) -> JobClient {
        let config = StabilityConfig {
            api_key: "sk-test".to_string(),
            base_url: server.uri(),
            ..Default::default()
        };
        JobClient::new(Box::new(StabilityVendor::new(&config).with_poll(fast())))
    }

    fn replicate_converter(server: &MockServer) -> Converter {
        let client = replicate(server);
        Converter::new()
            .with_shared_client(ModelType::Replicate, client.clone())
            .with_captioner(MediaTasks::new(client))
    }

    fn write_image(dir: &Path) -> String {
        let image = dir.join("still.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        image.to_string_lossy().into_owned()
    }

    async fn mount_video_prediction(server: &MockServer, id: &str, payload: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/predictions/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "status": "succeeded",
                "output": format!("{}/files/{id}.mp4", server.uri()),
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/files/{id}.mp4")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.to_vec()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_model_type_parsing() {
        assert_eq!("PiAPI".parse::<ModelType>().unwrap(), ModelType::PiApi);
        assert_eq!("replicate".parse::<ModelType>().unwrap(), ModelType::Replicate);
        assert_eq!(" STABILITY ".parse::<ModelType>().unwrap(), ModelType::Stability);
        assert!(matches!(
            "Sora".parse::<ModelType>(),
            Err(ConvertError::UnsupportedModel(name)) if name == "Sora"
        ));
    }

    #[test]
    fn test_model_type_display_round_trips() {
        for model in ModelType::ALL {
            assert_eq!(model.to_string().parse::<ModelType>().unwrap(), model);
        }
    }

    #[test]
    fn test_from_config_registers_every_model() {
        let converter = Converter::from_config(&Config::default());
        assert_eq!(converter.models(), ModelType::ALL.to_vec());

        let names: Vec<_> = ModelType::ALL
            .into_iter()
            .filter_map(|m| converter.client(m))
            .map(|client| client.vendor_name())
            .collect();
        assert_eq!(names, ["piapi", "replicate", "stability"]);
    }

    #[tokio::test]
    async fn test_missing_or_unknown_model_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = write_image(dir.path());
        let output = dir.path().join("out.mp4");
        let converter = replicate_converter(&server);

        let err = converter.convert(&image, "p", &output, None).await.unwrap_err();
        assert!(matches!(err, ConvertError::ModelNotSpecified));
        assert_eq!(err.to_string(), "Image-to-video model is not specified");

        let err = converter.convert(&image, "p", &output, Some("  ")).await.unwrap_err();
        assert!(matches!(err, ConvertError::ModelNotSpecified));

        let err = converter
            .convert(&image, "p", &output, Some("Sora"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedModel(_)));

        // Known model type, but no client registered for it
        let err = converter
            .convert(&image, "p", &output, Some("PiAPI"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedModel(name) if name == "PiAPI"));

        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_unreadable_image_is_input_error() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let err = replicate_converter(&server)
            .convert(
                &missing.to_string_lossy(),
                "p",
                &dir.path().join("out.mp4"),
                Some("Replicate"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Input { .. }));
    }

    #[tokio::test]
    async fn test_blank_prompt_is_auto_captioned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "cap-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/cap-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "succeeded",
                "output": "Caption: a dog on a beach",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(KLING))
            .and(body_partial_json(json!({"input": {"prompt": "a dog on a beach"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "vid-1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_video_prediction(&server, "vid-1", b"dog-video").await;

        let dir = tempfile::tempdir().unwrap();
        let image = write_image(dir.path());
        let output = dir.path().join("dog.mp4");

        let report = replicate_converter(&server)
            .convert(&image, "   ", &output, Some("Replicate"))
            .await
            .unwrap();

        assert_eq!(report.prompt, "a dog on a beach");
        assert_eq!(report.job_id, "vid-1");
        assert_eq!(report.bytes, 9);
        assert_eq!(std::fs::read(&output).unwrap(), b"dog-video");
    }

    #[tokio::test]
    async fn test_caption_failure_falls_back_to_empty_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("blip is down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(KLING))
            .and(body_partial_json(json!({"input": {"prompt": ""}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "vid-2"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_video_prediction(&server, "vid-2", b"plain").await;

        let dir = tempfile::tempdir().unwrap();
        let image = write_image(dir.path());
        let report = replicate_converter(&server)
            .convert(&image, "", &dir.path().join("v.mp4"), Some("replicate"))
            .await
            .unwrap();
        assert_eq!(report.prompt, "");
    }

    #[tokio::test]
    async fn test_concurrent_conversions_do_not_interfere() {
        let replicate_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KLING))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "rep-1"})))
            .expect(1)
            .mount(&replicate_server)
            .await;
        mount_video_prediction(&replicate_server, "rep-1", b"from-replicate").await;

        let stability_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2beta/image-to-video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "stab-1"})))
            .expect(1)
            .mount(&stability_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2beta/image-to-video/result/stab-1"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "in-progress"})))
            .up_to_n_times(2)
            .mount(&stability_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2beta/image-to-video/result/stab-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(b"from-stability".to_vec()),
            )
            .mount(&stability_server)
            .await;

        let converter = Converter::new()
            .with_shared_client(ModelType::Replicate, replicate(&replicate_server))
            .with_client(ModelType::Stability, stability(&stability_server));

        let dir = tempfile::tempdir().unwrap();
        let image = write_image(dir.path());
        let first = dir.path().join("a.mp4");
        let second = dir.path().join("b.mp4");

        let (a, b) = tokio::join!(
            converter.convert(&image, "pan left", &first, Some("Replicate")),
            converter.convert(&image, "pan right", &second, Some("Stability")),
        );

        assert_eq!(a.unwrap().model, ModelType::Replicate);
        assert_eq!(b.unwrap().model, ModelType::Stability);
        assert_eq!(std::fs::read(&first).unwrap(), b"from-replicate");
        assert_eq!(std::fs::read(&second).unwrap(), b"from-stability");
    }
}
