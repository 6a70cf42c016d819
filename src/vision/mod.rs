pub mod report;
pub mod types;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;
pub use types::{AnnotateImageResponse, Feature};
use types::{
    AnnotateImageRequest, BatchAnnotateImagesRequest, BatchAnnotateImagesResponse, FeatureRequest,
    Image, ImageSource,
};

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("no Vision credentials (set VQ_VISION_API_KEY or VQ_VISION_ACCESS_TOKEN)")]
    MissingCredentials,
    #[error("Vision request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Vision API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Vision API error {code}: {message}")]
    Api { code: i32, message: String },
    #[error("Vision API returned no image response")]
    EmptyResponse,
    #[error("Failed to decode Vision response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub enum Auth {
    ApiKey(String),
    Bearer(String),
}

/// Thin client for `POST /v1/images:annotate`.
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
    auth: Auth,
}

impl Client {
    pub fn new(endpoint: &str, auth: Auth) -> Result<Self, VisionError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// API key wins over an access token when both are set.
    pub fn from_settings(settings: &Settings) -> Result<Self, VisionError> {
        let auth = match (&settings.vision_api_key, &settings.vision_access_token) {
            (Some(key), _) => Auth::ApiKey(key.clone()),
            (None, Some(token)) => Auth::Bearer(token.clone()),
            (None, None) => return Err(VisionError::MissingCredentials),
        };
        Self::new(&settings.vision_endpoint, auth)
    }

    /// Authenticated `images:annotate` request, ready to execute.
    fn request(&self, image_uri: &str, features: &[Feature]) -> reqwest::Result<reqwest::Request> {
        let url = format!("{}/v1/images:annotate", self.endpoint);
        let req = self.http.post(&url).json(&build_request(image_uri, features));
        match &self.auth {
            Auth::ApiKey(key) => req.query(&[("key", key)]),
            Auth::Bearer(token) => req.bearer_auth(token),
        }
        .build()
    }

    pub async fn annotate(
        &self,
        image_uri: &str,
        features: &[Feature],
    ) -> Result<AnnotateImageResponse, VisionError> {
        let req = self.request(image_uri, features)?;

        info!("Annotating {} ({} features)", image_uri, features.len());
        let resp = self.http.execute(req).await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!("Vision HTTP {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(http_error(status.as_u16(), body));
        }
        parse_response(&body)
    }
}

pub fn build_request(image_uri: &str, features: &[Feature]) -> BatchAnnotateImagesRequest {
    BatchAnnotateImagesRequest {
        requests: vec![AnnotateImageRequest {
            image: Image {
                source: ImageSource {
                    image_uri: image_uri.to_string(),
                },
            },
            features: features.iter().map(|&kind| FeatureRequest { kind }).collect(),
        }],
    }
}

/// Decode a batch response body into the first image's annotations.
pub fn parse_response(body: &str) -> Result<AnnotateImageResponse, VisionError> {
    let batch: BatchAnnotateImagesResponse = serde_json::from_str(body)?;
    let raw = batch
        .responses
        .into_iter()
        .next()
        .ok_or(VisionError::EmptyResponse)?;
    let mut resp: AnnotateImageResponse = serde_json::from_value(raw.clone())?;
    if let Some(err) = resp.error.take() {
        return Err(VisionError::Api {
            code: err.code,
            message: err.message,
        });
    }
    resp.raw = raw;
    Ok(resp)
}

fn http_error(status: u16, body: String) -> VisionError {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: types::Status,
    }
    match serde_json::from_str::<Envelope>(&body) {
        Ok(e) => VisionError::Api {
            code: e.error.code,
            message: e.error.message,
        },
        Err(_) => VisionError::Http { status, body },
    }
}

// ── Detect commands ──

/// One canned detection: fixed sample image, fixed feature list, fixed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Detect {
    Labels,
    Text,
    Landmarks,
    Faces,
    Objects,
    Multi,
}

const ALL_FEATURES: &[Feature] = &[
    Feature::ObjectLocalization,
    Feature::FaceDetection,
    Feature::LandmarkDetection,
    Feature::LogoDetection,
    Feature::LabelDetection,
    Feature::TextDetection,
    Feature::DocumentTextDetection,
    Feature::SafeSearchDetection,
    Feature::ImageProperties,
    Feature::CropHints,
    Feature::WebDetection,
    Feature::ProductSearch,
];

impl Detect {
    pub const EVERY: [Detect; 6] = [
        Detect::Labels,
        Detect::Text,
        Detect::Landmarks,
        Detect::Faces,
        Detect::Objects,
        Detect::Multi,
    ];

    pub fn default_uri(self) -> &'static str {
        match self {
            Detect::Labels | Detect::Objects | Detect::Multi => {
                "gs://cloud-samples-data/vision/label/setagaya.jpeg"
            }
            Detect::Text => "gs://cloud-samples-data/vision/ocr/sign.jpg",
            Detect::Landmarks => "gs://cloud-samples-data/vision/landmark/eiffel_tower.jpg",
            Detect::Faces => "gs://cloud-samples-data/vision/face/faces.jpeg",
        }
    }

    pub fn features(self) -> &'static [Feature] {
        match self {
            Detect::Labels => &[Feature::LabelDetection],
            Detect::Text => &[Feature::TextDetection],
            Detect::Landmarks => &[Feature::LandmarkDetection],
            Detect::Faces => &[Feature::FaceDetection],
            Detect::Objects => &[Feature::ObjectLocalization],
            Detect::Multi => ALL_FEATURES,
        }
    }

    pub fn render(self, resp: &AnnotateImageResponse, min_score: f32) -> String {
        match self {
            Detect::Labels => report::labels(resp),
            Detect::Text => report::text(resp),
            Detect::Landmarks => report::landmarks(resp, min_score),
            Detect::Faces => report::faces(resp),
            Detect::Objects => report::objects(resp),
            Detect::Multi => report::full(resp),
        }
    }
}

/// Annotate `uri` (or the detection's sample image) and render its report.
pub async fn run(
    client: &Client,
    detect: Detect,
    uri: Option<&str>,
    min_score: f32,
) -> Result<String, VisionError> {
    let uri = uri.unwrap_or(detect.default_uri());
    let resp = client.annotate(uri, detect.features()).await?;
    Ok(detect.render(&resp, min_score))
}
