//! Gradio Space client (hosted on the Hugging Face hub) for the try-on endpoint.
//!
//! Flow: resolve the Space host, upload both images, start a job on `/call/<api>`, then read
//! the server-sent event stream for the result.

use super::{ModelOutput, TryOnError, TryOnModel};
use crate::config::TryOnConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
struct SpaceHost {
    host: String,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// Client for one Space endpoint. The Space host is resolved once and cached.
pub struct GradioClient {
    space: String,
    hub_base: String,
    api_prefix: String,
    api_name: String,
    token: Option<String>,
    host: OnceCell<String>,
    client: reqwest::Client,
}

impl GradioClient {
    pub fn new(config: &TryOnConfig, token: Option<String>) -> Result<Self, TryOnError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let host = OnceCell::new();
        if let Some(url) = config.space_url.as_ref().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            let _ = host.set(url.trim_end_matches('/').to_string());
        }
        Ok(Self {
            space: config.space.clone(),
            hub_base: config.hub_base.trim_end_matches('/').to_string(),
            api_prefix: normalize_prefix(&config.api_prefix),
            api_name: config.api_name.trim_start_matches('/').to_string(),
            token,
            host,
            client: builder.build()?,
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// GET {hub}/api/spaces/{space}/host: direct URL of the running Space.
    async fn host(&self) -> Result<&str, TryOnError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let url = format!("{}/api/spaces/{}/host", self.hub_base, self.space);
                let res = self.authed(self.client.get(&url)).send().await?;
                if !res.status().is_success() {
                    let status = res.status();
                    let body = res.text().await.unwrap_or_default();
                    return Err(TryOnError::Api(format!(
                        "resolving space {} failed: {} {}",
                        self.space, status, body
                    )));
                }
                let data: SpaceHost = res.json().await?;
                log::info!("try-on space {} is served from {}", self.space, data.host);
                Ok::<_, TryOnError>(data.host.trim_end_matches('/').to_string())
            })
            .await?;
        Ok(host.as_str())
    }

    /// POST {host}{prefix}/upload: returns the server-side path of each uploaded file.
    async fn upload(&self, host: &str, files: &[&Path]) -> Result<Vec<String>, TryOnError> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let bytes = tokio::fs::read(file).await?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image.jpg".to_string());
            form = form.part("files", reqwest::multipart::Part::bytes(bytes).file_name(name));
        }
        let url = format!("{}{}/upload", host, self.api_prefix);
        let res = self.authed(self.client.post(&url)).multipart(form).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TryOnError::Api(format!("upload failed: {} {}", status, body)));
        }
        let paths: Vec<String> = res.json().await?;
        if paths.len() != files.len() {
            return Err(TryOnError::Api(format!(
                "upload returned {} paths for {} files",
                paths.len(),
                files.len()
            )));
        }
        Ok(paths)
    }

    /// POST the job, then GET its event stream and return the first output value.
    async fn call(&self, host: &str, data: serde_json::Value) -> Result<serde_json::Value, TryOnError> {
        let url = format!("{}{}/call/{}", host, self.api_prefix, self.api_name);
        let res = self
            .authed(self.client.post(&url))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TryOnError::Api(format!("call failed: {} {}", status, body)));
        }
        let CallResponse { event_id } = res.json().await?;
        log::debug!("try-on job started: {}", event_id);

        let res = self
            .authed(self.client.get(format!("{}/{}", url, event_id)))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TryOnError::Api(format!("result stream failed: {} {}", status, body)));
        }
        let stream = res.text().await?;
        parse_event_stream(&stream)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let p = prefix.trim().trim_end_matches('/');
    if p.is_empty() {
        String::new()
    } else if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{}", p)
    }
}

fn file_data(path: &str) -> serde_json::Value {
    json!({ "path": path, "meta": { "_type": "gradio.FileData" } })
}

/// Read an SSE body: `event: complete` carries a JSON array of outputs, `event: error` a failure.
fn parse_event_stream(body: &str) -> Result<serde_json::Value, TryOnError> {
    let mut event = "";
    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                "complete" => {
                    let outputs: serde_json::Value = serde_json::from_str(data)
                        .map_err(|e| TryOnError::UnexpectedOutput(format!("{}: {}", e, data)))?;
                    return match outputs {
                        serde_json::Value::Array(mut items) if !items.is_empty() => {
                            Ok(items.swap_remove(0))
                        }
                        other => Err(TryOnError::UnexpectedOutput(other.to_string())),
                    };
                }
                "error" => return Err(TryOnError::Api(format!("model error: {}", data))),
                _ => {}
            }
        }
    }
    Err(TryOnError::Api("event stream ended without a result".to_string()))
}

/// Classify an output value. FileData objects without a URL are served from `{file_base}/file=`.
fn classify_output(value: serde_json::Value, file_base: &str) -> ModelOutput {
    let known = match &value {
        serde_json::Value::String(s) if s.starts_with("http") => Some(ModelOutput::Url(s.clone())),
        serde_json::Value::String(s) if Path::new(s).exists() => {
            Some(ModelOutput::LocalPath(PathBuf::from(s)))
        }
        serde_json::Value::Object(obj) => {
            let url = obj
                .get("url")
                .and_then(|v| v.as_str())
                .filter(|u| u.starts_with("http"));
            match (url, obj.get("path").and_then(|v| v.as_str())) {
                (Some(url), _) => Some(ModelOutput::Url(url.to_string())),
                (None, Some(path)) => Some(ModelOutput::Url(format!("{}/file={}", file_base, path))),
                (None, None) => None,
            }
        }
        _ => None,
    };
    known.unwrap_or(ModelOutput::Other(value))
}

#[async_trait]
impl TryOnModel for GradioClient {
    async fn predict(&self, person: &Path, garment: &Path) -> Result<ModelOutput, TryOnError> {
        let host = self.host().await?.to_string();
        log::info!("sending images to try-on model {}", self.space);
        let uploaded = self.upload(&host, &[person, garment]).await?;
        let data = json!([file_data(&uploaded[0]), file_data(&uploaded[1])]);
        let value = self.call(&host, data).await?;
        Ok(classify_output(value, &format!("{}{}", host, self.api_prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TryOnConfig {
        TryOnConfig {
            hub_base: server.uri(),
            ..TryOnConfig::default()
        }
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("gradio_api/"), "/gradio_api");
        assert_eq!(normalize_prefix("/gradio_api"), "/gradio_api");
    }

    #[test]
    fn event_stream_complete_returns_first_output() {
        let body = "event: generating\ndata: null\n\nevent: complete\ndata: [\"https://x.hf.space/r.png\", 1]\n\n";
        assert_eq!(
            parse_event_stream(body).unwrap(),
            serde_json::Value::String("https://x.hf.space/r.png".into())
        );
    }

    #[test]
    fn event_stream_error_and_truncation() {
        assert!(matches!(
            parse_event_stream("event: error\ndata: \"GPU quota exceeded\"\n\n"),
            Err(TryOnError::Api(m)) if m.contains("GPU quota")
        ));
        assert!(matches!(
            parse_event_stream("event: heartbeat\ndata: null\n\n"),
            Err(TryOnError::Api(_))
        ));
        assert!(matches!(
            parse_event_stream("event: complete\ndata: []\n\n"),
            Err(TryOnError::UnexpectedOutput(_))
        ));
    }

    #[test]
    fn classify_output_shapes() {
        assert_eq!(
            classify_output(json!("https://a/b.png"), "http://h"),
            ModelOutput::Url("https://a/b.png".into())
        );
        assert_eq!(
            classify_output(json!({ "path": "/tmp/gradio/r.webp", "url": null }), "http://h"),
            ModelOutput::Url("http://h/file=/tmp/gradio/r.webp".into())
        );
        assert_eq!(
            classify_output(json!({ "path": "/tmp/x", "url": "https://h/file=/tmp/x" }), "http://h"),
            ModelOutput::Url("https://h/file=/tmp/x".into())
        );

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("out.png");
        std::fs::write(&local, b"x").unwrap();
        assert_eq!(
            classify_output(json!(local.to_string_lossy()), "http://h"),
            ModelOutput::LocalPath(local.clone())
        );
        assert_eq!(
            classify_output(json!("/definitely/not/here.png"), "http://h"),
            ModelOutput::Other(json!("/definitely/not/here.png"))
        );
        assert_eq!(classify_output(json!(42), "http://h"), ModelOutput::Other(json!(42)));
    }

    #[tokio::test]
    async fn predict_runs_host_upload_call_and_stream() {
        let server = MockServer::start().await;
        let space_host = server.uri();
        Mock::given(method("GET"))
            .and(path("/api/spaces/HumanAIGC/OutfitAnyone/host"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "subdomain": "humanaigc-outfitanyone",
                "host": space_host
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("authorization", "Bearer hf_test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(["/tmp/gradio/person.jpg", "/tmp/gradio/garment.jpg"])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/call/tryon"))
            .and(body_partial_json(json!({
                "data": [
                    { "path": "/tmp/gradio/person.jpg", "meta": { "_type": "gradio.FileData" } },
                    { "path": "/tmp/gradio/garment.jpg", "meta": { "_type": "gradio.FileData" } }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "ev1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/call/tryon/ev1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "event: complete\ndata: [{\"path\": \"/tmp/gradio/out.png\", \"url\": null}]\n\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let person = dir.path().join("person.jpg");
        let garment = dir.path().join("garment.jpg");
        std::fs::write(&person, b"p").unwrap();
        std::fs::write(&garment, b"g").unwrap();

        let client = GradioClient::new(&config_for(&server), Some("hf_test".into())).unwrap();
        let out = client.predict(&person, &garment).await.unwrap();
        assert_eq!(
            out,
            ModelOutput::Url(format!("{}/file=/tmp/gradio/out.png", space_host))
        );
    }

    #[tokio::test]
    async fn space_url_skips_host_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gradio_api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["a", "b"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gradio_api/call/tryon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "e" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gradio_api/call/tryon/e"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("event: error\ndata: null\n\n"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("i.jpg");
        std::fs::write(&img, b"i").unwrap();

        let config = TryOnConfig {
            hub_base: "http://127.0.0.1:9".into(),
            space_url: Some(format!("{}/", server.uri())),
            api_prefix: "gradio_api".into(),
            ..TryOnConfig::default()
        };
        let client = GradioClient::new(&config, None).unwrap();
        let err = client.predict(&img, &img).await.unwrap_err();
        assert!(matches!(err, TryOnError::Api(m) if m.contains("model error")));
    }
}
