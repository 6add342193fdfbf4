//! Try-on invoker: download both images, run the model, store the result for static serving.

use super::{ModelOutput, TryOnError, TryOnModel};
use crate::media::MediaFetcher;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Runs one try-on for a sender and returns the public path of the result (`/static/<file>`).
#[async_trait]
pub trait TryOnService: Send + Sync {
    async fn try_on(
        &self,
        sender: &str,
        person_locator: &str,
        garment_locator: &str,
    ) -> Result<String, TryOnError>;
}

pub struct TryOnInvoker {
    media: Arc<dyn MediaFetcher>,
    model: Arc<dyn TryOnModel>,
    static_dir: PathBuf,
    media_dir: PathBuf,
    retention: Option<Duration>,
    client: reqwest::Client,
}

impl TryOnInvoker {
    pub fn new(
        media: Arc<dyn MediaFetcher>,
        model: Arc<dyn TryOnModel>,
        static_dir: impl Into<PathBuf>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            media,
            model,
            static_dir: static_dir.into(),
            media_dir: media_dir.into(),
            retention: None,
            client: reqwest::Client::new(),
        }
    }

    /// Delete earlier results older than `retention` before each new one is written.
    pub fn with_result_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    async fn prune_results(&self) {
        let Some(max_age) = self.retention else {
            return;
        };
        let mut entries = match tokio::fs::read_dir(&self.static_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("skipping result pruning: {}", e);
                return;
            }
        };
        let now = SystemTime::now();
        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("result-") && name.ends_with(".png")) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let expired = meta.is_file()
                && meta
                    .modified()
                    .ok()
                    .and_then(|m| now.duration_since(m).ok())
                    .is_some_and(|age| age > max_age);
            if !expired {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("failed to remove old result {}: {}", name, e),
            }
        }
        if removed > 0 {
            log::info!("pruned {} expired try-on result(s)", removed);
        }
    }

    async fn run(&self, person: &Path, garment: &Path, output: &Path) -> Result<(), TryOnError> {
        let result = self.model.predict(person, garment).await?;
        tokio::fs::create_dir_all(&self.static_dir).await?;
        self.prune_results().await;
        match result {
            ModelOutput::Url(url) => {
                let res = self.client.get(&url).send().await?;
                if res.status() != reqwest::StatusCode::OK {
                    return Err(TryOnError::Api(format!(
                        "fetching result from {} failed: {}",
                        url,
                        res.status()
                    )));
                }
                let bytes = res.bytes().await?;
                tokio::fs::write(output, &bytes).await?;
                log::info!("try-on result downloaded from model host");
            }
            ModelOutput::LocalPath(path) => {
                if !path.exists() {
                    return Err(TryOnError::UnexpectedOutput(format!(
                        "result path does not exist: {}",
                        path.display()
                    )));
                }
                let output = output.to_path_buf();
                tokio::task::spawn_blocking(move || reencode_png(&path, &output))
                    .await
                    .map_err(std::io::Error::other)??;
                log::info!("try-on result saved from local file");
            }
            ModelOutput::Other(value) => {
                return Err(TryOnError::UnexpectedOutput(value.to_string()));
            }
        }
        Ok(())
    }
}

/// Decode any supported image and write it as PNG.
fn reencode_png(src: &Path, dest: &Path) -> Result<(), TryOnError> {
    let img = image::ImageReader::open(src)?.with_guessed_format()?.decode()?;
    img.save_with_format(dest, image::ImageFormat::Png)?;
    Ok(())
}

/// File-name stem unique to this sender and moment: the sender's alphanumerics plus epoch millis.
fn artifact_stem(sender: &str, millis: i64) -> String {
    let who: String = sender.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let who = if who.is_empty() { "anon".to_string() } else { who };
    format!("{}-{}", who, millis)
}

#[async_trait]
impl TryOnService for TryOnInvoker {
    async fn try_on(
        &self,
        sender: &str,
        person_locator: &str,
        garment_locator: &str,
    ) -> Result<String, TryOnError> {
        let stem = artifact_stem(sender, chrono::Utc::now().timestamp_millis());
        let person = self.media_dir.join(format!("{}-person.jpg", stem));
        let garment = self.media_dir.join(format!("{}-garment.jpg", stem));
        let file_name = format!("result-{}.png", stem);
        let output = self.static_dir.join(&file_name);

        let downloads = async {
            self.media.fetch(person_locator, &person).await?;
            self.media.fetch(garment_locator, &garment).await?;
            Ok::<(), TryOnError>(())
        };
        let outcome = match downloads.await {
            Ok(()) => self.run(&person, &garment, &output).await,
            Err(e) => {
                log::warn!("failed to download one or both images: {}", e);
                Err(e)
            }
        };

        for input in [&person, &garment] {
            let _ = tokio::fs::remove_file(input).await;
        }

        match outcome {
            Ok(()) => Ok(format!("/static/{}", file_name)),
            Err(e) => {
                log::error!("try-on failed for {}: {}", sender, e);
                let _ = tokio::fs::remove_file(&output).await;
                Err(e)
            }
        }
    }
}
