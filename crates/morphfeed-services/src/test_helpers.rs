//! Fakes shared by the service tests.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use morphfeed_core::CorrelationId;
use morphfeed_db::InMemoryAssetRepository;
use morphfeed_generation::{Generator, InvocationError, InvocationRequest, InvocationSuccess};
use morphfeed_storage::InMemoryStorage;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::PipelineContext;
use crate::source::{BufferedSource, SourceFile};

pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn png_source() -> BufferedSource {
    BufferedSource::new(SourceFile::new(
        "source.png",
        "image/png",
        png_bytes(8, 8, [0, 255, 0, 255]),
    ))
}

enum Script {
    Succeed { image: Vec<u8> },
    Fail(InvocationError),
}

/// Generator whose outcome per recipe id is fixed up front.
pub struct ScriptedGenerator {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    invocations: AtomicUsize,
    fetches: AtomicUsize,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delays: HashMap::new(),
            invocations: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeed(self, recipe_id: &str) -> Self {
        self.succeed_with_image(recipe_id, png_bytes(10, 10, [255, 255, 255, 255]))
    }

    pub fn succeed_with_image(mut self, recipe_id: &str, image: Vec<u8>) -> Self {
        self.scripts
            .insert(recipe_id.to_string(), Script::Succeed { image });
        self
    }

    pub fn fail(mut self, recipe_id: &str, err: InvocationError) -> Self {
        self.scripts.insert(recipe_id.to_string(), Script::Fail(err));
        self
    }

    /// Hold the branch for `delay` before answering.
    pub fn delay(mut self, recipe_id: &str, delay: Duration) -> Self {
        self.delays.insert(recipe_id.to_string(), delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Output downloads made so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<InvocationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn output_url(recipe_id: &str) -> String {
        format!("https://outputs.test/{}.png", recipe_id)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationSuccess, InvocationError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delays.get(&request.recipe_id) {
            tokio::time::sleep(*delay).await;
        }

        match self.scripts.get(&request.recipe_id) {
            Some(Script::Succeed { .. }) => Ok(InvocationSuccess {
                output_url: Self::output_url(&request.recipe_id),
                attempts: 1,
                elapsed: Duration::from_millis(1),
            }),
            Some(Script::Fail(err)) => Err(err.clone()),
            None => Err(InvocationError::Protocol {
                status: None,
                message: format!("no script for {}", request.recipe_id),
            }),
        }
    }

    async fn fetch_output(
        &self,
        url: &str,
        _correlation_id: CorrelationId,
    ) -> Result<Bytes, InvocationError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.scripts
            .iter()
            .find_map(|(recipe_id, script)| match script {
                Script::Succeed { image } if Self::output_url(recipe_id) == url => {
                    Some(Bytes::from(image.clone()))
                }
                _ => None,
            })
            .ok_or_else(|| InvocationError::Protocol {
                status: Some(404),
                message: format!("unknown output {}", url),
            })
    }
}

/// In-memory collaborators wired into a context.
pub struct TestPipeline {
    pub storage: Arc<InMemoryStorage>,
    pub repository: Arc<InMemoryAssetRepository>,
    pub generator: Arc<ScriptedGenerator>,
}

impl TestPipeline {
    pub fn new(generator: ScriptedGenerator) -> Self {
        Self {
            storage: Arc::new(InMemoryStorage::new()),
            repository: Arc::new(InMemoryAssetRepository::new()),
            generator: Arc::new(generator),
        }
    }

    pub fn ctx(&self) -> PipelineContext {
        PipelineContext::new(
            self.storage.clone(),
            self.repository.clone(),
            self.generator.clone(),
        )
    }
}
