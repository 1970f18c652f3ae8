use std::sync::Arc;
use chrono::Local;
use mm_core::{ArtifactRecord, GenerationRequest, RefinedPrompt, ShapeModel};
use mm_gen::{
    BorderKeyRemover, GenerationDriver, HostAccelerator, RemoteService, ResourceReclaimer,
};
use mm_mesh::{MeshBuilder, RepairReport};
use tracing::{error, info, warn};
use crate::config::Config;
use crate::error::PipelineError;
use crate::filename::{FilenameSynthesizer, offline_name_at};
use crate::refiner::PromptRefiner;
use crate::store::ArtifactStore;
use crate::text_service::{GeminiClient, TextService};

/// Progress events emitted while a request runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Stage(String),
    Sampling { step: u32, total: u32 },
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub record: ArtifactRecord,
    pub report: RepairReport,
}

/// End-to-end request processing:
/// refine, generate (bracketed by reclaim), build and repair, name, persist.
///
/// Every service is constructed once and reused across requests.
pub struct Pipeline {
    refiner: PromptRefiner,
    driver: GenerationDriver,
    builder: MeshBuilder,
    filenames: FilenameSynthesizer,
    store: ArtifactStore,
    reclaimer: ResourceReclaimer,
}

impl Pipeline {
    pub fn new(
        refiner: PromptRefiner,
        driver: GenerationDriver,
        builder: MeshBuilder,
        filenames: FilenameSynthesizer,
        store: ArtifactStore,
        reclaimer: ResourceReclaimer,
    ) -> Self {
        Self {
            refiner,
            driver,
            builder,
            filenames,
            store,
            reclaimer,
        }
    }

    /// Wires the Gemini client and either the remote generation service or
    /// the local models, depending on `config.service_url`.
    pub fn from_config(config: &Config, store: ArtifactStore) -> Result<Self, PipelineError> {
        let text: Arc<dyn TextService> = Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )?);

        let (driver, reclaimer) = match &config.service_url {
            Some(url) => {
                info!("Using generation service at {}", url);
                let service = RemoteService::new(url.clone(), config.service_timeout)?;
                let driver = GenerationDriver::new(
                    Box::new(service.sampler(ShapeModel::Text300M)),
                    Box::new(service.sampler(ShapeModel::Image300M)),
                    Box::new(service.clone()),
                    Box::new(service.clone()),
                    Box::new(BorderKeyRemover::default()),
                );
                (driver, ResourceReclaimer::new(Arc::new(service)))
            }
            None => {
                info!("No generation service configured, using local models");
                (
                    GenerationDriver::local(config.latent_dim),
                    ResourceReclaimer::new(Arc::new(HostAccelerator)),
                )
            }
        };

        Ok(Self::new(
            PromptRefiner::new(text.clone()),
            driver,
            MeshBuilder::default(),
            FilenameSynthesizer::new(text),
            store,
            reclaimer,
        ))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn run(
        &self,
        request: &GenerationRequest,
        events: &mut dyn FnMut(PipelineEvent),
    ) -> Result<PipelineOutput, PipelineError> {
        let result = self.run_inner(request, events);
        if let Err(e) = &result {
            error!("Generation of '{}' failed: {}", request.product_name, e);
        }
        result
    }

    fn run_inner(
        &self,
        request: &GenerationRequest,
        events: &mut dyn FnMut(PipelineEvent),
    ) -> Result<PipelineOutput, PipelineError> {
        request.validate()?;
        let plan = self.driver.plan(request)?;
        info!(
            "Starting {} generation for '{}' ({} steps, guidance {})",
            plan.mode, request.product_name, plan.params.karras_steps, plan.params.guidance_scale
        );

        events(PipelineEvent::Stage("Refining prompt".into()));
        let prompt: RefinedPrompt = self.refiner.refine(request)?;

        events(PipelineEvent::Stage("Generating 3D model".into()));
        let raw = {
            let _reclaim = self.reclaimer.guard();
            self.driver.generate(&prompt, &plan, &mut |step, total| {
                events(PipelineEvent::Sampling { step, total })
            })?
        };

        events(PipelineEvent::Stage("Repairing mesh".into()));
        let (mesh, report) = self.builder.build_with_report(&raw)?;
        drop(raw);

        events(PipelineEvent::Stage("Saving model".into()));
        let filename = match self.filenames.synthesize(&prompt, request.output_format) {
            Ok(name) => name,
            // the refiner already found the text service down for this request
            Err(e) if prompt.is_fallback() => {
                let local = offline_name_at(
                    &request.product_name,
                    &prompt,
                    request.output_format,
                    Local::now(),
                );
                match local {
                    Some(name) => {
                        warn!("Naming '{}' locally: {}", request.product_name, e);
                        name
                    }
                    None => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        let record = self.store.save(&mesh, &prompt, &filename, request.output_format)?;

        info!("Finished '{}' -> {}", request.product_name, record.file_path.display());
        Ok(PipelineOutput { record, report })
    }
}
