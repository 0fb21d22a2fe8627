use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info_span, warn};

use crate::billing::CostMeter;
use crate::config::EngineConfig;
use crate::content::{BaseImageContent, StepContent};
use crate::db::audit_repo::{self, events};
use crate::db::{job_repo, now_timestamp, step_repo, Database};
use crate::error::{EngineError, Result};
use crate::model::{StepKind, StepUsage, TokenUsage};
use crate::provider::{ImageRequest, PromptContext, Providers};
use crate::versioning::{VersionMetadata, VersionStore};

use super::context::{StepOutputs, WorkflowContext};
use super::progress::{ProgressEvent, ProgressReporter};
use super::prompt;
use super::result::StepResult;

/// One step to run.
pub struct StepRequest<'a> {
    pub job_id: &'a str,
    pub step: StepKind,
    pub context: &'a WorkflowContext,
    /// Outputs of the other steps, as visible to this one.
    pub outputs: &'a StepOutputs,
    /// Set for regenerations; recorded on the new version.
    pub regeneration_reason: Option<&'a str>,
}

/// A validated generation waiting to be committed.
struct Generated {
    content: StepContent,
    usage: TokenUsage,
    price: i64,
    prompt: String,
    model: String,
}

/// The text half of the image stage.
#[derive(Deserialize)]
struct ImageBrief {
    image_prompt: String,
    #[serde(default)]
    alt_text: Option<String>,
}

/// Runs single pipeline steps.
///
/// A step either commits everything (version, ledger debit, COMPLETED step
/// row, job totals, audit entry) in one transaction, or commits nothing but a FAILED
/// step row. Provider calls are made once; there is no retry.
#[derive(Clone)]
pub struct StepExecutor {
    db: Database,
    config: Arc<EngineConfig>,
    providers: Providers,
    meter: CostMeter,
}

impl StepExecutor {
    pub fn new(
        db: Database,
        config: Arc<EngineConfig>,
        providers: Providers,
        meter: CostMeter,
    ) -> Self {
        Self {
            db,
            config,
            providers,
            meter,
        }
    }

    /// Runs one step. On failure the step row is marked FAILED with the
    /// error and the error is returned; no version or debit exists for it.
    pub fn execute_step(
        &self,
        request: &StepRequest<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<StepResult> {
        let job_id = request.job_id;
        let step = request.step;
        let _span = info_span!("step", %job_id, %step).entered();
        let started = Instant::now();

        self.db.with_tx(|tx| {
            let now = now_timestamp();
            step_repo::mark_in_progress(tx, job_id, step, &now)?;
            audit_repo::record(tx, job_id, Some(step), events::STEP_STARTED, "", &now)?;
            Ok::<_, EngineError>(())
        })?;
        progress.report(ProgressEvent::StepStarted {
            job_id: job_id.to_string(),
            step,
        });

        let outcome = self
            .generate(request)
            .and_then(|generated| self.commit(request, generated, elapsed_ms(started)));

        match outcome {
            Ok(result) => {
                debug!(
                    cost = result.usage.cost,
                    tokens = result.usage.tokens,
                    duration_ms = result.duration_ms,
                    "Step completed"
                );
                if let Some(version) = &result.version {
                    progress.report(ProgressEvent::StepCompleted {
                        job_id: job_id.to_string(),
                        step,
                        version: version.version,
                        cost: result.usage.cost,
                        tokens: result.usage.tokens,
                    });
                }
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "Step failed");
                self.record_failure(job_id, step, &err, elapsed_ms(started))?;
                progress.report(ProgressEvent::StepFailed {
                    job_id: job_id.to_string(),
                    step,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Prices the step, checks the balance, calls the provider(s) and
    /// validates the payload. Nothing is written here.
    fn generate(&self, request: &StepRequest<'_>) -> Result<Generated> {
        let step = request.step;
        let options = &request.context.options;
        let agency_id = &request.context.agency_id;

        let price = self
            .meter
            .price(step, options.image_quality, options.image_variations)?;
        if !self.meter.check_balance(agency_id, price)? {
            return Err(EngineError::InsufficientBalance {
                agency_id: agency_id.clone(),
                required: price,
                available: self.meter.balance(agency_id)?,
            });
        }

        let prompt = prompt::build(step, request.context, request.outputs, &self.config.models)?;

        let (content, usage, model) = match step {
            StepKind::Idea
            | StepKind::CopyDesign
            | StepKind::CopyPublication
            | StepKind::FinalDesign => {
                let generation = self.providers.text.generate(step, &prompt)?;
                let content = StepContent::from_json(step, generation.content)?;
                (content, generation.usage, generation.model)
            }
            StepKind::BaseImage => self.generate_image(request, &prompt)?,
        };

        content.validate()?;

        Ok(Generated {
            content,
            usage,
            price,
            prompt: prompt.prompt,
            model,
        })
    }

    /// Two calls: the text model writes the image prompt, the image model
    /// renders it. Usage is the sum of both.
    fn generate_image(
        &self,
        request: &StepRequest<'_>,
        prompt: &PromptContext,
    ) -> Result<(StepContent, TokenUsage, String)> {
        let options = &request.context.options;

        let brief_generation = self.providers.text.generate(StepKind::BaseImage, prompt)?;
        let brief: ImageBrief = serde_json::from_value(brief_generation.content).map_err(|e| {
            EngineError::validation(format!("BASE_IMAGE brief does not match its schema: {}", e))
        })?;

        let render = self.providers.image.render(&ImageRequest {
            prompt: brief.image_prompt.clone(),
            model: self.config.models.image.clone(),
            quality: options.image_quality,
            variations: options.image_variations,
        })?;

        let content = StepContent::BaseImage(BaseImageContent {
            image_prompt: brief.image_prompt,
            alt_text: brief.alt_text,
            quality: options.image_quality,
            images: render.images,
        });
        let model = format!("{}+{}", brief_generation.model, render.model);
        Ok((content, brief_generation.usage + render.usage, model))
    }

    /// Writes version, debit, step row, job totals and audit entries in one
    /// transaction.
    /// The debit re-checks the balance, so a concurrent job that spent the
    /// balance since [`StepExecutor::generate`] rolls this commit back.
    fn commit(
        &self,
        request: &StepRequest<'_>,
        generated: Generated,
        duration_ms: i64,
    ) -> Result<StepResult> {
        let job_id = request.job_id;
        let step = request.step;
        let context = request.context;
        let usage = StepUsage {
            tokens: i64::try_from(generated.usage.total_tokens).unwrap_or(i64::MAX),
            cost: generated.price,
        };

        let metadata = VersionMetadata {
            generating_user: context.user_id.clone(),
            prompt: generated.prompt,
            model: generated.model,
            usage: generated.usage,
            billed_cost: generated.price,
            parent_version_id: None,
            is_regeneration: request.regeneration_reason.is_some(),
            regeneration_reason: request.regeneration_reason.map(str::to_string),
        };

        let version = self.db.with_tx(|tx| {
            let version =
                VersionStore::create_version_in(tx, job_id, step, &generated.content, metadata)?;

            let debit = CostMeter::debit_in(
                tx,
                &context.agency_id,
                generated.price,
                &format!("{} generation", step),
                Some(&version.id),
                Some(&json!({
                    "job_id": job_id,
                    "step": step,
                    "version": version.version,
                    "tokens": usage.tokens,
                })),
            )?;

            let now = now_timestamp();
            let result_json = serde_json::to_string(&generated.content)?;
            step_repo::mark_completed(
                tx,
                job_id,
                step,
                &result_json,
                usage.tokens,
                usage.cost,
                duration_ms,
                &now,
            )?;
            job_repo::add_usage(tx, job_id, usage.cost, usage.tokens, &now)?;

            let event = if request.regeneration_reason.is_some() {
                events::STEP_REGENERATED
            } else {
                events::STEP_COMPLETED
            };
            audit_repo::record(
                tx,
                job_id,
                Some(step),
                event,
                &format!("version {}", version.version),
                &now,
            )?;
            audit_repo::record(
                tx,
                job_id,
                Some(step),
                events::LEDGER_DEBIT,
                &format!("{} (balance {})", debit.amount, debit.balance_after),
                &now,
            )?;

            Ok::<_, EngineError>(version)
        })?;

        Ok(StepResult::completed(job_id, version, usage, duration_ms))
    }

    fn record_failure(
        &self,
        job_id: &str,
        step: StepKind,
        err: &EngineError,
        duration_ms: i64,
    ) -> Result<()> {
        let message = err.to_string();
        self.db.with_tx(|tx| {
            let now = now_timestamp();
            step_repo::mark_failed(tx, job_id, step, &message, duration_ms, &now)?;
            audit_repo::record(tx, job_id, Some(step), events::STEP_FAILED, &message, &now)?;
            Ok(())
        })
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
