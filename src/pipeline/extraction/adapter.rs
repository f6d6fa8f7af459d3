use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use super::ollama::OllamaClient;
use super::openai::OpenAiClient;
use super::parser::parse_candidate;
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::rules::RuleBasedExtractor;
use super::sanitize::sanitize_narrative;
use super::types::{CandidateRecord, ExtractionRequest, TextService};
use super::usage::{UsageMeter, UsageSnapshot};
use super::ExtractionError;
use crate::config::{Backend, ConfigError, ServiceConfig};
use crate::pipeline::diagnostic;

/// The extraction boundary: narrative in, candidate record out.
///
/// Wraps one `TextService` with prompt construction, usage metering, output
/// repair and parsing. Cloning shares the service and the meter.
#[derive(Clone)]
pub struct ExtractionAdapter {
    service: Arc<dyn TextService>,
    usage: Arc<UsageMeter>,
    dump_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ExtractionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionAdapter")
            .field("service", &self.service.name())
            .field("usage", &self.usage.snapshot())
            .finish_non_exhaustive()
    }
}

impl ExtractionAdapter {
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self {
            service,
            usage: Arc::new(UsageMeter::new(None)),
            dump_dir: None,
        }
    }

    /// Build the backend named in `config`. The credential is handed to the
    /// client here and nowhere else.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.check()?;
        let service: Arc<dyn TextService> = match config.backend {
            Backend::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
            Backend::Ollama => Arc::new(OllamaClient::from_config(config)?),
            Backend::Rules => Arc::new(RuleBasedExtractor::new()),
        };

        tracing::info!(
            backend = %config.backend,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            token_budget = ?config.token_budget,
            "Extraction adapter configured"
        );

        Ok(Self::new(service)
            .with_budget(config.token_budget)
            .with_dump_dir(config.dump_dir.clone()))
    }

    pub fn with_budget(mut self, budget: Option<u64>) -> Self {
        self.usage = Arc::new(UsageMeter::new(budget));
        self
    }

    pub fn with_dump_dir(mut self, dump_dir: Option<PathBuf>) -> Self {
        self.dump_dir = dump_dir;
        self
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn dump_dir(&self) -> Option<&Path> {
        self.dump_dir.as_deref()
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    /// Extract a candidate record for one narrative.
    pub fn extract(
        &self,
        narrative: &str,
        patient_id: i64,
    ) -> Result<CandidateRecord, ExtractionError> {
        self.extract_for_run(narrative, patient_id, &Uuid::new_v4())
    }

    /// Same as [`extract`](Self::extract), tagging logs and dumps with `run_id`.
    pub fn extract_for_run(
        &self,
        narrative: &str,
        patient_id: i64,
        run_id: &Uuid,
    ) -> Result<CandidateRecord, ExtractionError> {
        self.usage.check_budget()?;

        let dump = diagnostic::dump_dir_for(self.dump_dir.as_deref(), run_id);
        let sanitized = sanitize_narrative(narrative, patient_id);
        let request = ExtractionRequest {
            patient_id,
            user_prompt: build_extraction_prompt(&sanitized, patient_id),
            system_prompt: EXTRACTION_SYSTEM_PROMPT.to_string(),
            narrative: sanitized,
        };

        if let Some(ref dir) = dump {
            diagnostic::dump_text(dir, "01-prompt.txt", &request.user_prompt);
        }

        let reply = match self.service.complete(&request) {
            Ok(reply) => reply,
            Err(e) => {
                self.usage.record_failure();
                tracing::warn!(
                    run_id = %run_id,
                    patient_id,
                    service = self.service.name(),
                    transient = e.is_transient(),
                    error = %e,
                    "Extraction call failed"
                );
                if let Some(ref dir) = dump {
                    diagnostic::dump_text(dir, "error.txt", &e.to_string());
                }
                return Err(e);
            }
        };

        self.usage.record_call(reply.usage.as_ref());
        tracing::info!(
            run_id = %run_id,
            patient_id,
            service = self.service.name(),
            tokens = reply.usage.map(|u| u.total_tokens),
            response_len = reply.text.len(),
            "Extraction call complete"
        );

        if let Some(ref dir) = dump {
            diagnostic::dump_text(dir, "02-raw-response.txt", &reply.text);
        }

        match parse_candidate(&reply.text, patient_id) {
            Ok(candidate) => {
                if let Some(ref dir) = dump {
                    diagnostic::dump_json(dir, "03-candidate.json", &candidate);
                }
                Ok(candidate)
            }
            Err(e) => {
                let preview: String = reply.text.chars().take(200).collect();
                tracing::warn!(
                    run_id = %run_id,
                    patient_id,
                    error = %e,
                    raw_preview = %preview,
                    "Service output could not be parsed"
                );
                if let Some(ref dir) = dump {
                    diagnostic::dump_text(dir, "error.txt", &e.to_string());
                }
                Err(e)
            }
        }
    }
}
