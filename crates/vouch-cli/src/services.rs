//! Wires runtime components from configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use vouch_runtime::enrichment::APOLLO_API_TOKEN_ENV;
use vouch_runtime::resilience::CircuitBreaker;
use vouch_runtime::secrets::ApiCredential;
use vouch_runtime::{
    ApolloLookup, CachedLookup, Classifier, ConfirmationStateMachine, DocumentSource,
    EnrichmentLookup, ExtractionService, GuardedLookup, GuardedNotifier, HttpDocumentService,
    HttpTextLoader, InMemoryDocuments, InMemoryStore, LlmExtractor, NoEnrichment, Notifier,
    ProviderRegistry, RuntimeConfig, StatementAnalyzer, SystemClock, TaskDispatcher, TextLoader,
    TokioExecutor, TracingNotifier, VerificationWorkflow, WebhookNotifier,
};

use crate::server::AppState;

/// The three document roles, possibly served by one object.
struct DocumentServices {
    source: Arc<dyn DocumentSource>,
    classifier: Arc<dyn Classifier>,
    loader: Arc<dyn TextLoader>,
}

fn documents(config: &RuntimeConfig, fixtures: Option<&Path>) -> Result<DocumentServices> {
    if let Some(path) = fixtures {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
        let docs = Arc::new(
            InMemoryDocuments::from_yaml(&yaml)
                .with_context(|| format!("Invalid fixtures in {}", path.display()))?,
        );
        tracing::info!(documents = docs.len(), "Serving documents from fixtures");
        return Ok(DocumentServices {
            source: docs.clone(),
            classifier: docs.clone(),
            loader: docs,
        });
    }

    let (Some(base_url), Some(text_url)) = (&config.documents.base_url, &config.documents.text_url)
    else {
        bail!("No document source: pass --fixtures or set documents.base_url and documents.text_url");
    };

    let timeout = config.timeouts.document_fetch;
    let service = Arc::new(HttpDocumentService::new(base_url.as_str(), timeout)?);
    let loader = Arc::new(HttpTextLoader::new(text_url.as_str(), timeout)?);
    Ok(DocumentServices {
        source: service.clone(),
        classifier: service,
        loader,
    })
}

fn enrichment(
    config: &RuntimeConfig,
    breaker: &Arc<CircuitBreaker>,
) -> Result<Arc<dyn EnrichmentLookup>> {
    let settings = config.enrichment.settings_json();
    if !ApiCredential::is_available(&settings, "api_token", APOLLO_API_TOKEN_ENV) {
        tracing::warn!("No enrichment token configured, reviewers will not be looked up");
        return Ok(Arc::new(NoEnrichment));
    }

    let apollo = ApolloLookup::from_config(&config.enrichment, config.timeouts.enrichment)?;
    let guarded = GuardedLookup::new(Arc::new(apollo), Arc::clone(breaker));
    Ok(Arc::new(CachedLookup::from_config(
        Arc::new(guarded),
        &config.enrichment,
    )))
}

fn notifier(config: &RuntimeConfig, breaker: &Arc<CircuitBreaker>) -> Result<Arc<dyn Notifier>> {
    if config.callback_url.is_none() && config.notification_url.is_none() {
        tracing::warn!("No callback or notification URL configured, notifications are logged only");
        return Ok(Arc::new(TracingNotifier));
    }

    let webhook = WebhookNotifier::new(
        config.callback_url.clone(),
        config.notification_url.clone(),
        config.timeouts.webhook,
    )?;
    Ok(Arc::new(GuardedNotifier::new(
        Arc::new(webhook),
        Arc::clone(breaker),
    )))
}

/// Build every service the HTTP layer needs.
pub fn build_state(config: &RuntimeConfig, fixtures: Option<&Path>) -> Result<AppState> {
    let docs = documents(config, fixtures)?;

    let provider = ProviderRegistry::with_defaults()
        .create(&config.provider.kind, &config.provider.settings_json())
        .context("Failed to create extraction provider")?;
    // One breaker, one circuit per dependency.
    let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
    let extractor: Arc<dyn ExtractionService> =
        Arc::new(LlmExtractor::new(provider, config, Arc::clone(&breaker)));

    let notifier = notifier(config, &breaker)?;
    let machine = Arc::new(ConfirmationStateMachine::new(
        Arc::new(InMemoryStore::new()),
        notifier.clone(),
        Arc::new(SystemClock),
    ));

    let workflow = VerificationWorkflow::builder()
        .documents(docs.source)
        .text_loader(docs.loader.clone())
        .extractor(extractor.clone())
        .enrichment(enrichment(config, &breaker)?)
        .machine(machine.clone())
        .notifier(notifier)
        .public_base_url(config.base_url())
        .build()?;

    let analyzer = Arc::new(StatementAnalyzer::new(docs.loader, extractor));
    let executor = Arc::new(TokioExecutor::from_config(analyzer, &config.dispatch));
    let dispatcher = TaskDispatcher::new(docs.classifier, executor, &config.dispatch);

    Ok(AppState {
        workflow: Arc::new(workflow),
        machine,
        dispatcher: Arc::new(dispatcher),
    })
}
