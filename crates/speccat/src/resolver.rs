//! Cached, single-flight document resolution.
//!
//! A [`DocumentResolver`] owns the identifier registry produced by discovery
//! and the cache of resolved documents. The first request for an identifier
//! starts one load-and-dereference pass on its own task; concurrent requests
//! attach to that pass through a `watch` channel instead of starting their
//! own. Dropping a waiting future never cancels the shared pass.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;

use crate::catalog::{Catalog, extract};
use crate::config::SpeccatConfig;
use crate::dereference::{CancelFlag, DereferenceOptions, dereference_cancellable};
use crate::document::DereferencedDocument;
use crate::error::SpeccatError;
use crate::fetch::{HttpFetcher, OfflineFetcher, ReferenceFetcher};
use crate::locator::{Discovery, SpecIdentifier, SpecSource};

/// A resolved document together with its catalog.
#[derive(Debug)]
pub struct ResolvedSpec {
    pub document: Arc<DereferencedDocument>,
    pub catalog: Arc<Catalog>,
}

type Outcome = Result<Arc<ResolvedSpec>, SpeccatError>;

#[derive(Default)]
struct Slot {
    ready: Option<Arc<ResolvedSpec>>,
    in_flight: Option<InFlight>,
}

struct InFlight {
    generation: u64,
    receiver: watch::Receiver<Option<Outcome>>,
}

impl Slot {
    fn pending_receiver(&self) -> Option<watch::Receiver<Option<Outcome>>> {
        self.in_flight
            .as_ref()
            .map(|in_flight| in_flight.receiver.clone())
    }
}

/// Counters describing resolver activity since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub passes_started: u64,
    pub passes_failed: u64,
    pub cache_hits: u64,
    pub coalesced_waits: u64,
    /// Timed-out passes whose background work has since stopped.
    pub passes_cancelled: u64,
}

#[derive(Default)]
struct Counters {
    passes_started: AtomicU64,
    passes_failed: AtomicU64,
    cache_hits: AtomicU64,
    coalesced_waits: AtomicU64,
    passes_cancelled: AtomicU64,
}

struct Shared {
    root: PathBuf,
    config: SpeccatConfig,
    fetcher: Arc<dyn ReferenceFetcher>,
    registry: RwLock<Discovery>,
    slots: Mutex<HashMap<SpecIdentifier, Slot>>,
    generation: AtomicU64,
    counters: Counters,
}

/// Handle to the resolution cache. Clones share the same cache.
#[derive(Clone)]
pub struct DocumentResolver {
    shared: Arc<Shared>,
}

impl DocumentResolver {
    /// Runs discovery under `root` and builds a resolver with the default fetcher
    /// for `config` (HTTP when remote references are allowed, offline otherwise).
    pub fn open(root: impl Into<PathBuf>, config: SpeccatConfig) -> Result<Self, SpeccatError> {
        let fetcher: Arc<dyn ReferenceFetcher> = if config.allow_remote {
            Arc::new(HttpFetcher::new(config.resolve_timeout()))
        } else {
            Arc::new(OfflineFetcher)
        };
        let root = root.into();
        let discovery = Discovery::scan(root.clone(), &config)?;
        Ok(Self::new(discovery, config, fetcher))
    }

    pub fn new(
        discovery: Discovery,
        config: SpeccatConfig,
        fetcher: Arc<dyn ReferenceFetcher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                root: discovery.root().to_path_buf(),
                config,
                fetcher,
                registry: RwLock::new(discovery),
                slots: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &SpeccatConfig {
        &self.shared.config
    }

    /// Identifiers of the current discovery pass.
    pub fn identifiers(&self) -> Vec<SpecIdentifier> {
        self.shared.registry.read().identifiers()
    }

    pub fn discovery(&self) -> Discovery {
        self.shared.registry.read().clone()
    }

    pub fn stats(&self) -> ResolverStats {
        let counters = &self.shared.counters;
        ResolverStats {
            passes_started: counters.passes_started.load(Ordering::Relaxed),
            passes_failed: counters.passes_failed.load(Ordering::Relaxed),
            cache_hits: counters.cache_hits.load(Ordering::Relaxed),
            coalesced_waits: counters.coalesced_waits.load(Ordering::Relaxed),
            passes_cancelled: counters.passes_cancelled.load(Ordering::Relaxed),
        }
    }

    /// Returns the dereferenced document for `identifier`, resolving it on
    /// first use.
    pub async fn resolve(
        &self,
        identifier: &SpecIdentifier,
    ) -> Result<Arc<DereferencedDocument>, SpeccatError> {
        Ok(self.resolve_spec(identifier).await?.document.clone())
    }

    /// Like [`resolve`](Self::resolve) but also yields the cached catalog.
    pub async fn resolve_spec(
        &self,
        identifier: &SpecIdentifier,
    ) -> Result<Arc<ResolvedSpec>, SpeccatError> {
        let receiver = {
            let mut slots = self.shared.slots.lock();
            let (ready, pending) = match slots.get(identifier) {
                Some(slot) => (slot.ready.clone(), slot.pending_receiver()),
                None => (None, None),
            };
            if let Some(ready) = ready {
                self.shared.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(ready);
            }
            match pending {
                Some(receiver) => {
                    self.shared
                        .counters
                        .coalesced_waits
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(identifier = %identifier, "joining in-flight resolution");
                    receiver
                }
                None => self.start_pass(&mut slots, identifier)?,
            }
        };
        wait_for(identifier, receiver).await
    }

    /// Re-resolves `identifier` from storage. The cached entry is replaced only
    /// when the new pass succeeds; a pass already in flight is joined.
    pub async fn reload(
        &self,
        identifier: &SpecIdentifier,
    ) -> Result<Arc<DereferencedDocument>, SpeccatError> {
        let receiver = {
            let mut slots = self.shared.slots.lock();
            let pending = slots.get(identifier).and_then(Slot::pending_receiver);
            match pending {
                Some(receiver) => receiver,
                None => self.start_pass(&mut slots, identifier)?,
            }
        };
        Ok(wait_for(identifier, receiver).await?.document.clone())
    }

    /// Drops the cached entry for `identifier`. Callers already waiting on an
    /// in-flight pass still receive its outcome; the outcome is not cached.
    pub fn invalidate(&self, identifier: &SpecIdentifier) -> bool {
        let removed = self.shared.slots.lock().remove(identifier).is_some();
        if removed {
            tracing::debug!(identifier = %identifier, "invalidated cached specification");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        self.shared.slots.lock().clear();
        tracing::debug!("invalidated all cached specifications");
    }

    /// Re-runs discovery and swaps the registry. Entries for identifiers that
    /// disappeared are dropped; surviving entries keep their cached documents.
    pub fn rescan(&self) -> Result<Discovery, SpeccatError> {
        let discovery = Discovery::scan(self.shared.root.clone(), &self.shared.config)?;
        {
            // Same lock order as `start_pass`: slots, then registry.
            let mut slots = self.shared.slots.lock();
            let mut registry = self.shared.registry.write();
            slots.retain(|identifier, _| discovery.contains(identifier));
            *registry = discovery.clone();
        }
        tracing::info!(count = discovery.len(), "rescanned specifications");
        Ok(discovery)
    }

    fn start_pass(
        &self,
        slots: &mut HashMap<SpecIdentifier, Slot>,
        identifier: &SpecIdentifier,
    ) -> Result<watch::Receiver<Option<Outcome>>, SpeccatError> {
        let source = self
            .shared
            .registry
            .read()
            .source(identifier)
            .cloned()
            .ok_or_else(|| SpeccatError::NotFound(identifier.to_string()))?;

        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = watch::channel(None);
        slots.entry(identifier.clone()).or_default().in_flight = Some(InFlight {
            generation,
            receiver: receiver.clone(),
        });
        self.shared
            .counters
            .passes_started
            .fetch_add(1, Ordering::Relaxed);

        tokio::spawn(run_pass(
            self.shared.clone(),
            identifier.clone(),
            source,
            generation,
            sender,
        ));
        Ok(receiver)
    }
}

async fn run_pass(
    shared: Arc<Shared>,
    identifier: SpecIdentifier,
    source: SpecSource,
    generation: u64,
    sender: watch::Sender<Option<Outcome>>,
) {
    let started = Instant::now();
    let timeout = shared.config.resolve_timeout();
    tracing::debug!(identifier = %identifier, "resolving specification");

    let options = DereferenceOptions::from(&shared.config);
    let cancel = CancelFlag::default();
    let task_shared = shared.clone();
    let task_cancel = cancel.clone();
    let task_identifier = identifier.clone();
    let task = tokio::task::spawn_blocking(move || {
        let result = dereference_cancellable(
            &task_identifier,
            &source,
            task_shared.fetcher.as_ref(),
            options,
            &task_cancel,
        );
        if task_cancel.is_cancelled() {
            task_shared
                .counters
                .passes_cancelled
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!(identifier = %task_identifier, "cancelled pass stopped");
        }
        result.map(|document| {
            let catalog = extract(&document);
            Arc::new(ResolvedSpec {
                document: Arc::new(document),
                catalog: Arc::new(catalog),
            })
        })
    });

    let outcome = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SpeccatError::Reference(format!(
            "dereferencing {identifier} aborted: {join_err}"
        ))),
        Err(_) => {
            // The blocking work notices the flag at its next node.
            cancel.cancel();
            Err(SpeccatError::Timeout {
                identifier: identifier.to_string(),
                after: timeout,
            })
        }
    };

    finish_pass(&shared, &identifier, generation, &outcome, started.elapsed());
    // Receivers may all be gone; the slot has been updated regardless.
    let _ = sender.send(Some(outcome));
}

fn finish_pass(
    shared: &Shared,
    identifier: &SpecIdentifier,
    generation: u64,
    outcome: &Outcome,
    elapsed: Duration,
) {
    let mut slots = shared.slots.lock();
    let current = slots
        .get(identifier)
        .and_then(|slot| slot.in_flight.as_ref())
        .map(|in_flight| in_flight.generation);
    if current != Some(generation) {
        tracing::debug!(identifier = %identifier, "discarding outcome of superseded pass");
        return;
    }

    match outcome {
        Ok(resolved) => {
            if let Some(slot) = slots.get_mut(identifier) {
                slot.in_flight = None;
                slot.ready = Some(resolved.clone());
            }
            tracing::info!(
                identifier = %identifier,
                operations = resolved.catalog.operations.len(),
                webhooks = resolved.catalog.webhooks.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "resolved specification"
            );
        }
        Err(err) => {
            shared.counters.passes_failed.fetch_add(1, Ordering::Relaxed);
            let keep_previous = match slots.get_mut(identifier) {
                Some(slot) => {
                    slot.in_flight = None;
                    slot.ready.is_some()
                }
                None => false,
            };
            if !keep_previous {
                slots.remove(identifier);
            }
            tracing::warn!(identifier = %identifier, error = %err, "specification resolution failed");
        }
    }
}

async fn wait_for(
    identifier: &SpecIdentifier,
    mut receiver: watch::Receiver<Option<Outcome>>,
) -> Outcome {
    let outcome = receiver
        .wait_for(Option::is_some)
        .await
        .map(|value| value.clone())
        .map_err(|_| {
            SpeccatError::Reference(format!("resolution of {identifier} ended without a result"))
        })?;
    outcome.unwrap_or_else(|| {
        Err(SpeccatError::Reference(format!(
            "resolution of {identifier} ended without a result"
        )))
    })
}
