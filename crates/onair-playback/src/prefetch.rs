//! Synthesis prefetching ahead of the playhead.
//!
//! The window maps a linear chunk index to its synthesis task. Tasks may
//! finish in any order; the orchestrator takes them out by index, which is
//! what keeps playback in program order. A failed task keeps its error
//! until its index is due.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use onair_core::{AudioHandle, FlatProgram};
use onair_tts::{SynthesisContext, SynthesisGateway, SynthesisResult};

/// Pending synthesis of one chunk.
pub type SynthesisTask = JoinHandle<SynthesisResult<AudioHandle>>;

/// How far ahead to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Chunks ahead of the current one kept in flight.
    pub lookahead: usize,
    /// When the current chunk is among the last this many of its section,
    /// the next section is prefetched as well.
    pub section_tail_threshold: usize,
    /// Chunks of the next section to prefetch.
    pub next_section_lead: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            lookahead: 3,
            section_tail_threshold: 2,
            next_section_lead: 4,
        }
    }
}

/// Per-session prefetch window.
pub struct PrefetchScheduler {
    gateway: Arc<SynthesisGateway>,
    voice_id: Arc<str>,
    context: SynthesisContext,
    config: PrefetchConfig,
    window: HashMap<usize, SynthesisTask>,
}

impl PrefetchScheduler {
    pub fn new(
        gateway: Arc<SynthesisGateway>,
        voice_id: impl Into<Arc<str>>,
        context: SynthesisContext,
        config: PrefetchConfig,
    ) -> Self {
        Self {
            gateway,
            voice_id: voice_id.into(),
            context,
            config,
            window: HashMap::new(),
        }
    }

    /// Indices that should be in flight while `index` is current.
    pub fn targets(&self, program: &FlatProgram, index: usize) -> Vec<usize> {
        let end = index
            .saturating_add(self.config.lookahead)
            .saturating_add(1)
            .min(program.len());
        let mut targets: Vec<usize> = (index..end).collect();

        let in_tail = program
            .remaining_in_section(index)
            .is_some_and(|remaining| remaining < self.config.section_tail_threshold);
        if in_tail {
            if let Some(next) = program.next_section_range(index) {
                targets.extend(next.take(self.config.next_section_lead));
            }
        }

        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Issue synthesis for `index` and its lookahead. Returns the indices
    /// newly issued; an index already in the window is never issued again.
    pub fn ensure(&mut self, program: &FlatProgram, index: usize) -> Vec<usize> {
        let issued: Vec<usize> = self
            .targets(program, index)
            .into_iter()
            .filter(|i| !self.window.contains_key(i))
            .collect();

        for &i in &issued {
            self.spawn(program, i);
        }
        if !issued.is_empty() {
            debug!(current = index, ?issued, "Prefetch issued");
        }
        issued
    }

    /// Remove the task for `index` from the window, issuing it first when
    /// it was never requested.
    pub fn take(&mut self, program: &FlatProgram, index: usize) -> Option<SynthesisTask> {
        if !self.window.contains_key(&index) {
            self.spawn(program, index);
        }
        self.window.remove(&index)
    }

    /// Whether the result for `index` can be taken without waiting.
    pub fn is_ready(&self, index: usize) -> bool {
        self.window.get(&index).is_some_and(JoinHandle::is_finished)
    }

    /// Sorted indices currently in the window.
    pub fn in_flight(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.window.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Abort every outstanding task.
    pub fn clear(&mut self) {
        for (_, task) in self.window.drain() {
            task.abort();
        }
    }

    fn spawn(&mut self, program: &FlatProgram, index: usize) {
        let Some(chunk) = program.get(index) else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        let voice_id = Arc::clone(&self.voice_id);
        let context = self.context.clone();
        let text = chunk.text.clone();

        let task =
            tokio::spawn(async move { gateway.synthesize(&text, &voice_id, &context).await });
        self.window.insert(index, task);
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for PrefetchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchScheduler")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
