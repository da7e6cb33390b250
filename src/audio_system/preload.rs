/// Preload batches
///
/// Count-based completion: a batch finishes when every asset in it has either
/// loaded or failed, whatever order the results arrive in.
use std::collections::HashMap;

use serde::Serialize;

use super::engine::EngineHandle;

/// Result of a preload batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PreloadReport {
    pub loaded: usize,
    pub failed: usize,
}

pub type PreloadCallback = Box<dyn FnOnce(PreloadReport)>;

struct PreloadBatch {
    remaining: usize,
    report: PreloadReport,
    on_complete: Option<PreloadCallback>,
}

/// A finished batch, ready to be reported
pub struct CompletedBatch {
    pub report: PreloadReport,
    pub on_complete: Option<PreloadCallback>,
}

impl CompletedBatch {
    pub fn fire(self) {
        if let Some(callback) = self.on_complete {
            callback(self.report);
        }
    }
}

#[derive(Default)]
pub struct PreloadTracker {
    batches: HashMap<u64, PreloadBatch>,
    watching: HashMap<EngineHandle, u64>,
    next_batch: u64,
}

impl PreloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a batch expecting `total` results
    pub fn open(&mut self, total: usize, on_complete: PreloadCallback) -> u64 {
        self.next_batch += 1;
        self.batches.insert(
            self.next_batch,
            PreloadBatch {
                remaining: total,
                report: PreloadReport::default(),
                on_complete: Some(on_complete),
            },
        );
        self.next_batch
    }

    /// Route the load result of `handle` to `batch`
    pub fn watch(&mut self, batch: u64, handle: EngineHandle) {
        self.watching.insert(handle, batch);
    }

    pub fn is_watching(&self, handle: EngineHandle) -> bool {
        self.watching.contains_key(&handle)
    }

    /// Record the load result of a watched handle
    pub fn resolve_handle(&mut self, handle: EngineHandle, loaded: bool) -> Option<CompletedBatch> {
        let batch = self.watching.remove(&handle)?;
        self.resolve(batch, loaded)
    }

    /// Record one result directly against a batch
    pub fn resolve(&mut self, batch: u64, loaded: bool) -> Option<CompletedBatch> {
        let entry = self.batches.get_mut(&batch)?;
        if loaded {
            entry.report.loaded += 1;
        } else {
            entry.report.failed += 1;
        }
        entry.remaining = entry.remaining.saturating_sub(1);
        if entry.remaining > 0 {
            return None;
        }

        let done = self.batches.remove(&batch)?;
        Some(CompletedBatch {
            report: done.report,
            on_complete: done.on_complete,
        })
    }

    /// Close every open batch, counting outstanding assets as failed.
    /// Returns the watched handles alongside the completed batches.
    pub fn abandon_all(&mut self) -> (Vec<EngineHandle>, Vec<CompletedBatch>) {
        let handles = self.watching.drain().map(|(handle, _)| handle).collect();
        let completed = self
            .batches
            .drain()
            .map(|(_, mut batch)| {
                batch.report.failed += batch.remaining;
                CompletedBatch {
                    report: batch.report,
                    on_complete: batch.on_complete,
                }
            })
            .collect();
        (handles, completed)
    }

    pub fn open_batches(&self) -> usize {
        self.batches.len()
    }
}
