//! Thread-safe session handle serialising selections.
//!
//! Every `select` takes a ticket. Selections run one at a time under the
//! controller lock; while one is evaluating, a newer ticket makes it fail with
//! `Superseded` before anything is committed, and a request that was queued
//! behind a newer one is skipped. The displayed layer therefore always
//! belongs to the newest request that succeeded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::controller::PresentationController;
use crate::error::SelectError;
use crate::legend::LegendDescription;
use crate::registry::LayerRegistry;

pub struct Session {
    registry: Arc<LayerRegistry>,
    controller: Mutex<PresentationController>,
    latest: AtomicU64,
}

impl Session {
    pub fn new(controller: PresentationController) -> Self {
        Self {
            registry: Arc::clone(controller.registry()),
            controller: Mutex::new(controller),
            latest: AtomicU64::new(0),
        }
    }

    /// Labels for the selection control, in registration order.
    pub fn labels(&self) -> Vec<String> {
        self.registry.labels().map(str::to_string).collect()
    }

    /// Select `label`, preempting any selection still in flight.
    ///
    /// Unknown labels are rejected up front and do not preempt anything.
    pub fn select(&self, label: &str) -> Result<(), SelectError> {
        self.registry.find_by_label(label)?;

        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let mut controller = self.lock();
        if self.latest.load(Ordering::SeqCst) != ticket {
            debug!(label, ticket, "skipping stale selection");
            return Err(SelectError::Superseded);
        }
        let is_cancelled = || self.latest.load(Ordering::SeqCst) != ticket;
        controller.select_with(label, &is_cancelled)
    }

    pub fn current_label(&self) -> Option<String> {
        self.lock().current_label().map(str::to_string)
    }

    pub fn current_legend(&self) -> Option<LegendDescription> {
        self.lock().current_legend().cloned()
    }

    pub fn inspect(&self, lon: f64, lat: f64) -> Option<f32> {
        self.lock().inspect(lon, lat)
    }

    fn lock(&self) -> MutexGuard<'_, PresentationController> {
        // Commits happen after all fallible work, so a poisoned lock still
        // guards a consistent state.
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
