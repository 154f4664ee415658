use std::sync::Arc;

use sandbox::{Runtime, UnitHandle};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Exclusive ownership of a provisioned unit.
///
/// The unit is destroyed by [`UnitLease::release`], or, if the lease is
/// dropped unreleased (the owning future was cancelled), by a background task
/// spawned from `Drop`. A lease taken with [`UnitLease::pending`] is armed
/// before the unit exists and addresses it by name until
/// [`UnitLease::attach`] supplies the handle. Tasks attached with
/// [`UnitLease::watch`] are aborted once the unit is gone.
pub(crate) struct UnitLease {
    runtime: Arc<dyn Runtime>,
    unit: UnitHandle,
    waiter: Option<JoinHandle<()>>,
    released: bool,
}

impl UnitLease {
    pub(crate) fn new(runtime: Arc<dyn Runtime>, unit: UnitHandle) -> Self {
        Self {
            runtime,
            unit,
            waiter: None,
            released: false,
        }
    }

    /// Arm a lease for a unit that is about to be created under `name`.
    pub(crate) fn pending(runtime: Arc<dyn Runtime>, name: &str) -> Self {
        let unit = UnitHandle {
            id: name.to_owned(),
            name: name.to_owned(),
        };
        Self::new(runtime, unit)
    }

    /// Replace the provisional handle with the one the runtime returned.
    pub(crate) fn attach(&mut self, unit: UnitHandle) {
        self.unit = unit;
    }

    /// Give up the lease without destroying anything, for a unit that was
    /// never created.
    pub(crate) fn disarm(mut self) {
        self.released = true;
    }

    pub(crate) fn unit(&self) -> &UnitHandle {
        &self.unit
    }

    /// Tie a background task to the unit's lifetime.
    pub(crate) fn watch(&mut self, waiter: JoinHandle<()>) {
        if let Some(previous) = self.waiter.replace(waiter) {
            previous.abort();
        }
    }

    /// Destroy the unit. A failure here means the unit may be leaked.
    pub(crate) async fn release(mut self) -> sandbox::Result<()> {
        let result = self.runtime.destroy(&self.unit).await;
        // Cancelled mid-destroy leaves the flag unset so `Drop` tries again.
        self.released = true;
        self.stop_watching();

        match &result {
            Ok(()) => info!(unit = %self.unit, "unit destroyed"),
            Err(e) => error!(unit = %self.unit, error = %e, "unit destroy failed, unit may be leaked"),
        }
        result
    }

    fn stop_watching(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            waiter.abort();
        }
    }
}

impl Drop for UnitLease {
    fn drop(&mut self) {
        self.stop_watching();
        if self.released {
            return;
        }
        self.released = true;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!(unit = %self.unit, "lease dropped outside a runtime, unit leaked");
            return;
        };
        warn!(unit = %self.unit, "lease dropped before release, destroying in background");

        let runtime = Arc::clone(&self.runtime);
        let unit = self.unit.clone();
        handle.spawn(async move {
            if let Err(e) = runtime.destroy(&unit).await {
                error!(unit = %unit, error = %e, "background destroy failed, unit may be leaked");
            }
        });
    }
}
