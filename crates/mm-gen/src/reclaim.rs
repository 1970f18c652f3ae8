use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::Result;

/// Device state after a cache release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorStatus {
    pub device: String,
    /// Bytes still held by live tensors, when the device reports it.
    pub allocated_bytes: Option<u64>,
}

/// The compute device the samplers and decoders run on.
pub trait Accelerator: Send + Sync {
    /// Releases cached allocations and reports what remains.
    fn release_cached(&self) -> Result<AcceleratorStatus>;
}

/// Plain host memory. Nothing is cached between calls, so releasing is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostAccelerator;

impl Accelerator for HostAccelerator {
    fn release_cached(&self) -> Result<AcceleratorStatus> {
        Ok(AcceleratorStatus {
            device: "cpu".into(),
            allocated_bytes: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReclaimSummary {
    pub device: String,
    pub allocated_bytes: Option<u64>,
    /// Set when the device refused the release.
    pub error: Option<String>,
}

impl ReclaimSummary {
    pub fn allocated_mb(&self) -> Option<f64> {
        self.allocated_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }
}

/// Frees accelerator memory between generations.
///
/// Reclaiming never fails: device errors are logged and reported in the
/// summary, and calling it repeatedly is harmless.
#[derive(Clone)]
pub struct ResourceReclaimer {
    accelerator: Arc<dyn Accelerator>,
}

impl ResourceReclaimer {
    pub fn new(accelerator: Arc<dyn Accelerator>) -> Self {
        Self { accelerator }
    }

    pub fn reclaim(&self) -> ReclaimSummary {
        match self.accelerator.release_cached() {
            Ok(status) => {
                match status.allocated_bytes {
                    Some(bytes) => info!(
                        "Reclaimed {} cache, {:.2} MB still allocated",
                        status.device,
                        bytes as f64 / (1024.0 * 1024.0)
                    ),
                    None => info!("Reclaimed {} cache", status.device),
                }
                ReclaimSummary {
                    device: status.device,
                    allocated_bytes: status.allocated_bytes,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Resource reclaim failed: {}", e);
                ReclaimSummary {
                    device: "unknown".into(),
                    allocated_bytes: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Reclaims now and again when the guard drops, including on early return.
    pub fn guard(&self) -> ReclaimGuard<'_> {
        self.reclaim();
        ReclaimGuard { reclaimer: self }
    }
}

impl Default for ResourceReclaimer {
    fn default() -> Self {
        Self::new(Arc::new(HostAccelerator))
    }
}

impl std::fmt::Debug for ResourceReclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceReclaimer").finish_non_exhaustive()
    }
}

#[must_use = "dropping the guard immediately reclaims right away"]
pub struct ReclaimGuard<'a> {
    reclaimer: &'a ResourceReclaimer,
}

impl Drop for ReclaimGuard<'_> {
    fn drop(&mut self) {
        self.reclaimer.reclaim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAccelerator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Accelerator for CountingAccelerator {
        fn release_cached(&self) -> Result<AcceleratorStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GenError::Service("device lost".into()));
            }
            Ok(AcceleratorStatus {
                device: "cuda:0".into(),
                allocated_bytes: Some(3 * 1024 * 1024),
            })
        }
    }

    #[test]
    fn test_reclaim_reports_device_state() {
        let reclaimer = ResourceReclaimer::new(Arc::new(CountingAccelerator::default()));
        let summary = reclaimer.reclaim();
        assert_eq!(summary.device, "cuda:0");
        assert_eq!(summary.allocated_mb(), Some(3.0));
        assert!(summary.error.is_none());
    }

    #[test]
    fn test_reclaim_is_repeatable() {
        let reclaimer = ResourceReclaimer::default();
        assert_eq!(reclaimer.reclaim(), reclaimer.reclaim());
    }

    #[test]
    fn test_failure_is_swallowed() {
        let accelerator = Arc::new(CountingAccelerator {
            fail: true,
            ..Default::default()
        });
        let summary = ResourceReclaimer::new(accelerator).reclaim();
        assert!(summary.error.is_some());
    }

    #[test]
    fn test_guard_reclaims_on_entry_and_exit() {
        let accelerator = Arc::new(CountingAccelerator::default());
        let reclaimer = ResourceReclaimer::new(accelerator.clone());
        {
            let _guard = reclaimer.guard();
            assert_eq!(accelerator.calls.load(Ordering::SeqCst), 1);
        }
        assert_eq!(accelerator.calls.load(Ordering::SeqCst), 2);
    }
}
