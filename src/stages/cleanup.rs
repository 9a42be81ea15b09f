use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{Instrument, debug, info, warn};

use crate::error::CleanupWarning;
use crate::llm::AnalysisBackend;

/// Temporary artifacts created while serving one request
#[derive(Debug, Default)]
pub struct ScopedArtifacts {
    local_files: Mutex<Vec<PathBuf>>,
    remote_files: Mutex<Vec<String>>,
}

impl ScopedArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_local(&self, path: impl Into<PathBuf>) {
        lock(&self.local_files).push(path.into());
    }

    /// Record a remote file by the name used to delete it
    pub fn track_remote(&self, name: impl Into<String>) {
        lock(&self.remote_files).push(name.into());
    }

    pub fn local_files(&self) -> Vec<PathBuf> {
        lock(&self.local_files).clone()
    }

    pub fn remote_files(&self) -> Vec<String> {
        lock(&self.remote_files).clone()
    }

    /// Remove everything tracked so far: remote handles first, then local files.
    ///
    /// Every removal is attempted. Failures are logged and returned, never raised.
    pub async fn release(&self, backend: &dyn AnalysisBackend) -> Vec<CleanupWarning> {
        let remote = std::mem::take(&mut *lock(&self.remote_files));
        let local = std::mem::take(&mut *lock(&self.local_files));
        let mut warnings = Vec::new();

        for name in &remote {
            match backend.delete_file(name).await {
                Ok(()) => info!("Uploaded file {} deleted from remote", name),
                Err(e) => warnings.push(CleanupWarning {
                    artifact: name.clone(),
                    reason: format!("{:#}", e),
                }),
            }
        }

        for path in &local {
            if let Err(e) = remove_local(path).await {
                warnings.push(CleanupWarning {
                    artifact: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        if warnings.is_empty() {
            info!(
                "Temporary artifacts deleted ({} remote, {} local)",
                remote.len(),
                local.len()
            );
        }
        for warning in &warnings {
            warn!("Cleanup: {}", warning);
        }

        warnings
    }
}

/// Run `body`, then release whatever artifacts it tracked.
///
/// The body's result is returned untouched; cleanup failures only produce
/// warnings in the log. If the returned future is dropped before the body
/// finishes (a client hanging up, a timeout), release moves to a spawned task.
pub async fn with_scoped_artifacts<F, Fut, T, E>(
    backend: Arc<dyn AnalysisBackend>,
    body: F,
) -> Result<T, E>
where
    F: FnOnce(Arc<ScopedArtifacts>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let artifacts = Arc::new(ScopedArtifacts::new());
    let mut guard = ReleaseOnDrop {
        artifacts: Arc::clone(&artifacts),
        backend: Arc::clone(&backend),
        armed: true,
    };

    let outcome = body(Arc::clone(&artifacts)).await;

    guard.armed = false;
    let warnings = artifacts.release(backend.as_ref()).await;
    debug!("Cleanup finished with {} warnings", warnings.len());
    outcome
}

/// Releases the artifacts of a scope whose future was dropped mid-body
struct ReleaseOnDrop {
    artifacts: Arc<ScopedArtifacts>,
    backend: Arc<dyn AnalysisBackend>,
    armed: bool,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let artifacts = Arc::clone(&self.artifacts);
        let backend = Arc::clone(&self.backend);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Request cancelled; releasing its artifacts in the background");
                handle.spawn(
                    async move {
                        let warnings = artifacts.release(backend.as_ref()).await;
                        debug!("Cleanup finished with {} warnings", warnings.len());
                    }
                    .in_current_span(),
                );
            }
            Err(_) => warn!(
                "Request cancelled outside a runtime; leaving {} local and {} remote artifacts",
                artifacts.local_files().len(),
                artifacts.remote_files().len()
            ),
        }
    }
}

async fn remove_local(path: &Path) -> std::io::Result<()> {
    tokio::fs::remove_file(path).await
}

/// A poisoned lock only means another task panicked mid-push; the list is still usable
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
