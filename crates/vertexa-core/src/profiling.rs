//! Profiling utilities based on the `puffin` crate.
//!
//! Scopes are recorded only while profiling is switched on, so the
//! `profile_function!` calls sprinkled through the draw path cost a single
//! atomic load otherwise.

#[cfg(feature = "profiling")]
use std::sync::OnceLock;

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Profiling backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Only record scopes in-process (no server).
    InProcess,
    /// Send profiling data to puffin_viewer via HTTP.
    #[cfg(feature = "profiling")]
    PuffinHttp,
}

/// Address the puffin HTTP server listens on.
#[cfg(feature = "profiling")]
pub const PUFFIN_HTTP_ADDR: &str = "0.0.0.0:8585";

/// Global profiling server instance.
#[cfg(feature = "profiling")]
static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

/// Initialize profiling with the specified backend.
///
/// # Example
/// ```no_run
/// use vertexa_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::InProcess);
/// ```
pub fn init_profiling(backend: ProfilingBackend) {
    puffin::set_scopes_on(true);

    match backend {
        ProfilingBackend::InProcess => {
            tracing::debug!("Puffin scopes enabled (in-process)");
        }
        #[cfg(feature = "profiling")]
        ProfilingBackend::PuffinHttp => match puffin_http::Server::new(PUFFIN_HTTP_ADDR) {
            Ok(server) => {
                tracing::info!("Puffin profiler server started on http://{}", PUFFIN_HTTP_ADDR);

                // Keep the server alive for the rest of the process
                let _ = PROFILING_SERVER.set(server);
            }
            Err(e) => {
                tracing::error!("Failed to start puffin server: {}", e);
            }
        },
    }
}

/// Whether scopes are currently being recorded.
#[inline]
pub fn is_enabled() -> bool {
    puffin::are_scopes_on()
}

/// Stop recording scopes.
pub fn disable_profiling() {
    puffin::set_scopes_on(false);
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per frame so the scopes of every draw prepared during the
/// frame are grouped together.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
