//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled, `profile_function!` and
//! `profile_scope!` expand to nothing.

#[cfg(feature = "profiling")]
pub use puffin::{profile_function, profile_scope};

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __larder_profile_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
pub use crate::__larder_profile_noop as profile_function;
#[cfg(not(feature = "profiling"))]
pub use crate::__larder_profile_noop as profile_scope;

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

/// Enable puffin scopes and serve them to `puffin_viewer` on `addr`.
///
/// # Example
/// ```no_run
/// larder_core::profiling::init_profiling("0.0.0.0:8585");
/// ```
#[cfg(feature = "profiling")]
pub fn init_profiling(addr: &str) {
    puffin::set_scopes_on(true);

    match puffin_http::Server::new(addr) {
        Ok(server) => {
            tracing::info!("Puffin profiler server started on http://{}", addr);
            let _ = PROFILING_SERVER.set(server);
        }
        Err(e) => {
            tracing::error!("Failed to start puffin server: {}", e);
        }
    }
}

/// Mark the start of a new profiling frame.
#[cfg(feature = "profiling")]
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped() -> u32 {
        profile_function!();
        profile_scope!("inner");
        7
    }

    #[test]
    fn test_macros_expand_in_functions() {
        assert_eq!(scoped(), 7);
    }
}
