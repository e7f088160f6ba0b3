//! Failure isolation for placement modules.
//!
//! Each module runs behind its own panic and error guard, so a failing
//! placement costs only its own adverts.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

use crate::CommercialError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorTags {
    pub feature: String,
    pub module: String,
}

/// Destination for swallowed module failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &CommercialError, tags: &ErrorTags);
}

/// Reports through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &CommercialError, tags: &ErrorTags) {
        error!(feature = %tags.feature, module = %tags.module, error = %error, "commercial module failed");
    }
}

pub type ModuleFuture<'a> = BoxFuture<'a, crate::Result<()>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    pub name: String,
    pub result: Result<(), CommercialError>,
}

impl ModuleOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Awaits `fut`, turning a panic into [`CommercialError::Panic`] and
/// forwarding any failure to `reporter`.
pub async fn run_safe<F, T>(name: &str, fut: F, reporter: &dyn ErrorReporter) -> crate::Result<T>
where
    F: Future<Output = crate::Result<T>>,
{
    let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(CommercialError::Panic(panic_message(&*panic))),
    };
    if let Err(err) = &outcome {
        reporter.report(
            err,
            &ErrorTags {
                feature: "commercial".to_string(),
                module: name.to_string(),
            },
        );
    }
    outcome
}

/// Runs every named module concurrently and returns one outcome per module,
/// in the order given.
pub async fn catch_errors_with_context(
    modules: Vec<(String, ModuleFuture<'_>)>,
    reporter: &dyn ErrorReporter,
) -> Vec<ModuleOutcome> {
    let runs = modules.into_iter().map(|(name, fut)| async move {
        debug!(module = %name, "starting commercial module");
        let result = run_safe(&name, fut, reporter).await;
        ModuleOutcome { name, result }
    });
    join_all(runs).await
}
