use crate::completer::{OutcomeHandler, WorkFactory};
use crate::config::ThrottleConfig;
use crate::ids::{IdSupplier, SequentialIds};
use crate::timeout::TimeoutScheduler;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use super::core::{Inner, ThrottleManager};

/// Builder for [`ThrottleManager`].
///
/// A work factory and an outcome handler are required. Id suppliers default
/// to independent [`SequentialIds`]; the runtime defaults to the one the
/// builder is called from.
pub struct ThrottleManagerBuilder<T> {
    config: ThrottleConfig,
    factory: Option<Arc<dyn WorkFactory<T>>>,
    handler: Option<Arc<dyn OutcomeHandler<T>>>,
    batch_ids: Option<Arc<dyn IdSupplier>>,
    request_ids: Option<Arc<dyn IdSupplier>>,
    runtime: Option<Handle>,
}

impl<T: Send + Sync + 'static> ThrottleManagerBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: ThrottleConfig::default(),
            factory: None,
            handler: None,
            batch_ids: None,
            request_ids: None,
            runtime: None,
        }
    }

    pub fn config(mut self, config: ThrottleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.config = self.config.with_max_in_flight(n);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config = self.config.with_max_retries(retries);
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_request_delay(delay);
        self
    }

    pub fn factory(mut self, factory: impl WorkFactory<T> + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn on_outcome(mut self, handler: impl OutcomeHandler<T> + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn batch_ids(mut self, supplier: impl IdSupplier + 'static) -> Self {
        self.batch_ids = Some(Arc::new(supplier));
        self
    }

    pub fn request_ids(mut self, supplier: impl IdSupplier + 'static) -> Self {
        self.request_ids = Some(Arc::new(supplier));
        self
    }

    /// Run timers and actions on this runtime instead of the ambient one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<ThrottleManager<T>> {
        self.config.validate()?;

        let factory = self.factory.ok_or_else(|| {
            Error::configuration_with_context(
                "a work factory is required",
                ErrorContext::new()
                    .with_field_path("factory")
                    .with_source("builder"),
            )
        })?;
        let handler = self.handler.ok_or_else(|| {
            Error::configuration_with_context(
                "an outcome handler is required",
                ErrorContext::new()
                    .with_field_path("on_outcome")
                    .with_source("builder"),
            )
        })?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| {
                Error::runtime_with_context(
                    "no tokio runtime available",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("builder"),
                )
            })?,
        };

        let batch_ids = self
            .batch_ids
            .unwrap_or_else(|| Arc::new(SequentialIds::new()));
        let request_ids = self
            .request_ids
            .unwrap_or_else(|| Arc::new(SequentialIds::new()));

        Ok(ThrottleManager {
            inner: Arc::new(Inner::new(
                self.config,
                factory,
                handler,
                batch_ids,
                request_ids,
                TimeoutScheduler::new(runtime),
            )),
        })
    }
}

impl<T: Send + Sync + 'static> Default for ThrottleManagerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
