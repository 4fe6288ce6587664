//! Typed handler registry.
//!
//! Handlers are registered for a concrete payload type. The registry stores a
//! type-erased closure that decodes the raw payload into that type and calls
//! the handler, so one untyped queue can feed any number of payload schemas.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

type Invoke = dyn Fn(&RawValue) -> Result<(), serde_json::Error> + Send + Sync;

/// Decode-and-invoke bundle for one discriminator. Immutable once built.
pub struct HandlerDescriptor {
    payload_type: &'static str,
    invoke: Box<Invoke>,
}

impl HandlerDescriptor {
    /// Bind a typed callback to its payload type.
    pub fn new<T, F>(handler: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            payload_type: type_name::<T>(),
            invoke: Box::new(move |raw: &RawValue| {
                let payload: T = serde_json::from_str(raw.get())?;
                handler(&payload);
                Ok(())
            }),
        }
    }

    /// Full type name of the payload this handler expects.
    pub fn payload_type(&self) -> &'static str {
        self.payload_type
    }

    /// Decode `raw` and run the handler. The handler is not called when decoding fails.
    pub fn invoke(&self, raw: &RawValue) -> Result<(), serde_json::Error> {
        (self.invoke)(raw)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("payload_type", &self.payload_type)
            .finish_non_exhaustive()
    }
}

/// Concurrent map from event discriminator to handler.
///
/// Last registration for a discriminator wins.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<HandlerDescriptor>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under the short type name of `T`.
    ///
    /// Returns the discriminator used.
    pub fn register<T, F>(&self, handler: F) -> String
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let discriminator = event_type_name::<T>().to_string();
        self.register_as::<T, F>(discriminator.clone(), handler);
        discriminator
    }

    /// Register `handler` under an explicit discriminator.
    pub fn register_as<T, F>(&self, discriminator: impl Into<String>, handler: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(discriminator, HandlerDescriptor::new::<T, F>(handler));
    }

    /// Store a prebuilt descriptor, replacing any previous one.
    pub fn insert(&self, discriminator: impl Into<String>, descriptor: HandlerDescriptor) {
        self.handlers
            .insert(discriminator.into(), Arc::new(descriptor));
    }

    /// Find the handler for a discriminator.
    pub fn lookup(&self, discriminator: &str) -> Option<Arc<HandlerDescriptor>> {
        self.handlers
            .get(discriminator)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the handler for a discriminator. Returns whether one was registered.
    pub fn unregister(&self, discriminator: &str) -> bool {
        self.handlers.remove(discriminator).is_some()
    }

    pub fn contains(&self, discriminator: &str) -> bool {
        self.handlers.contains_key(discriminator)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered discriminators, in no particular order.
    pub fn discriminators(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Discriminator derived from a payload type: its name without module path
/// or generic arguments.
///
/// `my_app::events::Ping` becomes `"Ping"`.
pub fn event_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
