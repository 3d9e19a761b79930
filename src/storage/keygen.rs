//! Key generation strategies.
//!
//! The strategy is chosen once at startup and never changes for the lifetime of
//! the process. Custom generators are looked up by name in a registry of
//! constructor functions filled by code, not discovered at runtime.

use crate::domain::record::RecordId;
use crate::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub trait KeyGenerator: Send + Sync + fmt::Debug {
    fn generate(&self) -> RecordId;
}

/// Millisecond timestamps, strictly increasing within the process.
///
/// When two calls land on the same millisecond (or the clock steps back) the
/// previous value plus one is used instead.
#[derive(Debug, Default)]
pub struct TimeOrderedKeyGen {
    last: AtomicI64,
}

impl TimeOrderedKeyGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

impl KeyGenerator for TimeOrderedKeyGen {
    fn generate(&self) -> RecordId {
        RecordId::Text(self.next_millis().to_string())
    }
}

/// Integer keys counting up from the process start time in milliseconds.
///
/// Suits integer key columns that are not auto-increment. Registered as
/// `sequence` by [`KeyGeneratorRegistry::builtin`].
#[derive(Debug)]
pub struct SequenceKeyGen {
    next: AtomicI64,
}

impl SequenceKeyGen {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequenceKeyGen {
    fn default() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }
}

impl KeyGenerator for SequenceKeyGen {
    fn generate(&self) -> RecordId {
        RecordId::Int(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

fn sequence_generator() -> Arc<dyn KeyGenerator> {
    Arc::new(SequenceKeyGen::default())
}

pub type KeyGeneratorConstructor = fn() -> Arc<dyn KeyGenerator>;

/// Name → constructor table for custom generators.
#[derive(Clone, Default)]
pub struct KeyGeneratorRegistry {
    constructors: HashMap<String, KeyGeneratorConstructor>,
}

impl KeyGeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generators shipped with the crate, selectable through `KEY_GENERATOR`.
    /// Applications register their own on top with [`register`](Self::register).
    pub fn builtin() -> Self {
        Self::new().with("sequence", sequence_generator)
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: KeyGeneratorConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn with(mut self, name: impl Into<String>, constructor: KeyGeneratorConstructor) -> Self {
        self.register(name, constructor);
        self
    }

    pub fn construct(&self, name: &str) -> Option<Arc<dyn KeyGenerator>> {
        self.constructors.get(name).map(|ctor| ctor())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for KeyGeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGeneratorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// The process-wide key strategy.
#[derive(Debug, Clone)]
pub enum KeyGeneration {
    /// Keys generated locally before insert.
    TimeOrdered(Arc<TimeOrderedKeyGen>),
    /// No client-side key: the insert omits the key field and the store assigns it.
    StoreDelegated,
    /// A generator resolved by name from a [`KeyGeneratorRegistry`].
    Custom {
        name: String,
        generator: Arc<dyn KeyGenerator>,
    },
}

impl Default for KeyGeneration {
    fn default() -> Self {
        KeyGeneration::TimeOrdered(Arc::new(TimeOrderedKeyGen::new()))
    }
}

impl KeyGeneration {
    /// Resolves a configured strategy name: `time` (or `timemillis`), `store`
    /// (or `db`), otherwise a custom generator name.
    pub fn resolve(name: &str, registry: &KeyGeneratorRegistry) -> RepositoryResult<Self> {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "time" | "timemillis" => Ok(KeyGeneration::default()),
            "store" | "db" => Ok(KeyGeneration::StoreDelegated),
            _ => registry
                .construct(trimmed)
                .map(|generator| KeyGeneration::Custom {
                    name: trimmed.to_string(),
                    generator,
                })
                .ok_or_else(|| RepositoryError::unresolved("key generator", trimmed)),
        }
    }

    pub fn is_store_delegated(&self) -> bool {
        matches!(self, KeyGeneration::StoreDelegated)
    }

    /// A fresh key, or `None` when the store assigns keys.
    pub fn next_key(&self) -> Option<RecordId> {
        match self {
            KeyGeneration::TimeOrdered(gen) => Some(gen.generate()),
            KeyGeneration::StoreDelegated => None,
            KeyGeneration::Custom { generator, .. } => Some(generator.generate()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            KeyGeneration::TimeOrdered(_) => "time",
            KeyGeneration::StoreDelegated => "store",
            KeyGeneration::Custom { name, .. } => name,
        }
    }
}
