//! Ordered provider fallback chains
//!
//! The priority between providers is data: a list of `(source, extract)`
//! pairs evaluated front to back until one extractor yields a value.

use crate::models::Provider;

type Extractor<'a, K, V> = Box<dyn Fn(K) -> Option<V> + 'a>;

pub struct FallbackChain<'a, K, V> {
    steps: Vec<(Provider, Extractor<'a, K, V>)>,
}

impl<'a, K: Copy, V> FallbackChain<'a, K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a lower-priority step
    #[must_use]
    pub fn then(mut self, source: Provider, extract: impl Fn(K) -> Option<V> + 'a) -> Self {
        self.steps.push((source, Box::new(extract)));
        self
    }

    /// First value produced for `key`, tagged with the step's source
    pub fn resolve(&self, key: K) -> Option<(Provider, V)> {
        self.candidates(key).next()
    }

    /// Every value produced for `key` in priority order. Steps run lazily,
    /// only as far as the iterator is consumed.
    pub fn candidates(&self, key: K) -> impl Iterator<Item = (Provider, V)> + '_ {
        self.steps
            .iter()
            .filter_map(move |(source, extract)| extract(key).map(|value| (*source, value)))
    }

    /// Sources in priority order
    #[must_use]
    pub fn order(&self) -> Vec<Provider> {
        self.steps.iter().map(|(source, _)| *source).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<K: Copy, V> Default for FallbackChain<'_, K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, de-duplicated list of contributing providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLedger {
    sources: Vec<Provider>,
}

impl SourceLedger {
    pub fn record(&mut self, source: Provider) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[Provider] {
        &self.sources
    }

    /// Display string, e.g. "OpenAQ, Open-Meteo"
    #[must_use]
    pub fn joined(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
