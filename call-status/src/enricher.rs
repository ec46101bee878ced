use crate::error_aggregator::{AggregatedError, BoxError, ErrorAggregator};
use futures::stream::{self, StreamExt};
use interfaces::defs::{AudioArtifact, Photo, PublicUrlResolver};
use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;

/// Bounded fan-out of per-key lookups whose results are written back into a
/// collection owned by the caller.
///
/// At most `max_parallelism` lookups are in flight; the rest wait their turn.
/// A failed lookup is recorded and never cancels its siblings. `enrich` only
/// returns once every lookup has finished.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentEnricher {
    max_parallelism: usize,
}

impl ConcurrentEnricher {
    pub fn new(max_parallelism: usize) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
        }
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Resolve every distinct non-empty key and hand each success to `apply`.
    ///
    /// `apply` runs on the draining side of the stream, one call at a time,
    /// so it may mutate state that is not safe to share.
    pub async fn enrich<I, K, R, Fut, V, E, A>(
        &self,
        keys: I,
        resolve: R,
        mut apply: A,
    ) -> Result<(), AggregatedError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
        R: Fn(String) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Into<BoxError>,
        A: FnMut(&str, V),
    {
        let keys = unique_keys(keys);
        if keys.is_empty() {
            return Ok(());
        }

        let failures = ErrorAggregator::new();
        let mut outcomes = stream::iter(keys)
            .map(|key| {
                let lookup = resolve(key.clone());
                async move { (key, lookup.await) }
            })
            .buffer_unordered(self.max_parallelism);

        while let Some((key, outcome)) = outcomes.next().await {
            match outcome {
                Ok(value) => apply(&key, value),
                Err(err) => failures.add(KeyError {
                    key,
                    source: err.into(),
                }),
            }
        }

        match failures.collapse() {
            Some(aggregate) => Err(aggregate),
            None => Ok(()),
        }
    }

    /// Fill `url` of every artifact. Artifacts sharing a storage path are
    /// resolved once; artifacts without a path are left alone.
    pub async fn enrich_audio_urls(
        &self,
        artifacts: &mut [AudioArtifact],
        resolver: &dyn PublicUrlResolver,
    ) -> Result<(), AggregatedError> {
        self.enrich_urls(artifacts, audio_path, set_audio_url, resolver).await
    }

    pub async fn enrich_photo_urls(
        &self,
        photos: &mut [Photo],
        resolver: &dyn PublicUrlResolver,
    ) -> Result<(), AggregatedError> {
        self.enrich_urls(photos, photo_path, set_photo_url, resolver).await
    }

    async fn enrich_urls<T>(
        &self,
        items: &mut [T],
        path_of: fn(&T) -> &str,
        set_url: fn(&mut T, &str),
        resolver: &dyn PublicUrlResolver,
    ) -> Result<(), AggregatedError> {
        let mut slots: HashMap<String, Vec<usize>> = HashMap::new();
        let mut paths = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let path = path_of(item);
            if path.is_empty() {
                continue;
            }
            slots
                .entry(path.to_string())
                .or_insert_with(|| {
                    paths.push(path.to_string());
                    Vec::new()
                })
                .push(index);
        }

        self.enrich(
            paths,
            |path| async move { resolver.public_url(&path).await },
            |path, url: String| {
                if let Some(indices) = slots.get(path) {
                    for &index in indices {
                        set_url(&mut items[index], &url);
                    }
                }
            },
        )
        .await
    }
}

fn unique_keys<I, K>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|key| key.as_ref().to_string())
        .filter(|key| !key.is_empty() && seen.insert(key.clone()))
        .collect()
}

fn audio_path(artifact: &AudioArtifact) -> &str {
    &artifact.storage_path
}

fn set_audio_url(artifact: &mut AudioArtifact, url: &str) {
    artifact.url = url.to_string();
}

fn photo_path(photo: &Photo) -> &str {
    &photo.storage_path
}

fn set_photo_url(photo: &mut Photo, url: &str) {
    photo.url = url.to_string();
}

/// A lookup failure tagged with the key it was for.
#[derive(Debug)]
pub struct KeyError {
    pub key: String,
    pub source: BoxError,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.source)
    }
}

impl StdError for KeyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}
