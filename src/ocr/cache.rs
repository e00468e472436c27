use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::{Error, Result};

type Factory<E> = Box<dyn Fn() -> Result<E> + Send + Sync>;

/// Lazily built, shared recognition engine.
///
/// The factory runs at most once successfully; every later [`get`](Self::get)
/// returns the same `Arc`. Construction is serialized so concurrent first
/// callers never load the model twice. A failed construction is reported to
/// its caller and nothing is stored.
pub struct EngineCache<E> {
    engine: OnceLock<Arc<E>>,
    init_lock: Mutex<()>,
    factory: Factory<E>,
}

impl<E> EngineCache<E> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<E> + Send + Sync + 'static,
    {
        Self {
            engine: OnceLock::new(),
            init_lock: Mutex::new(()),
            factory: Box::new(factory),
        }
    }

    /// Cache that already holds `engine`.
    pub fn with_engine(engine: E) -> Self
    where
        E: 'static,
    {
        let cache = Self::new(|| {
            Err(Error::InvalidArgument(
                "engine cache was seeded; factory must not run".to_string(),
            ))
        });
        let _ = cache.engine.set(Arc::new(engine));
        cache
    }

    /// Return the shared engine, building it on first use.
    ///
    /// GPU inference is never used; a request for it is logged and served
    /// the CPU engine.
    pub fn get(&self, gpu_requested: bool) -> Result<Arc<E>> {
        if gpu_requested {
            log::warn!("GPU acceleration requested but not available; using the CPU-only engine");
        }

        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }

        let start = std::time::Instant::now();
        log::info!("Constructing recognition engine");
        let engine = (self.factory)().map_err(|e| Error::EngineConstruction(Box::new(e)))?;
        let engine = Arc::new(engine);
        let _ = self.engine.set(Arc::clone(&engine));
        log::info!("Recognition engine ready in {:.3?}", start.elapsed());

        Ok(engine)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    use super::*;
    use crate::error::ErrorKind;

    fn counting_cache(counter: Arc<AtomicUsize>) -> EngineCache<usize> {
        EngineCache::new(move || Ok(counter.fetch_add(1, Ordering::SeqCst)))
    }

    #[test]
    fn returns_same_instance_regardless_of_gpu_flag() {
        let builds = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&builds));
        assert!(!cache.is_initialized());

        let first = cache.get(false).unwrap();
        for gpu in [true, false, true, true, false] {
            let next = cache.get(gpu).unwrap();
            assert!(Arc::ptr_eq(&first, &next));
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(cache.is_initialized());
    }

    #[test]
    fn concurrent_first_use_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let slow = Arc::clone(&builds);
        let cache = Arc::new(EngineCache::new(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(slow.fetch_add(1, Ordering::SeqCst))
        }));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.get(false).unwrap()
                })
            })
            .collect();
        let engines: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
    }

    #[test]
    fn construction_failure_is_reported_and_not_cached() {
        let cache: EngineCache<()> = EngineCache::new(|| {
            Err(Error::not_found(
                "detection model",
                std::path::Path::new("missing.rten"),
            ))
        });

        let err = cache.get(false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineConstruction);
        assert!(!cache.is_initialized());
    }

    #[test]
    fn seeded_cache_never_runs_factory() {
        let cache = EngineCache::with_engine(7u32);
        assert_eq!(*cache.get(false).unwrap(), 7);
    }
}
