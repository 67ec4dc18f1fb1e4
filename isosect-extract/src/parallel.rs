//! Parallel section extraction
//!
//! This module provides configurable thread pool management for extracting
//! the sections of one process concurrently. Each section gets its own dedup
//! map, so vertices on seams between sections are duplicated; the per-section
//! meshes are concatenated in section order, which keeps the result
//! independent of scheduling.

use crate::decomposition::Section;
use crate::marching_cubes::MarchingCubes;
use isosect_core::{Error, Result, TriangleMesh, Volume};
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, Mutex, OnceLock};

/// Global thread pool for section extraction
static GLOBAL_THREAD_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static THREAD_POOL_CONFIG: Mutex<ThreadPoolConfig> = Mutex::new(ThreadPoolConfig::new());

/// Thread pool configuration for parallel extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    /// Number of threads to use (None = automatic)
    pub num_threads: Option<usize>,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
}

impl ThreadPoolConfig {
    const fn new() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            thread_name_prefix: String::new(),
            enabled: true,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn build(&self) -> Result<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new();

        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }

        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let prefix = if self.thread_name_prefix.is_empty() {
            "isosect-extract".to_string()
        } else {
            self.thread_name_prefix.clone()
        };
        builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));

        builder
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "isosect-extract".to_string(),
            ..Self::new()
        }
    }
}

/// Initialize the global thread pool with custom configuration
///
/// Has no effect on the pool once it exists, but the enable flag is always
/// updated.
pub fn init_thread_pool(config: ThreadPoolConfig) -> Result<()> {
    if GLOBAL_THREAD_POOL.get().is_none() {
        let pool = config.build()?;
        // Losing a race to another initializer is fine
        let _ = GLOBAL_THREAD_POOL.set(Arc::new(pool));
    }

    if let Ok(mut global_config) = THREAD_POOL_CONFIG.lock() {
        *global_config = config;
    }
    Ok(())
}

/// Get the global thread pool, initializing with defaults if needed
pub fn get_thread_pool() -> Result<Arc<ThreadPool>> {
    if let Some(pool) = GLOBAL_THREAD_POOL.get() {
        return Ok(pool.clone());
    }
    let pool = Arc::new(ThreadPoolConfig::default().build()?);
    Ok(GLOBAL_THREAD_POOL.get_or_init(|| pool).clone())
}

/// Get current thread pool configuration
pub fn get_config() -> ThreadPoolConfig {
    THREAD_POOL_CONFIG
        .lock()
        .map(|config| config.clone())
        .unwrap_or_else(|_| ThreadPoolConfig::default())
}

/// Check if parallel processing is enabled
pub fn is_parallel_enabled() -> bool {
    get_config().enabled
}

/// Number of threads section extraction runs on
pub fn current_num_threads() -> usize {
    if !is_parallel_enabled() {
        return 1;
    }
    get_thread_pool()
        .map(|pool| pool.current_num_threads())
        .unwrap_or(1)
}

/// Parallel map over a slice on the global pool, preserving order
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    if !is_parallel_enabled() || data.len() < 2 {
        return Ok(data.iter().map(f).collect());
    }

    let pool = get_thread_pool()?;
    Ok(pool.install(|| data.par_iter().map(f).collect()))
}

/// Extract each section with its own dedup map and concatenate in section order
pub fn extract_sections_parallel(
    marching_cubes: &MarchingCubes,
    volume: &Volume,
    sections: &[Section],
) -> Result<TriangleMesh> {
    let parts = parallel_map(sections, |section| {
        marching_cubes.extract_sections(volume, std::slice::from_ref(section))
    })?;

    let mut mesh = TriangleMesh::new();
    for part in parts {
        mesh.append(part?);
    }

    debug!(
        "Extracted {} sections on {} threads: {} vertices, {} triangles",
        sections.len(),
        current_num_threads(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}
