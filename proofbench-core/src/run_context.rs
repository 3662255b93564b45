//! Per-run context: where artifacts go, what time it is, and the random
//! source used for partitioning.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Destination for run artifacts.
pub trait OutputSink: Send {
    /// Store `contents` under `name` and return a locator for it.
    fn write_artifact(&mut self, name: &str, contents: &str) -> Result<String>;
}

/// Writes artifacts as files in a directory, created on first write.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// `~` in `dir` is expanded.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let raw = dir.as_ref().to_string_lossy();
        Self {
            dir: PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl OutputSink for DirectorySink {
    fn write_artifact(&mut self, name: &str, contents: &str) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, contents)?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote artifact");
        Ok(path.display().to_string())
    }
}

/// Keeps artifacts in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every artifact written so far, in write order.
    pub fn artifacts(&self) -> Vec<(String, String)> {
        self.artifacts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    /// Contents of the latest artifact named `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.artifacts()
            .into_iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, contents)| contents)
    }
}

impl OutputSink for MemorySink {
    fn write_artifact(&mut self, name: &str, contents: &str) -> Result<String> {
        self.artifacts
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock memory sink: {}", e)))?
            .push((name.to_string(), contents.to_string()));
        Ok(format!("memory://{}", name))
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Everything a run needs from its environment.
pub struct RunContext {
    run_id: Uuid,
    sink: Box<dyn OutputSink>,
    clock: Box<dyn Clock>,
    rng: StdRng,
}

impl RunContext {
    /// Context with the system clock and an entropy-seeded generator.
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sink: Box::new(sink),
            clock: Box::new(SystemClock),
            rng: StdRng::from_entropy(),
        }
    }

    /// Context with a deterministic generator.
    pub fn seeded(sink: impl OutputSink + 'static, seed: u64) -> Self {
        Self::new(sink).with_seed(seed)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn sink_mut(&mut self) -> &mut dyn OutputSink {
        self.sink.as_mut()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Timestamp used in artifact names, e.g. `19_10__14_03_59`.
    pub fn stamp(&self) -> String {
        self.clock.now().format("%d_%m__%H_%M_%S").to_string()
    }
}
