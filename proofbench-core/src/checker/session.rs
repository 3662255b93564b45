//! Scoped checker session with a poisoned flag and a single restart path.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{CheckerAdapter, CheckerFactory};

/// Handle owning at most one live checker adapter.
///
/// The session is acquired once per run. An unexpected checker failure
/// poisons it; the next [`ensure_healthy`](Self::ensure_healthy) or an
/// explicit [`restart`](Self::restart) replaces the adapter. Release is
/// idempotent and also attempted on drop.
pub struct CheckerSession<F: CheckerFactory> {
    factory: F,
    adapter: Option<F::Adapter>,
    poisoned: Option<String>,
    restarts: u32,
}

impl<F: CheckerFactory> CheckerSession<F> {
    /// Open the first adapter.
    pub fn acquire(factory: F) -> Result<Self> {
        let adapter = factory.open()?;
        debug!("Checker session acquired");
        Ok(Self {
            factory,
            adapter: Some(adapter),
            poisoned: None,
            restarts: 0,
        })
    }

    /// The live adapter. Fails once the session has been released.
    pub fn adapter_mut(&mut self) -> Result<&mut F::Adapter> {
        self.adapter
            .as_mut()
            .ok_or_else(|| Error::Internal("checker session already released".to_string()))
    }

    /// Mark the adapter as unusable.
    pub fn poison(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Checker session poisoned");
        self.poisoned = Some(reason);
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Number of restarts performed so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn is_released(&self) -> bool {
        self.adapter.is_none()
    }

    /// Restart if poisoned, otherwise do nothing.
    pub fn ensure_healthy(&mut self) -> Result<()> {
        if self.is_poisoned() {
            self.restart()?;
        }
        Ok(())
    }

    /// Exit the current adapter and open a new one.
    pub fn restart(&mut self) -> Result<()> {
        if let Some(mut old) = self.adapter.take() {
            if let Err(e) = old.exit() {
                warn!(error = %e, "Failed to exit checker before restart");
            }
        }
        self.adapter = Some(self.factory.open()?);
        self.poisoned = None;
        self.restarts += 1;
        info!(restarts = self.restarts, "Checker session restarted");
        Ok(())
    }

    /// Exit the adapter. Later calls are no-ops.
    pub fn release(&mut self) -> Result<()> {
        match self.adapter.take() {
            Some(mut adapter) => {
                debug!("Releasing checker session");
                adapter.exit()
            }
            None => Ok(()),
        }
    }
}

impl<F: CheckerFactory> Drop for CheckerSession<F> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "Failed to release checker session on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockCheckerFactory;

    #[test]
    fn test_release_is_idempotent() {
        let factory = MockCheckerFactory::default();
        let stats = factory.stats();
        let mut session = CheckerSession::acquire(factory).unwrap();

        session.release().unwrap();
        session.release().unwrap();
        assert!(session.is_released());
        assert!(session.adapter_mut().is_err());
        drop(session);

        let stats = stats.lock().unwrap();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.exits, 1);
    }

    #[test]
    fn test_poison_and_restart() {
        let factory = MockCheckerFactory::default();
        let stats = factory.stats();
        let mut session = CheckerSession::acquire(factory).unwrap();

        session.ensure_healthy().unwrap();
        assert_eq!(session.restarts(), 0);

        session.poison("broken pipe");
        assert!(session.is_poisoned());
        session.ensure_healthy().unwrap();
        assert!(!session.is_poisoned());
        assert_eq!(session.restarts(), 1);

        drop(session);
        let stats = stats.lock().unwrap();
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.exits, 2);
    }
}
