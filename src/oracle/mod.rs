pub mod lighthouse;
pub mod types;

use anyhow::Result;
use tracing::warn;

pub use types::{OracleDiag, RawScriptEntry, RawScriptReport};

/// A browser-backed source of per-script boot-up timings.
pub trait Oracle {
    fn doctor(&self) -> Result<OracleDiag>;
    /// Starts one browser that serves every measurement round for a URL.
    fn acquire(&self) -> Result<Box<dyn BrowserSession + '_>>;
}

pub trait BrowserSession {
    fn measure(&mut self, url: &str) -> Result<RawScriptReport>;
    fn release(&mut self) -> Result<()>;
}

/// Owns an acquired session and releases it exactly once: through
/// [`SessionGuard::finish`] on the normal path, or on drop otherwise.
pub struct SessionGuard<'a> {
    session: Box<dyn BrowserSession + 'a>,
    released: bool,
}

impl<'a> SessionGuard<'a> {
    pub fn new(session: Box<dyn BrowserSession + 'a>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn acquire(oracle: &'a dyn Oracle) -> Result<Self> {
        Ok(Self::new(oracle.acquire()?))
    }

    pub fn measure(&mut self, url: &str) -> Result<RawScriptReport> {
        if self.released {
            anyhow::bail!("browser session already released");
        }
        self.session.measure(url)
    }

    pub fn finish(mut self) -> Result<()> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.session.release()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release_once() {
            warn!("browser session release failed: {err:#}");
        }
    }
}
