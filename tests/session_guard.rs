use anyhow::Result;
use gtm_audit::oracle::{BrowserSession, RawScriptReport, SessionGuard};
use std::cell::Cell;

struct CountingSession<'a> {
    releases: &'a Cell<u32>,
}

impl BrowserSession for CountingSession<'_> {
    fn measure(&mut self, url: &str) -> Result<RawScriptReport> {
        Ok(RawScriptReport {
            page_url: url.to_string(),
            entries: vec![],
        })
    }

    fn release(&mut self) -> Result<()> {
        self.releases.set(self.releases.get() + 1);
        Ok(())
    }
}

#[test]
fn finish_then_drop_releases_once() {
    let releases = Cell::new(0);
    let guard = SessionGuard::new(Box::new(CountingSession {
        releases: &releases,
    }));
    guard.finish().unwrap();
    assert_eq!(releases.get(), 1);
}

#[test]
fn drop_alone_releases() {
    let releases = Cell::new(0);
    {
        let mut guard = SessionGuard::new(Box::new(CountingSession {
            releases: &releases,
        }));
        guard.measure("https://a.com").unwrap();
    }
    assert_eq!(releases.get(), 1);
}
