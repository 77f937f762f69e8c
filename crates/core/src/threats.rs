//! Collection of signature names seen during a search.

use std::collections::BTreeSet;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

/// Distinct signature names, sorted for stable output.
pub type ThreatSet = BTreeSet<String>;

/// Handle to the collector thread.
pub struct ThreatCollector {
    handle: JoinHandle<Vec<String>>,
}

impl ThreatCollector {
    /// Spawn a thread that drains `names` until every sender is dropped.
    pub fn spawn(names: Receiver<String>) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name("threat-collector".into())
            .spawn(move || names.iter().collect::<Vec<_>>())?;
        Ok(Self { handle })
    }

    /// Wait for the collector and return every name it received, in arrival order.
    pub fn join(self) -> thread::Result<Vec<String>> {
        self.handle.join()
    }
}

/// Collapse duplicate names.
pub fn dedup<I>(names: I) -> ThreatSet
where
    I: IntoIterator<Item = String>,
{
    names.into_iter().collect()
}
