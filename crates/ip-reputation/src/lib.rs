//! IP reputation readings for the reputation sub-scorer.
//!
//! Reputation is a risk value in [0, 100]: blocklisted addresses read 100,
//! allowlisted addresses read 0, everything else reads the neutral 50. Lists
//! are CIDR files loaded into prefix tries behind `ArcSwap`, so they can be
//! hot-reloaded without blocking lookups in the request path.

mod prefix_set;

use std::io::BufRead;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use botshield_bot_score::{ReputationReading, ReputationSignal};
use ipnet::IpNet;
use tracing::{debug, info, warn};

use crate::prefix_set::PrefixSet;

/// Reputation read for an address on neither list.
pub const NEUTRAL_REPUTATION: u8 = 50;

/// Reputation lists backing the IP-reputation sub-scorer and the
/// `ip_reputation` rule condition.
pub struct ReputationList {
    blocklist: ArcSwap<PrefixSet>,
    allowlist: ArcSwap<PrefixSet>,
}

impl ReputationList {
    pub fn new() -> Self {
        Self {
            blocklist: ArcSwap::from_pointee(PrefixSet::new()),
            allowlist: ArcSwap::from_pointee(PrefixSet::new()),
        }
    }

    /// Load the blocklist from a file with one IP or CIDR per line. Empty
    /// lines and `#` comments are skipped; bare addresses become /32 or
    /// /128 entries. The new trie is swapped in atomically.
    ///
    /// Returns the number of entries loaded.
    pub fn load_blocklist(&self, path: &Path) -> anyhow::Result<usize> {
        let set = load_set_from_file(path)?;
        let count = set.len();
        self.blocklist.store(Arc::new(set));
        info!(path = %path.display(), count, "loaded reputation blocklist");
        Ok(count)
    }

    /// Load the allowlist; same format as [`Self::load_blocklist`].
    pub fn load_allowlist(&self, path: &Path) -> anyhow::Result<usize> {
        let set = load_set_from_file(path)?;
        let count = set.len();
        self.allowlist.store(Arc::new(set));
        info!(path = %path.display(), count, "loaded reputation allowlist");
        Ok(count)
    }

    /// Reputation for an address. The allowlist wins when an address is on
    /// both lists.
    pub fn reputation(&self, addr: IpAddr) -> u8 {
        if self.allowlist.load().contains(addr) {
            0
        } else if self.blocklist.load().contains(addr) {
            100
        } else {
            NEUTRAL_REPUTATION
        }
    }

    /// Map a reputation reading to the score contribution used by the bot
    /// scorer.
    pub fn contribution(reputation: u8) -> u8 {
        if reputation >= 80 {
            30
        } else if reputation >= 60 {
            15
        } else {
            0
        }
    }

    /// Reload both lists from config paths. A `None` path resets the
    /// corresponding list to empty; a failing load leaves the existing list
    /// untouched.
    pub fn reload_from_config(
        &self,
        blocklist_path: Option<&Path>,
        allowlist_path: Option<&Path>,
    ) -> anyhow::Result<()> {
        match blocklist_path {
            Some(path) => {
                self.load_blocklist(path)?;
            }
            None => {
                self.blocklist.store(Arc::new(PrefixSet::new()));
                debug!("cleared reputation blocklist (no path configured)");
            }
        }

        match allowlist_path {
            Some(path) => {
                self.load_allowlist(path)?;
            }
            None => {
                self.allowlist.store(Arc::new(PrefixSet::new()));
                debug!("cleared reputation allowlist (no path configured)");
            }
        }

        Ok(())
    }
}

impl Default for ReputationList {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReputationSignal for ReputationList {
    async fn sample(&self, client_ip: IpAddr) -> anyhow::Result<ReputationReading> {
        let reputation = self.reputation(client_ip);
        Ok(ReputationReading {
            reputation,
            contribution: Self::contribution(reputation),
        })
    }
}

fn load_set_from_file(path: &Path) -> anyhow::Result<PrefixSet> {
    let file = std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", path.display(), e))?;
    let reader = std::io::BufReader::new(file);

    let mut set = PrefixSet::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Ok(network) = trimmed.parse::<IpNet>() {
            set.insert(network);
        } else if let Ok(addr) = trimmed.parse::<IpAddr>() {
            let prefix = match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            set.insert(IpNet::new(addr, prefix).expect("host prefix length is valid"));
        } else {
            warn!(
                path = %path.display(),
                line = line_num + 1,
                content = trimmed,
                "skipping unparseable reputation entry"
            );
        }
    }

    Ok(set)
}
