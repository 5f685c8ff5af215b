use anyhow::Result;
use pulse_common::types::NetworkStats;
use sysinfo::Networks;

/// Byte counters summed over all interfaces at the start of a window.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficMark {
    received: u64,
    transmitted: u64,
}

pub struct NetworkCollector {
    networks: Networks,
}

impl NetworkCollector {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }

    pub fn mark(&mut self) -> TrafficMark {
        self.networks.refresh(true);
        self.totals()
    }

    /// Bytes in and out across all interfaces since `start`.
    ///
    /// Interfaces that disappear mid-window make the totals shrink; the
    /// delta saturates at zero instead of wrapping.
    pub fn collect(&mut self, start: TrafficMark) -> Result<NetworkStats> {
        self.networks.refresh(true);
        let end = self.totals();
        Ok(NetworkStats {
            in_bytes: end.received.saturating_sub(start.received),
            out_bytes: end.transmitted.saturating_sub(start.transmitted),
        })
    }

    fn totals(&self) -> TrafficMark {
        self.networks
            .iter()
            .fold(TrafficMark::default(), |acc, (_name, data)| TrafficMark {
                received: acc.received + data.total_received(),
                transmitted: acc.transmitted + data.total_transmitted(),
            })
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}
