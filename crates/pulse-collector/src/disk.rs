use anyhow::{bail, Result};
use pulse_common::types::{percent_of, DiskStats};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;
use sysinfo::Disks;

/// Cumulative I/O counters at the start of a sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoMark {
    read: u64,
    written: u64,
}

pub struct DiskCollector {
    disks: Disks,
}

impl DiskCollector {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }

    /// Records the I/O counters so `collect` can report the delta.
    pub fn mark(&mut self) -> IoMark {
        self.disks.refresh(true);
        self.io_totals()
    }

    /// Space usage of the root filesystem plus bytes read and written since
    /// `start`.
    pub fn collect(&mut self, start: IoMark) -> Result<DiskStats> {
        self.disks.refresh(true);
        if self.disks.list().is_empty() {
            bail!("no disks reported by the OS");
        }

        let root = self
            .disks
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"));
        let (total, available) = match root {
            Some(disk) => (disk.total_space(), disk.available_space()),
            None => self.disks.iter().fold((0, 0), |(t, a), disk| {
                (t + disk.total_space(), a + disk.available_space())
            }),
        };
        let used = total.saturating_sub(available);
        let end = self.io_totals();

        Ok(DiskStats {
            used,
            total,
            percent: percent_of(used, total),
            read_bytes: end.read.saturating_sub(start.read),
            write_bytes: end.written.saturating_sub(start.written),
        })
    }

    fn io_totals(&self) -> IoMark {
        sum_by_device(self.disks.iter().map(|disk| {
            let usage = disk.usage();
            (
                disk.name(),
                usage.total_read_bytes,
                usage.total_written_bytes,
            )
        }))
    }
}

/// Sums I/O counters once per device. A device mounted at several points
/// (bind mounts, btrfs subvolumes) is listed once per mount with the same
/// counters.
fn sum_by_device<'a>(entries: impl IntoIterator<Item = (&'a OsStr, u64, u64)>) -> IoMark {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|(name, _, _)| seen.insert(*name))
        .fold(IoMark::default(), |acc, (_, read, written)| IoMark {
            read: acc.read + read,
            written: acc.written + written,
        })
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_mounted_twice_is_counted_once() {
        let root = OsStr::new("/dev/sda1");
        let data = OsStr::new("/dev/sdb1");
        let totals = sum_by_device([(root, 100, 40), (root, 100, 40), (data, 7, 3)]);
        assert_eq!(
            totals,
            IoMark {
                read: 107,
                written: 43
            }
        );
    }
}
