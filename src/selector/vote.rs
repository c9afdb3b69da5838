//! Majority voting over short sample windows
//!
//! A single edge is not trusted. Before a channel is accepted its line (or
//! every line, when the triggering line has already dropped) is sampled a
//! fixed number of times and the asserted samples are counted.

use std::thread;
use std::time::Duration;

use crate::error::InputError;
use crate::input::InputLines;
use crate::selector::{ChannelId, ChannelTable};

/// Voting parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteConfig {
    /// Samples taken per line
    pub samples: usize,
    /// Asserted samples needed to confirm a channel
    pub threshold: usize,
    /// Pause after each sampling pass
    pub interval: Duration,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            samples: crate::constants::DEFAULT_SAMPLE_COUNT,
            threshold: crate::constants::DEFAULT_CONFIRM_THRESHOLD,
            interval: Duration::from_millis(crate::constants::DEFAULT_SAMPLE_INTERVAL_MS),
        }
    }
}

/// Ordered `(channel, level)` observations from one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleWindow {
    observations: Vec<(ChannelId, bool)>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: ChannelId, asserted: bool) {
        self.observations.push((channel, asserted));
    }

    /// Sample one line `config.samples` times
    pub fn collect_single(
        lines: &dyn InputLines,
        table: &ChannelTable,
        channel: ChannelId,
        config: &VoteConfig,
    ) -> Result<Self, InputError> {
        let pin = table
            .get(channel)
            .map(|c| c.pin)
            .ok_or_else(|| InputError::EdgeSource(format!("unknown channel {}", channel)))?;

        let mut window = Self::new();
        for _ in 0..config.samples {
            window.push(channel, lines.read(pin)?);
            thread::sleep(config.interval);
        }
        Ok(window)
    }

    /// Sample every line `config.samples` times, one pass over all lines
    /// per interval
    pub fn collect_all(
        lines: &dyn InputLines,
        table: &ChannelTable,
        config: &VoteConfig,
    ) -> Result<Self, InputError> {
        let mut window = Self::new();
        for _ in 0..config.samples {
            for channel in table.iter() {
                window.push(channel.id, lines.read(channel.pin)?);
            }
            thread::sleep(config.interval);
        }
        Ok(window)
    }

    /// Asserted samples for one channel
    pub fn asserted(&self, channel: ChannelId) -> usize {
        self.observations
            .iter()
            .filter(|(c, level)| *c == channel && *level)
            .count()
    }

    /// Asserted samples per channel index
    pub fn tally(&self, channels: usize) -> Vec<usize> {
        let mut counts = vec![0; channels];
        for (channel, level) in &self.observations {
            if *level {
                if let Some(count) = counts.get_mut(channel.index()) {
                    *count += 1;
                }
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Confirm a single line from its own samples
pub fn confirm_single(window: &SampleWindow, channel: ChannelId, threshold: usize) -> bool {
    window.asserted(channel) >= threshold
}

/// Pick the channel with the most asserted samples.
///
/// Ties go to the channel registered first. Returns `None` when the best
/// count is below `threshold`.
pub fn elect(window: &SampleWindow, table: &ChannelTable, threshold: usize) -> Option<ChannelId> {
    let counts = window.tally(table.len());
    let mut best: Option<(ChannelId, usize)> = None;
    for channel in table.iter() {
        let count = counts[channel.id.index()];
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((channel.id, count));
        }
    }

    tracing::debug!("Vote tally: {:?}", counts);

    match best {
        Some((channel, count)) if count >= threshold => Some(channel),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::input::SimulatedLines;
    use proptest::prelude::*;

    fn table(n: usize) -> ChannelTable {
        let configs: Vec<ChannelConfig> = (0..n)
            .map(|i| ChannelConfig::new(&format!("C{}", i), i as u32 + 1, &format!("S{}", i), "http://x"))
            .collect();
        ChannelTable::from_config(&configs).unwrap()
    }

    fn id(table: &ChannelTable, i: usize) -> ChannelId {
        table.iter().nth(i).unwrap().id
    }

    fn fast() -> VoteConfig {
        VoteConfig {
            interval: Duration::ZERO,
            ..VoteConfig::default()
        }
    }

    #[test]
    fn test_single_line_majority() {
        let table = table(1);
        let c = id(&table, 0);
        let mut window = SampleWindow::new();
        for level in [true, true, false, true, false] {
            window.push(c, level);
        }
        assert!(confirm_single(&window, c, 3));
        assert!(!confirm_single(&window, c, 4));
    }

    #[test]
    fn test_elect_highest_count() {
        let table = table(3);
        let mut window = SampleWindow::new();
        for _ in 0..5 {
            window.push(id(&table, 0), false);
            window.push(id(&table, 1), true);
            window.push(id(&table, 2), false);
        }
        window.push(id(&table, 2), true);
        assert_eq!(elect(&window, &table, 3), Some(id(&table, 1)));
    }

    #[test]
    fn test_elect_tie_goes_to_first_registered() {
        let table = table(4);
        let mut window = SampleWindow::new();
        for _ in 0..4 {
            window.push(id(&table, 3), true);
            window.push(id(&table, 1), true);
        }
        assert_eq!(elect(&window, &table, 3), Some(id(&table, 1)));
    }

    #[test]
    fn test_elect_below_threshold() {
        let table = table(2);
        let mut window = SampleWindow::new();
        window.push(id(&table, 0), true);
        window.push(id(&table, 0), true);
        assert_eq!(elect(&window, &table, 3), None);
        assert_eq!(elect(&SampleWindow::new(), &table, 3), None);
    }

    #[test]
    fn test_collect_all_samples_every_line() {
        let table = table(3);
        let lines = SimulatedLines::new();
        lines.setup(&table.pins()).unwrap();
        lines.set_level(2, true);

        let window = SampleWindow::collect_all(&lines, &table, &fast()).unwrap();
        assert_eq!(window.len(), 15);
        assert_eq!(window.tally(3), vec![0, 5, 0]);
        assert_eq!(lines.reads(1), 5);
    }

    #[test]
    fn test_collect_single_propagates_read_errors() {
        let table = table(1);
        let lines = SimulatedLines::new();
        let result = SampleWindow::collect_single(&lines, &table, id(&table, 0), &fast());
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_single_confirms_only_with_threshold(levels in proptest::collection::vec(any::<bool>(), 5)) {
            let table = table(1);
            let c = id(&table, 0);
            let mut window = SampleWindow::new();
            for level in &levels {
                window.push(c, *level);
            }
            let asserted = levels.iter().filter(|l| **l).count();
            prop_assert_eq!(confirm_single(&window, c, 3), asserted >= 3);
        }

        #[test]
        fn prop_elected_channel_has_top_count(
            passes in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 6), 5)
        ) {
            let table = table(6);
            let mut window = SampleWindow::new();
            for pass in &passes {
                for (i, level) in pass.iter().enumerate() {
                    window.push(id(&table, i), *level);
                }
            }
            let counts = window.tally(6);
            let top = counts.iter().copied().max().unwrap_or(0);

            match elect(&window, &table, 3) {
                Some(winner) => {
                    prop_assert!(top >= 3);
                    prop_assert_eq!(counts[winner.index()], top);
                    // first registered among the tied
                    let first = counts.iter().position(|c| *c == top).unwrap();
                    prop_assert_eq!(winner.index(), first);
                }
                None => prop_assert!(top < 3),
            }
        }
    }
}
