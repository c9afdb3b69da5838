//! Channel table: one entry per physical selector line

use serde::Serialize;
use std::fmt;

use crate::config::ChannelConfig;
use crate::error::{Error, Result};

/// Index of a channel in the table (registration order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelId(usize);

impl ChannelId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A selector position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub pin: u32,
    /// Station this position plays
    pub station: String,
}

/// Immutable, ordered set of channels
#[derive(Debug, Clone)]
pub struct ChannelTable {
    channels: Vec<Channel>,
}

impl ChannelTable {
    /// Build the table, rejecting duplicate pins or names
    pub fn from_config(configs: &[ChannelConfig]) -> Result<Self> {
        let mut channels: Vec<Channel> = Vec::with_capacity(configs.len());
        for (index, cfg) in configs.iter().enumerate() {
            if channels.iter().any(|c| c.pin == cfg.pin || c.name == cfg.name) {
                return Err(Error::Config(format!(
                    "channel {} (pin {}) collides with an earlier entry",
                    cfg.name, cfg.pin
                )));
            }
            channels.push(Channel {
                id: ChannelId(index),
                name: cfg.name.clone(),
                pin: cfg.pin,
                station: cfg.station.clone(),
            });
        }
        if channels.is_empty() {
            return Err(Error::Config("channel table is empty".into()));
        }
        Ok(Self { channels })
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn by_pin(&self, pin: u32) -> Option<&Channel> {
        self.channels.iter().find(|c| c.pin == pin)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn pins(&self) -> Vec<u32> {
        self.channels.iter().map(|c| c.pin).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_preserves_order() {
        let table = ChannelTable::from_config(&ChannelConfig::reference_table()).unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.pins(), vec![5, 6, 13, 19, 26, 16]);

        let nova = table.by_name("NOVA").unwrap();
        assert_eq!(nova.id.index(), 4);
        assert_eq!(table.by_pin(26), Some(nova));
    }

    #[test]
    fn test_table_rejects_shared_pin() {
        let configs = vec![
            ChannelConfig::new("A", 1, "A", "http://a"),
            ChannelConfig::new("B", 1, "B", "http://b"),
        ];
        assert!(ChannelTable::from_config(&configs).is_err());
    }
}
