//! Ordered station table
//!
//! Ordinals are 1-based positions in the external player's playlist and
//! follow registration order. The registry is filled once at startup and
//! shared read-only afterwards.

use serde::Serialize;

use crate::config::ChannelConfig;
use crate::error::RegistryError;
use crate::selector::Channel;

/// A playable stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub name: String,
    pub url: String,
    /// 1-based playlist position
    pub ordinal: usize,
}

/// Stations in registration order
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every configured channel's station in table order
    pub fn from_channels(channels: &[ChannelConfig]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for channel in channels {
            registry.register(&channel.station, &channel.url)?;
        }
        Ok(registry)
    }

    /// Append a station, returning its ordinal
    pub fn register(&mut self, name: &str, url: &str) -> Result<usize, RegistryError> {
        if self.stations.iter().any(|s| s.name == name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        let ordinal = self.stations.len() + 1;
        self.stations.push(Station {
            name: name.to_string(),
            url: url.to_string(),
            ordinal,
        });
        Ok(ordinal)
    }

    /// Station mapped to a channel
    pub fn resolve(&self, channel: &Channel) -> Result<&Station, RegistryError> {
        self.stations
            .iter()
            .find(|s| s.name == channel.station)
            .ok_or_else(|| RegistryError::UnknownChannel(channel.name.clone()))
    }

    /// Playlist position of a station
    pub fn ordinal(&self, name: &str) -> Result<usize, RegistryError> {
        self.stations
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.ordinal)
            .ok_or_else(|| RegistryError::UnknownStation(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ChannelTable;
    use proptest::prelude::*;

    #[test]
    fn test_reference_ordinals() {
        let registry = StationRegistry::from_channels(&ChannelConfig::reference_table()).unwrap();
        assert_eq!(registry.ordinal("ANR"), Ok(1));
        assert_eq!(registry.ordinal("NORDJYSKE"), Ok(4));
        assert_eq!(registry.ordinal("ABC"), Ok(6));
        assert_eq!(
            registry.ordinal("P4"),
            Err(RegistryError::UnknownStation("P4".into()))
        );
    }

    #[test]
    fn test_resolve_channel() {
        let configs = ChannelConfig::reference_table();
        let table = ChannelTable::from_config(&configs).unwrap();
        let registry = StationRegistry::from_channels(&configs).unwrap();

        let nova = table.by_name("NOVA").unwrap();
        let station = registry.resolve(nova).unwrap();
        assert_eq!(station.url, "http://stream.novafm.dk/nova128");
        assert_eq!(station.ordinal, 5);
    }

    #[test]
    fn test_resolve_unknown_channel() {
        let configs = ChannelConfig::reference_table();
        let table = ChannelTable::from_config(&configs).unwrap();
        let registry = StationRegistry::from_channels(&configs[..2]).unwrap();

        let abc = table.by_name("ABC").unwrap();
        assert_eq!(
            registry.resolve(abc),
            Err(RegistryError::UnknownChannel("ABC".into()))
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = StationRegistry::new();
        registry.register("ANR", "http://a").unwrap();
        assert!(registry.register("ANR", "http://b").is_err());
        assert_eq!(registry.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_ordinals_follow_registration_order(
            names in proptest::collection::hash_set("[A-Z]{1,8}", 1..12)
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let mut registry = StationRegistry::new();
            for name in &names {
                registry.register(name, "http://stream").unwrap();
            }
            let ordinals: Vec<usize> = registry.iter().map(|s| s.ordinal).collect();
            prop_assert_eq!(ordinals, (1..=names.len()).collect::<Vec<_>>());
            for (i, name) in names.iter().enumerate() {
                prop_assert_eq!(registry.ordinal(name), Ok(i + 1));
            }
        }
    }
}
