//! The TOML system configuration shared by every MPSS process.
//!
//! ```toml
//! Degree = 1
//! [Primary]
//! Url = "127.0.0.1:9000"
//! [Peers.node_1]
//! Id = 1
//! Url = "127.0.0.1:9001"
//! ```
//!
//! `OldGroup`/`NewGroup` optionally rotate the share holders; both default
//! to all configured peers. Unknown keys are rejected so a typo cannot
//! silently change a deployment.

use std::{collections::BTreeMap, path::Path};

use mpss_core::{
    NodeId,
    params::{ParameterError, PublicParameters},
};
use serde::Deserialize;

/// Errors raised while loading or validating a [`SystemConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for the expected schema.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// Robustness requires at least `3t + 1` peers.
    #[error("{got} peers configured, the protocol needs at least 3t+1 = {required}")]
    TooFewPeers {
        /// Configured number of peers.
        got: usize,
        /// Required minimum.
        required: usize,
    },
    /// Two peer entries share the same id.
    #[error("peer ids must be unique, {0} appears twice")]
    DuplicatePeerId(NodeId),
    /// A group entry references an id no peer is configured for.
    #[error("group references unknown peer id {0}")]
    UnknownGroupMember(NodeId),
    /// The requested peer label does not exist.
    #[error("no peer labelled {0:?} in the config")]
    UnknownPeer(String),
    /// The derived public parameters are invalid.
    #[error(transparent)]
    Parameters(#[from] ParameterError),
}

/// Address of the bulletin board.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct PrimaryConfig {
    /// `host:port` of the board.
    pub url: String,
}

/// One peer node entry.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct PeerConfig {
    /// Protocol id of the peer; doubles as its share abscissa.
    pub id: NodeId,
    /// `host:port` the peer serves on.
    pub url: String,
}

/// The deployment description every process loads at startup.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct SystemConfig {
    /// The sharing threshold `t`.
    pub degree: usize,
    /// Ids holding shares when the run starts; defaults to all peers.
    #[serde(default)]
    pub old_group: Option<Vec<u64>>,
    /// Ids receiving shares each epoch; defaults to all peers.
    #[serde(default)]
    pub new_group: Option<Vec<u64>>,
    /// The bulletin board.
    pub primary: PrimaryConfig,
    /// All peer nodes, keyed by a human-readable label.
    pub peers: BTreeMap<String, PeerConfig>,
}

impl SystemConfig {
    /// Loads and validates the config at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = 3 * self.degree + 1;
        if self.peers.len() < required {
            return Err(ConfigError::TooFewPeers {
                got: self.peers.len(),
                required,
            });
        }
        let ids = self.peer_ids();
        for pair in ids.windows(2) {
            if pair[0] == pair[1] {
                return Err(ConfigError::DuplicatePeerId(pair[0]));
            }
        }
        for group in [&self.old_group, &self.new_group].into_iter().flatten() {
            for &member in group {
                if !ids.contains(&NodeId(member)) {
                    return Err(ConfigError::UnknownGroupMember(NodeId(member)));
                }
            }
        }
        Ok(())
    }

    /// All configured peer ids in ascending order.
    pub fn peer_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.peers.values().map(|peer| peer.id).collect();
        ids.sort_unstable();
        ids
    }

    /// The validated protocol parameters this deployment runs with.
    pub fn public_parameters(&self) -> Result<PublicParameters, ConfigError> {
        let all = self.peer_ids();
        let old = match &self.old_group {
            Some(group) => group.iter().copied().map(NodeId).collect(),
            None => all.clone(),
        };
        let new = match &self.new_group {
            Some(group) => group.iter().copied().map(NodeId).collect(),
            None => all,
        };
        Ok(PublicParameters::new(self.degree, old, new)?)
    }

    /// Looks a peer up by its config label.
    pub fn peer(&self, label: &str) -> Result<&PeerConfig, ConfigError> {
        self.peers
            .get(label)
            .ok_or_else(|| ConfigError::UnknownPeer(label.to_string()))
    }

    /// The serve address of the peer with the given id.
    pub fn peer_url(&self, id: NodeId) -> Option<&str> {
        self.peers
            .values()
            .find(|peer| peer.id == id)
            .map(|peer| peer.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
Degree = 1

[Primary]
Url = "127.0.0.1:9000"

[Peers.node_1]
Id = 1
Url = "127.0.0.1:9001"

[Peers.node_2]
Id = 2
Url = "127.0.0.1:9002"

[Peers.node_3]
Id = 3
Url = "127.0.0.1:9003"

[Peers.node_4]
Id = 4
Url = "127.0.0.1:9004"
"#;

    #[test]
    fn parses_the_documented_shape() {
        let config = SystemConfig::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.degree, 1);
        assert_eq!(config.primary.url, "127.0.0.1:9000");
        assert_eq!(
            config.peer_ids(),
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
        );
        assert_eq!(config.peer("node_3").unwrap().url, "127.0.0.1:9003");
        assert_eq!(config.peer_url(NodeId(2)), Some("127.0.0.1:9002"));

        let pp = config.public_parameters().unwrap();
        assert_eq!(pp.old_group(), pp.new_group());
        assert_eq!(pp.quorum(), 3);
    }

    #[test]
    fn rejects_unknown_keys() {
        let doctored = format!("Rounds = 3\n{EXAMPLE}");
        assert!(matches!(
            SystemConfig::from_toml(&doctored).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn rejects_too_few_peers() {
        let mut config: SystemConfig = toml::from_str(EXAMPLE).unwrap();
        config.degree = 2;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::TooFewPeers {
                got: 4,
                required: 7
            }
        ));
    }

    #[test]
    fn rotation_groups_must_reference_peers() {
        let doctored = format!("NewGroup = [1, 2, 3, 9]\n{EXAMPLE}");
        assert!(matches!(
            SystemConfig::from_toml(&doctored).unwrap_err(),
            ConfigError::UnknownGroupMember(NodeId(9))
        ));
    }
}
