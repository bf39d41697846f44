//! Base node registry
//!
//! Keeps track of the known base nodes (seed list, peers reported by the
//! wallet engine, nodes added by the user), the currently selected node,
//! and round-robin rotation when the current node fails.
//!
//! Address formats:
//! - `<pubkey hex>::/onion3/<service id>:<port>`
//! - `<pubkey hex>::/ip4/<a.b.c.d>/tcp/<port>`

use crate::db::{BaseNodeListKind, Database};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

const ONION_WITH_NAME: &str = r"(.+::[A-Fa-f0-9]{64}::/onion3/[A-Za-z0-9]+:\d+)";
const IPV4_WITH_NAME: &str =
    r"(.+::[A-Fa-f0-9]{64}::/ip4/[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}/tcp/[0-9]{2,6})";
const ONION: &str = r"^[A-Fa-f0-9]{64}::/onion3/[A-Za-z0-9]+:\d+$";
const IPV4: &str =
    r"^[A-Fa-f0-9]{64}::/ip4/[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}/tcp/[0-9]{2,6}$";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No base nodes known")]
    Empty,

    #[error("Invalid base node address: {0}")]
    InvalidAddress(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A base node the wallet can sync against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseNode {
    pub name: String,
    pub public_key_hex: String,
    /// Empty for peers reported by the engine without a known address
    #[serde(default)]
    pub address: String,
    /// Added by the user rather than taken from the seed list or engine
    #[serde(default)]
    pub is_custom: bool,
}

impl BaseNode {
    /// Parse `<pubkey>::<address>` as entered by the user
    pub fn from_peer_string(name: &str, peer: &str) -> RegistryResult<Self> {
        if !is_valid_base_node_address(peer) {
            return Err(RegistryError::InvalidAddress(peer.to_string()));
        }

        let (public_key_hex, address) = peer
            .split_once("::")
            .ok_or_else(|| RegistryError::InvalidAddress(peer.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            public_key_hex: public_key_hex.to_string(),
            address: address.to_string(),
            is_custom: true,
        })
    }
}

impl std::fmt::Display for BaseNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}::{}", self.name, self.public_key_hex, self.address)
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static base node pattern"))
}

fn onion_with_name() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, ONION_WITH_NAME)
}

fn ipv4_with_name() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, IPV4_WITH_NAME)
}

fn onion() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, ONION)
}

fn ipv4() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, IPV4)
}

/// Check a `<pubkey>::<address>` peer string
pub fn is_valid_base_node_address(peer: &str) -> bool {
    onion().is_match(peer) || ipv4().is_match(peer)
}

/// Parse a seed list of `name::pubkey::address` entries, sorted by name
pub fn parse_base_node_list(content: &str) -> Vec<BaseNode> {
    let mut nodes: Vec<BaseNode> = [onion_with_name(), ipv4_with_name()]
        .into_iter()
        .flat_map(|re| re.find_iter(content))
        .filter_map(|m| {
            let mut parts = m.as_str().splitn(3, "::");
            let name = parts.next()?.trim();
            let public_key_hex = parts.next()?;
            let address = parts.next()?;
            Some(BaseNode {
                name: name.to_string(),
                public_key_hex: public_key_hex.to_string(),
                address: address.to_string(),
                is_custom: false,
            })
        })
        .collect();

    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    nodes
}

/// Base node selection and persistence
pub struct BaseNodeRegistry {
    db: Database,
    /// Seed list, used when the engine has not reported any peers yet
    seed_nodes: Vec<BaseNode>,
    /// Position of the next node to pick in `known_base_nodes`
    rotation: Mutex<usize>,
}

impl BaseNodeRegistry {
    pub fn new(db: Database, seed_nodes: Vec<BaseNode>) -> Self {
        Self {
            db,
            seed_nodes,
            rotation: Mutex::new(0),
        }
    }

    /// Nodes eligible for rotation: engine peers if any, else the seed list
    pub async fn known_base_nodes(&self) -> RegistryResult<Vec<BaseNode>> {
        let engine_nodes = self.db.get_base_nodes(BaseNodeListKind::Engine).await?;
        if engine_nodes.is_empty() {
            Ok(self.seed_nodes.clone())
        } else {
            Ok(engine_nodes)
        }
    }

    pub async fn current(&self) -> RegistryResult<Option<BaseNode>> {
        Ok(self.db.get_current_base_node().await?)
    }

    /// Select a base node. Clears the last sync result.
    pub async fn set_current(&self, node: &BaseNode) -> RegistryResult<()> {
        self.db.set_last_sync_result(None).await?;
        self.db.set_current_base_node(node).await?;
        info!(name = %node.name, public_key = %node.public_key_hex, "Base node selected");
        Ok(())
    }

    /// Select the next known base node, wrapping around at the end of the list
    pub async fn set_next_base_node(&self) -> RegistryResult<BaseNode> {
        let nodes = self.known_base_nodes().await?;
        if nodes.is_empty() {
            return Err(RegistryError::Empty);
        }

        let node = {
            let mut rotation = self.rotation.lock().await;
            let index = *rotation % nodes.len();
            *rotation = index + 1;
            nodes[index].clone()
        };

        self.set_current(&node).await?;
        Ok(node)
    }

    pub async fn user_base_nodes(&self) -> RegistryResult<Vec<BaseNode>> {
        Ok(self.db.get_base_nodes(BaseNodeListKind::User).await?)
    }

    pub async fn add_user_base_node(&self, node: &BaseNode) -> RegistryResult<()> {
        let node = BaseNode {
            is_custom: true,
            ..node.clone()
        };
        self.db.insert_base_node(BaseNodeListKind::User, &node).await?;
        info!(name = %node.name, "Custom base node added");
        Ok(())
    }

    /// Returns whether a node was removed
    pub async fn delete_user_base_node(&self, public_key_hex: &str) -> RegistryResult<bool> {
        Ok(self
            .db
            .delete_base_node(BaseNodeListKind::User, public_key_hex)
            .await?)
    }

    /// Replace the engine peer list with freshly reported peers
    pub async fn refresh_engine_base_nodes(
        &self,
        public_keys: &[String],
        network: &str,
    ) -> RegistryResult<()> {
        let nodes: Vec<BaseNode> = public_keys
            .iter()
            .enumerate()
            .map(|(index, key)| BaseNode {
                name: format!("{} {}", network, index + 1),
                public_key_hex: key.clone(),
                address: String::new(),
                is_custom: false,
            })
            .collect();

        self.db
            .replace_base_nodes(BaseNodeListKind::Engine, &nodes)
            .await?;
        info!(count = nodes.len(), "Base node list refreshed from engine");
        Ok(())
    }

    /// Outcome of the last validation against the current node, `None` if unknown
    pub async fn last_sync_result(&self) -> RegistryResult<Option<bool>> {
        Ok(self.db.get_last_sync_result().await?)
    }

    pub async fn set_last_sync_result(&self, result: Option<bool>) -> RegistryResult<()> {
        Ok(self.db.set_last_sync_result(result).await?)
    }

    pub async fn save_chain_tip(&self, height: u64) -> RegistryResult<()> {
        Ok(self.db.set_chain_tip(height).await?)
    }

    pub async fn chain_tip(&self) -> RegistryResult<u64> {
        Ok(self.db.get_chain_tip().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "2e93c460df49d8cfbbf7a06dd9004c25a84f92584f7d0ac5e30bd8e0beee9a43";
    const KEY_B: &str = "06e98e9c5eb52bd504836edec1878eccf12eb9f26a5fe5ec0e279423156e657a";

    fn seed_list() -> String {
        format!(
            "zeta::{KEY_A}::/onion3/pluto2yzfwirxw6qvwkbiqzwe3smxdzksb3nh7lrd2rnmatgwcb6ezid:18141\n\
             alpha::{KEY_B}::/ip4/172.2.3.4/tcp/18189\n\
             garbage line\n"
        )
    }

    #[test]
    fn test_parse_base_node_list() {
        let nodes = parse_base_node_list(&seed_list());
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "alpha");
        assert_eq!(nodes[0].public_key_hex, KEY_B);
        assert_eq!(nodes[0].address, "/ip4/172.2.3.4/tcp/18189");
        assert_eq!(nodes[1].name, "zeta");
        assert!(nodes[1].address.starts_with("/onion3/"));
        assert!(!nodes[1].is_custom);
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_base_node_address(&format!("{KEY_A}::/onion3/abcdef123:18141")));
        assert!(is_valid_base_node_address(&format!("{KEY_A}::/ip4/10.0.0.1/tcp/18189")));
        assert!(!is_valid_base_node_address(&format!("{KEY_A}::/ip4/10.0.0.1/udp/18189")));
        assert!(!is_valid_base_node_address("abcd::/onion3/abcdef123:18141"));
        assert!(!is_valid_base_node_address(&format!("name::{KEY_A}::/onion3/abc:1")));
    }

    #[test]
    fn test_from_peer_string() {
        let node = BaseNode::from_peer_string("mine", &format!("{KEY_A}::/ip4/10.0.0.1/tcp/18189")).unwrap();
        assert_eq!(node.public_key_hex, KEY_A);
        assert_eq!(node.address, "/ip4/10.0.0.1/tcp/18189");
        assert!(node.is_custom);

        assert!(matches!(
            BaseNode::from_peer_string("bad", "nope"),
            Err(RegistryError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_rotation_wraps_around() {
        let db = Database::in_memory().await.unwrap();
        let registry = BaseNodeRegistry::new(db, parse_base_node_list(&seed_list()));

        let first = registry.set_next_base_node().await.unwrap();
        let second = registry.set_next_base_node().await.unwrap();
        let third = registry.set_next_base_node().await.unwrap();

        assert_eq!(first.name, "alpha");
        assert_eq!(second.name, "zeta");
        assert_eq!(third, first);
        assert_eq!(registry.current().await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_rotation_with_no_nodes() {
        let db = Database::in_memory().await.unwrap();
        let registry = BaseNodeRegistry::new(db, Vec::new());

        assert!(matches!(
            registry.set_next_base_node().await,
            Err(RegistryError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_engine_peers_replace_seed_list() {
        let db = Database::in_memory().await.unwrap();
        let registry = BaseNodeRegistry::new(db, parse_base_node_list(&seed_list()));

        registry
            .refresh_engine_base_nodes(&[KEY_A.to_string()], "esmeralda")
            .await
            .unwrap();

        let known = registry.known_base_nodes().await.unwrap();
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].name, "esmeralda 1");
    }

    #[tokio::test]
    async fn test_user_base_nodes() {
        let db = Database::in_memory().await.unwrap();
        let registry = BaseNodeRegistry::new(db, Vec::new());

        let node = BaseNode::from_peer_string("home", &format!("{KEY_B}::/ip4/192.168.1.2/tcp/18189")).unwrap();
        registry.add_user_base_node(&node).await.unwrap();
        assert_eq!(registry.user_base_nodes().await.unwrap(), vec![node]);

        assert!(registry.delete_user_base_node(KEY_B).await.unwrap());
        assert!(!registry.delete_user_base_node(KEY_B).await.unwrap());
        assert!(registry.user_base_nodes().await.unwrap().is_empty());
    }
}
