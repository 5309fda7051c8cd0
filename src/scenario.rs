//! Scenario roles: which nodes are attack sources and which are servers.
//!
//! Roles are fixed for a run. They come from the `roles` section of the
//! configuration, or are derived the way the dataset scenarios assign them:
//! the last five nodes attack when attacks are enabled, and five servers are
//! drawn uniformly from all nodes with a seeded RNG.

use std::collections::BTreeSet;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Number of trailing nodes reserved as attackers
pub const ATTACKER_POOL: u32 = 5;
/// Number of nodes running a server application
pub const SERVER_COUNT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Server,
    Client,
}

/// Attacker set and server/client role map for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roles {
    ue_total: u32,
    attackers: BTreeSet<u32>,
    servers: BTreeSet<u32>,
}

impl Roles {
    /// Use explicitly listed attackers and servers
    pub fn explicit(ue_total: u32, attackers: BTreeSet<u32>, servers: BTreeSet<u32>) -> Self {
        let roles = Roles {
            ue_total,
            attackers,
            servers,
        };
        roles.warn_overlap();
        roles
    }

    /// Derive roles for `ue_total` nodes
    pub fn derive(ue_total: u32, enable_attack: bool, seed: u64) -> Self {
        let attackers: BTreeSet<u32> = if enable_attack && ue_total >= ATTACKER_POOL {
            (ue_total - ATTACKER_POOL..ue_total).collect()
        } else {
            BTreeSet::new()
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let count = SERVER_COUNT.min(ue_total) as usize;
        let servers: BTreeSet<u32> = rand::seq::index::sample(&mut rng, ue_total as usize, count)
            .into_iter()
            .map(|i| i as u32)
            .collect();

        info!(
            "Derived roles for {} nodes: servers {:?}, attackers {:?}",
            ue_total, servers, attackers
        );

        let roles = Roles {
            ue_total,
            attackers,
            servers,
        };
        roles.warn_overlap();
        roles
    }

    fn warn_overlap(&self) {
        for node in self.attackers.intersection(&self.servers) {
            warn!("Node {} is both a server and an attacker", node);
        }
    }

    pub fn ue_total(&self) -> u32 {
        self.ue_total
    }

    pub fn attackers(&self) -> &BTreeSet<u32> {
        &self.attackers
    }

    pub fn servers(&self) -> &BTreeSet<u32> {
        &self.servers
    }

    pub fn is_attacker(&self, node: u32) -> bool {
        self.attackers.contains(&node)
    }

    pub fn is_server(&self, node: u32) -> bool {
        self.servers.contains(&node)
    }

    pub fn role(&self, node: u32) -> NodeRole {
        if self.is_server(node) {
            NodeRole::Server
        } else {
            NodeRole::Client
        }
    }

    /// Nodes running a client application
    pub fn clients(&self) -> usize {
        (0..self.ue_total)
            .filter(|n| self.role(*n) == NodeRole::Client)
            .count()
    }

    /// Clients that are not attackers
    pub fn benign_clients(&self) -> usize {
        (0..self.ue_total)
            .filter(|n| self.role(*n) == NodeRole::Client && !self.is_attacker(*n))
            .count()
    }
}
