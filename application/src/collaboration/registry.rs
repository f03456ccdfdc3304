//! Peer registry

use crate::ports::peer_agent::PeerAgent;
use orchestra_domain::{AgentId, AgentProfile, Capability};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Agents reachable by the collaboration engine, keyed by id.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: BTreeMap<AgentId, Arc<dyn PeerAgent>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, replacing any peer with the same id
    pub fn register(&mut self, peer: Arc<dyn PeerAgent>) {
        self.peers.insert(peer.profile().id.clone(), peer);
    }

    pub fn with_peer(mut self, peer: Arc<dyn PeerAgent>) -> Self {
        self.register(peer);
        self
    }

    pub fn get(&self, id: &AgentId) -> Option<&Arc<dyn PeerAgent>> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn profiles(&self) -> Vec<AgentProfile> {
        self.peers.values().map(|p| p.profile().clone()).collect()
    }

    /// Peers declaring every required capability, heaviest first.
    ///
    /// Ties keep id order.
    pub fn find_capable(&self, required: &[Capability]) -> Vec<Arc<dyn PeerAgent>> {
        let mut found: Vec<Arc<dyn PeerAgent>> = self
            .peers
            .values()
            .filter(|p| p.profile().has_capabilities(required))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.profile().weight.total_cmp(&a.profile().weight));
        found
    }

    /// The highest-weight peer
    pub fn heaviest(&self) -> Option<&Arc<dyn PeerAgent>> {
        self.peers.values().fold(None, |best, p| match best {
            Some(b) if b.profile().weight >= p.profile().weight => Some(b),
            _ => Some(p),
        })
    }
}

impl std::fmt::Debug for PeerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRegistry")
            .field("peers", &self.peers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::peer_agent::PeerError;
    use async_trait::async_trait;
    use orchestra_domain::TaskContext;
    use tokio_util::sync::CancellationToken;

    struct Idle(AgentProfile);

    #[async_trait]
    impl PeerAgent for Idle {
        fn profile(&self) -> &AgentProfile {
            &self.0
        }

        async fn run(
            &self,
            _task: &str,
            _context: &TaskContext,
            _cancel: &CancellationToken,
        ) -> Result<String, PeerError> {
            Ok(String::new())
        }
    }

    fn registry() -> PeerRegistry {
        PeerRegistry::new()
            .with_peer(Arc::new(Idle(
                AgentProfile::new("coder").with_capability("code").with_weight(1.0),
            )))
            .with_peer(Arc::new(Idle(
                AgentProfile::new("senior")
                    .with_capability("code")
                    .with_capability("review")
                    .with_weight(3.0),
            )))
            .with_peer(Arc::new(Idle(AgentProfile::new("writer").with_capability("docs"))))
    }

    #[test]
    fn test_find_capable_orders_by_weight() {
        let found = registry().find_capable(&[Capability::new("CODE")]);
        let ids: Vec<&str> = found.iter().map(|p| p.profile().id.as_str()).collect();
        assert_eq!(ids, vec!["senior", "coder"]);
    }

    #[test]
    fn test_find_capable_requires_all() {
        let found = registry().find_capable(&[Capability::new("code"), Capability::new("docs")]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_heaviest_and_lookup() {
        let reg = registry();
        assert_eq!(reg.heaviest().unwrap().profile().id.as_str(), "senior");
        assert!(reg.contains(&AgentId::new("writer")));
        assert!(reg.get(&AgentId::new("ghost")).is_none());
        assert_eq!(reg.len(), 3);
    }
}
