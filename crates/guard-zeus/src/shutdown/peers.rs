//! Other consumers of the shared preloader.

use std::fmt;
use std::sync::Arc;

/// What the shutdown logic needs to know about another watcher.
pub trait ConsumerStatus: Send + Sync {
    fn name(&self) -> String;

    /// Whether this consumer uses the shared Zeus preloader at all.
    fn is_preloader_consumer(&self) -> bool;

    /// Whether it is currently running.
    fn is_running(&self) -> bool;

    /// A peer blocks the last-one-out stop only if both hold.
    fn is_active(&self) -> bool {
        self.is_preloader_consumer() && self.is_running()
    }
}

/// Source of the peers to wait for.
pub trait PeerRegistry: Send + Sync {
    fn consumers(&self) -> Vec<Arc<dyn ConsumerStatus>>;
}

/// Names of the peers that still hold the preloader.
pub fn active_peers(registry: &dyn PeerRegistry) -> Vec<String> {
    registry
        .consumers()
        .iter()
        .filter(|peer| peer.is_active())
        .map(|peer| peer.name())
        .collect()
}

/// A registry that never has peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerRegistry for NoPeers {
    fn consumers(&self) -> Vec<Arc<dyn ConsumerStatus>> {
        Vec::new()
    }
}

/// A fixed list of peers.
#[derive(Clone, Default)]
pub struct StaticPeers {
    peers: Vec<Arc<dyn ConsumerStatus>>,
}

impl StaticPeers {
    pub fn new(peers: Vec<Arc<dyn ConsumerStatus>>) -> Self {
        Self { peers }
    }
}

impl fmt::Debug for StaticPeers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.peers.iter().map(|p| p.name()).collect();
        f.debug_struct("StaticPeers").field("peers", &names).finish()
    }
}

impl PeerRegistry for StaticPeers {
    fn consumers(&self) -> Vec<Arc<dyn ConsumerStatus>> {
        self.peers.clone()
    }
}

impl<F> PeerRegistry for F
where
    F: Fn() -> Vec<Arc<dyn ConsumerStatus>> + Send + Sync,
{
    fn consumers(&self) -> Vec<Arc<dyn ConsumerStatus>> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Peer {
        name: &'static str,
        consumer: bool,
        running: bool,
    }

    impl ConsumerStatus for Peer {
        fn name(&self) -> String {
            self.name.to_string()
        }
        fn is_preloader_consumer(&self) -> bool {
            self.consumer
        }
        fn is_running(&self) -> bool {
            self.running
        }
    }

    fn peer(name: &'static str, consumer: bool, running: bool) -> Arc<dyn ConsumerStatus> {
        Arc::new(Peer {
            name,
            consumer,
            running,
        })
    }

    #[test]
    fn test_only_running_consumers_are_active() {
        let registry = StaticPeers::new(vec![
            peer("rspec", true, true),
            peer("stopped", true, false),
            peer("livereload", false, true),
        ]);
        assert_eq!(active_peers(&registry), vec!["rspec".to_string()]);
    }

    #[test]
    fn test_closure_registry() {
        let registry = || vec![peer("cucumber", true, true)];
        assert_eq!(active_peers(&registry), vec!["cucumber".to_string()]);
        assert!(active_peers(&NoPeers).is_empty());
    }
}
