//! Content-addressed graph labelling: the flow-graph hash (`spec.md` §4.4)
//! and an illustrative Merkle tree builder (§4.5), both built on the
//! "consumed" hash primitive below.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use sha3::{Digest, Sha3_256};

use crate::graph::Graph;

/// Incremental SHA3-256 digesting. SHA3-256 is `spec.md`'s reference choice
/// for the hash primitive; any collision-resistant hash would satisfy the
/// interface.
pub struct Hasher(Sha3_256);

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    pub fn new() -> Self {
        Self(Sha3_256::new())
    }

    pub fn absorb(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub fn finalize_hex(self) -> String {
        self.0
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut h = Hasher::new();
    h.absorb(bytes);
    h.finalize_hex()
}

/// A graph carrying, per node, the content-addressed digest produced by
/// [`flow_graph_hash`]. `original_hash` is just the source node's own id;
/// `new_hash` is `None` until that node has been visited at least once.
pub struct HashGraph<K> {
    pub graph: Graph<K>,
    digest: HashMap<K, Option<String>>,
}

impl<K> HashGraph<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new_hash(&self, id: &K) -> Option<&str> {
        self.digest.get(id).and_then(|d| d.as_deref())
    }
}

/// Computes a content-addressed digest per node of `graph`, such that any
/// upstream change in identity or topology propagates to every downstream
/// digest. Tolerates cycles: a predecessor reachable *from* the node being
/// hashed is skipped, since including it would make termination depend on a
/// value this pass hasn't computed yet.
///
/// Panics if a sink is left without a digest once the work-list drains —
/// that is an invariant violation, not a recoverable error.
pub fn flow_graph_hash<K>(graph: &Graph<K>) -> HashGraph<K>
where
    K: Eq + Hash + Clone + Debug + Display,
{
    let mut hash_graph: Graph<K> = Graph::new();
    let mut digest: HashMap<K, Option<String>> = HashMap::new();
    let mut visited: HashSet<K> = HashSet::new();

    let mut work_list: VecDeque<K> = graph.nodes_with_in_degree(0).into_iter().collect();
    let mut queued: HashSet<K> = work_list.iter().cloned().collect();

    while let Some(source) = work_list.pop_front() {
        queued.remove(&source);

        let predecessors = graph.nodes_to(&source);
        let mut hasher = Hasher::new();
        hasher.absorb(source.to_string().as_bytes());
        for predecessor in &predecessors {
            if graph.depth_first_search(&source, predecessor) {
                continue; // `predecessor` is downstream of `source` on a cycle.
            }
            if let Some(Some(d)) = digest.get(predecessor) {
                hasher.absorb(d.as_bytes());
            }
        }
        let source_digest = hasher.finalize_hex();

        hash_graph.add_node(source.clone());
        digest.insert(source.clone(), Some(source_digest));

        for receiver in graph.nodes_from(&source) {
            if visited.contains(&receiver) {
                continue;
            }
            visited.insert(receiver.clone());

            hash_graph.add_node(receiver.clone());
            digest.entry(receiver.clone()).or_insert(None);
            hash_graph.add_edge(source.clone(), receiver.clone(), 1);

            if queued.insert(receiver.clone()) {
                work_list.push_back(receiver);
            }
        }
    }

    for sink in graph.nodes_with_out_degree(0) {
        match digest.get(&sink) {
            Some(Some(_)) => {}
            other => panic!("invariant violation: sink {sink:?} has no flow-hash digest ({other:?})"),
        }
    }

    HashGraph {
        graph: hash_graph,
        digest,
    }
}

/// Hashes each block into a leaf, then repeatedly folds the first two
/// leaves into a parent until one root remains. An odd leaf is carried
/// forward unpaired. A single block returns a one-node graph.
pub fn merkle_tree(blocks: &[Vec<u8>]) -> Graph<String> {
    let mut g: Graph<String> = Graph::new();
    let mut frontier: VecDeque<String> = VecDeque::with_capacity(blocks.len());

    for block in blocks {
        let digest = hash_bytes(block);
        g.add_node(digest.clone());
        frontier.push_back(digest);
    }

    while frontier.len() > 1 {
        let c1 = frontier.pop_front().unwrap();
        let c2 = frontier.pop_front().unwrap();

        let mut hasher = Hasher::new();
        hasher.absorb(c1.as_bytes());
        hasher.absorb(c2.as_bytes());
        let parent = hasher.finalize_hex();

        g.add_node(parent.clone());
        g.add_edge(c1, parent.clone(), 1);
        g.add_edge(c2, parent.clone(), 1);
        frontier.push_back(parent);
    }

    g
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_bytes(b"this"), hash_bytes(b"this"));
        assert_ne!(hash_bytes(b"this"), hash_bytes(b"that"));
    }

    #[test]
    fn merkle_tree_node_counts() {
        assert_eq!(merkle_tree(&[b"this".to_vec()]).len(), 1);
        assert_eq!(merkle_tree(&[b"this".to_vec(), b"that".to_vec()]).len(), 3);
        assert_eq!(
            merkle_tree(&[b"this".to_vec(), b"that".to_vec(), b"them".to_vec()]).len(),
            5
        );
        assert_eq!(
            merkle_tree(&[
                b"this".to_vec(),
                b"that".to_vec(),
                b"them".to_vec(),
                b"they".to_vec(),
            ])
            .len(),
            7
        );
    }

    #[test]
    fn flow_hash_with_self_loop_and_isolated_node() {
        let g = Graph::from_list([
            ("s-1", "i-1", 1),
            ("s-2", "i-1", 1),
            ("i-1", "e-1", 1),
            ("i-1", "e-2", 1),
            ("s-3", "i-2", 1),
            ("i-2", "i-2", 1),
            ("i-2", "e-2", 1),
        ]);
        let mut g = g;
        g.add_node("s-4");
        let hashed = flow_graph_hash(&g);
        assert_eq!(hashed.graph.len(), g.len());
        assert!(hashed.new_hash(&"e-1").is_some());
        assert!(hashed.new_hash(&"e-2").is_some());
    }

    #[test]
    fn flow_hash_with_back_edge() {
        let g = Graph::from_list([(1, 2, 1), (2, 3, 1), (3, 4, 1), (3, 2, 1)]);
        let hashed = flow_graph_hash(&g);
        assert_eq!(hashed.graph.len(), g.len());
        for node in [1, 2, 3, 4] {
            assert!(hashed.new_hash(&node).is_some());
        }
    }

    #[test]
    fn flow_hash_changes_when_an_ancestor_changes() {
        let g1 = Graph::from_list([(1, 2, 1), (2, 3, 1)]);
        let g2 = Graph::from_list([(1, 2, 1), (2, 3, 1), (9, 2, 1)]);
        let h1 = flow_graph_hash(&g1);
        let h2 = flow_graph_hash(&g2);
        assert_ne!(h1.new_hash(&3), h2.new_hash(&3));
    }

    #[test]
    fn flow_hash_is_deterministic_for_same_graph() {
        let g = Graph::from_list([(1, 2, 1), (2, 4, 1), (3, 4, 1)]);
        let h1 = flow_graph_hash(&g);
        let h2 = flow_graph_hash(&g);
        assert_eq!(h1.new_hash(&4), h2.new_hash(&4));
    }
}
