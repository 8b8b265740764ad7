/// A data structure for efficiently maintaining disjoint sets of interned
/// node ids. The pass is single-threaded, so no interior locking.
#[derive(Default)]
pub struct DisjointSet {
    /// Mapping from node to its parent. A node is the representative of its
    /// set when it is its own parent.
    node_parents: Vec<usize>,
}

impl DisjointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.node_parents.len()
    }

    /// Adds a fresh singleton set and returns its node id.
    pub fn make_set(&mut self) -> usize {
        let node = self.node_parents.len();
        self.node_parents.push(node);
        node
    }

    /// Gets the representative node of the set that `node` is in.
    /// Path compression is performed while finding the representative.
    pub fn find(&mut self, node: usize) -> usize {
        let parent = self.node_parents[node];
        if parent == node {
            return node;
        }
        let representative = self.find(parent);
        self.node_parents[node] = representative;
        representative
    }

    /// Unions the set containing `a` and the set containing `b` and returns
    /// the representative. The smaller node id wins, which keeps class
    /// canonicals stable across runs.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let a_rep = self.find(a);
        let b_rep = self.find(b);
        let (representative, other) = if a_rep <= b_rep {
            (a_rep, b_rep)
        } else {
            (b_rep, a_rep)
        };
        self.node_parents[other] = representative;
        representative
    }
}
