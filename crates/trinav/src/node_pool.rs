//! Search node arena and open heap for cell searches
//!
//! Nodes live in a [`NodePool`] and point at their parent by index, forming a
//! tree rooted at the search's start node. A node's `G` is not stored: it is
//! the sum of `local_g` along the parent chain and is walked on each access.
//!
//! The [`OpenHeap`] keys entries by `F` at push/relax time. Only open nodes are
//! ever relaxed, and open nodes have no children, so a stored key never goes
//! stale.

use std::cmp::Ordering;

use crate::tri_cell::CellRef;

/// Node index type
pub type NodeIndex = u32;

/// A node of the search tree.
#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Cell the node corresponds to
    pub cell: CellRef,
    /// Index of the parent node
    pub parent: Option<NodeIndex>,
    /// Cost from the parent node to this node
    pub local_g: f32,
    /// Heuristic estimate to the goal
    pub h: f32,
}

/// Arena of search nodes, reused between searches.
#[derive(Debug, Default)]
pub struct NodePool {
    nodes: Vec<SearchNode>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all nodes, keeping the allocation.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Releases surplus capacity beyond `capacity` nodes.
    pub fn shrink_to(&mut self, capacity: usize) {
        self.nodes.shrink_to(capacity);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a node and returns its index.
    pub fn alloc(&mut self, cell: CellRef, parent: Option<NodeIndex>, local_g: f32, h: f32) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(SearchNode {
            cell,
            parent,
            local_g,
            h,
        });
        index
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &SearchNode {
        &self.nodes[index as usize]
    }

    /// Re-parents a node.
    pub fn set_parent(&mut self, index: NodeIndex, parent: NodeIndex, local_g: f32) {
        let node = &mut self.nodes[index as usize];
        node.parent = Some(parent);
        node.local_g = local_g;
    }

    /// Accumulated cost from the start node.
    pub fn g(&self, index: NodeIndex) -> f32 {
        let mut total = 0.0;
        let mut current = Some(index);
        while let Some(i) = current {
            let node = self.node(i);
            total += node.local_g;
            current = node.parent;
        }
        total
    }

    /// `G + H`.
    pub fn f(&self, index: NodeIndex) -> f32 {
        self.g(index) + self.node(index).h
    }

    /// Number of cells on the path from the start node to `index`, inclusive.
    pub fn path_size(&self, index: NodeIndex) -> usize {
        let mut size = 0;
        let mut current = Some(index);
        while let Some(i) = current {
            size += 1;
            current = self.node(i).parent;
        }
        size
    }

    /// Writes the cells from the start node to `index` into `path`.
    pub fn load_path(&self, index: NodeIndex, path: &mut Vec<CellRef>) {
        let start = path.len();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = self.node(i);
            path.push(node.cell);
            current = node.parent;
        }
        path[start..].reverse();
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    f: f32,
    h: f32,
    node: NodeIndex,
}

impl HeapEntry {
    // F ascending, then H ascending, then node index ascending.
    fn cmp_key(&self, other: &HeapEntry) -> Ordering {
        self.f
            .total_cmp(&other.f)
            .then_with(|| self.h.total_cmp(&other.h))
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Binary min-heap of open nodes with decrease-key support.
#[derive(Debug, Default)]
pub struct OpenHeap {
    heap: Vec<HeapEntry>,
    // Heap slot of each node, indexed by node index
    positions: Vec<Option<usize>>,
}

impl OpenHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.positions
            .get(node as usize)
            .is_some_and(|p| p.is_some())
    }

    /// Index of the lowest-F node.
    pub fn peek(&self) -> Option<NodeIndex> {
        self.heap.first().map(|e| e.node)
    }

    /// Pushes a node keyed by its current `F`.
    pub fn push(&mut self, pool: &NodePool, node: NodeIndex) {
        if self.contains(node) {
            self.update(pool, node);
            return;
        }
        if self.positions.len() <= node as usize {
            self.positions.resize(node as usize + 1, None);
        }
        let entry = HeapEntry {
            f: pool.f(node),
            h: pool.node(node).h,
            node,
        };
        self.heap.push(entry);
        let last = self.heap.len() - 1;
        self.positions[node as usize] = Some(last);
        self.bubble_up(last);
    }

    /// Pops the lowest-F node.
    pub fn pop(&mut self) -> Option<NodeIndex> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        self.positions[top.node as usize] = None;
        if !self.heap.is_empty() {
            self.positions[self.heap[0].node as usize] = Some(0);
            self.trickle_down(0);
        }
        Some(top.node)
    }

    /// Re-keys a node after its parent changed.
    pub fn update(&mut self, pool: &NodePool, node: NodeIndex) {
        let Some(Some(i)) = self.positions.get(node as usize).copied() else {
            return;
        };
        let old = self.heap[i];
        self.heap[i].f = pool.f(node);
        self.heap[i].h = pool.node(node).h;
        if self.heap[i].cmp_key(&old) == Ordering::Less {
            self.bubble_up(i);
        } else {
            self.trickle_down(i);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions[self.heap[a].node as usize] = Some(a);
        self.positions[self.heap[b].node as usize] = Some(b);
    }

    fn bubble_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].cmp_key(&self.heap[parent]) != Ordering::Less {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn trickle_down(&mut self, mut i: usize) {
        let size = self.heap.len();
        loop {
            let child1 = 2 * i + 1;
            if child1 >= size {
                break;
            }
            let child2 = child1 + 1;
            let mut min_child = child1;
            if child2 < size && self.heap[child2].cmp_key(&self.heap[child1]) == Ordering::Less {
                min_child = child2;
            }
            if self.heap[i].cmp_key(&self.heap[min_child]) != Ordering::Greater {
                break;
            }
            self.swap(i, min_child);
            i = min_child;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_pool() {
        let mut pool = NodePool::new();
        let root = pool.alloc(CellRef::new(7), None, 0.0, 5.0);
        let a = pool.alloc(CellRef::new(3), Some(root), 1.5, 2.0);
        let b = pool.alloc(CellRef::new(9), Some(a), 2.0, 0.5);

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.g(b), 3.5);
        assert_eq!(pool.f(b), 4.0);
        assert_eq!(pool.path_size(b), 3);

        let mut path = vec![CellRef::new(99)];
        pool.load_path(b, &mut path);
        assert_eq!(
            path,
            vec![CellRef::new(99), CellRef::new(7), CellRef::new(3), CellRef::new(9)]
        );

        pool.set_parent(b, root, 1.0);
        assert_eq!(pool.g(b), 1.0);
        assert_eq!(pool.path_size(b), 2);

        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_open_heap_ordering() {
        let mut pool = NodePool::new();
        let mut heap = OpenHeap::new();
        let costs = [(5.0, 1.0), (2.0, 0.0), (8.0, 3.0), (2.0, 0.0), (1.0, 2.0)];
        for (g, h) in costs {
            let n = pool.alloc(CellRef::new(0), None, g, h);
            heap.push(&pool, n);
        }
        assert_eq!(heap.len(), 5);
        assert_eq!(heap.peek(), Some(1));

        // F ties: node 4 has F 3 and H 2, node 1 and 3 have F 2 and H 0
        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).collect();
        assert_eq!(order, vec![1, 3, 4, 0, 2]);
        assert!(heap.is_empty());
        assert!(!heap.contains(1));
    }

    #[test]
    fn test_open_heap_equal_f_prefers_lower_h() {
        let mut pool = NodePool::new();
        let mut heap = OpenHeap::new();
        let a = pool.alloc(CellRef::new(0), None, 1.0, 3.0);
        let b = pool.alloc(CellRef::new(1), None, 3.0, 1.0);
        heap.push(&pool, a);
        heap.push(&pool, b);
        assert_eq!(heap.pop(), Some(b));
        assert_eq!(heap.pop(), Some(a));
    }

    #[test]
    fn test_open_heap_update() {
        let mut pool = NodePool::new();
        let mut heap = OpenHeap::new();
        let root = pool.alloc(CellRef::new(0), None, 0.0, 0.0);
        let far = pool.alloc(CellRef::new(1), None, 10.0, 0.0);
        let near = pool.alloc(CellRef::new(2), None, 4.0, 0.0);
        heap.push(&pool, far);
        heap.push(&pool, near);
        assert_eq!(heap.peek(), Some(near));

        pool.set_parent(far, root, 1.0);
        heap.update(&pool, far);
        assert_eq!(heap.pop(), Some(far));
        assert_eq!(heap.pop(), Some(near));
        assert_eq!(heap.pop(), None);

        // Updating a node that is not queued is a no-op
        heap.update(&pool, root);
        assert!(heap.is_empty());
    }
}
