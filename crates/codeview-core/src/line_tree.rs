//! Line storage tree.
//!
//! Lines live in a flat arena and are indexed by a B-tree whose nodes live in a second arena.
//! Leaves hold up to 50 line ids, branches up to 10 children, and every node caches its line
//! count and total height so that both line-number and height lookups are O(log n).
//!
//! Navigation never goes through owning back-pointers: a [`Line`] knows the [`NodeId`] of its
//! leaf and every node knows its parent id.

use crate::line::{Line, LineId};
use std::ops::ControlFlow;
use tracing::trace;

/// Leaves are split once they hold more than this many lines.
const LEAF_MAX: usize = 50;
/// Size of the chunks a split leaf is cut into.
const LEAF_CHUNK: usize = 25;
/// Branches spill once they have more than this many children.
const BRANCH_MAX: usize = 10;
/// Number of children moved into a new sibling when a branch spills.
const SPILL_COUNT: usize = 5;
/// Branches holding fewer lines than this are collapsed into a single leaf.
const COLLAPSE_BELOW: usize = 25;

/// Arena index of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) const DETACHED: NodeId = NodeId(usize::MAX);
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(Vec<LineId>),
    Branch(Vec<NodeId>),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    size: usize,
    height: f64,
    kind: NodeKind,
}

impl Node {
    fn empty_leaf(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            size: 0,
            height: 0.0,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }
}

/// The indexed line store of a document.
#[derive(Debug, Clone)]
pub struct LineTree {
    nodes: Vec<Node>,
    free_nodes: Vec<usize>,
    lines: Vec<Line>,
    free_lines: Vec<usize>,
    root: NodeId,
}

impl Default for LineTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LineTree {
    /// An empty tree: a root branch with one empty leaf.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            lines: Vec::new(),
            free_lines: Vec::new(),
            root: NodeId(0),
        };
        let root = tree.alloc_node(Node {
            parent: None,
            size: 0,
            height: 0.0,
            kind: NodeKind::Branch(Vec::new()),
        });
        let leaf = tree.alloc_node(Node::empty_leaf(Some(root)));
        tree.children_mut(root).push(leaf);
        tree.root = root;
        tree
    }

    /// Build a tree holding `lines`.
    pub fn from_lines(lines: Vec<Line>) -> Self {
        let mut tree = Self::new();
        tree.insert(0, lines);
        tree
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.nodes[self.root.0].size
    }

    /// `true` if the tree holds no lines.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all line heights.
    pub fn height(&self) -> f64 {
        self.nodes[self.root.0].height
    }

    /// Borrow a line by id.
    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.0]
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> &mut Line {
        &mut self.lines[id.0]
    }

    /// Id of the line at zero-based index `n`.
    pub fn line_at(&self, n: usize) -> Option<LineId> {
        if n >= self.len() {
            return None;
        }
        let mut node = self.root;
        let mut n = n;
        loop {
            match &self.nodes[node.0].kind {
                NodeKind::Leaf(lines) => return lines.get(n).copied(),
                NodeKind::Branch(children) => {
                    let mut next = None;
                    for &child in children {
                        let sz = self.nodes[child.0].size;
                        if n < sz {
                            next = Some(child);
                            break;
                        }
                        n -= sz;
                    }
                    node = next?;
                }
            }
        }
    }

    /// Zero-based index of a live line.
    pub fn line_no(&self, id: LineId) -> usize {
        let mut cur = self.lines[id.0].leaf;
        let mut no = match &self.nodes[cur.0].kind {
            NodeKind::Leaf(lines) => lines.iter().position(|&l| l == id).unwrap_or(0),
            NodeKind::Branch(_) => 0,
        };
        while let Some(parent) = self.nodes[cur.0].parent {
            if let NodeKind::Branch(children) = &self.nodes[parent.0].kind {
                for &child in children {
                    if child == cur {
                        break;
                    }
                    no += self.nodes[child.0].size;
                }
            }
            cur = parent;
        }
        no
    }

    /// Insert `lines` before zero-based index `at`.
    pub fn insert(&mut self, at: usize, lines: Vec<Line>) {
        if lines.is_empty() {
            return;
        }
        let height: f64 = lines.iter().map(|l| l.height).sum();
        let ids: Vec<LineId> = lines.into_iter().map(|l| self.alloc_line(l)).collect();
        self.insert_inner(self.root, at.min(self.len()), ids, height);
    }

    /// Remove `count` lines starting at zero-based index `at` and return them.
    pub fn remove(&mut self, at: usize, count: usize) -> Vec<Line> {
        let count = count.min(self.len().saturating_sub(at));
        if count == 0 {
            return Vec::new();
        }
        let mut removed = Vec::with_capacity(count);
        self.remove_inner(self.root, at, count, &mut removed);
        removed
            .into_iter()
            .map(|id| {
                self.free_lines.push(id.0);
                std::mem::replace(&mut self.lines[id.0], Line::new(String::new(), Vec::new(), 0.0))
            })
            .collect()
    }

    /// Visit the ids of lines `from..to` in order; the visitor may stop early.
    pub fn iterate<F>(&self, from: usize, to: usize, mut visit: F)
    where
        F: FnMut(LineId, &Line) -> ControlFlow<()>,
    {
        let to = to.min(self.len());
        if from >= to {
            return;
        }
        let _ = self.iter_n(self.root, from, to - from, &mut |id| visit(id, &self.lines[id.0]));
    }

    /// Ids of lines `from..to`.
    pub fn ids(&self, from: usize, to: usize) -> Vec<LineId> {
        let mut out = Vec::with_capacity(to.saturating_sub(from));
        self.iterate(from, to, |id, _| {
            out.push(id);
            ControlFlow::Continue(())
        });
        out
    }

    /// Change the height of one line, propagating the difference to its ancestors.
    pub fn set_line_height(&mut self, id: LineId, height: f64) {
        let diff = height - self.lines[id.0].height;
        if diff == 0.0 {
            return;
        }
        self.lines[id.0].height = height;
        let mut node = Some(self.lines[id.0].leaf);
        while let Some(n) = node {
            self.nodes[n.0].height += diff;
            node = self.nodes[n.0].parent;
        }
    }

    /// Sum of the heights of all lines before `id`.
    pub fn height_at_line(&self, id: LineId) -> f64 {
        let mut cur = self.lines[id.0].leaf;
        let mut h = 0.0;
        if let NodeKind::Leaf(lines) = &self.nodes[cur.0].kind {
            for &line in lines {
                if line == id {
                    break;
                }
                h += self.lines[line.0].height;
            }
        }
        while let Some(parent) = self.nodes[cur.0].parent {
            if let NodeKind::Branch(children) = &self.nodes[parent.0].kind {
                for &child in children {
                    if child == cur {
                        break;
                    }
                    h += self.nodes[child.0].height;
                }
            }
            cur = parent;
        }
        h
    }

    /// Zero-based index of the line containing vertical offset `h`.
    ///
    /// Returns [`LineTree::len`] when `h` lies below the last line.
    pub fn line_at_height(&self, mut h: f64) -> usize {
        let mut n = 0;
        let mut node = self.root;
        'outer: loop {
            match &self.nodes[node.0].kind {
                NodeKind::Branch(children) => {
                    for &child in children {
                        let ch = self.nodes[child.0].height;
                        if h < ch {
                            node = child;
                            continue 'outer;
                        }
                        h -= ch;
                        n += self.nodes[child.0].size;
                    }
                    return n;
                }
                NodeKind::Leaf(lines) => {
                    for (i, &line) in lines.iter().enumerate() {
                        let lh = self.lines[line.0].height;
                        if h < lh {
                            return n + i;
                        }
                        h -= lh;
                    }
                    return n + lines.len();
                }
            }
        }
    }

    /// Verify the cached counts, heights, node fan-out and back links.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.nodes[self.root.0].parent.is_some() {
            return Err("root has a parent".to_string());
        }
        self.check_node(self.root).map(|_| ())
    }

    fn check_node(&self, id: NodeId) -> Result<(usize, f64), String> {
        let node = &self.nodes[id.0];
        let (size, height) = match &node.kind {
            NodeKind::Leaf(lines) => {
                if lines.len() > LEAF_MAX {
                    return Err(format!("leaf {id:?} holds {} lines", lines.len()));
                }
                for &line in lines {
                    if self.lines[line.0].leaf != id {
                        return Err(format!("line {line:?} points at the wrong leaf"));
                    }
                }
                let height = lines.iter().map(|l| self.lines[l.0].height).sum();
                (lines.len(), height)
            }
            NodeKind::Branch(children) => {
                if children.len() > BRANCH_MAX {
                    return Err(format!("branch {id:?} has {} children", children.len()));
                }
                if children.is_empty() && id != self.root {
                    return Err(format!("branch {id:?} is empty"));
                }
                let mut size = 0;
                let mut height = 0.0;
                for &child in children {
                    if self.nodes[child.0].parent != Some(id) {
                        return Err(format!("child {child:?} has the wrong parent"));
                    }
                    let (s, h) = self.check_node(child)?;
                    size += s;
                    height += h;
                }
                (size, height)
            }
        };
        if size != node.size {
            return Err(format!("node {id:?} caches size {} but holds {size}", node.size));
        }
        if (height - node.height).abs() > 1e-6 {
            return Err(format!(
                "node {id:?} caches height {} but holds {height}",
                node.height
            ));
        }
        Ok((size, height))
    }

    fn alloc_line(&mut self, line: Line) -> LineId {
        match self.free_lines.pop() {
            Some(slot) => {
                self.lines[slot] = line;
                LineId(slot)
            }
            None => {
                self.lines.push(line);
                LineId(self.lines.len() - 1)
            }
        }
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                NodeId(slot)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id.0] = Node::empty_leaf(None);
        self.free_nodes.push(id.0);
    }

    fn children_mut(&mut self, id: NodeId) -> &mut Vec<NodeId> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Branch(children) => children,
            NodeKind::Leaf(_) => unreachable!("leaf {id:?} has no children"),
        }
    }

    fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Leaf(_))
    }

    fn new_branch(&mut self, children: Vec<NodeId>, parent: Option<NodeId>) -> NodeId {
        let size = children.iter().map(|c| self.nodes[c.0].size).sum();
        let height = children.iter().map(|c| self.nodes[c.0].height).sum();
        let id = self.alloc_node(Node {
            parent,
            size,
            height,
            kind: NodeKind::Branch(Vec::new()),
        });
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        *self.children_mut(id) = children;
        id
    }

    fn new_leaf(&mut self, lines: Vec<LineId>, parent: NodeId) -> NodeId {
        let height = lines.iter().map(|l| self.lines[l.0].height).sum();
        let id = self.alloc_node(Node {
            parent: Some(parent),
            size: lines.len(),
            height,
            kind: NodeKind::Leaf(Vec::new()),
        });
        for &line in &lines {
            self.lines[line.0].leaf = id;
        }
        self.nodes[id.0].kind = NodeKind::Leaf(lines);
        id
    }

    fn insert_inner(&mut self, node: NodeId, at: usize, ids: Vec<LineId>, height: f64) {
        let n = ids.len();
        self.nodes[node.0].size += n;
        self.nodes[node.0].height += height;

        if let NodeKind::Leaf(lines) = &mut self.nodes[node.0].kind {
            let at = at.min(lines.len());
            for &line in &ids {
                self.lines[line.0].leaf = node;
            }
            lines.splice(at..at, ids);
            return;
        }

        let children = match &self.nodes[node.0].kind {
            NodeKind::Branch(children) => children.clone(),
            NodeKind::Leaf(_) => return,
        };
        if children.is_empty() {
            // Only an emptied root gets here.
            let leaf = self.new_leaf(ids, node);
            self.children_mut(node).push(leaf);
            return;
        }

        let mut at = at;
        let last = children.len() - 1;
        for (i, &child) in children.iter().enumerate() {
            let sz = self.nodes[child.0].size;
            if at <= sz || i == last {
                self.insert_inner(child, at.min(sz), ids, height);
                self.split_leaf_if_needed(node, i, child);
                break;
            }
            at -= sz;
        }
    }

    fn split_leaf_if_needed(&mut self, parent: NodeId, index: usize, child: NodeId) {
        let len = match &self.nodes[child.0].kind {
            NodeKind::Leaf(lines) if lines.len() > LEAF_MAX => lines.len(),
            _ => return,
        };
        let remaining = len % LEAF_CHUNK + LEAF_CHUNK;
        let tail = match &mut self.nodes[child.0].kind {
            NodeKind::Leaf(lines) => lines.split_off(remaining),
            NodeKind::Branch(_) => return,
        };
        let mut new_leaves = Vec::new();
        for chunk in tail.chunks(LEAF_CHUNK) {
            let leaf = self.new_leaf(chunk.to_vec(), parent);
            let moved = self.nodes[leaf.0].height;
            self.nodes[child.0].height -= moved;
            self.nodes[child.0].size -= chunk.len();
            new_leaves.push(leaf);
        }
        trace!(lines = len, leaves = new_leaves.len() + 1, "split leaf");
        let children = self.children_mut(parent);
        children.splice(index + 1..index + 1, new_leaves);
        self.maybe_spill(parent);
    }

    fn maybe_spill(&mut self, node: NodeId) {
        let count = |tree: &Self, id: NodeId| match &tree.nodes[id.0].kind {
            NodeKind::Branch(children) => children.len(),
            NodeKind::Leaf(_) => 0,
        };
        if count(self, node) <= BRANCH_MAX {
            return;
        }
        let mut me = node;
        loop {
            let spilled = {
                let children = self.children_mut(me);
                let split = children.len() - SPILL_COUNT;
                children.split_off(split)
            };
            let sibling = self.new_branch(spilled, None);
            match self.nodes[me.0].parent {
                None => {
                    // The root keeps its id: its remaining children move into a copy.
                    let rest = std::mem::take(self.children_mut(me));
                    let copy = self.new_branch(rest, Some(me));
                    *self.children_mut(me) = vec![copy, sibling];
                    me = copy;
                    trace!("root grew a level");
                }
                Some(parent) => {
                    let (size, height) = (self.nodes[sibling.0].size, self.nodes[sibling.0].height);
                    self.nodes[me.0].size -= size;
                    self.nodes[me.0].height -= height;
                    let children = self.children_mut(parent);
                    let index = children.iter().position(|&c| c == me).unwrap_or(0);
                    children.insert(index + 1, sibling);
                    trace!("branch spilled into a sibling");
                }
            }
            self.nodes[sibling.0].parent = self.nodes[me.0].parent;
            if count(self, me) <= BRANCH_MAX {
                break;
            }
        }
        if let Some(parent) = self.nodes[me.0].parent {
            self.maybe_spill(parent);
        }
    }

    fn remove_inner(&mut self, node: NodeId, at: usize, n: usize, out: &mut Vec<LineId>) {
        if let NodeKind::Leaf(lines) = &mut self.nodes[node.0].kind {
            let removed: Vec<LineId> = lines.drain(at..at + n).collect();
            let height: f64 = removed.iter().map(|l| self.lines[l.0].height).sum();
            self.nodes[node.0].height -= height;
            self.nodes[node.0].size -= n;
            out.extend(removed);
            return;
        }

        self.nodes[node.0].size -= n;
        let mut at = at;
        let mut n = n;
        let mut i = 0;
        while n > 0 {
            let child = match &self.nodes[node.0].kind {
                NodeKind::Branch(children) if i < children.len() => children[i],
                _ => break,
            };
            let sz = self.nodes[child.0].size;
            if at < sz {
                let rm = n.min(sz - at);
                let old_height = self.nodes[child.0].height;
                self.remove_inner(child, at, rm, out);
                let new_height = self.nodes[child.0].height;
                self.nodes[node.0].height -= old_height - new_height;
                if sz == rm {
                    self.children_mut(node).remove(i);
                    self.free_subtree(child);
                } else {
                    i += 1;
                }
                n -= rm;
                at = 0;
            } else {
                at -= sz;
                i += 1;
            }
        }

        let needs_collapse = match &self.nodes[node.0].kind {
            NodeKind::Branch(children) => {
                self.nodes[node.0].size < COLLAPSE_BELOW
                    && (children.len() > 1 || children.first().is_some_and(|&c| !self.is_leaf(c)))
            }
            NodeKind::Leaf(_) => false,
        };
        if needs_collapse {
            let mut lines = Vec::with_capacity(self.nodes[node.0].size);
            let children = std::mem::take(self.children_mut(node));
            for child in children {
                self.collect_lines(child, &mut lines);
                self.free_subtree(child);
            }
            trace!(lines = lines.len(), "collapsed branch into a leaf");
            let leaf = self.new_leaf(lines, node);
            self.children_mut(node).push(leaf);
        }
    }

    fn collect_lines(&self, node: NodeId, out: &mut Vec<LineId>) {
        match &self.nodes[node.0].kind {
            NodeKind::Leaf(lines) => out.extend_from_slice(lines),
            NodeKind::Branch(children) => {
                for &child in children {
                    self.collect_lines(child, out);
                }
            }
        }
    }

    fn free_subtree(&mut self, node: NodeId) {
        if let NodeKind::Branch(children) = &self.nodes[node.0].kind {
            for child in children.clone() {
                self.free_subtree(child);
            }
        }
        self.free_node(node);
    }

    fn iter_n(
        &self,
        node: NodeId,
        at: usize,
        n: usize,
        visit: &mut dyn FnMut(LineId) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        match &self.nodes[node.0].kind {
            NodeKind::Leaf(lines) => {
                for &line in &lines[at..(at + n).min(lines.len())] {
                    visit(line)?;
                }
            }
            NodeKind::Branch(children) => {
                let mut at = at;
                let mut n = n;
                for &child in children {
                    let sz = self.nodes[child.0].size;
                    if at < sz {
                        let used = n.min(sz - at);
                        self.iter_n(child, at, used, visit)?;
                        n -= used;
                        if n == 0 {
                            break;
                        }
                        at = 0;
                    } else {
                        at -= sz;
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(range: std::ops::Range<usize>) -> Vec<Line> {
        range
            .map(|i| Line::new(format!("line {i}"), Vec::new(), 1.0))
            .collect()
    }

    fn texts(tree: &LineTree) -> Vec<String> {
        let mut out = Vec::new();
        tree.iterate(0, tree.len(), |_, line| {
            out.push(line.text().to_string());
            ControlFlow::Continue(())
        });
        out
    }

    #[test]
    fn test_large_insert_splits_and_spills() {
        let tree = LineTree::from_lines(lines(0..1000));
        tree.check_invariants().unwrap();
        assert_eq!(tree.len(), 1000);
        assert_eq!(tree.height(), 1000.0);
        for n in [0, 1, 49, 50, 51, 500, 999] {
            let id = tree.line_at(n).unwrap();
            assert_eq!(tree.line(id).text(), format!("line {n}"));
            assert_eq!(tree.line_no(id), n);
        }
        assert!(tree.line_at(1000).is_none());
    }

    #[test]
    fn test_remove_collapses_small_branches() {
        let mut tree = LineTree::from_lines(lines(0..300));
        let removed = tree.remove(10, 280);
        assert_eq!(removed.len(), 280);
        assert_eq!(removed[0].text(), "line 10");
        tree.check_invariants().unwrap();
        assert_eq!(tree.len(), 20);
        assert_eq!(texts(&tree)[10], "line 290");
    }

    #[test]
    fn test_heights() {
        let mut tree = LineTree::from_lines(lines(0..120));
        let id = tree.line_at(60).unwrap();
        assert_eq!(tree.height_at_line(id), 60.0);
        tree.set_line_height(tree.line_at(3).unwrap(), 3.0);
        assert_eq!(tree.height(), 122.0);
        assert_eq!(tree.height_at_line(id), 62.0);
        assert_eq!(tree.line_at_height(4.5), 3);
        assert_eq!(tree.line_at_height(62.5), 60);
        assert_eq!(tree.line_at_height(1e9), 120);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_iterate_stops_early() {
        let tree = LineTree::from_lines(lines(0..200));
        let mut seen = 0;
        tree.iterate(40, 200, |_, _| {
            seen += 1;
            if seen == 7 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, 7);
        assert_eq!(tree.ids(195, 500).len(), 5);
    }

    #[test]
    fn test_random_operations_keep_invariants() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut tree = LineTree::from_lines(lines(0..10));
        let mut model: Vec<String> = texts(&tree);
        let mut next = 10;
        for _ in 0..400 {
            if model.len() > 1 && rng.gen_bool(0.45) {
                let at = rng.gen_range(0..model.len());
                let count = rng.gen_range(1..=(model.len() - at).min(120));
                if count == model.len() {
                    continue;
                }
                tree.remove(at, count);
                model.drain(at..at + count);
            } else {
                let at = rng.gen_range(0..=model.len());
                let count = rng.gen_range(1..150);
                tree.insert(at, lines(next..next + count));
                model.splice(at..at, (next..next + count).map(|i| format!("line {i}")));
                next += count;
            }
            tree.check_invariants().unwrap();
            assert_eq!(tree.len(), model.len());
        }
        assert_eq!(texts(&tree), model);
    }
}
