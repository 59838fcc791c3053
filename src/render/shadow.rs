// ============================================================================
// spark-observable - Shadow Tree
// Path-addressed mirror of what has been placed into one host container
// ============================================================================
//
// The reconciler never asks the host where things are. Every slot it renders
// is recorded here under its path, so a slot that re-renders later can find
// the first host node that follows it and insert its new content there.
// ============================================================================

/// One slot of the shadow tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Shadow<N> {
    Empty,
    Leaf(N),
    Seq(Vec<Shadow<N>>),
}

impl<N: Clone + PartialEq> Shadow<N> {
    /// A fresh root: an empty list whose slot `[0]` the render fills.
    pub fn root() -> Self {
        Shadow::Seq(Vec::new())
    }

    /// Slot at `path`, if it exists.
    pub fn get(&self, path: &[usize]) -> Option<&Shadow<N>> {
        let mut current = self;
        for &index in path {
            match current {
                Shadow::Seq(items) => current = items.get(index)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Store `value` at `path`, returning what was there.
    ///
    /// The parent of the slot must be a `Seq`. Writing one past its end
    /// appends.
    ///
    /// # Panics
    ///
    /// Panics if an ancestor of the slot is not a list, which means a
    /// template rendered out of order.
    pub fn set(&mut self, path: &[usize], value: Shadow<N>) -> Shadow<N> {
        let Some((&last, parents)) = path.split_last() else {
            return std::mem::replace(self, value);
        };
        let mut current = self;
        for &index in parents {
            current = match current {
                Shadow::Seq(items) if index < items.len() => &mut items[index],
                _ => panic!("shadow slot {path:?} has no list parent"),
            };
        }
        let Shadow::Seq(items) = current else {
            panic!("shadow slot {path:?} has no list parent");
        };
        if last < items.len() {
            std::mem::replace(&mut items[last], value)
        } else {
            items.resize(last, Shadow::Empty);
            items.push(value);
            Shadow::Empty
        }
    }

    /// Every host node in the subtree, in document order.
    pub fn nodes(&self) -> Vec<N> {
        let mut out = Vec::new();
        self.collect_nodes(&mut out);
        out
    }

    fn collect_nodes(&self, out: &mut Vec<N>) {
        match self {
            Shadow::Empty => {}
            Shadow::Leaf(node) => out.push(node.clone()),
            Shadow::Seq(items) => items.iter().for_each(|item| item.collect_nodes(out)),
        }
    }

    /// First host node in the subtree.
    pub fn first_node(&self) -> Option<&N> {
        match self {
            Shadow::Empty => None,
            Shadow::Leaf(node) => Some(node),
            Shadow::Seq(items) => items.iter().find_map(Shadow::first_node),
        }
    }

    /// The first host node placed after the slot at `path`, or `None` when
    /// the slot's content should be appended.
    ///
    /// Descends along the path; whenever the deeper levels yield nothing,
    /// the later siblings at the current level are scanned in order.
    pub fn find_next_node(&self, path: &[usize]) -> Option<N> {
        let Some((&index, rest)) = path.split_first() else {
            return None;
        };
        let Shadow::Seq(items) = self else {
            return None;
        };
        if !rest.is_empty() {
            if let Some(found) = items.get(index).and_then(|child| child.find_next_node(rest)) {
                return Some(found);
            }
        }
        items
            .iter()
            .skip(index + 1)
            .find_map(Shadow::first_node)
            .cloned()
    }

    /// Empty the slot currently holding `node`. Returns whether it was found.
    pub fn detach(&mut self, node: &N) -> bool {
        match self {
            Shadow::Leaf(existing) if existing == node => {
                *self = Shadow::Empty;
                true
            }
            Shadow::Seq(items) => items.iter_mut().any(|item| item.detach(node)),
            _ => false,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
