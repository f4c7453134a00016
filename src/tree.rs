//! Sibling and ancestor bookkeeping for a depth-first task listing.

/// Where one entry of a depth-first listing sits in its tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreeNode {
    pub depth: usize,
    /// A later entry shares this depth before any shallower entry appears.
    pub has_next_sibling: bool,
    /// The entry right after this one is deeper.
    pub has_children: bool,
    /// `has_next_sibling` of the ancestor at each depth `0..depth`.
    pub ancestors: Vec<bool>,
}

/// Computes [`TreeNode`]s for a depth-first listing given as depths.
///
/// Linear in the number of entries: sibling lookahead is resolved walking
/// backwards with one flag per depth, ancestor vectors walking forwards with
/// a depth-indexed stack.
pub fn topology(depths: &[usize]) -> Vec<TreeNode> {
    let mut nodes: Vec<TreeNode> = Vec::with_capacity(depths.len());
    nodes.resize_with(depths.len(), TreeNode::default);

    // seen[d]: an entry at depth d was passed since the last shallower one.
    let mut seen: Vec<bool> = Vec::new();
    for (i, &depth) in depths.iter().enumerate().rev() {
        let node = &mut nodes[i];
        node.depth = depth;
        node.has_next_sibling = seen.get(depth).copied().unwrap_or(false);
        node.has_children = depths.get(i + 1).is_some_and(|&next| next > depth);
        seen.truncate(depth + 1);
        seen.resize(depth + 1, false);
        seen[depth] = true;
    }

    let mut stack: Vec<bool> = Vec::new();
    for node in &mut nodes {
        stack.truncate(node.depth);
        stack.resize(node.depth, false);
        node.ancestors = stack.clone();
        stack.push(node.has_next_sibling);
    }

    nodes
}
