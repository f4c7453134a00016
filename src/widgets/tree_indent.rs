use crate::tree::TreeNode;

/// Box-drawing prefix for a task's position in the hierarchy.
///
/// ```text
/// root task
/// ├── child 1
/// │   ├── grandchild a
/// │   └── grandchild b
/// └── child 2
/// ```
///
/// Root tasks get an empty prefix. The own-level segment is three columns
/// wide (`├──`); the row gap that follows it lines the text up with the
/// four-column ancestor segments (`│   `).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeIndent(String);

impl TreeIndent {
    pub fn of(node: &TreeNode) -> Self {
        if node.depth == 0 {
            return Self(String::new());
        }
        let mut out = ancestor_columns(node);
        match node.has_next_sibling {
            true => out.push_str("├──"),
            false => out.push_str("└──"),
        }
        Self(out)
    }

    /// Prefix for a task's second display line, continuing the tree lines
    /// that pass through the task's own row.
    pub fn continuation(node: &TreeNode) -> Self {
        let mut out = ancestor_columns(node);
        if node.depth > 0 {
            out.push(if node.has_next_sibling { '│' } else { ' ' });
            out.push_str("   ");
        }
        out.push(if node.has_children { '│' } else { ' ' });
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One four-column segment per connector-drawing ancestor (depth ≥ 1).
fn ancestor_columns(node: &TreeNode) -> String {
    let mut out = String::new();
    for &has_next in node.ancestors.iter().skip(1) {
        match has_next {
            true => out.push_str("│   "),
            false => out.push_str("    "),
        }
    }
    out
}

impl std::fmt::Display for TreeIndent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::topology;

    fn indents(depths: &[usize]) -> Vec<String> {
        topology(depths)
            .iter()
            .map(|n| TreeIndent::of(n).to_string())
            .collect()
    }

    #[test]
    fn draws_tree_lines() {
        assert_eq!(
            indents(&[0, 1, 2, 2, 1]),
            vec!["", "├──", "│   ├──", "│   └──", "└──"]
        );
    }

    #[test]
    fn closed_ancestor_leaves_blank_column() {
        assert_eq!(indents(&[0, 1, 2]), vec!["", "└──", "    └──"]);
    }

    #[test]
    fn continuation_follows_siblings_and_children() {
        let nodes = topology(&[0, 1, 2, 1]);
        assert_eq!(TreeIndent::continuation(&nodes[0]).as_str(), "│");
        assert_eq!(TreeIndent::continuation(&nodes[1]).as_str(), "│   │");
        assert_eq!(TreeIndent::continuation(&nodes[3]).as_str(), "     ");
    }
}
