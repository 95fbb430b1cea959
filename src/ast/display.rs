use super::{Node, NodeKind};
use itertools::Itertools;
use std::fmt;

/// A wrapper to display a script tree, one node per line.
/// Used to inspect the output of the compiler.
pub struct DisplayNode<'a> {
    pub node: &'a Node,
}

impl<'a> fmt::Display for DisplayNode<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header(self.node))?;
        let count = self.node.children().len();
        for (i, child) in self.node.children().iter().enumerate() {
            self.fmt_as_tree(child, f, "", i + 1 == count)?;
        }
        Ok(())
    }
}

impl<'a> DisplayNode<'a> {
    fn fmt_as_tree(
        &self,
        node: &Node,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        writeln!(f, "{}{}{}", prefix, node_marker, self.header(node))?;

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        let count = node.children().len();
        for (i, child) in node.children().iter().enumerate() {
            self.fmt_as_tree(child, f, &child_prefix, i + 1 == count)?;
        }
        Ok(())
    }

    fn header(&self, node: &Node) -> String {
        let mut header = node.kind().to_string();
        if node.kind() == NodeKind::Condition {
            if let Some(expr) = node.expression() {
                header.push_str(&format!(" {}", expr));
            }
            return header;
        }
        let attributes = node
            .attributes()
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(k, v)| format!("{}={}", k, v))
            .join(" ");
        if !attributes.is_empty() {
            header.push_str(&format!(" [{}]", attributes));
        }
        header
    }
}
