use super::{ScopeId, ScopeTree};
use std::fmt;

/// Dumps a scope tree with one scope per line and its variants underneath.
///
/// ```text
/// <root>
/// ├── app (Input) = demo
/// │     DEFAULT: app
/// │     EXTERNAL: demo
/// ```
pub struct ScopePrinter<'a> {
    pub tree: &'a ScopeTree,
}

impl<'a> ScopePrinter<'a> {
    pub fn new(tree: &'a ScopeTree) -> Self {
        Self { tree }
    }

    fn fmt_scope(
        &self,
        id: ScopeId,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node = self.tree.node(id);
        let marker = if is_last { "└── " } else { "├── " };
        write!(f, "{}{}{} ({:?})", prefix, marker, node.name(), node.frame())?;
        match node.value() {
            Some(value) => writeln!(f, " = {}", value)?,
            None if node.is_skipped() => writeln!(f, " <skipped>")?,
            None => writeln!(f)?,
        }

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        if node.variants().len() > 1 {
            for variant in node.variants() {
                writeln!(f, "{}  {}: {}", child_prefix, variant.kind, variant.value)?;
            }
        }

        let count = node.children().len();
        for (i, child) in node.children().iter().enumerate() {
            self.fmt_scope(*child, f, &child_prefix, i + 1 == count)?;
        }
        Ok(())
    }
}

impl fmt::Display for ScopePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.tree.root();
        writeln!(f, "<root>")?;
        let children = self.tree.node(root).children();
        for (i, child) in children.iter().enumerate() {
            self.fmt_scope(*child, f, "", i + 1 == children.len())?;
        }
        Ok(())
    }
}
