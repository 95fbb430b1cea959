/// One segment of a scope path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// `~`, anchors the path at the root scope.
    Root,
    /// `..`, moves to the parent scope.
    Parent,
    Name(&'a str),
}

/// Splits a dotted scope path into segments.
///
/// `~` is only meaningful as the first character; `..` may repeat, as in `....name`.
pub fn parse(path: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = path.trim();
    if let Some(stripped) = rest.strip_prefix('~') {
        segments.push(Segment::Root);
        rest = stripped.strip_prefix('.').unwrap_or(stripped);
    }
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix("..") {
            segments.push(Segment::Parent);
            rest = stripped;
            continue;
        }
        let end = rest.find('.').unwrap_or(rest.len());
        let name = rest[..end].trim();
        if !name.is_empty() {
            segments.push(Segment::Name(name));
        }
        rest = rest.get(end + 1..).unwrap_or("");
    }
    segments
}

/// Keeps a frame name addressable by dotted paths.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '#') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
