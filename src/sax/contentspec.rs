//! Content specifications of element type declarations.
//!
//! ```text
//! [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
//! ```

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentSpec {
    EMPTY,
    ANY,
    /// The element types that may appear in mixed content, without `#PCDATA`.
    Mixed(Vec<Box<str>>),
    Children(ElementContent),
}

impl std::fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EMPTY => write!(f, "EMPTY"),
            Self::ANY => write!(f, "ANY"),
            Self::Mixed(names) if names.is_empty() => write!(f, "(#PCDATA)"),
            Self::Mixed(names) => write!(f, "(#PCDATA|{})*", names.join("|")),
            Self::Children(content) => write!(f, "{content}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    /// `?`
    ZeroOrOne,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Occurrence {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'?' => Some(Self::ZeroOrOne),
            b'*' => Some(Self::ZeroOrMore),
            b'+' => Some(Self::OneOrMore),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Self::ZeroOrOne => '?',
            Self::ZeroOrMore => '*',
            Self::OneOrMore => '+',
        }
    }
}

/// A node of an element content model.  
/// Children are referred to by their indices in [`ElementContent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementContentNode {
    Name(Box<str>),
    /// ```text
    /// [50] seq ::= '(' S? cp ( S? ',' S? cp )* S? ')'
    /// ```
    Sequence(Vec<usize>),
    /// ```text
    /// [49] choice ::= '(' S? cp ( S? '|' S? cp )+ S? ')'
    /// ```
    Choice(Vec<usize>),
    Repeat(usize, Occurrence),
}

/// An expression tree of an element content model.
///
/// ```text
/// [47] children ::= (choice | seq) ('?' | '*' | '+')?
/// [48] cp       ::= (Name | choice | seq) ('?' | '*' | '+')?
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementContent {
    nodes: Vec<ElementContentNode>,
    root: usize,
}

impl ElementContent {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: ElementContentNode) -> usize {
        let id = self.nodes.len();
        self.nodes.push(node);
        // the node created last always becomes the root
        self.root = id;
        id
    }

    pub(crate) fn create_name(&mut self, name: impl Into<Box<str>>) -> usize {
        self.push(ElementContentNode::Name(name.into()))
    }

    pub(crate) fn create_sequence(&mut self, children: Vec<usize>) -> usize {
        self.push(ElementContentNode::Sequence(children))
    }

    pub(crate) fn create_choice(&mut self, children: Vec<usize>) -> usize {
        self.push(ElementContentNode::Choice(children))
    }

    pub(crate) fn create_repeat(&mut self, child: usize, occurrence: Occurrence) -> usize {
        self.push(ElementContentNode::Repeat(child, occurrence))
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, id: usize) -> Option<&ElementContentNode> {
        self.nodes.get(id)
    }

    /// Iterate element type names appearing in this model, in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let mut stack = vec![self.root];
        let mut ret = vec![];
        while let Some(id) = stack.pop() {
            match &self.nodes[id] {
                ElementContentNode::Name(name) => ret.push(name.as_ref()),
                ElementContentNode::Sequence(children) | ElementContentNode::Choice(children) => {
                    stack.extend(children.iter().rev())
                }
                &ElementContentNode::Repeat(child, _) => stack.push(child),
            }
        }
        ret.into_iter()
    }

    fn write_node(&self, id: usize, buf: &mut String) {
        match &self.nodes[id] {
            ElementContentNode::Name(name) => buf.push_str(name),
            ElementContentNode::Sequence(children) | ElementContentNode::Choice(children) => {
                let sep = if matches!(self.nodes[id], ElementContentNode::Sequence(_)) {
                    ','
                } else {
                    '|'
                };
                buf.push('(');
                for (i, &child) in children.iter().enumerate() {
                    if i > 0 {
                        buf.push(sep);
                    }
                    self.write_node(child, buf);
                }
                buf.push(')');
            }
            &ElementContentNode::Repeat(child, occurrence) => {
                self.write_node(child, buf);
                write!(buf, "{}", occurrence.as_char()).ok();
            }
        }
    }
}

impl std::fmt::Display for ElementContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        self.write_node(self.root, &mut buf);
        f.write_str(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_content_model() {
        // ((a,b)|c*)+
        let mut content = ElementContent::new();
        let a = content.create_name("a");
        let b = content.create_name("b");
        let seq = content.create_sequence(vec![a, b]);
        let c = content.create_name("c");
        let c = content.create_repeat(c, Occurrence::ZeroOrMore);
        let choice = content.create_choice(vec![seq, c]);
        content.create_repeat(choice, Occurrence::OneOrMore);

        assert_eq!(content.to_string(), "((a,b)|c*)+");
        assert_eq!(content.names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(
            ContentSpec::Children(content).to_string(),
            "((a,b)|c*)+"
        );
    }

    #[test]
    fn render_mixed() {
        assert_eq!(ContentSpec::Mixed(vec![]).to_string(), "(#PCDATA)");
        assert_eq!(
            ContentSpec::Mixed(vec!["a".into(), "b".into()]).to_string(),
            "(#PCDATA|a|b)*"
        );
    }
}
