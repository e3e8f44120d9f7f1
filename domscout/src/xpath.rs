//! Path expressions.
//!
//! A compiled subset of XPath 1.0 location paths, evaluated against any
//! [`Document`]. Results are de-duplicated and returned in document order,
//! like an ordered node iterator.
//!
//! Supported:
//! - absolute and relative paths, `//`, `.`, `..`, unions with `|`
//! - axes `child`, `descendant`, `descendant-or-self`, `self`, `parent`,
//!   `ancestor`, `following-sibling`, `preceding-sibling`
//! - node tests: names (ASCII case-insensitive), `*`, `text()`, `node()`
//! - predicates: `[n]`, `[last()]`, `[@a]`, `[@a='v']`, `[@a!='v']`,
//!   `[text()='v']`, `[.='v']`, `[normalize-space()='v']`,
//!   `contains(..)`, `starts-with(..)`, `not(..)`, `and`, `or`
//! - a parenthesised head with predicates, e.g. `(//li)[2]/a`

use std::collections::{HashMap, HashSet};

use crate::dom::{Document, NodeId, NodeKind, TreeWalker, WhatToShow};
use crate::errors::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfNode,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    AnyElement,
    Text,
    AnyNode,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Attribute(String),
    Text,
    Context,
    NormalizedContext,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Exists(Operand),
    Equals(Operand, String),
    NotEquals(Operand, String),
    Contains(Operand, String),
    StartsWith(Operand, String),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    Condition(Condition),
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
enum Head {
    Root,
    Context,
    Group {
        inner: Box<PathExpr>,
        predicates: Vec<Predicate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct LocationPath {
    head: Head,
    steps: Vec<Step>,
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    source: String,
    branches: Vec<LocationPath>,
}

impl PathExpr {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let mut parser = Parser::new(source);
        let expr = parser.union()?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates against `document`, with the document node as context.
    pub fn evaluate<D: Document + ?Sized>(&self, document: &D) -> Vec<NodeId> {
        let order = document_order(document);
        let mut nodes = self.evaluate_from(document, &[document.root()], &order);
        sort_document_order(&mut nodes, &order);
        nodes
    }

    fn evaluate_from<D: Document + ?Sized>(
        &self,
        document: &D,
        context: &[NodeId],
        order: &HashMap<NodeId, usize>,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        for branch in &self.branches {
            out.extend(branch.evaluate(document, context, order));
        }
        sort_document_order(&mut out, order);
        out
    }
}

impl LocationPath {
    fn evaluate<D: Document + ?Sized>(
        &self,
        document: &D,
        context: &[NodeId],
        order: &HashMap<NodeId, usize>,
    ) -> Vec<NodeId> {
        let mut current = match &self.head {
            Head::Root => vec![document.root()],
            Head::Context => context.to_vec(),
            Head::Group { inner, predicates } => {
                let nodes = inner.evaluate_from(document, context, order);
                apply_predicates(document, nodes, predicates)
            }
        };

        for step in &self.steps {
            let mut next = Vec::new();
            for &node in &current {
                let candidates: Vec<NodeId> = axis_nodes(document, node, step.axis)
                    .into_iter()
                    .filter(|&n| matches_test(document, n, &step.test))
                    .collect();
                next.extend(apply_predicates(document, candidates, &step.predicates));
            }
            sort_document_order(&mut next, order);
            current = next;
        }
        current
    }
}

fn document_order<D: Document + ?Sized>(document: &D) -> HashMap<NodeId, usize> {
    let root = document.root();
    std::iter::once(root)
        .chain(TreeWalker::new(document, root, WhatToShow::All))
        .enumerate()
        .map(|(i, node)| (node, i))
        .collect()
}

fn sort_document_order(nodes: &mut Vec<NodeId>, order: &HashMap<NodeId, usize>) {
    let mut seen = HashSet::new();
    nodes.retain(|n| seen.insert(*n));
    nodes.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
}

/// Nodes on `axis` from `node`, in axis order (reverse axes nearest first).
fn axis_nodes<D: Document + ?Sized>(document: &D, node: NodeId, axis: Axis) -> Vec<NodeId> {
    let children = |n: NodeId| document.children(n).unwrap_or_default();
    let parent = |n: NodeId| document.parent(n).ok().flatten();

    match axis {
        Axis::Child => children(node),
        Axis::Descendant => TreeWalker::new(document, node, WhatToShow::All).collect(),
        Axis::DescendantOrSelf => std::iter::once(node)
            .chain(TreeWalker::new(document, node, WhatToShow::All))
            .collect(),
        Axis::SelfNode => vec![node],
        Axis::Parent => parent(node).into_iter().collect(),
        Axis::Ancestor => {
            let mut out = Vec::new();
            let mut cursor = parent(node);
            while let Some(p) = cursor {
                out.push(p);
                cursor = parent(p);
            }
            out
        }
        Axis::FollowingSibling | Axis::PrecedingSibling => {
            let Some(p) = parent(node) else {
                return Vec::new();
            };
            let siblings = children(p);
            let Some(index) = siblings.iter().position(|&s| s == node) else {
                return Vec::new();
            };
            if axis == Axis::FollowingSibling {
                siblings[index + 1..].to_vec()
            } else {
                siblings[..index].iter().rev().copied().collect()
            }
        }
    }
}

fn matches_test<D: Document + ?Sized>(document: &D, node: NodeId, test: &NodeTest) -> bool {
    let Ok(kind) = document.kind(node) else {
        return false;
    };
    match test {
        NodeTest::AnyNode => true,
        NodeTest::Text => kind == NodeKind::Text,
        NodeTest::AnyElement => kind == NodeKind::Element,
        NodeTest::Name(name) => {
            kind == NodeKind::Element
                && document
                    .tag_name(node)
                    .map(|tag| tag.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
        }
    }
}

fn apply_predicates<D: Document + ?Sized>(
    document: &D,
    mut nodes: Vec<NodeId>,
    predicates: &[Predicate],
) -> Vec<NodeId> {
    for predicate in predicates {
        let size = nodes.len();
        nodes = nodes
            .into_iter()
            .enumerate()
            .filter(|(i, node)| match predicate {
                Predicate::Position(n) => i + 1 == *n,
                Predicate::Last => i + 1 == size,
                Predicate::Condition(condition) => condition.holds(document, *node),
            })
            .map(|(_, node)| node)
            .collect();
    }
    nodes
}

impl Operand {
    /// String values of the operand's node-set, in order.
    fn values<D: Document + ?Sized>(&self, document: &D, node: NodeId) -> Vec<String> {
        match self {
            Operand::Attribute(name) => document
                .attribute(node, name)
                .ok()
                .flatten()
                .into_iter()
                .collect(),
            Operand::Text => document
                .children(node)
                .unwrap_or_default()
                .into_iter()
                .filter(|&c| matches!(document.kind(c), Ok(NodeKind::Text)))
                .filter_map(|c| document.text_content(c).ok())
                .collect(),
            Operand::Context => document.text_content(node).ok().into_iter().collect(),
            Operand::NormalizedContext => document
                .text_content(node)
                .ok()
                .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
                .into_iter()
                .collect(),
        }
    }
}

impl Condition {
    fn holds<D: Document + ?Sized>(&self, document: &D, node: NodeId) -> bool {
        match self {
            // a string value is true only when non-empty
            Condition::Exists(operand @ (Operand::Context | Operand::NormalizedContext)) => operand
                .values(document, node)
                .first()
                .is_some_and(|v| !v.is_empty()),
            Condition::Exists(operand) => !operand.values(document, node).is_empty(),
            Condition::Equals(operand, literal) => {
                operand.values(document, node).iter().any(|v| v == literal)
            }
            Condition::NotEquals(operand, literal) => {
                operand.values(document, node).iter().any(|v| v != literal)
            }
            Condition::Contains(operand, literal) => operand
                .values(document, node)
                .first()
                .is_some_and(|v| v.contains(literal.as_str())),
            Condition::StartsWith(operand, literal) => operand
                .values(document, node)
                .first()
                .is_some_and(|v| v.starts_with(literal.as_str())),
            Condition::Not(inner) => !inner.holds(document, node),
            Condition::And(a, b) => a.holds(document, node) && b.holds(document, node),
            Condition::Or(a, b) => a.holds(document, node) || b.holds(document, node),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> QueryError {
        QueryError::InvalidPath(format!(
            "{reason} at offset {} in {:?}",
            self.pos, self.source
        ))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn looking_at(&self, token: &str) -> bool {
        token
            .chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.looking_at(token) {
            self.pos += token.chars().count();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), QueryError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    /// Consumes `keyword` only when it is not the prefix of a longer name.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let end = self.pos + keyword.chars().count();
        let boundary = self.chars.get(end).map_or(true, |c| !is_name_char(*c));
        if self.looking_at(keyword) && boundary {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn name(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += 1,
            _ => return None,
        }
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn literal(&mut self) -> Result<String, QueryError> {
        self.skip_ws();
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => {
                let number = self.number();
                return number
                    .map(|n| n.to_string())
                    .ok_or_else(|| self.error("expected a string literal"));
            }
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string literal"))
    }

    fn number(&mut self) -> Option<usize> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn union(&mut self) -> Result<PathExpr, QueryError> {
        let mut branches = vec![self.location_path()?];
        while self.eat("|") {
            branches.push(self.location_path()?);
        }
        Ok(PathExpr {
            source: self.source.to_string(),
            branches,
        })
    }

    fn location_path(&mut self) -> Result<LocationPath, QueryError> {
        self.skip_ws();
        let mut steps = Vec::new();

        let head = if self.eat("(") {
            let inner = self.union()?;
            self.expect(")")?;
            let predicates = self.predicates()?;
            Head::Group {
                inner: Box::new(inner),
                predicates,
            }
        } else if self.looking_at("//") {
            Head::Root
        } else if self.eat("/") {
            self.skip_ws();
            // a lone "/" selects the document node
            if self.at_end() || matches!(self.peek(), Some('|' | ')')) {
                return Ok(LocationPath {
                    head: Head::Root,
                    steps,
                });
            }
            steps.push(self.step()?);
            Head::Root
        } else {
            steps.push(self.step()?);
            Head::Context
        };

        loop {
            if self.eat("//") {
                steps.push(Step {
                    axis: Axis::DescendantOrSelf,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
                steps.push(self.step()?);
            } else if self.eat("/") {
                steps.push(self.step()?);
            } else {
                break;
            }
        }

        if steps.is_empty() && !matches!(head, Head::Group { .. }) {
            return Err(self.error("empty location path"));
        }
        Ok(LocationPath { head, steps })
    }

    fn step(&mut self) -> Result<Step, QueryError> {
        if self.eat("..") {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }
        if self.eat(".") {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }
        if self.eat("@") {
            return Err(self.error("attribute nodes cannot be located"));
        }

        let mut axis = Axis::Child;
        let test = if self.eat("*") {
            NodeTest::AnyElement
        } else {
            let mut name = self.name().ok_or_else(|| self.error("expected a node test"))?;
            if self.eat("::") {
                axis = Axis::from_name(&name)
                    .ok_or_else(|| self.error(&format!("unsupported axis {name:?}")))?;
                if self.eat("*") {
                    return Ok(Step {
                        axis,
                        test: NodeTest::AnyElement,
                        predicates: self.predicates()?,
                    });
                }
                name = self.name().ok_or_else(|| self.error("expected a node test"))?;
            }
            if self.eat("(") {
                self.expect(")")?;
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::AnyNode,
                    _ => return Err(self.error(&format!("unsupported node test {name}()"))),
                }
            } else {
                NodeTest::Name(name)
            }
        };

        Ok(Step {
            axis,
            test,
            predicates: self.predicates()?,
        })
    }

    fn predicates(&mut self) -> Result<Vec<Predicate>, QueryError> {
        let mut predicates = Vec::new();
        while self.eat("[") {
            self.skip_ws();
            let predicate = if let Some(n) = self.number() {
                if n == 0 {
                    return Err(self.error("positions start at 1"));
                }
                Predicate::Position(n)
            } else if self.eat_keyword("last") {
                self.expect("(")?;
                self.expect(")")?;
                Predicate::Last
            } else {
                Predicate::Condition(self.or_condition()?)
            };
            self.expect("]")?;
            predicates.push(predicate);
        }
        Ok(predicates)
    }

    fn or_condition(&mut self) -> Result<Condition, QueryError> {
        let mut left = self.and_condition()?;
        while self.eat_keyword("or") {
            let right = self.and_condition()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_condition(&mut self) -> Result<Condition, QueryError> {
        let mut left = self.primary_condition()?;
        while self.eat_keyword("and") {
            let right = self.primary_condition()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary_condition(&mut self) -> Result<Condition, QueryError> {
        if self.eat("(") {
            let inner = self.or_condition()?;
            self.expect(")")?;
            return Ok(inner);
        }
        if self.eat_keyword("not") {
            self.expect("(")?;
            let inner = self.or_condition()?;
            self.expect(")")?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        if self.eat_keyword("contains") {
            let (operand, literal) = self.function_args()?;
            return Ok(Condition::Contains(operand, literal));
        }
        if self.eat_keyword("starts-with") {
            let (operand, literal) = self.function_args()?;
            return Ok(Condition::StartsWith(operand, literal));
        }

        let operand = self.operand()?;
        if self.eat("!=") {
            Ok(Condition::NotEquals(operand, self.literal()?))
        } else if self.eat("=") {
            Ok(Condition::Equals(operand, self.literal()?))
        } else {
            Ok(Condition::Exists(operand))
        }
    }

    /// `(operand, 'literal')` of a two-argument string function.
    fn function_args(&mut self) -> Result<(Operand, String), QueryError> {
        self.expect("(")?;
        let operand = self.operand()?;
        self.expect(",")?;
        let literal = self.literal()?;
        self.expect(")")?;
        Ok((operand, literal))
    }

    fn operand(&mut self) -> Result<Operand, QueryError> {
        if self.eat("@") {
            let name = self
                .name()
                .ok_or_else(|| self.error("expected an attribute name"))?;
            return Ok(Operand::Attribute(name));
        }
        if self.eat_keyword("text") {
            self.expect("(")?;
            self.expect(")")?;
            return Ok(Operand::Text);
        }
        if self.eat_keyword("normalize-space") {
            self.expect("(")?;
            self.eat(".");
            self.expect(")")?;
            return Ok(Operand::NormalizedContext);
        }
        if self.eat(".") {
            return Ok(Operand::Context);
        }
        Err(self.error("expected @attribute, text(), . or normalize-space()"))
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}
