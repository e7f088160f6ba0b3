use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::core::dom::{Document, NodeId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    #[error("Unsupported pseudo-class: {0}")]
    UnsupportedPseudoClass(String),
    #[error("Unsupported pseudo-element: {0}")]
    UnsupportedPseudoElement(String),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

/// Relation between a compound and the compound to its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combinator {
    None,
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeOperator {
    Exists,
    Equal,
    Contains,
    DashMatch,
    StartsWith,
    EndsWith,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeSelector {
    pub name: String,
    pub operator: AttributeOperator,
    pub value: Option<String>,
    pub case_insensitive: bool,
}

impl AttributeSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        if self.operator == AttributeOperator::Exists {
            return true;
        }
        let Some(expected) = self.value.as_deref() else {
            return false;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual.to_string(), expected.to_string())
        };
        match self.operator {
            AttributeOperator::Exists => true,
            AttributeOperator::Equal => actual == expected,
            AttributeOperator::Contains => actual.split_whitespace().any(|v| v == expected),
            AttributeOperator::DashMatch => {
                actual == expected || actual.starts_with(&format!("{expected}-"))
            }
            AttributeOperator::StartsWith => !expected.is_empty() && actual.starts_with(&expected),
            AttributeOperator::EndsWith => !expected.is_empty() && actual.ends_with(&expected),
            AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PseudoClass {
    Root,
    Empty,
    FirstChild,
    LastChild,
    OnlyChild,
    NthChild(NthPattern),
    NthLastChild(NthPattern),
    Not(Box<SimpleSelector>),
}

/// `an+b` position pattern, positions counted from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NthPattern {
    pub a: i32,
    pub b: i32,
}

impl NthPattern {
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || SelectorError::Parse(format!("Invalid nth pattern: {input}"));
        let number = |s: &str| s.parse::<i32>().map_err(|_| invalid());

        match compact.as_str() {
            "odd" => return Ok(Self::new(2, 1)),
            "even" => return Ok(Self::new(2, 0)),
            _ => {}
        }

        let Some(n_pos) = compact.find('n') else {
            return Ok(Self::new(0, number(&compact)?));
        };
        let a = match &compact[..n_pos] {
            "" | "+" => 1,
            "-" => -1,
            other => number(other)?,
        };
        let rest = &compact[n_pos + 1..];
        let b = if rest.is_empty() {
            0
        } else if let Some(positive) = rest.strip_prefix('+') {
            number(positive)?
        } else if rest.starts_with('-') {
            number(rest)?
        } else {
            return Err(invalid());
        };
        Ok(Self::new(a, b))
    }

    pub fn matches(&self, position: i32) -> bool {
        if self.a == 0 {
            return position == self.b;
        }
        let diff = position - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleSelector {
    pub element_name: Option<String>,
    pub id: Option<String>,
    pub classes: SmallVec<[String; 4]>,
    pub attributes: SmallVec<[AttributeSelector; 2]>,
    pub pseudo_classes: SmallVec<[PseudoClass; 2]>,
}

impl SimpleSelector {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.element_name.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.pseudo_classes.is_empty()
    }

    pub fn matches(&self, node_id: NodeId, document: &Document) -> bool {
        let own = document.with_node(node_id, |node| {
            if !node.is_element() {
                return false;
            }
            if let Some(name) = self.element_name.as_deref() {
                if name != "*" && !node.matches_tag(name) {
                    return false;
                }
            }
            if let Some(id) = self.id.as_deref() {
                if !node.matches_id(id) {
                    return false;
                }
            }
            if !self.classes.iter().all(|c| node.matches_class(c)) {
                return false;
            }
            self.attributes
                .iter()
                .all(|a| a.matches(node.attributes.get(&a.name).map(String::as_str)))
        });
        own.unwrap_or(false)
            && self
                .pseudo_classes
                .iter()
                .all(|p| matches_pseudo_class(p, node_id, document))
    }
}

fn element_siblings(node_id: NodeId, document: &Document) -> Option<(Vec<NodeId>, usize)> {
    let parent = document.get_parent(node_id)?;
    let siblings: Vec<NodeId> = document
        .get_children(parent)
        .into_iter()
        .filter(|&id| document.is_element(id))
        .collect();
    let index = siblings.iter().position(|&id| id == node_id)?;
    Some((siblings, index))
}

fn matches_pseudo_class(pseudo_class: &PseudoClass, node_id: NodeId, document: &Document) -> bool {
    match pseudo_class {
        PseudoClass::Root => node_id == document.document_element(),
        PseudoClass::Empty => document.get_children(node_id).iter().all(|&child| {
            document
                .with_node(child, |n| n.is_text() && n.text_content.is_empty())
                .unwrap_or(true)
        }),
        PseudoClass::FirstChild => {
            element_siblings(node_id, document).is_some_and(|(_, index)| index == 0)
        }
        PseudoClass::LastChild => element_siblings(node_id, document)
            .is_some_and(|(siblings, index)| index + 1 == siblings.len()),
        PseudoClass::OnlyChild => {
            element_siblings(node_id, document).is_some_and(|(siblings, _)| siblings.len() == 1)
        }
        PseudoClass::NthChild(pattern) => element_siblings(node_id, document)
            .is_some_and(|(_, index)| pattern.matches(index as i32 + 1)),
        PseudoClass::NthLastChild(pattern) => element_siblings(node_id, document)
            .is_some_and(|(siblings, index)| pattern.matches((siblings.len() - index) as i32)),
        PseudoClass::Not(inner) => !inner.matches(node_id, document),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compound {
    pub combinator: Combinator,
    pub selector: SimpleSelector,
}

/// Compounds left to right; each compound's combinator links it to the one before.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexSelector {
    pub compounds: SmallVec<[Compound; 4]>,
}

impl ComplexSelector {
    pub fn matches(&self, node_id: NodeId, document: &Document) -> bool {
        match self.compounds.len() {
            0 => false,
            len => self.matches_at(len - 1, node_id, document),
        }
    }

    fn matches_at(&self, index: usize, node_id: NodeId, document: &Document) -> bool {
        let compound = &self.compounds[index];
        if !compound.selector.matches(node_id, document) {
            return false;
        }
        if index == 0 {
            return true;
        }
        let left = index - 1;
        match compound.combinator {
            Combinator::None => true,
            Combinator::Child => document
                .get_parent(node_id)
                .is_some_and(|parent| self.matches_at(left, parent, document)),
            Combinator::Descendant => {
                let mut current = document.get_parent(node_id);
                while let Some(ancestor) = current {
                    if self.matches_at(left, ancestor, document) {
                        return true;
                    }
                    current = document.get_parent(ancestor);
                }
                false
            }
            Combinator::NextSibling => element_siblings(node_id, document)
                .and_then(|(siblings, index)| index.checked_sub(1).map(|i| siblings[i]))
                .is_some_and(|previous| self.matches_at(left, previous, document)),
            Combinator::SubsequentSibling => element_siblings(node_id, document)
                .is_some_and(|(siblings, index)| {
                    siblings[..index]
                        .iter()
                        .any(|&previous| self.matches_at(left, previous, document))
                }),
        }
    }
}

/// A comma separated selector list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub complex_selectors: SmallVec<[ComplexSelector; 2]>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        SelectorParser::new(input).parse()
    }

    pub fn matches(&self, node_id: NodeId, document: &Document) -> bool {
        self.complex_selectors
            .iter()
            .any(|cs| cs.matches(node_id, document))
    }
}

struct SelectorParser<'a> {
    input: &'a str,
    position: usize,
    current: Option<char>,
}

impl<'a> SelectorParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            current: input.chars().next(),
        }
    }

    fn parse(&mut self) -> Result<Selector> {
        let mut complex_selectors = SmallVec::new();

        loop {
            self.skip_whitespace();
            complex_selectors.push(self.parse_complex_selector()?);
            self.skip_whitespace();

            if self.consume_char(',') {
                continue;
            }
            if !self.is_at_end() {
                return Err(SelectorError::Parse(format!(
                    "Unexpected '{}' in '{}'",
                    self.current.unwrap_or_default(),
                    self.input
                )));
            }
            break;
        }

        Ok(Selector { complex_selectors })
    }

    fn parse_complex_selector(&mut self) -> Result<ComplexSelector> {
        let mut compounds = SmallVec::new();
        let mut combinator = Combinator::None;

        loop {
            let selector = self.parse_simple_selector()?;
            if selector.is_empty() {
                return Err(SelectorError::InvalidSelector(self.input.to_string()));
            }
            compounds.push(Compound {
                combinator,
                selector,
            });

            combinator = self.parse_combinator();
            if combinator == Combinator::None {
                break;
            }
        }

        Ok(ComplexSelector { compounds })
    }

    fn parse_simple_selector(&mut self) -> Result<SimpleSelector> {
        let mut selector = SimpleSelector::new();

        while let Some(c) = self.current {
            match c {
                '*' => {
                    self.advance();
                    selector.element_name = Some("*".to_string());
                }
                '#' => {
                    self.advance();
                    selector.id = Some(self.parse_name()?);
                }
                '.' => {
                    self.advance();
                    selector.classes.push(self.parse_name()?);
                }
                '[' => selector.attributes.push(self.parse_attribute()?),
                ':' => {
                    self.advance();
                    if self.current == Some(':') {
                        self.advance();
                        let name = self.parse_name()?;
                        return Err(SelectorError::UnsupportedPseudoElement(name));
                    }
                    selector.pseudo_classes.push(self.parse_pseudo_class()?);
                }
                c if c.is_alphabetic() || c == '_' => {
                    if selector.element_name.is_some() {
                        break;
                    }
                    selector.element_name = Some(self.parse_name()?.to_lowercase());
                }
                _ => break,
            }
        }

        Ok(selector)
    }

    fn parse_combinator(&mut self) -> Combinator {
        let had_whitespace = self.skip_whitespace();

        let explicit = match self.current {
            Some('>') => Some(Combinator::Child),
            Some('+') => Some(Combinator::NextSibling),
            Some('~') => Some(Combinator::SubsequentSibling),
            _ => None,
        };
        if let Some(combinator) = explicit {
            self.advance();
            self.skip_whitespace();
            return combinator;
        }

        match self.current {
            Some(',') | Some(')') | None => Combinator::None,
            Some(_) if had_whitespace => Combinator::Descendant,
            Some(_) => Combinator::None,
        }
    }

    fn parse_attribute(&mut self) -> Result<AttributeSelector> {
        self.expect_char('[')?;
        self.skip_whitespace();
        let name = self.parse_name()?;
        self.skip_whitespace();

        let (operator, value) = if self.current == Some(']') {
            (AttributeOperator::Exists, None)
        } else {
            let operator = match self.current {
                Some('=') => AttributeOperator::Equal,
                Some('~') => AttributeOperator::Contains,
                Some('|') => AttributeOperator::DashMatch,
                Some('^') => AttributeOperator::StartsWith,
                Some('$') => AttributeOperator::EndsWith,
                Some('*') => AttributeOperator::Substring,
                _ => {
                    return Err(SelectorError::Parse(
                        "Expected attribute operator".to_string(),
                    ))
                }
            };
            self.advance();
            if operator != AttributeOperator::Equal {
                self.expect_char('=')?;
            }
            self.skip_whitespace();

            let value = if matches!(self.current, Some('"') | Some('\'')) {
                self.parse_string()?
            } else {
                self.parse_name()?
            };
            (operator, Some(value))
        };

        self.skip_whitespace();
        let case_insensitive = if matches!(self.current, Some('i') | Some('I')) {
            self.advance();
            self.skip_whitespace();
            true
        } else {
            false
        };
        self.expect_char(']')?;

        Ok(AttributeSelector {
            name,
            operator,
            value,
            case_insensitive,
        })
    }

    fn parse_pseudo_class(&mut self) -> Result<PseudoClass> {
        let name = self.parse_name()?;

        match name.as_str() {
            "root" => Ok(PseudoClass::Root),
            "empty" => Ok(PseudoClass::Empty),
            "first-child" => Ok(PseudoClass::FirstChild),
            "last-child" => Ok(PseudoClass::LastChild),
            "only-child" => Ok(PseudoClass::OnlyChild),
            "nth-child" => Ok(PseudoClass::NthChild(self.parse_nth_argument()?)),
            "nth-last-child" => Ok(PseudoClass::NthLastChild(self.parse_nth_argument()?)),
            "not" => {
                self.expect_char('(')?;
                self.skip_whitespace();
                let inner = self.parse_simple_selector()?;
                self.skip_whitespace();
                self.expect_char(')')?;
                if inner.is_empty() {
                    return Err(SelectorError::InvalidSelector(self.input.to_string()));
                }
                Ok(PseudoClass::Not(Box::new(inner)))
            }
            _ => Err(SelectorError::UnsupportedPseudoClass(name)),
        }
    }

    fn parse_nth_argument(&mut self) -> Result<NthPattern> {
        self.expect_char('(')?;
        let start = self.position;
        while let Some(c) = self.current {
            if c == ')' {
                break;
            }
            self.advance();
        }
        let pattern = NthPattern::parse(&self.input[start..self.position])?;
        self.expect_char(')')?;
        Ok(pattern)
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.position;

        while let Some(c) = self.current {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.advance();
            } else {
                break;
            }
        }

        if start == self.position {
            Err(SelectorError::Parse(format!(
                "Expected name at {} in '{}'",
                start, self.input
            )))
        } else {
            Ok(self.input[start..self.position].to_string())
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self
            .current
            .ok_or_else(|| SelectorError::Parse("Expected string".to_string()))?;
        self.advance();

        let mut string = String::new();
        while let Some(c) = self.current {
            self.advance();
            if c == quote {
                return Ok(string);
            }
            if c == '\\' {
                if let Some(escaped) = self.current {
                    string.push(escaped);
                    self.advance();
                }
            } else {
                string.push(c);
            }
        }

        Err(SelectorError::Parse("Unterminated string".to_string()))
    }

    fn advance(&mut self) {
        if let Some(c) = self.current {
            self.position += c.len_utf8();
            self.current = self.input[self.position..].chars().next();
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.is_none()
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.current.is_some_and(char::is_whitespace) {
            self.advance();
            skipped = true;
        }
        skipped
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.current == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        if self.consume_char(expected) {
            Ok(())
        } else {
            Err(SelectorError::Parse(format!("Expected '{}'", expected)))
        }
    }
}
