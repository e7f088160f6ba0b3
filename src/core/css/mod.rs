pub mod selector;

pub use selector::{
    AttributeOperator, AttributeSelector, Combinator, ComplexSelector, Compound, NthPattern,
    PseudoClass, Selector, SelectorError, SimpleSelector,
};
