//! The closed operator set and its precedence table.
//!
//! Operator order is part of the parsing contract: the infix scan tries
//! textual representations in enum order, so multi-character operators
//! (`>=`, `&&`, `||`, `##`) must come before their single-character
//! prefixes (`>`, `&`, `|`, `#`).

use static_assertions::const_assert_eq;

/// Every operator the grammar knows about.
///
/// The final `None` entry is a placeholder that keeps the enum length in
/// sync with the tables below; it never appears in a parsed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Operator {
    UnaryPlus,
    Negate,
    Not,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
    Less,
    Equal,
    NotEqual,
    And,
    AlternateAnd,
    Or,
    BitwiseAnd,
    AlternateBitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    None,
}

pub const OPERATOR_COUNT: usize = 22;

/// Binding strength. A *smaller* level folds first, so it binds tighter.
const PRECEDENCE: [u8; OPERATOR_COUNT] = [
    1, 1, 1, // unary
    2, 2, 2, // * / %
    3, 3, // + -
    4, 4, 4, 4, // >= <= > <
    5, 5, // == !=
    9, 9, // && ##
    10, // ||
    6, 6, // & #
    8, // |
    7, // ^
    11, // placeholder
];

const REPRESENTATIONS: [Option<&str>; OPERATOR_COUNT] = [
    Some("+"),
    Some("-"),
    Some("!"),
    Some("*"),
    Some("/"),
    Some("%"),
    Some("+"),
    Some("-"),
    Some(">="),
    Some("<="),
    Some(">"),
    Some("<"),
    Some("=="),
    Some("!="),
    Some("&&"),
    Some("##"),
    Some("||"),
    Some("&"),
    Some("#"),
    Some("|"),
    Some("^"),
    Option::None,
];

const_assert_eq!(PRECEDENCE.len(), OPERATOR_COUNT);
const_assert_eq!(REPRESENTATIONS.len(), OPERATOR_COUNT);

/// The infix operators, in the order the flat scan tries them.
pub(crate) const BINARY_OPERATORS: [Operator; 18] = [
    Operator::Multiply,
    Operator::Divide,
    Operator::Modulo,
    Operator::Add,
    Operator::Subtract,
    Operator::GreaterOrEqual,
    Operator::LessOrEqual,
    Operator::Greater,
    Operator::Less,
    Operator::Equal,
    Operator::NotEqual,
    Operator::And,
    Operator::AlternateAnd,
    Operator::Or,
    Operator::BitwiseAnd,
    Operator::AlternateBitwiseAnd,
    Operator::BitwiseOr,
    Operator::BitwiseXor,
];

impl Operator {
    /// Precedence level; smaller binds tighter.
    pub fn precedence(self) -> u8 {
        PRECEDENCE[self as usize]
    }

    /// Textual representation, if the operator has one.
    pub fn symbol(self) -> Option<&'static str> {
        REPRESENTATIONS[self as usize]
    }

    /// Whether the operator always produces a boolean.
    pub fn returns_bool(self) -> bool {
        matches!(
            self,
            Operator::GreaterOrEqual
                | Operator::LessOrEqual
                | Operator::Greater
                | Operator::Less
                | Operator::Equal
                | Operator::NotEqual
                | Operator::And
                | Operator::AlternateAnd
                | Operator::Or
        )
    }

    /// Whether the operator short-circuits on its boolean operands.
    pub fn short_circuits(self) -> bool {
        matches!(
            self,
            Operator::And | Operator::AlternateAnd | Operator::Or
        )
    }
}
