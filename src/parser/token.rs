//! The token tree.
//!
//! One parsed expression is one immutable `Token` tree, owned by the
//! compiled unit that was built from it. Nodes carry everything the
//! evaluator needs; types resolved at parse time (casts, `typeof`,
//! constructor calls) are stored as [`TypeRef`] identities.

use std::sync::Arc;

use ecow::EcoString;

use crate::ops::Operator;
use crate::types::TypeRef;
use crate::values::Value;

/// What a `$name` reference points at.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// The unit's input value (any non-reserved name).
    Named(EcoString),
    /// A scratch cell, `$V0`..`$V9`.
    Slot(u8),
    /// A side-channel placeholder, `$P0`..`$P4`.
    Side(u8),
}

/// One node of the token tree.
#[derive(Debug, Clone)]
pub enum Token {
    Constant {
        value: Value,
    },
    Parameter {
        kind: ParamKind,
    },
    UnaryOp {
        op: Operator,
        operand: Box<Token>,
    },
    BinaryOp {
        op: Operator,
        left: Box<Token>,
        right: Box<Token>,
    },
    Ternary {
        condition: Box<Token>,
        if_true: Box<Token>,
        if_false: Box<Token>,
    },
    NullCoalesce {
        left: Box<Token>,
        right: Box<Token>,
    },
    /// `target?`: yields the target, or short-circuits the enclosing
    /// chain to null when the target is null.
    NullPropagate {
        target: Box<Token>,
    },
    StaticMember {
        ty: TypeRef,
        name: EcoString,
    },
    InstanceMember {
        target: Box<Token>,
        name: EcoString,
    },
    StaticCall {
        ty: TypeRef,
        name: EcoString,
        type_args: Vec<TypeRef>,
        args: Vec<Token>,
    },
    InstanceCall {
        target: Box<Token>,
        name: EcoString,
        type_args: Vec<TypeRef>,
        args: Vec<Token>,
    },
    New {
        ty: TypeRef,
        args: Vec<Token>,
    },
    Index {
        target: Box<Token>,
        args: Vec<Token>,
    },
    Cast {
        ty: TypeRef,
        target: Box<Token>,
    },
    Typeof {
        ty: TypeRef,
    },
    Is {
        target: Box<Token>,
        ty: TypeRef,
    },
    As {
        target: Box<Token>,
        ty: TypeRef,
    },
    Assign {
        target: Box<Token>,
        value: Box<Token>,
    },
    Lambda {
        params: Vec<EcoString>,
        body: Arc<Token>,
    },
    Throw {
        value: Box<Token>,
    },
    Bracketed {
        inner: Box<Token>,
    },
    /// Marks a postfix chain; evaluation of the wrapped subtree may be cut
    /// short by a null-propagating access, yielding null for the chain.
    Chain {
        target: Box<Token>,
    },
}

impl Token {
    /// The node's declared result type. Never "unknown": nodes whose type
    /// depends on runtime operands report the dynamic marker.
    pub fn result_type(&self) -> TypeRef {
        match self {
            Token::Constant { value } => match value {
                Value::Null => TypeRef::Object,
                other => other.type_ref(),
            },
            Token::UnaryOp { op, .. } if *op == Operator::Not => TypeRef::Bool,
            Token::BinaryOp { op, .. } if op.returns_bool() => TypeRef::Bool,
            Token::Is { .. } => TypeRef::Bool,
            Token::Cast { ty, .. } | Token::As { ty, .. } | Token::New { ty, .. } => ty.clone(),
            Token::Typeof { .. } => TypeRef::Type,
            Token::Lambda { .. } => TypeRef::Lambda,
            Token::Bracketed { inner } => inner.result_type(),
            Token::Chain { target } => target.result_type(),
            _ => TypeRef::Object,
        }
    }

    /// Child nodes, in source order.
    pub fn children(&self) -> Vec<&Token> {
        match self {
            Token::Constant { .. }
            | Token::Parameter { .. }
            | Token::StaticMember { .. }
            | Token::Typeof { .. } => Vec::new(),
            Token::UnaryOp { operand, .. } => vec![operand],
            Token::BinaryOp { left, right, .. } | Token::NullCoalesce { left, right } => {
                vec![left, right]
            }
            Token::Ternary {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
            Token::NullPropagate { target }
            | Token::Cast { target, .. }
            | Token::Is { target, .. }
            | Token::As { target, .. }
            | Token::Bracketed { inner: target }
            | Token::Chain { target } => vec![target],
            Token::InstanceMember { target, .. } => vec![target],
            Token::StaticCall { args, .. } | Token::New { args, .. } => args.iter().collect(),
            Token::InstanceCall { target, args, .. } | Token::Index { target, args } => {
                let mut children = vec![&**target];
                children.extend(args.iter());
                children
            }
            Token::Assign { target, value } => vec![target, value],
            Token::Lambda { body, .. } => vec![body],
            Token::Throw { value } => vec![value],
        }
    }

    /// An indented dump of the tree, published with diagnostics events and
    /// retained on the compiled unit as its debug view.
    pub fn debug_view(&self) -> String {
        let mut out = String::new();
        self.dump(0, &mut out);
        out
    }

    fn describe(&self) -> String {
        match self {
            Token::Constant { value } => format!("Constant({})", value),
            Token::Parameter { kind } => match kind {
                ParamKind::Named(name) => format!("Parameter(${})", name),
                ParamKind::Slot(n) => format!("Parameter($V{})", n),
                ParamKind::Side(n) => format!("Parameter($P{})", n),
            },
            Token::UnaryOp { op, .. } => format!("UnaryOp({})", op.symbol().unwrap_or("?")),
            Token::BinaryOp { op, .. } => format!("BinaryOp({})", op.symbol().unwrap_or("?")),
            Token::Ternary { .. } => "Ternary".to_string(),
            Token::NullCoalesce { .. } => "NullCoalesce".to_string(),
            Token::NullPropagate { .. } => "NullPropagate".to_string(),
            Token::StaticMember { ty, name } => format!("StaticMember({}.{})", ty, name),
            Token::InstanceMember { name, .. } => format!("InstanceMember(.{})", name),
            Token::StaticCall { ty, name, .. } => format!("StaticCall({}.{})", ty, name),
            Token::InstanceCall { name, .. } => format!("InstanceCall(.{})", name),
            Token::New { ty, .. } => format!("New({})", ty),
            Token::Index { .. } => "Index".to_string(),
            Token::Cast { ty, .. } => format!("Cast({})", ty),
            Token::Typeof { ty } => format!("Typeof({})", ty),
            Token::Is { ty, .. } => format!("Is({})", ty),
            Token::As { ty, .. } => format!("As({})", ty),
            Token::Assign { .. } => "Assign".to_string(),
            Token::Lambda { params, .. } => {
                let names: Vec<&str> = params.iter().map(|p| p.as_str()).collect();
                format!("Lambda({})", names.join(", "))
            }
            Token::Throw { .. } => "Throw".to_string(),
            Token::Bracketed { .. } => "Bracketed".to_string(),
            Token::Chain { .. } => "Chain".to_string(),
        }
    }

    fn dump(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&self.describe());
        out.push('\n');
        for child in self.children() {
            child.dump(depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_declares_bool() {
        let token = Token::BinaryOp {
            op: Operator::Greater,
            left: Box::new(Token::Constant {
                value: Value::I32(1),
            }),
            right: Box::new(Token::Constant {
                value: Value::I32(2),
            }),
        };
        assert_eq!(token.result_type(), TypeRef::Bool);
    }

    #[test]
    fn arithmetic_declares_dynamic() {
        let token = Token::BinaryOp {
            op: Operator::Add,
            left: Box::new(Token::Constant {
                value: Value::I32(1),
            }),
            right: Box::new(Token::Constant {
                value: Value::I32(2),
            }),
        };
        assert_eq!(token.result_type(), TypeRef::Object);
    }

    #[test]
    fn debug_view_indents_children() {
        let token = Token::BinaryOp {
            op: Operator::Multiply,
            left: Box::new(Token::Constant {
                value: Value::I32(2),
            }),
            right: Box::new(Token::Constant {
                value: Value::I32(3),
            }),
        };
        let view = token.debug_view();
        assert_eq!(view, "BinaryOp(*)\n  Constant(2)\n  Constant(3)\n");
    }
}
