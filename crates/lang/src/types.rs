//! The source type system and its flattening rules.

use gridchain_vm::ValType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Bool,
    I256,
    U256,
    ByteVec,
    Address,
    /// Fixed-size array, flattened at storage and call boundaries.
    FixedSizeArray(Box<Type>, usize),
    /// Reference to a contract by type name.
    Contract(String),
    Unit,
}

impl Type {
    /// Flattened slot count: scalars take one slot, arrays the product of
    /// their dimensions.
    pub fn flatten_len(&self) -> usize {
        match self {
            Type::Unit => 0,
            Type::FixedSizeArray(elem, n) => elem.flatten_len() * n,
            _ => 1,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::FixedSizeArray(..))
    }

    /// The scalar type of every flattened slot, if uniform.
    pub fn scalar(&self) -> &Type {
        match self {
            Type::FixedSizeArray(elem, _) => elem.scalar(),
            other => other,
        }
    }

    /// The VM-level value type of a scalar slot.
    pub fn val_type(&self) -> Option<ValType> {
        Some(match self {
            Type::Bool => ValType::Bool,
            Type::I256 => ValType::I256,
            Type::U256 => ValType::U256,
            Type::ByteVec => ValType::ByteVec,
            Type::Address | Type::Contract(_) => ValType::Address,
            Type::Unit | Type::FixedSizeArray(..) => return None,
        })
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "Bool"),
            Type::I256 => write!(f, "I256"),
            Type::U256 => write!(f, "U256"),
            Type::ByteVec => write!(f, "ByteVec"),
            Type::Address => write!(f, "Address"),
            Type::FixedSizeArray(elem, n) => write!(f, "[{elem}; {n}]"),
            Type::Contract(name) => write!(f, "{name}"),
            Type::Unit => write!(f, "()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_len() {
        assert_eq!(Type::U256.flatten_len(), 1);
        assert_eq!(
            Type::FixedSizeArray(Box::new(Type::U256), 3).flatten_len(),
            3
        );
        let nested = Type::FixedSizeArray(
            Box::new(Type::FixedSizeArray(Box::new(Type::Bool), 4)),
            2,
        );
        assert_eq!(nested.flatten_len(), 8);
        assert_eq!(nested.scalar(), &Type::Bool);
        assert_eq!(Type::Unit.flatten_len(), 0);
    }
}
