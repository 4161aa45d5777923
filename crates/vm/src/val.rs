//! Runtime values.

use ethnum::{I256, U256};

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{read_varint, write_varint, CodecError, Decode, Encode};

use crate::errors::ExecError;

/// Tagged runtime value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Val {
    Bool(bool),
    I256(I256),
    U256(U256),
    ByteVec(Vec<u8>),
    Address(Buf32),
}

/// The type half of [`Val`], used by field schemas and default values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ValType {
    Bool = 0,
    I256 = 1,
    U256 = 2,
    ByteVec = 3,
    Address = 4,
}

impl Val {
    pub fn ty(&self) -> ValType {
        match self {
            Val::Bool(_) => ValType::Bool,
            Val::I256(_) => ValType::I256,
            Val::U256(_) => ValType::U256,
            Val::ByteVec(_) => ValType::ByteVec,
            Val::Address(_) => ValType::Address,
        }
    }

    pub fn as_bool(&self) -> Result<bool, ExecError> {
        match self {
            Val::Bool(b) => Ok(*b),
            _ => Err(ExecError::InvalidType),
        }
    }

    pub fn as_i256(&self) -> Result<I256, ExecError> {
        match self {
            Val::I256(v) => Ok(*v),
            _ => Err(ExecError::InvalidType),
        }
    }

    pub fn as_u256(&self) -> Result<U256, ExecError> {
        match self {
            Val::U256(v) => Ok(*v),
            _ => Err(ExecError::InvalidType),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], ExecError> {
        match self {
            Val::ByteVec(b) => Ok(b),
            _ => Err(ExecError::InvalidType),
        }
    }

    pub fn as_address(&self) -> Result<Buf32, ExecError> {
        match self {
            Val::Address(a) => Ok(*a),
            _ => Err(ExecError::InvalidType),
        }
    }
}

impl ValType {
    pub fn default_val(&self) -> Val {
        match self {
            ValType::Bool => Val::Bool(false),
            ValType::I256 => Val::I256(I256::ZERO),
            ValType::U256 => Val::U256(U256::ZERO),
            ValType::ByteVec => Val::ByteVec(Vec::new()),
            ValType::Address => Val::Address(Buf32::zero()),
        }
    }

    fn from_byte(b: u8) -> Result<Self, CodecError> {
        Ok(match b {
            0 => ValType::Bool,
            1 => ValType::I256,
            2 => ValType::U256,
            3 => ValType::ByteVec,
            4 => ValType::Address,
            _ => return Err(CodecError::InvalidValue("val type")),
        })
    }
}

impl Encode for ValType {
    fn encode(&self, w: &mut Vec<u8>) {
        w.push(*self as u8);
    }
}

impl Decode for ValType {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        ValType::from_byte(u8::decode(r)?)
    }
}

impl Encode for Val {
    fn encode(&self, w: &mut Vec<u8>) {
        self.ty().encode(w);
        match self {
            Val::Bool(b) => w.push(*b as u8),
            Val::I256(v) => w.extend_from_slice(&v.to_be_bytes()),
            Val::U256(v) => v.encode(w),
            Val::ByteVec(b) => {
                write_varint(w, b.len() as u64);
                w.extend_from_slice(b);
            }
            Val::Address(a) => a.encode(w),
        }
    }
}

impl Decode for Val {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        let ty = ValType::decode(r)?;
        Ok(match ty {
            ValType::Bool => Val::Bool(u8::decode(r)? != 0),
            ValType::I256 => {
                let mut arr = [0u8; 32];
                for byte in arr.iter_mut() {
                    *byte = u8::decode(r)?;
                }
                Val::I256(I256::from_be_bytes(arr))
            }
            ValType::U256 => Val::U256(U256::decode(r)?),
            ValType::ByteVec => {
                let len = read_varint(r)? as usize;
                if r.len() < len {
                    return Err(CodecError::UnexpectedEof);
                }
                let (head, rest) = r.split_at(len);
                let bytes = head.to_vec();
                *r = rest;
                Val::ByteVec(bytes)
            }
            ValType::Address => Val::Address(Buf32::decode(r)?),
        })
    }
}

/// Encodes contract fields for trie storage.
pub fn encode_vals(vals: &[Val]) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint(&mut out, vals.len() as u64);
    for v in vals {
        v.encode(&mut out);
    }
    out
}

pub fn decode_vals(mut bytes: &[u8]) -> Result<Vec<Val>, CodecError> {
    let r = &mut bytes;
    let count = read_varint(r)?;
    let mut out = Vec::with_capacity((count as usize).min(64));
    for _ in 0..count {
        out.push(Val::decode(r)?);
    }
    if !r.is_empty() {
        return Err(CodecError::TrailingBytes(r.len()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_val_roundtrip() {
        let vals = vec![
            Val::Bool(true),
            Val::I256(I256::from(-7i8)),
            Val::U256(U256::from(42u8)),
            Val::ByteVec(vec![1, 2, 3]),
            Val::Address(Buf32::new([9; 32])),
        ];
        let bytes = encode_vals(&vals);
        assert_eq!(decode_vals(&bytes).unwrap(), vals);
    }

    #[test]
    fn test_type_mismatch() {
        assert_eq!(Val::Bool(true).as_u256(), Err(ExecError::InvalidType));
        assert_eq!(Val::U256(U256::ZERO).as_bool(), Err(ExecError::InvalidType));
    }
}
