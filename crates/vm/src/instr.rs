//! The instruction set: constants, locals and fields, checked arithmetic,
//! control flow, calls, crypto and balance movement.

use ethnum::{I256, U256};
use num_enum::TryFromPrimitive;

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{read_varint, write_varint, CodecError, Decode, Encode};

/// Raw opcode bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    ConstTrue = 0x00,
    ConstFalse = 0x01,
    I256Const0 = 0x02,
    I256Const1 = 0x03,
    U256Const0 = 0x04,
    U256Const1 = 0x05,
    U256Const2 = 0x06,
    U256Const3 = 0x07,
    U256Const4 = 0x08,
    U256Const5 = 0x09,
    I256Const = 0x0a,
    U256Const = 0x0b,
    BytesConst = 0x0c,
    AddressConst = 0x0d,

    LoadLocal = 0x10,
    StoreLocal = 0x11,
    LoadField = 0x12,
    StoreField = 0x13,
    Pop = 0x14,
    Dup = 0x15,
    Swap = 0x16,

    I256Add = 0x20,
    I256Sub = 0x21,
    I256Mul = 0x22,
    I256Div = 0x23,
    I256Mod = 0x24,
    U256Add = 0x25,
    U256Sub = 0x26,
    U256Mul = 0x27,
    U256Div = 0x28,
    U256Mod = 0x29,
    I256Neg = 0x2a,

    Eq = 0x30,
    Ne = 0x31,
    I256Lt = 0x32,
    I256Le = 0x33,
    I256Gt = 0x34,
    I256Ge = 0x35,
    U256Lt = 0x36,
    U256Le = 0x37,
    U256Gt = 0x38,
    U256Ge = 0x39,
    BoolAnd = 0x3a,
    BoolOr = 0x3b,
    BoolNot = 0x3c,

    ByteVecConcat = 0x40,
    ByteVecSize = 0x41,

    Jump = 0x50,
    IfTrue = 0x51,
    IfFalse = 0x52,

    CallLocal = 0x60,
    CallExternal = 0x61,
    Return = 0x62,

    Log = 0x70,

    Blake2b = 0x80,
    Keccak256 = 0x81,
    VerifyTxSignature = 0x82,

    ApproveNative = 0x90,
    TransferNative = 0x91,
    TransferToken = 0x92,
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    ConstTrue,
    ConstFalse,
    I256Const0,
    I256Const1,
    U256Const0,
    U256Const1,
    U256Const2,
    U256Const3,
    U256Const4,
    U256Const5,
    I256Const(I256),
    U256Const(U256),
    BytesConst(Vec<u8>),
    AddressConst(Buf32),

    LoadLocal(u8),
    StoreLocal(u8),
    LoadField(u8),
    StoreField(u8),
    Pop,
    Dup,
    Swap,

    I256Add,
    I256Sub,
    I256Mul,
    I256Div,
    I256Mod,
    U256Add,
    U256Sub,
    U256Mul,
    U256Div,
    U256Mod,
    I256Neg,

    Eq,
    Ne,
    I256Lt,
    I256Le,
    I256Gt,
    I256Ge,
    U256Lt,
    U256Le,
    U256Gt,
    U256Ge,
    BoolAnd,
    BoolOr,
    BoolNot,

    ByteVecConcat,
    ByteVecSize,

    /// Offsets are relative to the following instruction.
    Jump(i16),
    IfTrue(i16),
    IfFalse(i16),

    CallLocal(u8),
    CallExternal(u8),
    Return,

    /// Pops its argument count.  A hook for external indexers; the core
    /// layer does nothing else with it.
    Log(u8),

    Blake2b,
    Keccak256,
    VerifyTxSignature,

    ApproveNative,
    TransferNative,
    TransferToken,
}

impl Instr {
    pub fn opcode(&self) -> OpCode {
        match self {
            Instr::ConstTrue => OpCode::ConstTrue,
            Instr::ConstFalse => OpCode::ConstFalse,
            Instr::I256Const0 => OpCode::I256Const0,
            Instr::I256Const1 => OpCode::I256Const1,
            Instr::U256Const0 => OpCode::U256Const0,
            Instr::U256Const1 => OpCode::U256Const1,
            Instr::U256Const2 => OpCode::U256Const2,
            Instr::U256Const3 => OpCode::U256Const3,
            Instr::U256Const4 => OpCode::U256Const4,
            Instr::U256Const5 => OpCode::U256Const5,
            Instr::I256Const(_) => OpCode::I256Const,
            Instr::U256Const(_) => OpCode::U256Const,
            Instr::BytesConst(_) => OpCode::BytesConst,
            Instr::AddressConst(_) => OpCode::AddressConst,
            Instr::LoadLocal(_) => OpCode::LoadLocal,
            Instr::StoreLocal(_) => OpCode::StoreLocal,
            Instr::LoadField(_) => OpCode::LoadField,
            Instr::StoreField(_) => OpCode::StoreField,
            Instr::Pop => OpCode::Pop,
            Instr::Dup => OpCode::Dup,
            Instr::Swap => OpCode::Swap,
            Instr::I256Add => OpCode::I256Add,
            Instr::I256Sub => OpCode::I256Sub,
            Instr::I256Mul => OpCode::I256Mul,
            Instr::I256Div => OpCode::I256Div,
            Instr::I256Mod => OpCode::I256Mod,
            Instr::U256Add => OpCode::U256Add,
            Instr::U256Sub => OpCode::U256Sub,
            Instr::U256Mul => OpCode::U256Mul,
            Instr::U256Div => OpCode::U256Div,
            Instr::U256Mod => OpCode::U256Mod,
            Instr::I256Neg => OpCode::I256Neg,
            Instr::Eq => OpCode::Eq,
            Instr::Ne => OpCode::Ne,
            Instr::I256Lt => OpCode::I256Lt,
            Instr::I256Le => OpCode::I256Le,
            Instr::I256Gt => OpCode::I256Gt,
            Instr::I256Ge => OpCode::I256Ge,
            Instr::U256Lt => OpCode::U256Lt,
            Instr::U256Le => OpCode::U256Le,
            Instr::U256Gt => OpCode::U256Gt,
            Instr::U256Ge => OpCode::U256Ge,
            Instr::BoolAnd => OpCode::BoolAnd,
            Instr::BoolOr => OpCode::BoolOr,
            Instr::BoolNot => OpCode::BoolNot,
            Instr::ByteVecConcat => OpCode::ByteVecConcat,
            Instr::ByteVecSize => OpCode::ByteVecSize,
            Instr::Jump(_) => OpCode::Jump,
            Instr::IfTrue(_) => OpCode::IfTrue,
            Instr::IfFalse(_) => OpCode::IfFalse,
            Instr::CallLocal(_) => OpCode::CallLocal,
            Instr::CallExternal(_) => OpCode::CallExternal,
            Instr::Return => OpCode::Return,
            Instr::Log(_) => OpCode::Log,
            Instr::Blake2b => OpCode::Blake2b,
            Instr::Keccak256 => OpCode::Keccak256,
            Instr::VerifyTxSignature => OpCode::VerifyTxSignature,
            Instr::ApproveNative => OpCode::ApproveNative,
            Instr::TransferNative => OpCode::TransferNative,
            Instr::TransferToken => OpCode::TransferToken,
        }
    }

    /// Cost charged before the instruction runs.
    pub fn gas(&self) -> u64 {
        match self {
            Instr::ConstTrue
            | Instr::ConstFalse
            | Instr::I256Const0
            | Instr::I256Const1
            | Instr::U256Const0
            | Instr::U256Const1
            | Instr::U256Const2
            | Instr::U256Const3
            | Instr::U256Const4
            | Instr::U256Const5
            | Instr::I256Const(_)
            | Instr::U256Const(_)
            | Instr::BytesConst(_)
            | Instr::AddressConst(_)
            | Instr::Pop
            | Instr::Dup
            | Instr::Swap => 2,

            Instr::LoadLocal(_) | Instr::StoreLocal(_) => 3,
            Instr::LoadField(_) | Instr::StoreField(_) => 5,

            Instr::I256Add
            | Instr::I256Sub
            | Instr::I256Mul
            | Instr::I256Div
            | Instr::I256Mod
            | Instr::U256Add
            | Instr::U256Sub
            | Instr::U256Mul
            | Instr::U256Div
            | Instr::U256Mod
            | Instr::I256Neg
            | Instr::Eq
            | Instr::Ne
            | Instr::I256Lt
            | Instr::I256Le
            | Instr::I256Gt
            | Instr::I256Ge
            | Instr::U256Lt
            | Instr::U256Le
            | Instr::U256Gt
            | Instr::U256Ge
            | Instr::BoolAnd
            | Instr::BoolOr
            | Instr::BoolNot => 3,

            Instr::ByteVecConcat => 5,
            Instr::ByteVecSize => 2,

            Instr::Jump(_) | Instr::IfTrue(_) | Instr::IfFalse(_) => 8,

            Instr::CallLocal(_) | Instr::CallExternal(_) => 24,
            Instr::Return => 2,

            Instr::Log(_) => 8,

            Instr::Blake2b | Instr::Keccak256 => 30,
            Instr::VerifyTxSignature => 200,

            Instr::ApproveNative | Instr::TransferNative | Instr::TransferToken => 30,
        }
    }
}

impl Encode for Instr {
    fn encode(&self, w: &mut Vec<u8>) {
        w.push(self.opcode() as u8);
        match self {
            Instr::I256Const(v) => w.extend_from_slice(&v.to_be_bytes()),
            Instr::U256Const(v) => v.encode(w),
            Instr::BytesConst(b) => {
                write_varint(w, b.len() as u64);
                w.extend_from_slice(b);
            }
            Instr::AddressConst(a) => a.encode(w),
            Instr::LoadLocal(i)
            | Instr::StoreLocal(i)
            | Instr::LoadField(i)
            | Instr::StoreField(i)
            | Instr::CallLocal(i)
            | Instr::CallExternal(i)
            | Instr::Log(i) => w.push(*i),
            Instr::Jump(off) | Instr::IfTrue(off) | Instr::IfFalse(off) => {
                w.extend_from_slice(&off.to_be_bytes())
            }
            _ => {}
        }
    }
}

impl Decode for Instr {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        let byte = u8::decode(r)?;
        let op = OpCode::try_from(byte).map_err(|_| CodecError::InvalidValue("opcode"))?;

        fn offset(r: &mut &[u8]) -> Result<i16, CodecError> {
            let hi = u8::decode(r)?;
            let lo = u8::decode(r)?;
            Ok(i16::from_be_bytes([hi, lo]))
        }

        Ok(match op {
            OpCode::ConstTrue => Instr::ConstTrue,
            OpCode::ConstFalse => Instr::ConstFalse,
            OpCode::I256Const0 => Instr::I256Const0,
            OpCode::I256Const1 => Instr::I256Const1,
            OpCode::U256Const0 => Instr::U256Const0,
            OpCode::U256Const1 => Instr::U256Const1,
            OpCode::U256Const2 => Instr::U256Const2,
            OpCode::U256Const3 => Instr::U256Const3,
            OpCode::U256Const4 => Instr::U256Const4,
            OpCode::U256Const5 => Instr::U256Const5,
            OpCode::I256Const => {
                let buf = Buf32::decode(r)?;
                Instr::I256Const(I256::from_be_bytes(*buf.as_ref()))
            }
            OpCode::U256Const => Instr::U256Const(U256::decode(r)?),
            OpCode::BytesConst => {
                let len = read_varint(r)? as usize;
                if r.len() < len {
                    return Err(CodecError::UnexpectedEof);
                }
                let (head, rest) = r.split_at(len);
                let bytes = head.to_vec();
                *r = rest;
                Instr::BytesConst(bytes)
            }
            OpCode::AddressConst => Instr::AddressConst(Buf32::decode(r)?),
            OpCode::LoadLocal => Instr::LoadLocal(u8::decode(r)?),
            OpCode::StoreLocal => Instr::StoreLocal(u8::decode(r)?),
            OpCode::LoadField => Instr::LoadField(u8::decode(r)?),
            OpCode::StoreField => Instr::StoreField(u8::decode(r)?),
            OpCode::Pop => Instr::Pop,
            OpCode::Dup => Instr::Dup,
            OpCode::Swap => Instr::Swap,
            OpCode::I256Add => Instr::I256Add,
            OpCode::I256Sub => Instr::I256Sub,
            OpCode::I256Mul => Instr::I256Mul,
            OpCode::I256Div => Instr::I256Div,
            OpCode::I256Mod => Instr::I256Mod,
            OpCode::U256Add => Instr::U256Add,
            OpCode::U256Sub => Instr::U256Sub,
            OpCode::U256Mul => Instr::U256Mul,
            OpCode::U256Div => Instr::U256Div,
            OpCode::U256Mod => Instr::U256Mod,
            OpCode::I256Neg => Instr::I256Neg,
            OpCode::Eq => Instr::Eq,
            OpCode::Ne => Instr::Ne,
            OpCode::I256Lt => Instr::I256Lt,
            OpCode::I256Le => Instr::I256Le,
            OpCode::I256Gt => Instr::I256Gt,
            OpCode::I256Ge => Instr::I256Ge,
            OpCode::U256Lt => Instr::U256Lt,
            OpCode::U256Le => Instr::U256Le,
            OpCode::U256Gt => Instr::U256Gt,
            OpCode::U256Ge => Instr::U256Ge,
            OpCode::BoolAnd => Instr::BoolAnd,
            OpCode::BoolOr => Instr::BoolOr,
            OpCode::BoolNot => Instr::BoolNot,
            OpCode::ByteVecConcat => Instr::ByteVecConcat,
            OpCode::ByteVecSize => Instr::ByteVecSize,
            OpCode::Jump => Instr::Jump(offset(r)?),
            OpCode::IfTrue => Instr::IfTrue(offset(r)?),
            OpCode::IfFalse => Instr::IfFalse(offset(r)?),
            OpCode::CallLocal => Instr::CallLocal(u8::decode(r)?),
            OpCode::CallExternal => Instr::CallExternal(u8::decode(r)?),
            OpCode::Return => Instr::Return,
            OpCode::Log => Instr::Log(u8::decode(r)?),
            OpCode::Blake2b => Instr::Blake2b,
            OpCode::Keccak256 => Instr::Keccak256,
            OpCode::VerifyTxSignature => Instr::VerifyTxSignature,
            OpCode::ApproveNative => Instr::ApproveNative,
            OpCode::TransferNative => Instr::TransferNative,
            OpCode::TransferToken => Instr::TransferToken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instr_roundtrip() {
        let instrs = vec![
            Instr::ConstTrue,
            Instr::U256Const(U256::from(77u8)),
            Instr::I256Const(I256::from(-5i8)),
            Instr::BytesConst(vec![1, 2, 3]),
            Instr::LoadLocal(3),
            Instr::Jump(-12),
            Instr::IfFalse(250),
            Instr::CallExternal(1),
            Instr::Return,
        ];
        let bytes = instrs.encode_to_vec();
        assert_eq!(Vec::<Instr>::decode_exact(&bytes).unwrap(), instrs);
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let bytes = [0xffu8];
        assert!(Instr::decode_exact(&bytes).is_err());
    }

    #[test]
    fn test_gas_is_positive() {
        for i in [Instr::Pop, Instr::U256Add, Instr::Blake2b, Instr::Return] {
            assert!(i.gas() > 0);
        }
    }
}
