//! Bytecode containers: methods, scripts and contracts.

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{CodecError, Decode, Encode};
use gridchain_primitives::hash;

use crate::instr::Instr;
use crate::val::ValType;

/// One compiled method.  Arg, local and return lengths count flattened
/// slots; locals include the args.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Method {
    pub is_public: bool,
    pub is_payable: bool,
    pub args_length: u8,
    pub locals_length: u8,
    pub return_length: u8,
    pub instrs: Vec<Instr>,
}

impl Encode for Method {
    fn encode(&self, w: &mut Vec<u8>) {
        w.push(self.is_public as u8);
        w.push(self.is_payable as u8);
        w.push(self.args_length);
        w.push(self.locals_length);
        w.push(self.return_length);
        self.instrs.encode(w);
    }
}

impl Decode for Method {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        let is_public = u8::decode(r)? != 0;
        let is_payable = u8::decode(r)? != 0;
        let args_length = u8::decode(r)?;
        let locals_length = u8::decode(r)?;
        let return_length = u8::decode(r)?;
        let instrs = Vec::decode(r)?;
        Ok(Self {
            is_public,
            is_payable,
            args_length,
            locals_length,
            return_length,
            instrs,
        })
    }
}

/// A one-shot script: no persistent fields, entry is method 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    pub methods: Vec<Method>,
}

impl Encode for Script {
    fn encode(&self, w: &mut Vec<u8>) {
        self.methods.encode(w);
    }
}

impl Decode for Script {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            methods: Vec::decode(r)?,
        })
    }
}

/// A deployed contract: a flattened field schema plus its methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    pub fields: Vec<ValType>,
    pub methods: Vec<Method>,
}

impl Contract {
    pub fn code_hash(&self) -> Buf32 {
        hash::blake2b(&self.encode_to_vec())
    }
}

impl Encode for Contract {
    fn encode(&self, w: &mut Vec<u8>) {
        self.fields.encode(w);
        self.methods.encode(w);
    }
}

impl Decode for Contract {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            fields: Vec::decode(r)?,
            methods: Vec::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> Method {
        Method {
            is_public: true,
            is_payable: false,
            args_length: 1,
            locals_length: 2,
            return_length: 1,
            instrs: vec![Instr::LoadLocal(0), Instr::U256Const1, Instr::U256Add, Instr::Return],
        }
    }

    #[test]
    fn test_contract_roundtrip() {
        let contract = Contract {
            fields: vec![ValType::U256, ValType::Bool],
            methods: vec![method()],
        };
        let bytes = contract.encode_to_vec();
        assert_eq!(Contract::decode_exact(&bytes).unwrap(), contract);
    }

    #[test]
    fn test_code_hash_tracks_content() {
        let a = Contract {
            fields: vec![],
            methods: vec![method()],
        };
        let mut b = a.clone();
        b.methods[0].is_payable = true;
        assert_ne!(a.code_hash(), b.code_hash());
    }
}
