//! Frame-by-frame execution.
//!
//! The executor owns the call stack and one shared value stack.  A step
//! runs instructions of the top frame until the frame set changes (a call
//! pushes, a return pops) and control comes back to the driver loop.

use std::collections::HashMap;
use std::sync::Arc;

use ethnum::U256;
use tracing::trace;

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{Decode, Encode};
use gridchain_primitives::crypto::{self, Signature};
use gridchain_primitives::hash;
use gridchain_smt::NodeStore;
use gridchain_state::account::AccountState;
use gridchain_state::world::WorldState;

use crate::balance::{BalanceState, Balances};
use crate::contract::{Contract, Method, Script};
use crate::errors::ExecError;
use crate::gas::GasMeter;
use crate::instr::Instr;
use crate::stack::Stack;
use crate::val::{decode_vals, encode_vals, Val};

struct LoadedContract {
    contract: Arc<Contract>,
    fields: Vec<Val>,
    amount: u64,
    dirty: bool,
}

/// Execution environment of one transaction.  Stateless contexts carry no
/// world state; stateful ones own a fork that is committed only on success.
pub struct ExecContext<S: NodeStore> {
    tx_id: Buf32,
    signatures: Vec<Signature>,
    world: Option<WorldState<S>>,
    loaded: HashMap<Buf32, LoadedContract>,
}

impl<S: NodeStore> ExecContext<S> {
    pub fn stateless(tx_id: Buf32, signatures: Vec<Signature>) -> Self {
        Self {
            tx_id,
            signatures,
            world: None,
            loaded: HashMap::new(),
        }
    }

    pub fn stateful(tx_id: Buf32, signatures: Vec<Signature>, world: WorldState<S>) -> Self {
        Self {
            tx_id,
            signatures,
            world: Some(world),
            loaded: HashMap::new(),
        }
    }

    pub fn tx_id(&self) -> &Buf32 {
        &self.tx_id
    }

    pub fn world(&self) -> Option<&WorldState<S>> {
        self.world.as_ref()
    }

    fn pop_signature(&mut self) -> Result<Signature, ExecError> {
        self.signatures.pop().ok_or(ExecError::StackUnderflow)
    }

    fn world_mut(&mut self) -> Result<&mut WorldState<S>, ExecError> {
        self.world.as_mut().ok_or(ExecError::ExpectedStatefulContext)
    }

    /// Installs a contract account, used at deploy time and by tests.
    pub fn deploy_contract(
        &mut self,
        addr: Buf32,
        contract: &Contract,
        fields: Vec<Val>,
        amount: u64,
    ) -> Result<(), ExecError> {
        let code = contract.encode_to_vec();
        let state = AccountState::Contract {
            code_hash: hash::blake2b(&code),
            code,
            fields: encode_vals(&fields),
            amount,
        };
        self.world_mut()?.put_account(&addr, &state)?;
        Ok(())
    }

    fn load_contract(&mut self, addr: Buf32) -> Result<(), ExecError> {
        if self.loaded.contains_key(&addr) {
            return Ok(());
        }
        let account = self
            .world_mut()?
            .get_account(&addr)?
            .ok_or(ExecError::InvalidContractAddress(addr))?;
        let AccountState::Contract {
            code,
            fields,
            amount,
            ..
        } = account
        else {
            return Err(ExecError::InvalidContractAddress(addr));
        };

        let contract = Contract::decode_exact(&code).map_err(|_| ExecError::InvalidBytecode)?;
        let fields = decode_vals(&fields).map_err(|_| ExecError::InvalidBytecode)?;
        self.loaded.insert(
            addr,
            LoadedContract {
                contract: Arc::new(contract),
                fields,
                amount,
                dirty: false,
            },
        );
        Ok(())
    }

    fn credit_native(&mut self, addr: Buf32, amount: u64) -> Result<(), ExecError> {
        if let Some(loaded) = self.loaded.get_mut(&addr) {
            loaded.amount += amount;
            loaded.dirty = true;
            return Ok(());
        }
        let world = self.world_mut()?;
        let state = match world.get_account(&addr)? {
            Some(AccountState::Asset { amount: held, tokens }) => AccountState::Asset {
                amount: held + amount,
                tokens,
            },
            Some(AccountState::Contract {
                code_hash,
                code,
                fields,
                amount: held,
            }) => AccountState::Contract {
                code_hash,
                code,
                fields,
                amount: held + amount,
            },
            None => AccountState::Asset {
                amount,
                tokens: Vec::new(),
            },
        };
        world.put_account(&addr, &state)?;
        Ok(())
    }

    fn credit_token(&mut self, addr: Buf32, token: Buf32, amount: u64) -> Result<(), ExecError> {
        let world = self.world_mut()?;
        let state = match world.get_account(&addr)? {
            Some(AccountState::Asset {
                amount: held,
                mut tokens,
            }) => {
                match tokens.iter_mut().find(|(t, _)| *t == token) {
                    Some((_, v)) => *v += amount,
                    None => tokens.push((token, amount)),
                }
                AccountState::Asset {
                    amount: held,
                    tokens,
                }
            }
            Some(other) => other,
            None => AccountState::Asset {
                amount: 0,
                tokens: vec![(token, amount)],
            },
        };
        world.put_account(&addr, &state)?;
        Ok(())
    }

    /// Writes dirty contract states back into the world fork.
    fn commit(&mut self) -> Result<(), ExecError> {
        let dirty: Vec<Buf32> = self
            .loaded
            .iter()
            .filter(|(_, c)| c.dirty)
            .map(|(a, _)| *a)
            .collect();
        for addr in dirty {
            let loaded = &self.loaded[&addr];
            let code = loaded.contract.encode_to_vec();
            let state = AccountState::Contract {
                code_hash: hash::blake2b(&code),
                code,
                fields: encode_vals(&loaded.fields),
                amount: loaded.amount,
            };
            self.world_mut()?.put_account(&addr, &state)?;
            self.loaded.get_mut(&addr).expect("vm: dirty entry").dirty = false;
        }
        Ok(())
    }

    fn rollback(&mut self, root: Option<Buf32>) {
        self.loaded.clear();
        if let (Some(world), Some(root)) = (self.world.as_mut(), root) {
            world.set_root(root);
        }
    }
}

#[derive(Clone)]
enum FrameObj {
    Script(Arc<Script>),
    Contract { addr: Buf32, contract: Arc<Contract> },
}

impl FrameObj {
    fn method(&self, index: usize) -> Result<&Method, ExecError> {
        let methods = match self {
            FrameObj::Script(s) => &s.methods,
            FrameObj::Contract { contract, .. } => &contract.methods,
        };
        methods.get(index).ok_or(ExecError::InvalidMethodIndex)
    }
}

struct Frame {
    obj: FrameObj,
    method_index: usize,
    pc: usize,
    locals_base: usize,
    op_base: usize,
    return_length: usize,
    balance: Option<BalanceState>,
}

/// The virtual machine.  One instance executes one entry call.
pub struct Vm<'c, S: NodeStore> {
    ctx: &'c mut ExecContext<S>,
    stack: Stack,
    frames: Vec<Frame>,
    gas: GasMeter,
}

impl<'c, S: NodeStore> Vm<'c, S> {
    pub fn new(ctx: &'c mut ExecContext<S>, gas_budget: u64) -> Self {
        Self {
            ctx,
            stack: Stack::new(),
            frames: Vec::new(),
            gas: GasMeter::new(gas_budget),
        }
    }

    pub fn gas_used(&self) -> u64 {
        self.gas.used()
    }

    /// Runs a script from its entry method.
    pub fn execute_script(
        &mut self,
        script: Arc<Script>,
        args: Vec<Val>,
        balance: Option<BalanceState>,
    ) -> Result<Vec<Val>, ExecError> {
        self.execute_entry(FrameObj::Script(script), 0, args, balance)
    }

    /// Runs a public method of a deployed contract.
    pub fn execute_contract_method(
        &mut self,
        addr: Buf32,
        method_index: usize,
        args: Vec<Val>,
        balance: Option<BalanceState>,
    ) -> Result<Vec<Val>, ExecError> {
        let snapshot = self.ctx.world.as_ref().map(|w| w.root());
        self.ctx.load_contract(addr).map_err(|e| {
            self.ctx.rollback(snapshot);
            e
        })?;
        let contract = self.ctx.loaded[&addr].contract.clone();
        self.execute_entry(FrameObj::Contract { addr, contract }, method_index, args, balance)
    }

    fn execute_entry(
        &mut self,
        obj: FrameObj,
        method_index: usize,
        args: Vec<Val>,
        balance: Option<BalanceState>,
    ) -> Result<Vec<Val>, ExecError> {
        let snapshot = self.ctx.world.as_ref().map(|w| w.root());
        match self.execute_entry_inner(obj, method_index, args, balance) {
            Ok(out) => {
                self.ctx.commit().map_err(|e| {
                    self.ctx.rollback(snapshot);
                    e
                })?;
                Ok(out)
            }
            Err(e) => {
                self.ctx.rollback(snapshot);
                Err(e)
            }
        }
    }

    fn execute_entry_inner(
        &mut self,
        obj: FrameObj,
        method_index: usize,
        args: Vec<Val>,
        balance: Option<BalanceState>,
    ) -> Result<Vec<Val>, ExecError> {
        let return_length = obj.method(method_index)?.return_length as usize;

        self.stack.extend(args)?;
        self.push_frame(obj, method_index, balance, true)?;

        while !self.frames.is_empty() {
            self.step()?;
        }

        if self.stack.len() != return_length {
            return Err(ExecError::InvalidReturnLength);
        }
        self.stack.pop_many(return_length)
    }

    /// Runs the top frame until the frame set changes.
    fn step(&mut self) -> Result<(), ExecError> {
        loop {
            let (obj, method_index, pc) = {
                let frame = self.frames.last().expect("vm: step without frame");
                (frame.obj.clone(), frame.method_index, frame.pc)
            };
            let method = obj.method(method_index)?;
            let pc_max = method.instrs.len();

            if pc == pc_max {
                self.do_return()?;
                return Ok(());
            }
            if pc > pc_max {
                return Err(ExecError::PcOverflow);
            }

            let instr = method.instrs[pc].clone();
            trace!(?instr, pc, "exec");
            self.gas.charge(instr.gas())?;

            match instr {
                Instr::CallLocal(i) => {
                    self.top_frame_mut().pc += 1;
                    let balance = self.balance_for_callee(&obj, i as usize)?;
                    self.push_frame(obj, i as usize, balance, false)?;
                    return Ok(());
                }
                Instr::CallExternal(i) => {
                    self.top_frame_mut().pc += 1;
                    self.call_external(i as usize)?;
                    return Ok(());
                }
                Instr::Return => {
                    self.do_return()?;
                    return Ok(());
                }
                other => self.run_instr(other, pc_max)?,
            }
        }
    }

    fn top_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("vm: no frame")
    }

    /// Hands the caller's approved pot to a payable callee.
    fn balance_for_callee(
        &mut self,
        obj: &FrameObj,
        method_index: usize,
    ) -> Result<Option<BalanceState>, ExecError> {
        let callee_payable = obj.method(method_index)?.is_payable;
        if !callee_payable {
            return Ok(None);
        }
        let parent = self.top_frame_mut();
        let Some(parent_balance) = parent.balance.as_mut() else {
            return Err(ExecError::EmptyBalanceForPayableMethod);
        };
        Ok(Some(parent_balance.take_approved()))
    }

    fn call_external(&mut self, method_index: usize) -> Result<(), ExecError> {
        let addr = self.stack.pop_address()?;
        self.ctx.load_contract(addr)?;
        let contract = self.ctx.loaded[&addr].contract.clone();
        let obj = FrameObj::Contract { addr, contract };

        let method = obj.method(method_index)?;
        if !method.is_public {
            return Err(ExecError::ExternalPrivateMethodCall);
        }
        let mut balance = self.balance_for_callee(&obj, method_index)?;

        // A payable contract method also gets the contract's own asset.
        if let Some(balance) = balance.as_mut() {
            let loaded = self.ctx.loaded.get_mut(&addr).expect("vm: loaded contract");
            if loaded.amount > 0 {
                balance.add_remaining(&addr, Balances::native(loaded.amount));
                loaded.amount = 0;
                loaded.dirty = true;
            }
        }

        self.push_frame(obj, method_index, balance, false)
    }

    fn push_frame(
        &mut self,
        obj: FrameObj,
        method_index: usize,
        balance: Option<BalanceState>,
        is_entry: bool,
    ) -> Result<(), ExecError> {
        let method = obj.method(method_index)?;
        if method.is_payable && balance.is_none() {
            return Err(ExecError::EmptyBalanceForPayableMethod);
        }
        if !method.is_payable && balance.is_some() {
            // Non-payable methods may not consume balances.
            return Err(ExecError::BalanceUnavailable);
        }
        if is_entry && !method.is_public {
            return Err(ExecError::ExternalPrivateMethodCall);
        }

        let args_length = method.args_length as usize;
        let locals_length = method.locals_length as usize;
        let return_length = method.return_length as usize;

        let args = self.stack.pop_many(args_length)?;
        let locals_base = self.stack.len();
        self.stack.extend(args)?;
        for _ in args_length..locals_length {
            self.stack.push(Val::U256(U256::ZERO))?;
        }

        self.frames.push(Frame {
            obj,
            method_index,
            pc: 0,
            locals_base,
            op_base: locals_base + locals_length,
            return_length,
            balance,
        });
        Ok(())
    }

    fn do_return(&mut self) -> Result<(), ExecError> {
        let frame = self.frames.pop().expect("vm: return without frame");

        if self.stack.len() != frame.op_base + frame.return_length {
            return Err(ExecError::InvalidReturnLength);
        }
        let returns = self.stack.pop_many(frame.return_length)?;
        self.stack.truncate(frame.locals_base);
        self.stack.extend(returns)?;

        // Refund whatever balance the frame did not spend.
        if let Some(balance) = frame.balance {
            match self.frames.last_mut().and_then(|f| f.balance.as_mut()) {
                Some(parent) => parent.merge_refund(balance),
                None => {
                    for (addr, bal) in balance.drain_all() {
                        if bal.native > 0 {
                            self.ctx.credit_native(addr, bal.native)?;
                        }
                        for (token, amount) in bal.tokens {
                            if amount > 0 {
                                self.ctx.credit_token(addr, token, amount)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn offset_pc(&mut self, offset: i16, pc_max: usize) -> Result<(), ExecError> {
        let frame = self.top_frame_mut();
        let next = frame.pc as i64 + 1 + offset as i64;
        if next < 0 || next > pc_max as i64 {
            return Err(ExecError::InvalidInstrOffset);
        }
        frame.pc = next as usize;
        Ok(())
    }

    fn local_slot(&self, index: u8) -> Result<usize, ExecError> {
        let frame = self.frames.last().expect("vm: no frame");
        let slot = frame.locals_base + index as usize;
        if slot >= frame.op_base {
            return Err(ExecError::InvalidLocalIndex);
        }
        Ok(slot)
    }

    fn contract_addr(&self) -> Result<Buf32, ExecError> {
        match &self.frames.last().expect("vm: no frame").obj {
            FrameObj::Contract { addr, .. } => Ok(*addr),
            FrameObj::Script(_) => Err(ExecError::InvalidFieldIndex),
        }
    }

    fn frame_balance_mut(&mut self) -> Result<&mut BalanceState, ExecError> {
        self.top_frame_mut()
            .balance
            .as_mut()
            .ok_or(ExecError::BalanceUnavailable)
    }

    fn run_instr(&mut self, instr: Instr, pc_max: usize) -> Result<(), ExecError> {
        use Instr::*;

        let mut jumped = false;
        match instr {
            ConstTrue => self.stack.push(Val::Bool(true))?,
            ConstFalse => self.stack.push(Val::Bool(false))?,
            I256Const0 => self.stack.push(Val::I256(ethnum::I256::ZERO))?,
            I256Const1 => self.stack.push(Val::I256(ethnum::I256::ONE))?,
            U256Const0 => self.stack.push(Val::U256(U256::ZERO))?,
            U256Const1 => self.stack.push(Val::U256(U256::ONE))?,
            U256Const2 => self.stack.push(Val::U256(U256::from(2u8)))?,
            U256Const3 => self.stack.push(Val::U256(U256::from(3u8)))?,
            U256Const4 => self.stack.push(Val::U256(U256::from(4u8)))?,
            U256Const5 => self.stack.push(Val::U256(U256::from(5u8)))?,
            I256Const(v) => self.stack.push(Val::I256(v))?,
            U256Const(v) => self.stack.push(Val::U256(v))?,
            BytesConst(b) => self.stack.push(Val::ByteVec(b))?,
            AddressConst(a) => self.stack.push(Val::Address(a))?,

            LoadLocal(i) => {
                let slot = self.local_slot(i)?;
                let val = self.stack.get(slot)?.clone();
                self.stack.push(val)?;
            }
            StoreLocal(i) => {
                let slot = self.local_slot(i)?;
                let val = self.stack.pop()?;
                self.stack.set(slot, val)?;
            }
            LoadField(i) => {
                let addr = self.contract_addr()?;
                let loaded = self.ctx.loaded.get(&addr).expect("vm: frame contract");
                let val = loaded
                    .fields
                    .get(i as usize)
                    .ok_or(ExecError::InvalidFieldIndex)?
                    .clone();
                self.stack.push(val)?;
            }
            StoreField(i) => {
                let addr = self.contract_addr()?;
                let val = self.stack.pop()?;
                let loaded = self.ctx.loaded.get_mut(&addr).expect("vm: frame contract");
                let slot = loaded
                    .fields
                    .get_mut(i as usize)
                    .ok_or(ExecError::InvalidFieldIndex)?;
                if slot.ty() != val.ty() {
                    return Err(ExecError::InvalidFieldType);
                }
                *slot = val;
                loaded.dirty = true;
            }
            Pop => {
                self.stack.pop()?;
            }
            Dup => self.stack.dup_top()?,
            Swap => self.stack.swap_top()?,

            I256Add => self.i256_binop(|a, b| a.checked_add(b))?,
            I256Sub => self.i256_binop(|a, b| a.checked_sub(b))?,
            I256Mul => self.i256_binop(|a, b| a.checked_mul(b))?,
            I256Div => self.i256_binop(|a, b| a.checked_div(b))?,
            I256Mod => self.i256_binop(|a, b| a.checked_rem(b))?,
            U256Add => self.u256_binop(|a, b| a.checked_add(b))?,
            U256Sub => self.u256_binop(|a, b| a.checked_sub(b))?,
            U256Mul => self.u256_binop(|a, b| a.checked_mul(b))?,
            U256Div => self.u256_binop(|a, b| a.checked_div(b))?,
            U256Mod => self.u256_binop(|a, b| a.checked_rem(b))?,
            I256Neg => {
                let v = self.stack.pop_i256()?;
                let out = v.checked_neg().ok_or(ExecError::ArithmeticError)?;
                self.stack.push(Val::I256(out))?;
            }

            Eq | Ne => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                if a.ty() != b.ty() {
                    return Err(ExecError::InvalidType);
                }
                let eq = a == b;
                self.stack
                    .push(Val::Bool(if matches!(instr, Eq) { eq } else { !eq }))?;
            }
            I256Lt => self.i256_cmp(|a, b| a < b)?,
            I256Le => self.i256_cmp(|a, b| a <= b)?,
            I256Gt => self.i256_cmp(|a, b| a > b)?,
            I256Ge => self.i256_cmp(|a, b| a >= b)?,
            U256Lt => self.u256_cmp(|a, b| a < b)?,
            U256Le => self.u256_cmp(|a, b| a <= b)?,
            U256Gt => self.u256_cmp(|a, b| a > b)?,
            U256Ge => self.u256_cmp(|a, b| a >= b)?,
            BoolAnd => {
                let b = self.stack.pop_bool()?;
                let a = self.stack.pop_bool()?;
                self.stack.push(Val::Bool(a && b))?;
            }
            BoolOr => {
                let b = self.stack.pop_bool()?;
                let a = self.stack.pop_bool()?;
                self.stack.push(Val::Bool(a || b))?;
            }
            BoolNot => {
                let a = self.stack.pop_bool()?;
                self.stack.push(Val::Bool(!a))?;
            }

            ByteVecConcat => {
                let b = self.stack.pop_bytes()?;
                let mut a = self.stack.pop_bytes()?;
                a.extend_from_slice(&b);
                self.stack.push(Val::ByteVec(a))?;
            }
            ByteVecSize => {
                let a = self.stack.pop_bytes()?;
                self.stack.push(Val::U256(U256::from(a.len() as u64)))?;
            }

            Jump(off) => {
                self.offset_pc(off, pc_max)?;
                jumped = true;
            }
            IfTrue(off) => {
                if self.stack.pop_bool()? {
                    self.offset_pc(off, pc_max)?;
                    jumped = true;
                }
            }
            IfFalse(off) => {
                if !self.stack.pop_bool()? {
                    self.offset_pc(off, pc_max)?;
                    jumped = true;
                }
            }

            Log(n) => {
                // Event payloads stay off-chain for now; arguments are
                // consumed and nothing else happens at this layer.
                self.stack.pop_many(n as usize)?;
            }

            Blake2b => {
                let data = self.stack.pop_bytes()?;
                let digest = hash::blake2b(&data);
                self.stack.push(Val::ByteVec(digest.as_slice().to_vec()))?;
            }
            Keccak256 => {
                let data = self.stack.pop_bytes()?;
                let digest = hash::keccak256(&data);
                self.stack.push(Val::ByteVec(digest.as_slice().to_vec()))?;
            }
            VerifyTxSignature => {
                let pk_bytes = self.stack.pop_bytes()?;
                let pk = secp256k1::PublicKey::from_slice(&pk_bytes)
                    .map_err(|_| ExecError::InvalidSignature)?;
                let sig = self.ctx.pop_signature()?;
                let tx_id = self.ctx.tx_id;
                if !crypto::verify(&tx_id, &sig, &pk) {
                    return Err(ExecError::InvalidSignature);
                }
            }

            ApproveNative => {
                let amount = pop_amount(&mut self.stack)?;
                let from = self.stack.pop_address()?;
                self.frame_balance_mut()?.approve_native(&from, amount)?;
            }
            TransferNative => {
                let amount = pop_amount(&mut self.stack)?;
                let to = self.stack.pop_address()?;
                let from = self.stack.pop_address()?;
                self.frame_balance_mut()?.use_native(&from, amount)?;
                self.ctx.credit_native(to, amount)?;
            }
            TransferToken => {
                let amount = pop_amount(&mut self.stack)?;
                let token_bytes = self.stack.pop_bytes()?;
                let token =
                    Buf32::try_from(token_bytes.as_slice()).map_err(|_| ExecError::InvalidType)?;
                let to = self.stack.pop_address()?;
                let from = self.stack.pop_address()?;
                self.frame_balance_mut()?.use_token(&from, &token, amount)?;
                self.ctx.credit_token(to, token, amount)?;
            }

            CallLocal(_) | CallExternal(_) | Return => {
                unreachable!("vm: frame-changing instr in run_instr")
            }
        }

        if !jumped {
            self.top_frame_mut().pc += 1;
        }
        Ok(())
    }

    fn i256_binop(
        &mut self,
        op: impl Fn(ethnum::I256, ethnum::I256) -> Option<ethnum::I256>,
    ) -> Result<(), ExecError> {
        let b = self.stack.pop_i256()?;
        let a = self.stack.pop_i256()?;
        let out = op(a, b).ok_or(ExecError::ArithmeticError)?;
        self.stack.push(Val::I256(out))
    }

    fn u256_binop(&mut self, op: impl Fn(U256, U256) -> Option<U256>) -> Result<(), ExecError> {
        let b = self.stack.pop_u256()?;
        let a = self.stack.pop_u256()?;
        let out = op(a, b).ok_or(ExecError::ArithmeticError)?;
        self.stack.push(Val::U256(out))
    }

    fn i256_cmp(
        &mut self,
        op: impl Fn(ethnum::I256, ethnum::I256) -> bool,
    ) -> Result<(), ExecError> {
        let b = self.stack.pop_i256()?;
        let a = self.stack.pop_i256()?;
        self.stack.push(Val::Bool(op(a, b)))
    }

    fn u256_cmp(&mut self, op: impl Fn(U256, U256) -> bool) -> Result<(), ExecError> {
        let b = self.stack.pop_u256()?;
        let a = self.stack.pop_u256()?;
        self.stack.push(Val::Bool(op(a, b)))
    }
}

fn pop_amount(stack: &mut Stack) -> Result<u64, ExecError> {
    let v = stack.pop_u256()?;
    u64::try_from(v).map_err(|_| ExecError::ArithmeticError)
}
