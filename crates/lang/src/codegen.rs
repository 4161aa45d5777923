//! Type checking and code generation.
//!
//! Functions compile in declaration order, so identical sources always
//! produce identical bytecode.  Arrays live in consecutive slots; an
//! `ArrayRef` in the arena records where a named array starts and its
//! shape, and every access resolves to plain slot loads and stores at
//! compile time.

use std::collections::HashMap;

use ethnum::{I256, U256};

use gridchain_vm::{Contract, Instr, Method, Script, ValType};

use crate::ast::*;
use crate::errors::{CompileError, Span};
use crate::parser::parse;
use crate::types::Type;

#[derive(Clone, Debug)]
pub enum CompiledUnit {
    Contract(Contract),
    Script(Script),
}

pub fn compile(src: &str) -> Result<CompiledUnit, CompileError> {
    let unit = parse(src)?;
    UnitCompiler::new(&unit)?.compile(&unit)
}

pub fn compile_contract(src: &str) -> Result<Contract, CompileError> {
    match compile(src)? {
        CompiledUnit::Contract(c) => Ok(c),
        CompiledUnit::Script(_) => Err(CompileError::Type(
            "expected a TxContract".into(),
            Span::default(),
        )),
    }
}

pub fn compile_tx_script(src: &str) -> Result<Script, CompileError> {
    match (parse(src)?.kind.clone(), compile(src)?) {
        (UnitKind::TxScript, CompiledUnit::Script(s)) => Ok(s),
        _ => Err(CompileError::Type(
            "expected a TxScript".into(),
            Span::default(),
        )),
    }
}

pub fn compile_asset_script(src: &str) -> Result<Script, CompileError> {
    match (parse(src)?.kind.clone(), compile(src)?) {
        (UnitKind::AssetScript, CompiledUnit::Script(s)) => Ok(s),
        _ => Err(CompileError::Type(
            "expected an AssetScript".into(),
            Span::default(),
        )),
    }
}

/// Where a named array's slots live.
#[derive(Clone, Debug)]
struct ArrayRef {
    start: usize,
    shape: Vec<usize>,
    ty: Type,
}

#[derive(Clone, Debug)]
enum VarInfo {
    Scalar { slot: usize, ty: Type },
    Array { handle: usize },
}

#[derive(Clone, Debug)]
struct FuncSig {
    index: usize,
    params: Vec<Type>,
    ret: Type,
}

#[derive(Clone, Debug)]
struct EventInfo {
    field_types: Vec<Type>,
}

struct UnitCompiler {
    funcs: HashMap<String, FuncSig>,
    events: HashMap<String, EventInfo>,
    fields: HashMap<String, VarInfo>,
    field_arena: Vec<ArrayRef>,
    field_schema: Vec<ValType>,
}

fn shape_of(ty: &Type) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut at = ty;
    while let Type::FixedSizeArray(elem, n) = at {
        shape.push(*n);
        at = elem;
    }
    shape
}

impl UnitCompiler {
    fn new(unit: &Unit) -> Result<Self, CompileError> {
        let mut funcs = HashMap::new();
        for (index, func) in unit.funcs.iter().enumerate() {
            let sig = FuncSig {
                index,
                params: func.params.iter().map(|p| p.ty.clone()).collect(),
                ret: func.ret.clone(),
            };
            if funcs.insert(func.name.clone(), sig).is_some() {
                return Err(CompileError::Duplicate(
                    format!("function `{}`", func.name),
                    func.span,
                ));
            }
        }
        if funcs.len() > u8::MAX as usize {
            return Err(CompileError::OutOfRange(
                "too many functions".into(),
                unit.span,
            ));
        }

        let mut events = HashMap::new();
        for event in &unit.events {
            let info = EventInfo {
                field_types: event.fields.iter().map(|p| p.ty.clone()).collect(),
            };
            if events.insert(event.name.clone(), info).is_some() {
                return Err(CompileError::Duplicate(
                    format!("event `{}`", event.name),
                    event.span,
                ));
            }
        }

        // Contract fields flatten into one schema.
        let mut fields = HashMap::new();
        let mut field_arena = Vec::new();
        let mut field_schema = Vec::new();
        let mut next_slot = 0usize;
        for param in &unit.fields {
            let len = param.ty.flatten_len();
            let scalar = param
                .ty
                .scalar()
                .val_type()
                .ok_or_else(|| CompileError::Type("field of unit type".into(), param.span))?;
            let info = if param.ty.is_array() {
                field_arena.push(ArrayRef {
                    start: next_slot,
                    shape: shape_of(&param.ty),
                    ty: param.ty.clone(),
                });
                VarInfo::Array {
                    handle: field_arena.len() - 1,
                }
            } else {
                VarInfo::Scalar {
                    slot: next_slot,
                    ty: param.ty.clone(),
                }
            };
            if fields.insert(param.name.clone(), info).is_some() {
                return Err(CompileError::Duplicate(
                    format!("field `{}`", param.name),
                    param.span,
                ));
            }
            for _ in 0..len {
                field_schema.push(scalar);
            }
            next_slot += len;
        }
        if next_slot > u8::MAX as usize {
            return Err(CompileError::OutOfRange("too many field slots".into(), unit.span));
        }

        Ok(Self {
            funcs,
            events,
            fields,
            field_arena,
            field_schema,
        })
    }

    fn compile(&self, unit: &Unit) -> Result<CompiledUnit, CompileError> {
        if unit.kind == UnitKind::TxScript {
            // The entry method is the only public one in a tx script.
            for (i, func) in unit.funcs.iter().enumerate() {
                if i == 0 && !func.is_public {
                    return Err(CompileError::Type(
                        "tx script entry method must be pub".into(),
                        func.span,
                    ));
                }
                if i > 0 && func.is_public {
                    return Err(CompileError::Type(
                        "tx script methods after the first must be private".into(),
                        func.span,
                    ));
                }
            }
            if unit.funcs.is_empty() {
                return Err(CompileError::Type(
                    "tx script needs an entry method".into(),
                    unit.span,
                ));
            }
        }

        let mut methods = Vec::with_capacity(unit.funcs.len());
        for func in &unit.funcs {
            methods.push(FuncCompiler::new(self, func)?.compile(func)?);
        }

        Ok(match unit.kind {
            UnitKind::TxContract => CompiledUnit::Contract(Contract {
                fields: self.field_schema.clone(),
                methods,
            }),
            UnitKind::TxScript | UnitKind::AssetScript => {
                CompiledUnit::Script(Script { methods })
            }
        })
    }
}

struct FuncCompiler<'u> {
    unit: &'u UnitCompiler,
    locals: HashMap<String, VarInfo>,
    local_arena: Vec<ArrayRef>,
    next_slot: usize,
    instrs: Vec<Instr>,
    ret: Type,
    args_length: usize,
}

/// A resolved variable access: contiguous slots in locals or fields.
struct Place {
    start: usize,
    ty: Type,
    in_fields: bool,
}

impl<'u> FuncCompiler<'u> {
    fn new(unit: &'u UnitCompiler, func: &FuncDef) -> Result<Self, CompileError> {
        let mut this = Self {
            unit,
            locals: HashMap::new(),
            local_arena: Vec::new(),
            next_slot: 0,
            instrs: Vec::new(),
            ret: func.ret.clone(),
            args_length: 0,
        };
        for param in &func.params {
            this.declare(&param.name, param.ty.clone(), param.span)?;
        }
        this.args_length = this.next_slot;
        Ok(this)
    }

    fn compile(mut self, func: &FuncDef) -> Result<Method, CompileError> {
        self.body(&func.body)?;

        let bound = |n: usize, what: &str| -> Result<u8, CompileError> {
            u8::try_from(n)
                .map_err(|_| CompileError::OutOfRange(format!("too many {what} slots"), func.span))
        };

        Ok(Method {
            is_public: func.is_public,
            is_payable: func.is_payable,
            args_length: bound(self.args_length, "argument")?,
            locals_length: bound(self.next_slot, "local")?,
            return_length: bound(self.ret.flatten_len(), "return")?,
            instrs: self.instrs,
        })
    }

    fn declare(&mut self, name: &str, ty: Type, span: Span) -> Result<usize, CompileError> {
        if self.locals.contains_key(name) {
            return Err(CompileError::Duplicate(format!("binding `{name}`"), span));
        }
        let start = self.next_slot;
        let len = ty.flatten_len();
        if len == 0 {
            return Err(CompileError::Type("binding of unit type".into(), span));
        }
        let info = if ty.is_array() {
            self.local_arena.push(ArrayRef {
                start,
                shape: shape_of(&ty),
                ty,
            });
            VarInfo::Array {
                handle: self.local_arena.len() - 1,
            }
        } else {
            VarInfo::Scalar { slot: start, ty }
        };
        self.locals.insert(name.to_string(), info);
        self.next_slot += len;
        Ok(start)
    }

    fn lookup(&self, name: &str, span: Span) -> Result<Place, CompileError> {
        if let Some(info) = self.locals.get(name) {
            return Ok(match info {
                VarInfo::Scalar { slot, ty } => Place {
                    start: *slot,
                    ty: ty.clone(),
                    in_fields: false,
                },
                VarInfo::Array { handle } => {
                    let aref = &self.local_arena[*handle];
                    Place {
                        start: aref.start,
                        ty: aref.ty.clone(),
                        in_fields: false,
                    }
                }
            });
        }
        if let Some(info) = self.unit.fields.get(name) {
            return Ok(match info {
                VarInfo::Scalar { slot, ty } => Place {
                    start: *slot,
                    ty: ty.clone(),
                    in_fields: true,
                },
                VarInfo::Array { handle } => {
                    let aref = &self.unit.field_arena[*handle];
                    Place {
                        start: aref.start,
                        ty: aref.ty.clone(),
                        in_fields: true,
                    }
                }
            });
        }
        Err(CompileError::Type(format!("unknown name `{name}`"), span))
    }

    fn body(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn in_fragment(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<Vec<Instr>, CompileError> {
        let saved = std::mem::take(&mut self.instrs);
        let res = f(self);
        let frag = std::mem::replace(&mut self.instrs, saved);
        res.map(|_| frag)
    }

    fn branch_offset(&self, len: usize, span: Span) -> Result<i16, CompileError> {
        if len > 0xff {
            return Err(CompileError::OutOfRange(
                "Too many instrs for branches".into(),
                span,
            ));
        }
        Ok(len as i16)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Let { name, ty, init } => {
                let init_ty = self.expr(init, ty.as_ref())?;
                if let Some(want) = ty {
                    if *want != init_ty {
                        return Err(CompileError::Type(
                            format!("let of `{want}` from `{init_ty}`"),
                            stmt.span,
                        ));
                    }
                }
                let start = self.declare(name, init_ty.clone(), stmt.span)?;
                self.store_slots(start, init_ty.flatten_len(), false);
                Ok(())
            }

            StmtKind::Assign {
                target,
                indices,
                value,
            } => {
                let place = self.lookup(target, stmt.span)?;
                let (start, ty) = self.resolve_indices(&place, indices, stmt.span)?;
                let value_ty = self.expr(value, Some(&ty))?;
                if value_ty != ty {
                    return Err(CompileError::Type(
                        format!("assigning `{value_ty}` to `{ty}`"),
                        stmt.span,
                    ));
                }
                self.store_slots(start, ty.flatten_len(), place.in_fields);
                Ok(())
            }

            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let branch = self.cond(cond)?;
                let then_ir = self.in_fragment(|c| c.body(then_body))?;
                let else_ir = self.in_fragment(|c| c.body(else_body))?;

                if else_ir.is_empty() {
                    let off = self.branch_offset(then_ir.len(), stmt.span)?;
                    self.instrs.push(branch_instr(branch, off));
                    self.instrs.extend(then_ir);
                } else {
                    let off = self.branch_offset(then_ir.len() + 1, stmt.span)?;
                    self.instrs.push(branch_instr(branch, off));
                    self.instrs.extend(then_ir);
                    let jump = self.branch_offset(else_ir.len(), stmt.span)?;
                    self.instrs.push(Instr::Jump(jump));
                    self.instrs.extend(else_ir);
                }
                Ok(())
            }

            StmtKind::While { cond, body } => {
                let (cond_ir, branch) = {
                    let mut branch = Branch::IfFalse;
                    let cond_ir = self.in_fragment(|c| {
                        branch = c.cond(cond)?;
                        Ok(())
                    })?;
                    (cond_ir, branch)
                };
                let body_ir = self.in_fragment(|c| c.body(body))?;

                let exit = self.branch_offset(body_ir.len() + 1, stmt.span)?;
                let total = cond_ir.len() + 1 + body_ir.len() + 1;
                if total > 0xff {
                    return Err(CompileError::OutOfRange(
                        "Too many instrs for branches".into(),
                        stmt.span,
                    ));
                }
                self.instrs.extend(cond_ir);
                self.instrs.push(branch_instr(branch, exit));
                self.instrs.extend(body_ir);
                self.instrs.push(Instr::Jump(-(total as i16)));
                Ok(())
            }

            StmtKind::Return(value) => {
                let ret = self.ret.clone();
                match value {
                    None => {
                        if ret != Type::Unit {
                            return Err(CompileError::Type(
                                format!("empty return from `{ret}` function"),
                                stmt.span,
                            ));
                        }
                    }
                    Some(e) => {
                        let got = self.expr(e, Some(&ret))?;
                        if got != ret {
                            return Err(CompileError::Type(
                                format!("returning `{got}` from `{ret}` function"),
                                stmt.span,
                            ));
                        }
                    }
                }
                self.instrs.push(Instr::Return);
                Ok(())
            }

            StmtKind::Emit { event, args } => {
                let info = self.unit.events.get(event).ok_or_else(|| {
                    CompileError::Type(format!("unknown event `{event}`"), stmt.span)
                })?;
                if info.field_types.len() != args.len() {
                    return Err(CompileError::Type(
                        format!(
                            "event `{event}` takes {} fields, got {}",
                            info.field_types.len(),
                            args.len()
                        ),
                        stmt.span,
                    ));
                }
                // Type check only: event emission lowers to no instructions
                // at this layer.
                let field_types = info.field_types.clone();
                for (arg, want) in args.iter().zip(&field_types) {
                    let frag_ty = {
                        let mut got = Type::Unit;
                        self.in_fragment(|c| {
                            got = c.expr(arg, Some(want))?;
                            Ok(())
                        })?;
                        got
                    };
                    if frag_ty != *want {
                        return Err(CompileError::Type(
                            format!("event field expects `{want}`, got `{frag_ty}`"),
                            arg.span,
                        ));
                    }
                }
                Ok(())
            }

            StmtKind::ExprStmt(e) => {
                let ty = self.expr(e, None)?;
                for _ in 0..ty.flatten_len() {
                    self.instrs.push(Instr::Pop);
                }
                Ok(())
            }
        }
    }

    /// Emits condition code and picks the branch instruction, folding a
    /// leading negation into `IfTrue`.
    fn cond(&mut self, cond: &Expr) -> Result<Branch, CompileError> {
        if let ExprKind::Unary {
            op: UnOp::Not,
            operand,
        } = &cond.kind
        {
            let ty = self.expr(operand, Some(&Type::Bool))?;
            if ty != Type::Bool {
                return Err(CompileError::Type(
                    format!("condition of type `{ty}`"),
                    cond.span,
                ));
            }
            return Ok(Branch::IfTrue);
        }
        let ty = self.expr(cond, Some(&Type::Bool))?;
        if ty != Type::Bool {
            return Err(CompileError::Type(
                format!("condition of type `{ty}`"),
                cond.span,
            ));
        }
        Ok(Branch::IfFalse)
    }

    /// Emits stores for `len` stacked slots into `start..start+len`,
    /// popping in reverse slot order.
    fn store_slots(&mut self, start: usize, len: usize, in_fields: bool) {
        for slot in (start..start + len).rev() {
            self.instrs.push(if in_fields {
                Instr::StoreField(slot as u8)
            } else {
                Instr::StoreLocal(slot as u8)
            });
        }
    }

    fn load_slots(&mut self, start: usize, len: usize, in_fields: bool) {
        for slot in start..start + len {
            self.instrs.push(if in_fields {
                Instr::LoadField(slot as u8)
            } else {
                Instr::LoadLocal(slot as u8)
            });
        }
    }

    /// Statically resolves an index chain against a place.
    fn resolve_indices(
        &mut self,
        place: &Place,
        indices: &[Expr],
        span: Span,
    ) -> Result<(usize, Type), CompileError> {
        let mut start = place.start;
        let mut ty = place.ty.clone();
        for index in indices {
            let Type::FixedSizeArray(elem, n) = ty else {
                return Err(CompileError::Type("indexing a non-array".into(), span));
            };
            let idx = static_index(index)?;
            if idx >= n {
                return Err(CompileError::OutOfRange(
                    format!("index {idx} out of bounds for length {n}"),
                    index.span,
                ));
            }
            start += idx * elem.flatten_len();
            ty = *elem;
        }
        Ok((start, ty))
    }

    /// Compiles an expression, leaving its flattened slots on the stack.
    /// Returns its type.  `hint` steers integer literal typing.
    fn expr(&mut self, e: &Expr, hint: Option<&Type>) -> Result<Type, CompileError> {
        match &e.kind {
            ExprKind::IntLit(v) => {
                if hint == Some(&Type::I256) {
                    let signed = i256_from_u256(*v, e.span)?;
                    self.push_i256_const(signed);
                    return Ok(Type::I256);
                }
                self.push_u256_const(*v);
                Ok(Type::U256)
            }
            ExprKind::SignedIntLit(v) => {
                let signed = i256_from_u256(*v, e.span)?;
                self.push_i256_const(signed);
                Ok(Type::I256)
            }
            ExprKind::BoolLit(b) => {
                self.instrs
                    .push(if *b { Instr::ConstTrue } else { Instr::ConstFalse });
                Ok(Type::Bool)
            }

            ExprKind::Var(name) => {
                let place = self.lookup(name, e.span)?;
                self.load_slots(place.start, place.ty.flatten_len(), place.in_fields);
                Ok(place.ty)
            }

            ExprKind::Index { .. } => {
                let (base_name, indices) = flatten_index_chain(e)?;
                let place = self.lookup(&base_name, e.span)?;
                let (start, ty) = self.resolve_indices(&place, &indices, e.span)?;
                self.load_slots(start, ty.flatten_len(), place.in_fields);
                Ok(ty)
            }

            ExprKind::ArrayLit(elems) => {
                let elem_hint = match hint {
                    Some(Type::FixedSizeArray(elem, _)) => Some(elem.as_ref()),
                    _ => None,
                };
                let mut elem_ty: Option<Type> = None;
                for elem in elems {
                    let ty = self.expr(elem, elem_hint)?;
                    if let Some(prev) = &elem_ty {
                        if *prev != ty {
                            return Err(CompileError::Type(
                                "mixed element types in array literal".into(),
                                elem.span,
                            ));
                        }
                    }
                    elem_ty = Some(ty);
                }
                let elem_ty = elem_ty.ok_or_else(|| {
                    CompileError::Type("empty array literal".into(), e.span)
                })?;
                Ok(Type::FixedSizeArray(Box::new(elem_ty), elems.len()))
            }

            ExprKind::ArrayFill { elem, count } => {
                let elem_hint = match hint {
                    Some(Type::FixedSizeArray(inner, _)) => Some(inner.as_ref()),
                    _ => None,
                };
                let count = *count as usize;
                if count == 0 {
                    return Err(CompileError::Type("empty array fill".into(), e.span));
                }
                let elem_ty = self.expr(elem, elem_hint)?;
                if elem_ty.is_array() {
                    // Re-evaluating keeps slot duplication simple for
                    // nested shapes.
                    for _ in 1..count {
                        self.expr(elem, elem_hint)?;
                    }
                } else {
                    for _ in 1..count {
                        self.instrs.push(Instr::Dup);
                    }
                }
                Ok(Type::FixedSizeArray(Box::new(elem_ty), count))
            }

            ExprKind::Unary { op, operand } => match op {
                UnOp::Not => {
                    let ty = self.expr(operand, Some(&Type::Bool))?;
                    if ty != Type::Bool {
                        return Err(CompileError::Type(
                            format!("negating `{ty}`"),
                            e.span,
                        ));
                    }
                    self.instrs.push(Instr::BoolNot);
                    Ok(Type::Bool)
                }
                UnOp::Neg => {
                    let ty = self.expr(operand, Some(&Type::I256))?;
                    if ty != Type::I256 {
                        return Err(CompileError::Type(
                            format!("arithmetic negation of `{ty}`"),
                            e.span,
                        ));
                    }
                    self.instrs.push(Instr::I256Neg);
                    Ok(Type::I256)
                }
            },

            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, e.span, hint),

            ExprKind::Call { name, args } => {
                let sig = self
                    .unit
                    .funcs
                    .get(name)
                    .ok_or_else(|| {
                        CompileError::Type(format!("unknown function `{name}`"), e.span)
                    })?
                    .clone();
                if sig.params.len() != args.len() {
                    return Err(CompileError::Type(
                        format!(
                            "`{name}` takes {} arguments, got {}",
                            sig.params.len(),
                            args.len()
                        ),
                        e.span,
                    ));
                }
                for (arg, want) in args.iter().zip(&sig.params) {
                    let got = self.expr(arg, Some(want))?;
                    if got != *want {
                        return Err(CompileError::Type(
                            format!("argument expects `{want}`, got `{got}`"),
                            arg.span,
                        ));
                    }
                }
                self.instrs.push(Instr::CallLocal(sig.index as u8));
                Ok(sig.ret)
            }

            ExprKind::Builtin { name, args } => self.builtin(name, args, e.span),
        }
    }

    fn binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
        hint: Option<&Type>,
    ) -> Result<Type, CompileError> {
        let operand_hint = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => hint,
            _ => None,
        };
        let lhs_ty = self.expr(lhs, operand_hint)?;
        let rhs_ty = self.expr(rhs, operand_hint.or(Some(&lhs_ty)))?;

        if lhs_ty.is_array() || rhs_ty.is_array() {
            return Err(CompileError::Type(
                "operators are not defined on arrays".into(),
                span,
            ));
        }
        if lhs_ty != rhs_ty {
            return Err(CompileError::Type(
                format!("operand types `{lhs_ty}` and `{rhs_ty}` differ"),
                span,
            ));
        }

        let arith = |u: Instr, i: Instr| -> Result<(Instr, Type), CompileError> {
            match lhs_ty {
                Type::U256 => Ok((u, Type::U256)),
                Type::I256 => Ok((i, Type::I256)),
                ref other => Err(CompileError::Type(
                    format!("arithmetic on `{other}`"),
                    span,
                )),
            }
        };
        let cmp = |u: Instr, i: Instr| -> Result<(Instr, Type), CompileError> {
            match lhs_ty {
                Type::U256 => Ok((u, Type::Bool)),
                Type::I256 => Ok((i, Type::Bool)),
                ref other => Err(CompileError::Type(
                    format!("ordering comparison on `{other}`"),
                    span,
                )),
            }
        };

        let (instr, out) = match op {
            BinOp::Add => arith(Instr::U256Add, Instr::I256Add)?,
            BinOp::Sub => arith(Instr::U256Sub, Instr::I256Sub)?,
            BinOp::Mul => arith(Instr::U256Mul, Instr::I256Mul)?,
            BinOp::Div => arith(Instr::U256Div, Instr::I256Div)?,
            BinOp::Mod => arith(Instr::U256Mod, Instr::I256Mod)?,
            BinOp::Lt => cmp(Instr::U256Lt, Instr::I256Lt)?,
            BinOp::Le => cmp(Instr::U256Le, Instr::I256Le)?,
            BinOp::Gt => cmp(Instr::U256Gt, Instr::I256Gt)?,
            BinOp::Ge => cmp(Instr::U256Ge, Instr::I256Ge)?,
            BinOp::Eq => (Instr::Eq, Type::Bool),
            BinOp::Ne => (Instr::Ne, Type::Bool),
            BinOp::And | BinOp::Or => {
                if lhs_ty != Type::Bool {
                    return Err(CompileError::Type(
                        format!("logical operator on `{lhs_ty}`"),
                        span,
                    ));
                }
                (
                    if op == BinOp::And {
                        Instr::BoolAnd
                    } else {
                        Instr::BoolOr
                    },
                    Type::Bool,
                )
            }
            BinOp::Concat => {
                if lhs_ty != Type::ByteVec {
                    return Err(CompileError::Type(
                        format!("`++` on `{lhs_ty}`"),
                        span,
                    ));
                }
                (Instr::ByteVecConcat, Type::ByteVec)
            }
        };
        self.instrs.push(instr);
        Ok(out)
    }

    fn builtin(
        &mut self,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<Type, CompileError> {
        use Type::*;
        let (params, ret, instr): (Vec<Type>, Type, Instr) = match name {
            "blake2b" => (vec![ByteVec], ByteVec, Instr::Blake2b),
            "keccak256" => (vec![ByteVec], ByteVec, Instr::Keccak256),
            "verifyTxSignature" => (vec![ByteVec], Unit, Instr::VerifyTxSignature),
            "size" => (vec![ByteVec], U256, Instr::ByteVecSize),
            "approveNative" => (vec![Address, U256], Unit, Instr::ApproveNative),
            "transferNative" => (vec![Address, Address, U256], Unit, Instr::TransferNative),
            "transferToken" => (
                vec![Address, Address, ByteVec, U256],
                Unit,
                Instr::TransferToken,
            ),
            _ => {
                return Err(CompileError::Type(
                    format!("unknown builtin `{name}!`"),
                    span,
                ))
            }
        };

        if params.len() != args.len() {
            return Err(CompileError::Type(
                format!("`{name}!` takes {} arguments, got {}", params.len(), args.len()),
                span,
            ));
        }
        for (arg, want) in args.iter().zip(&params) {
            let got = self.expr(arg, Some(want))?;
            if got != *want {
                return Err(CompileError::Type(
                    format!("`{name}!` expects `{want}`, got `{got}`"),
                    arg.span,
                ));
            }
        }
        self.instrs.push(instr);
        Ok(ret)
    }

    fn push_u256_const(&mut self, v: U256) {
        let shorthand = [
            Instr::U256Const0,
            Instr::U256Const1,
            Instr::U256Const2,
            Instr::U256Const3,
            Instr::U256Const4,
            Instr::U256Const5,
        ];
        let instr = if v <= U256::from(5u8) {
            shorthand[v.as_usize()].clone()
        } else {
            Instr::U256Const(v)
        };
        self.instrs.push(instr);
    }

    fn push_i256_const(&mut self, v: I256) {
        let instr = if v == I256::ZERO {
            Instr::I256Const0
        } else if v == I256::ONE {
            Instr::I256Const1
        } else {
            Instr::I256Const(v)
        };
        self.instrs.push(instr);
    }
}

#[derive(Copy, Clone)]
enum Branch {
    IfTrue,
    IfFalse,
}

fn branch_instr(branch: Branch, offset: i16) -> Instr {
    match branch {
        Branch::IfTrue => Instr::IfTrue(offset),
        Branch::IfFalse => Instr::IfFalse(offset),
    }
}

fn static_index(e: &Expr) -> Result<usize, CompileError> {
    match &e.kind {
        ExprKind::IntLit(v) => u64::try_from(*v)
            .map(|v| v as usize)
            .map_err(|_| CompileError::OutOfRange("index literal too large".into(), e.span)),
        _ => Err(CompileError::UnsupportedArrayOp(
            "dynamic array indexing".into(),
            e.span,
        )),
    }
}

fn flatten_index_chain(e: &Expr) -> Result<(String, Vec<Expr>), CompileError> {
    let mut indices = Vec::new();
    let mut at = e;
    loop {
        match &at.kind {
            ExprKind::Index { base, index } => {
                indices.push((**index).clone());
                at = base;
            }
            ExprKind::Var(name) => {
                indices.reverse();
                return Ok((name.clone(), indices));
            }
            _ => {
                return Err(CompileError::UnsupportedArrayOp(
                    "indexing a non-variable expression".into(),
                    at.span,
                ))
            }
        }
    }
}

fn i256_from_u256(v: U256, span: Span) -> Result<I256, CompileError> {
    if v > U256::from_words(i128::MAX as u128, u128::MAX) {
        return Err(CompileError::OutOfRange(
            "signed literal too large".into(),
            span,
        ));
    }
    Ok(I256::from_words(v.into_words().0 as i128, v.into_words().1 as i128))
}
