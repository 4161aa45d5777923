//! Compiling source forms and running them on the VM.

use std::sync::Arc;

use ethnum::U256;

use gridchain_lang::{
    compile_asset_script, compile_contract, compile_tx_script, CompileError,
};
use gridchain_primitives::codec::Encode;
use gridchain_primitives::crypto;
use gridchain_primitives::hash;
use gridchain_smt::MemNodeStore;
use gridchain_state::world::WorldState;
use gridchain_vm::{ExecContext, ExecError, Val, Vm};

const GAS: u64 = 10_000_000;

fn u(v: u64) -> Val {
    Val::U256(U256::from(v))
}

fn stateful() -> ExecContext<MemNodeStore> {
    let world = WorldState::empty(Arc::new(MemNodeStore::new()));
    ExecContext::stateful(hash::blake2b(b"tx"), Vec::new(), world)
}

#[test]
fn test_contract_with_field_and_private_helper() {
    let contract = compile_contract(
        "TxContract Foo(x: U256) {
            pub fn add(a: U256) -> U256 { return square(x) + square(a) }
            fn square(n: U256) -> U256 { return n * n }
        }",
    )
    .unwrap();

    let addr = hash::blake2b(b"foo");
    let mut ctx = stateful();
    ctx.deploy_contract(addr, &contract, vec![u(1)], 0).unwrap();

    let mut vm = Vm::new(&mut ctx, GAS);
    let out = vm.execute_contract_method(addr, 0, vec![u(2)], None).unwrap();
    assert_eq!(out, vec![u(5)]);
}

#[test]
fn test_recursive_fibonacci_with_stable_gas() {
    let contract = compile_contract(
        "TxContract Fib() {
            pub fn fib(n: U256) -> U256 {
                if n < 2 { return n }
                return fib(n - 1) + fib(n - 2)
            }
        }",
    )
    .unwrap();

    let addr = hash::blake2b(b"fib");
    let mut gas_used = Vec::new();
    for _ in 0..2 {
        let mut ctx = stateful();
        ctx.deploy_contract(addr, &contract, vec![], 0).unwrap();
        let mut vm = Vm::new(&mut ctx, GAS);
        let out = vm
            .execute_contract_method(addr, 0, vec![u(10)], None)
            .unwrap();
        assert_eq!(out, vec![u(55)]);
        gas_used.push(vm.gas_used());
    }
    assert_eq!(gas_used[0], gas_used[1]);
}

#[test]
fn test_asset_script_signature_check() {
    let script = compile_asset_script(
        "AssetScript Unlock {
            pub fn unlock(pk: ByteVec) -> ByteVec {
                let hashed = blake2b!(pk)
                verifyTxSignature!(pk)
                return hashed
            }
        }",
    )
    .unwrap();
    let script = Arc::new(script);

    let (sk, pk) = crypto::generate_keypair();
    let tx_id = hash::blake2b(b"spending tx");
    let sig = crypto::sign(&tx_id, &sk);
    let pk_bytes = pk.serialize().to_vec();

    // Valid pre-pushed signature.
    let mut ctx = ExecContext::<MemNodeStore>::stateless(tx_id, vec![sig]);
    let mut vm = Vm::new(&mut ctx, GAS);
    let out = vm
        .execute_script(script.clone(), vec![Val::ByteVec(pk_bytes.clone())], None)
        .unwrap();
    assert_eq!(
        out,
        vec![Val::ByteVec(hash::blake2b(&pk_bytes).as_slice().to_vec())]
    );

    // Empty signature stack underflows.
    let mut ctx = ExecContext::<MemNodeStore>::stateless(tx_id, vec![]);
    let mut vm = Vm::new(&mut ctx, GAS);
    assert_eq!(
        vm.execute_script(script, vec![Val::ByteVec(pk_bytes)], None),
        Err(ExecError::StackUnderflow)
    );
}

#[test]
fn test_while_loops_and_array_reads() {
    let script = compile_tx_script(
        "TxScript Sum {
            pub fn main() -> U256 {
                let xs: [U256; 3] = [1, 2, 3]
                let i = 0
                let total = xs[0] + xs[1] + xs[2]
                while i < 2 {
                    i = i + 1
                }
                return total + i
            }
        }",
    )
    .unwrap();

    let mut ctx = ExecContext::<MemNodeStore>::stateless(hash::blake2b(b"t"), vec![]);
    let mut vm = Vm::new(&mut ctx, GAS);
    let out = vm.execute_script(Arc::new(script), vec![], None).unwrap();
    assert_eq!(out, vec![u(8)]);
}

#[test]
fn test_nested_arrays_flatten_and_copy() {
    let script = compile_tx_script(
        "TxScript Nested {
            pub fn main() -> U256 {
                let a: [[U256; 2]; 2] = [[1, 2], [3, 4]]
                let b = [0; 2]
                b = a[1]
                a[0][1] = 9
                return b[0] + b[1] + a[0][1]
            }
        }",
    )
    .unwrap();

    let mut ctx = ExecContext::<MemNodeStore>::stateless(hash::blake2b(b"t"), vec![]);
    let mut vm = Vm::new(&mut ctx, GAS);
    let out = vm.execute_script(Arc::new(script), vec![], None).unwrap();
    assert_eq!(out, vec![u(16)]);
}

#[test]
fn test_codegen_is_deterministic() {
    let src = "TxContract Foo(x: U256, ys: [U256; 4]) {
        event Bumped(amount: U256)
        pub fn bump(a: U256) -> U256 {
            emit Bumped(a)
            if a > x { return a } else { return x }
        }
    }";
    let a = compile_contract(src).unwrap().encode_to_vec();
    let b = compile_contract(src).unwrap().encode_to_vec();
    assert_eq!(a, b);
}

#[test]
fn test_emit_lowers_to_no_instructions() {
    let contract = compile_contract(
        "TxContract Foo() {
            event Pinged(value: U256)
            pub fn ping() -> () { emit Pinged(3) }
        }",
    )
    .unwrap();
    assert!(contract.methods[0].instrs.is_empty());
}

#[test]
fn test_unknown_event_rejected() {
    let err = compile_contract(
        "TxContract Foo() {
            pub fn ping() -> () { emit Missing(3) }
        }",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Type(..)));
}

#[test]
fn test_event_arity_checked() {
    let err = compile_contract(
        "TxContract Foo() {
            event Pinged(value: U256)
            pub fn ping() -> () { emit Pinged(3, 4) }
        }",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Type(..)));
}

#[test]
fn test_duplicate_function_rejected() {
    let err = compile_contract(
        "TxContract Foo() {
            pub fn f() -> () { }
            fn f() -> () { }
        }",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Duplicate(..)));
}

#[test]
fn test_tx_script_method_visibility() {
    assert!(matches!(
        compile_tx_script("TxScript S { fn main() -> () { } }").unwrap_err(),
        CompileError::Type(..)
    ));
    assert!(matches!(
        compile_tx_script(
            "TxScript S {
                pub fn main() -> () { }
                pub fn other() -> () { }
            }"
        )
        .unwrap_err(),
        CompileError::Type(..)
    ));
    // Contracts carry no such restriction.
    assert!(compile_contract(
        "TxContract C {
            pub fn a() -> () { }
            pub fn b() -> () { }
        }"
    )
    .is_ok());
}

#[test]
fn test_array_equality_is_a_compile_error() {
    let err = compile_tx_script(
        "TxScript S {
            pub fn main() -> Bool {
                let a = [1, 2]
                let b = [1, 2]
                return a == b
            }
        }",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Type(..)));
}

#[test]
fn test_dynamic_indexing_unsupported() {
    let err = compile_tx_script(
        "TxScript S {
            pub fn main() -> U256 {
                let a = [1, 2]
                let i = 1
                return a[i]
            }
        }",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedArrayOp(..)));
}

#[test]
fn test_branch_bodies_are_bounded() {
    let mut body = String::new();
    for _ in 0..130 {
        body.push_str("x = x + 1\n");
    }
    let src = format!(
        "TxScript S {{
            pub fn main() -> U256 {{
                let x = 0
                if true {{
                    {body}
                }}
                return x
            }}
        }}"
    );
    let err = compile_tx_script(&src).unwrap_err();
    match err {
        CompileError::OutOfRange(msg, _) => {
            assert_eq!(msg, "Too many instrs for branches");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_signed_arithmetic() {
    let script = compile_tx_script(
        "TxScript Signed {
            pub fn main() -> I256 {
                let a = 5i
                let b = -3i
                return a * b
            }
        }",
    )
    .unwrap();

    let mut ctx = ExecContext::<MemNodeStore>::stateless(hash::blake2b(b"t"), vec![]);
    let mut vm = Vm::new(&mut ctx, GAS);
    let out = vm.execute_script(Arc::new(script), vec![], None).unwrap();
    assert_eq!(out, vec![Val::I256(ethnum::I256::from(-15i8))]);
}
