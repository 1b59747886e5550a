use crate::utils::{uncaught_class, with_vm, STATIC};
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassDescriptor;
use class_model::instruction::Instruction::*;
use class_model::instruction::MethodRef;
use lite_vm::java_exception::{InvokeMethodResult, RunError};
use lite_vm::jvm_error::VmError;
use lite_vm::jvm_exceptions::{ARITHMETIC_EXCEPTION, UNSATISFIED_LINK_ERROR};
use lite_vm::jvm_values::Value;
use lite_vm::virtual_machine::{VirtualMachine, VmConfig};

const MATH: &str = "natives/Math";

fn math_class() -> ClassDescriptor {
    let mut class = ClassBuilder::new(MATH);
    class
        .native_method("gcd", "(II)I", STATIC)
        .unwrap()
        .native_method("wide", "(JI)J", STATIC)
        .unwrap()
        .native_method("missing", "()V", STATIC)
        .unwrap()
        .method("callGcd", "()I", STATIC, |code| {
            code.push(Iconst(84))
                .push(Iconst(36))
                .push(Invokestatic(MethodRef::new(MATH, "gcd", "(II)I")))
                .push(Ireturn);
            Ok(())
        })
        .unwrap()
        .method("callWide", "()J", STATIC, |code| {
            code.push(Lconst(1 << 40))
                .push(Iconst(3))
                .push(Invokestatic(MethodRef::new(MATH, "wide", "(JI)J")))
                .push(Lreturn);
            Ok(())
        })
        .unwrap()
        .method("hash", "()I", STATIC, |code| {
            code.push(New(MATH.to_string()))
                .push(Invokevirtual(MethodRef::new(
                    "java/lang/Object",
                    "hashCode",
                    "()I",
                )))
                .push(Ireturn);
            Ok(())
        })
        .unwrap();
    class.build()
}

fn gcd(vm: &mut VirtualMachine, args: &[Value]) -> InvokeMethodResult {
    match args {
        [Value::Int(0), Value::Int(0)] => {
            Err(vm.throw_new(ARITHMETIC_EXCEPTION, Some("gcd(0, 0)".to_string())))
        }
        [Value::Int(a), Value::Int(b)] => {
            let (mut a, mut b) = (a.abs(), b.abs());
            while b != 0 {
                (a, b) = (b, a % b);
            }
            Ok(Some(Value::Int(a)))
        }
        _ => Err(VmError::ValueTypeMismatch.into()),
    }
}

fn wide(_vm: &mut VirtualMachine, args: &[Value]) -> InvokeMethodResult {
    match args {
        [Value::Long(value), Value::Int(shift)] => Ok(Some(Value::Long(value << shift))),
        _ => Err(VmError::ValueTypeMismatch.into()),
    }
}

/// 声明返回 int 却什么都不返回
fn ill_typed(_vm: &mut VirtualMachine, _args: &[Value]) -> InvokeMethodResult {
    Ok(None)
}

fn with_math<F, R>(f: F) -> R
where
    F: for<'a> FnOnce(&mut VirtualMachine<'a>) -> R,
{
    with_vm(vec![math_class()], VmConfig::default(), |vm| {
        vm.registry_native_method(MATH, "gcd", "(II)I", gcd);
        vm.registry_native_method(MATH, "wide", "(JI)J", wide);
        f(vm)
    })
}

#[test]
fn test_native_called_from_bytecode() {
    with_math(|vm| {
        assert_eq!(
            vm.run_static(MATH, "callGcd", "()I", Vec::new()),
            Ok(Some(Value::Int(12)))
        );
        assert_eq!(
            vm.run_static(MATH, "callWide", "()J", Vec::new()),
            Ok(Some(Value::Long(1 << 43)))
        );
    });
}

#[test]
fn test_native_exception_carries_native_frame() {
    with_math(|vm| {
        match vm.run_static(MATH, "gcd", "(II)I", vec![Value::Int(0), Value::Int(0)]) {
            Err(RunError::Uncaught(uncaught)) => {
                assert_eq!(uncaught.class_name, ARITHMETIC_EXCEPTION);
                assert_eq!(uncaught.message.as_deref(), Some("gcd(0, 0)"));
                assert_eq!(uncaught.stack_trace.len(), 1);
                assert_eq!(uncaught.stack_trace[0].pc, None);
            }
            other => panic!("expected ArithmeticException, got {:?}", other),
        }
    });
}

#[test]
fn test_unregistered_native() {
    with_math(|vm| {
        let result = vm.run_static(MATH, "missing", "()V", Vec::new());
        assert_eq!(uncaught_class(result), UNSATISFIED_LINK_ERROR);
    });
}

#[test]
fn test_native_results_are_type_checked() {
    with_math(|vm| {
        vm.registry_native_method(MATH, "gcd", "(II)I", ill_typed);
        assert_eq!(
            vm.run_static(MATH, "gcd", "(II)I", vec![Value::Int(1), Value::Int(2)]),
            Err(RunError::Internal(VmError::ValueTypeMismatch))
        );
    });
}

#[test]
fn test_object_hash_code_is_builtin() {
    with_math(|vm| {
        let first = vm.run_static(MATH, "hash", "()I", Vec::new());
        let second = vm.run_static(MATH, "hash", "()I", Vec::new());
        assert!(matches!(first, Ok(Some(Value::Int(_)))));
        assert_ne!(first, second);
    });
}
