use crate::utils::{uncaught_class, with_vm, STATIC};
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassDescriptor;
use class_model::instruction::Instruction::*;
use class_model::instruction::MethodRef;
use class_model::type_descriptor::PrimitiveType;
use lite_vm::java_exception::RunError;
use lite_vm::jvm_exceptions::{OUT_OF_MEMORY_ERROR, STACK_OVERFLOW_ERROR};
use lite_vm::jvm_values::Value;
use lite_vm::virtual_machine::VmConfig;

const LIMITS: &str = "limits/Limits";

fn limits_class() -> ClassDescriptor {
    let mut class = ClassBuilder::new(LIMITS);
    class
        .method("recurse", "(I)I", STATIC, |code| {
            code.push(Iload(0))
                .push(Iconst(1))
                .push(Iadd)
                .push(Invokestatic(MethodRef::new(LIMITS, "recurse", "(I)I")))
                .push(Ireturn);
            Ok(())
        })
        .unwrap()
        // 捕获 StackOverflowError 后返回当时的深度
        .method("depth", "(I)I", STATIC, |code| {
            let (start, end, handler) = (code.fresh_label(), code.fresh_label(), code.fresh_label());
            code.place_label(start)?;
            code.push(Iload(0))
                .push(Iconst(1))
                .push(Iadd)
                .push(Invokestatic(MethodRef::new(LIMITS, "depth", "(I)I")))
                .push(Ireturn);
            code.place_label(end)?;
            code.place_label(handler)?;
            code.push(Pop).push(Iload(0)).push(Ireturn);
            code.try_range(start, end, handler, Some(STACK_OVERFLOW_ERROR));
            Ok(())
        })
        .unwrap()
        // n > 0 时返回 n + countDown(n - 1)
        .method("countDown", "(I)I", STATIC, |code| {
            let done = code.fresh_label();
            code.push(Iload(0))
                .push_branch(Ifle, done)
                .push(Iload(0))
                .push(Iload(0))
                .push(Iconst(1))
                .push(Isub)
                .push(Invokestatic(MethodRef::new(LIMITS, "countDown", "(I)I")))
                .push(Iadd)
                .push(Ireturn);
            code.place_label(done)?;
            code.push(Iconst(0)).push(Ireturn);
            Ok(())
        })
        .unwrap()
        .method("allocate", "()V", STATIC, |code| {
            let again = code.fresh_label();
            code.place_label(again)?;
            code.push(Iconst(16))
                .push(Newarray(PrimitiveType::Long))
                .push(Pop)
                .push_branch(Goto, again);
            Ok(())
        })
        .unwrap();
    class.build()
}

#[test]
fn test_stack_overflow_is_thrown() {
    let config = VmConfig {
        max_call_depth: 100,
        ..VmConfig::default()
    };
    with_vm(vec![limits_class()], config, |vm| {
        let result = vm.run_static(LIMITS, "recurse", "(I)I", vec![Value::Int(0)]);
        match result {
            Err(RunError::Uncaught(uncaught)) => {
                assert_eq!(uncaught.class_name, STACK_OVERFLOW_ERROR);
                assert_eq!(uncaught.stack_trace.len(), 100);
                assert!(uncaught
                    .stack_trace
                    .iter()
                    .all(|element| element.method_name == "recurse" && element.pc == Some(3)));
            }
            other => panic!("expected StackOverflowError, got {:?}", other),
        }
        assert_eq!(vm.call_depth(), 0);
    });
}

#[test]
fn test_default_call_depth_overflows_into_exception() {
    with_vm(vec![limits_class()], VmConfig::default(), |vm| {
        let result = vm.run_static(LIMITS, "recurse", "(I)I", vec![Value::Int(0)]);
        match result {
            Err(RunError::Uncaught(uncaught)) => {
                assert_eq!(uncaught.class_name, STACK_OVERFLOW_ERROR);
                assert_eq!(uncaught.stack_trace.len(), VmConfig::default().max_call_depth);
                assert_eq!(uncaught.stack_trace.len(), 1024);
            }
            other => panic!("expected StackOverflowError, got {:?}", other),
        }
        assert_eq!(vm.call_depth(), 0);
    });
}

#[test]
fn test_deep_recursion_returns_normally() {
    let result = with_vm(vec![limits_class()], VmConfig::default(), |vm| {
        vm.run_static(LIMITS, "countDown", "(I)I", vec![Value::Int(1000)])
    });
    assert_eq!(result, Ok(Some(Value::Int(500500))));
}

#[test]
fn test_stack_overflow_is_catchable() {
    let config = VmConfig {
        max_call_depth: 50,
        ..VmConfig::default()
    };
    let result = with_vm(vec![limits_class()], config, |vm| {
        vm.run_static(LIMITS, "depth", "(I)I", vec![Value::Int(1)])
    });
    assert_eq!(result, Ok(Some(Value::Int(50))));
}

#[test]
fn test_heap_capacity_is_enforced() {
    let config = VmConfig {
        heap_capacity: 32,
        ..VmConfig::default()
    };
    with_vm(vec![limits_class()], config, |vm| {
        let result = vm.run_static(LIMITS, "allocate", "()V", Vec::new());
        assert_eq!(uncaught_class(result), OUT_OF_MEMORY_ERROR);
        assert_eq!(vm.heap().len(), 33);
    });
}
