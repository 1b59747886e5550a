use crate::utils::{uncaught_class, with_vm, STATIC};
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassDescriptor;
use class_model::code_builder::CodeBuilder;
use class_model::field_descriptor::FieldAccessFlags;
use class_model::instruction::Instruction::*;
use class_model::instruction::{FieldRef, MethodRef};
use class_model::method_descriptor::MethodAccessFlags;
use lite_vm::java_exception::RunError;
use lite_vm::jvm_exceptions::NO_CLASS_DEF_FOUND_ERROR;
use lite_vm::jvm_values::Value;
use lite_vm::virtual_machine::VmConfig;

const LOG: &str = "init/Log";
const STATIC_FIELD: FieldAccessFlags = FieldAccessFlags::PUBLIC.union(FieldAccessFlags::STATIC);

/// `Log.order = Log.order * 10 + digit`
fn record(code: &mut CodeBuilder, digit: i32) {
    let order = FieldRef::new(LOG, "order", "I");
    code.push(Getstatic(order.clone()))
        .push(Iconst(10))
        .push(Imul)
        .push(Iconst(digit))
        .push(Iadd)
        .push(Putstatic(order));
}

fn log_class() -> ClassDescriptor {
    let mut log = ClassBuilder::new(LOG);
    log.field("order", "I", STATIC_FIELD).unwrap();
    log.build()
}

fn recording_class(name: &str, digit: i32) -> ClassBuilder {
    let mut class = ClassBuilder::new(name);
    class
        .field("marker", "I", STATIC_FIELD)
        .unwrap()
        .method("<clinit>", "()V", MethodAccessFlags::STATIC, |code| {
            record(code, digit);
            code.push(Return);
            Ok(())
        })
        .unwrap();
    class
}

fn log_order(classes: Vec<ClassDescriptor>, trigger: &str) -> Value {
    with_vm(classes, VmConfig::default(), |vm| {
        vm.get_static_by_name(trigger, "marker").unwrap();
        vm.get_static_by_name(LOG, "order").unwrap()
    })
}

#[test]
fn test_super_class_initialized_first() {
    let parent = recording_class("init/Parent", 1);
    let mut child = recording_class("init/Child", 2);
    child.extends("init/Parent");
    let classes = vec![log_class(), parent.build(), child.build()];
    assert_eq!(log_order(classes, "init/Child"), Value::Int(12));
}

#[test]
fn test_interfaces_not_initialized_by_implementor() {
    let mut interface = ClassBuilder::interface("init/Marked");
    interface
        .method("<clinit>", "()V", MethodAccessFlags::STATIC, |code| {
            record(code, 9);
            code.push(Return);
            Ok(())
        })
        .unwrap();
    let mut class = recording_class("init/Implementor", 3);
    class.implements("init/Marked");
    let classes = vec![log_class(), interface.build(), class.build()];
    assert_eq!(log_order(classes, "init/Implementor"), Value::Int(3));
}

#[test]
fn test_failed_initializer_marks_class_erroneous() {
    let mut broken = ClassBuilder::new("init/Broken");
    broken
        .method("<clinit>", "()V", MethodAccessFlags::STATIC, |code| {
            code.push(New("java/lang/RuntimeException".to_string()))
                .push(Dup)
                .push(Invokespecial(MethodRef::new(
                    "java/lang/RuntimeException",
                    "<init>",
                    "()V",
                )))
                .push(Athrow);
            Ok(())
        })
        .unwrap()
        .method("get", "()I", STATIC, |code| {
            code.push(Iconst(1)).push(Ireturn);
            Ok(())
        })
        .unwrap();
    with_vm(vec![broken.build()], VmConfig::default(), |vm| {
        // 第一次使用抛出 <clinit> 中的异常
        let first = vm.run_static("init/Broken", "get", "()I", Vec::new());
        assert_eq!(uncaught_class(first), "java/lang/RuntimeException");
        match vm.run_static("init/Broken", "get", "()I", Vec::new()) {
            Err(RunError::Uncaught(uncaught)) => {
                assert_eq!(uncaught.class_name, NO_CLASS_DEF_FOUND_ERROR);
                assert_eq!(
                    uncaught.message.as_deref(),
                    Some("Could not initialize class init/Broken")
                );
            }
            other => panic!("expected NoClassDefFoundError, got {:?}", other),
        }
    });
}

#[test]
fn test_initializer_exception_propagates_to_first_user() {
    let mut broken = ClassBuilder::new("init/Throwing");
    broken
        .field("value", "I", STATIC_FIELD)
        .unwrap()
        .method("<clinit>", "()V", MethodAccessFlags::STATIC, |code| {
            code.push(Iconst(1)).push(Iconst(0)).push(Idiv).push(Pop).push(Return);
            Ok(())
        })
        .unwrap();
    let mut user = ClassBuilder::new("init/User");
    user.method("read", "()I", STATIC, |code| {
        code.push(Getstatic(FieldRef::new("init/Throwing", "value", "I")))
            .push(Ireturn);
        Ok(())
    })
    .unwrap()
    .method("readTwice", "()I", STATIC, |code| {
        // 第一次的 ArithmeticException 被吞掉，第二次读取得到 NoClassDefFoundError
        let (start, end, handler) = (code.fresh_label(), code.fresh_label(), code.fresh_label());
        code.place_label(start)?;
        code.push(Invokestatic(MethodRef::new("init/User", "read", "()I")))
            .push(Pop);
        code.place_label(end)?;
        code.push(Iconst(0)).push(Ireturn);
        code.place_label(handler)?;
        code.push(Pop)
            .push(Invokestatic(MethodRef::new("init/User", "read", "()I")))
            .push(Ireturn);
        code.try_range(start, end, handler, Some("java/lang/ArithmeticException"));
        Ok(())
    })
    .unwrap();
    let classes = vec![broken.build(), user.build()];
    with_vm(classes, VmConfig::default(), |vm| {
        let result = vm.run_static("init/User", "readTwice", "()I", Vec::new());
        assert_eq!(uncaught_class(result), NO_CLASS_DEF_FOUND_ERROR);
    });
}
