use crate::utils::{run_static, STATIC};
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassDescriptor;
use class_model::code_builder::CodeBuilder;
use class_model::field_descriptor::FieldAccessFlags;
use class_model::instruction::Instruction::*;
use class_model::instruction::{FieldRef, MethodRef};
use class_model::method_descriptor::MethodAccessFlags;
use class_model::program_error::Result;
use lite_vm::java_exception::RunError;
use lite_vm::jvm_exceptions::{ARITHMETIC_EXCEPTION, NULL_POINTER_EXCEPTION};
use lite_vm::jvm_values::Value;

const FLOW: &str = "exceptions/Flow";
const PRIVATE_STATIC: MethodAccessFlags = MethodAccessFlags::PRIVATE.union(MethodAccessFlags::STATIC);

fn trace() -> FieldRef {
    FieldRef::new(FLOW, "trace", "I")
}

fn append(code: &mut CodeBuilder, digit: i32) {
    code.push(Getstatic(trace()))
        .push(Iconst(10))
        .push(Imul)
        .push(Iconst(digit))
        .push(Iadd)
        .push(Putstatic(trace()));
}

fn throw_npe(code: &mut CodeBuilder) {
    code.push(AconstNull).push(Arraylength).push(Pop);
}

/// 每个方法体 `body` 都在带 `trace` 静态字段的类 `Flow` 中
fn flow_class<F>(methods: Vec<(&str, &str, F)>) -> ClassDescriptor
where
    F: FnOnce(&mut CodeBuilder) -> Result<()>,
{
    let mut class = ClassBuilder::new(FLOW);
    class
        .field(
            "trace",
            "I",
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
        )
        .unwrap();
    for (name, descriptor, body) in methods {
        let flags = if name == "run" { STATIC } else { PRIVATE_STATIC };
        class.method(name, descriptor, flags, body).unwrap();
    }
    class.build()
}

type Body = Box<dyn FnOnce(&mut CodeBuilder) -> Result<()>>;

fn run_flow(methods: Vec<(&str, &str, Body)>) -> std::result::Result<Option<Value>, RunError> {
    run_static(vec![flow_class(methods)], FLOW, "run", "()I")
}

#[test]
fn test_nested_handlers_innermost_first() {
    // try { try { npe } catch (NPE) { trace 1; throw npe } } catch (RuntimeException) { trace 2 }
    let run: Body = Box::new(|code| {
        let (outer_start, inner_start, inner_end, inner_handler, outer_end, outer_handler, done) = (
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
        );
        code.place_label(outer_start)?;
        code.place_label(inner_start)?;
        throw_npe(code);
        code.place_label(inner_end)?;
        code.push_branch(Goto, done);
        code.place_label(inner_handler)?;
        code.push(Pop);
        append(code, 1);
        throw_npe(code);
        code.place_label(outer_end)?;
        code.push_branch(Goto, done);
        code.place_label(outer_handler)?;
        code.push(Pop);
        append(code, 2);
        code.place_label(done)?;
        code.push(Getstatic(trace())).push(Ireturn);
        code.try_range(inner_start, inner_end, inner_handler, Some(NULL_POINTER_EXCEPTION))
            .try_range(outer_start, outer_end, outer_handler, Some("java/lang/RuntimeException"));
        Ok(())
    });
    assert_eq!(run_flow(vec![("run", "()I", run)]), Ok(Some(Value::Int(12))));
}

#[test]
fn test_unmatched_handler_propagates_to_caller() {
    let thrower: Body = Box::new(|code| {
        let (start, end, handler) = (code.fresh_label(), code.fresh_label(), code.fresh_label());
        code.place_label(start)?;
        code.push(Iconst(1)).push(Iconst(0)).push(Idiv).push(Ireturn);
        code.place_label(end)?;
        code.place_label(handler)?;
        code.push(Pop);
        append(code, 9);
        code.push(Iconst(-1)).push(Ireturn);
        code.try_range(start, end, handler, Some(NULL_POINTER_EXCEPTION));
        Ok(())
    });
    let run: Body = Box::new(|code| {
        let (start, end, handler) = (code.fresh_label(), code.fresh_label(), code.fresh_label());
        code.place_label(start)?;
        code.push(Invokestatic(MethodRef::new(FLOW, "divide", "()I")))
            .push(Ireturn);
        code.place_label(end)?;
        code.place_label(handler)?;
        code.push(Pop);
        append(code, 3);
        code.push(Getstatic(trace())).push(Ireturn);
        code.try_range(start, end, handler, Some(ARITHMETIC_EXCEPTION));
        Ok(())
    });
    assert_eq!(
        run_flow(vec![("divide", "()I", thrower), ("run", "()I", run)]),
        Ok(Some(Value::Int(3)))
    );
}

#[test]
fn test_operand_stack_cleared_before_handler() {
    let run: Body = Box::new(|code| {
        let (start, end, handler) = (code.fresh_label(), code.fresh_label(), code.fresh_label());
        code.push(Iconst(7)).push(Iconst(8));
        code.place_label(start)?;
        throw_npe(code);
        code.place_label(end)?;
        code.push(Iadd).push(Ireturn);
        code.place_label(handler)?;
        // 只剩异常对象
        code.push(Pop).push(Iconst(5)).push(Ireturn);
        code.try_range(start, end, handler, None);
        Ok(())
    });
    assert_eq!(run_flow(vec![("run", "()I", run)]), Ok(Some(Value::Int(5))));
}

#[test]
fn test_rethrown_exception_keeps_identity() {
    // catch (Throwable t) { trace 4; throw t; }，调用者比较两次收到的引用
    let rethrow: Body = Box::new(|code| {
        let (start, end, handler) = (code.fresh_label(), code.fresh_label(), code.fresh_label());
        code.place_label(start)?;
        code.push(Aload(0)).push(Athrow);
        code.place_label(end)?;
        code.place_label(handler)?;
        code.push(Astore(1));
        append(code, 4);
        code.push(Aload(1)).push(Athrow);
        code.try_range(start, end, handler, Some("java/lang/Throwable"));
        Ok(())
    });
    let run: Body = Box::new(|code| {
        let (start, end, handler, same) = (
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
            code.fresh_label(),
        );
        code.push(New("java/lang/RuntimeException".to_string()))
            .push(Dup)
            .push(Invokespecial(MethodRef::new(
                "java/lang/RuntimeException",
                "<init>",
                "()V",
            )))
            .push(Astore(0));
        code.place_label(start)?;
        code.push(Aload(0))
            .push(Invokestatic(MethodRef::new(FLOW, "rethrow", "(Ljava/lang/Throwable;)V")));
        code.place_label(end)?;
        code.push(Iconst(0)).push(Ireturn);
        code.place_label(handler)?;
        code.push(Aload(0)).push_branch(IfAcmpeq, same);
        code.push(Iconst(-1)).push(Ireturn);
        code.place_label(same)?;
        code.push(Getstatic(trace())).push(Ireturn);
        code.try_range(start, end, handler, None);
        Ok(())
    });
    assert_eq!(
        run_flow(vec![
            ("rethrow", "(Ljava/lang/Throwable;)V", rethrow),
            ("run", "()I", run)
        ]),
        Ok(Some(Value::Int(4)))
    );
}
