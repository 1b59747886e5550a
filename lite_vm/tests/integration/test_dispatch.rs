use crate::utils::{run_static, uncaught_class, STATIC};
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::{ClassAccessFlags, ClassDescriptor};
use class_model::code_builder::CodeBuilder;
use class_model::instruction::Instruction::*;
use class_model::instruction::MethodRef;
use class_model::method_descriptor::MethodAccessFlags;
use lite_vm::jvm_exceptions::{
    ABSTRACT_METHOD_ERROR, INCOMPATIBLE_CLASS_CHANGE_ERROR, INSTANTIATION_ERROR,
    NO_CLASS_DEF_FOUND_ERROR, NO_SUCH_METHOD_ERROR,
};
use lite_vm::jvm_values::Value;

const SHAPE: &str = "dispatch/Shape";
const SQUARE: &str = "dispatch/Square";
const TRIANGLE: &str = "dispatch/Triangle";
const BLOB: &str = "dispatch/Blob";
const SIDED: &str = "dispatch/Sided";
const MAIN: &str = "dispatch/Main";

fn construct(code: &mut CodeBuilder, class_name: &str) {
    code.push(New(class_name.to_string()))
        .push(Dup)
        .push(Invokespecial(MethodRef::new(class_name, "<init>", "()V")));
}

/// abstract class Shape { abstract int sides(); int describe() { return sides() * 10; } }
/// class Square extends Shape implements Sided { int sides() { return 4; } }
/// class Triangle extends Shape implements Sided { int sides() { return 3; } }
/// class Blob extends Shape {}
fn hierarchy() -> Vec<ClassDescriptor> {
    let mut sided = ClassBuilder::interface(SIDED);
    sided.abstract_method("sides", "()I").unwrap();

    let mut shape = ClassBuilder::new(SHAPE);
    shape
        .access_flags(ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT)
        .default_constructor()
        .unwrap()
        .abstract_method("sides", "()I")
        .unwrap()
        .method("describe", "()I", MethodAccessFlags::PUBLIC, |code| {
            code.push(Aload(0))
                .push(Invokevirtual(MethodRef::new(SHAPE, "sides", "()I")))
                .push(Iconst(10))
                .push(Imul)
                .push(Ireturn);
            Ok(())
        })
        .unwrap();

    let mut square = ClassBuilder::new(SQUARE);
    square
        .extends(SHAPE)
        .implements(SIDED)
        .default_constructor()
        .unwrap()
        .method("sides", "()I", MethodAccessFlags::PUBLIC, |code| {
            code.push(Iconst(4)).push(Ireturn);
            Ok(())
        })
        .unwrap();

    let mut triangle = ClassBuilder::new(TRIANGLE);
    triangle
        .extends(SHAPE)
        .implements(SIDED)
        .default_constructor()
        .unwrap()
        .method("sides", "()I", MethodAccessFlags::PUBLIC, |code| {
            code.push(Iconst(3)).push(Ireturn);
            Ok(())
        })
        .unwrap();

    let mut blob = ClassBuilder::new(BLOB);
    blob.extends(SHAPE).default_constructor().unwrap();

    vec![
        sided.build(),
        shape.build(),
        square.build(),
        triangle.build(),
        blob.build(),
    ]
}

fn run_main<F>(body: F) -> Result<Option<Value>, lite_vm::java_exception::RunError>
where
    F: FnOnce(&mut CodeBuilder),
{
    let mut main = ClassBuilder::new(MAIN);
    main.method("run", "()I", STATIC, |code| {
        body(code);
        Ok(())
    })
    .unwrap()
    // 同一个调用点，每次执行的接收者类型可能不同
    .method("describe", "(Ldispatch/Shape;)I", STATIC, |code| {
        code.push(Aload(0))
            .push(Invokevirtual(MethodRef::new(SHAPE, "describe", "()I")))
            .push(Ireturn);
        Ok(())
    })
    .unwrap()
    .method("sides", "(Ldispatch/Sided;)I", STATIC, |code| {
        code.push(Aload(0))
            .push(Invokeinterface(MethodRef::new(SIDED, "sides", "()I")))
            .push(Ireturn);
        Ok(())
    })
    .unwrap()
    // 返回捕获到的 NoSuchMethodError 个数
    .method("missingTwice", "()I", STATIC, |code| {
        code.push(Iconst(0)).push(Istore(0));
        for _ in 0..2 {
            let (start, end, handler, next) = (
                code.fresh_label(),
                code.fresh_label(),
                code.fresh_label(),
                code.fresh_label(),
            );
            code.place_label(start)?;
            code.push(Invokestatic(MethodRef::new(MAIN, "absent", "()V")));
            code.place_label(end)?;
            code.push_branch(Goto, next);
            code.place_label(handler)?;
            code.push(Pop).push(Iinc(0, 1));
            code.place_label(next)?;
            code.try_range(start, end, handler, Some(NO_SUCH_METHOD_ERROR));
        }
        code.push(Iload(0)).push(Ireturn);
        Ok(())
    })
    .unwrap();
    let mut classes = hierarchy();
    classes.push(main.build());
    run_static(classes, MAIN, "run", "()I")
}

#[test]
fn test_virtual_call_selects_override() {
    let result = run_main(|code| {
        construct(code, SQUARE);
        code.push(Invokevirtual(MethodRef::new(SHAPE, "describe", "()I")))
            .push(Ireturn);
    });
    assert_eq!(result, Ok(Some(Value::Int(40))));
}

#[test]
fn test_interface_call_selects_implementation() {
    let result = run_main(|code| {
        construct(code, SQUARE);
        code.push(Invokeinterface(MethodRef::new(SIDED, "sides", "()I")))
            .push(Ireturn);
    });
    assert_eq!(result, Ok(Some(Value::Int(4))));
}

#[test]
fn test_unimplemented_abstract_method() {
    let result = run_main(|code| {
        construct(code, BLOB);
        code.push(Invokevirtual(MethodRef::new(SHAPE, "describe", "()I")))
            .push(Ireturn);
    });
    assert_eq!(uncaught_class(result), ABSTRACT_METHOD_ERROR);
}

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    let result = run_main(|code| {
        construct(code, SHAPE);
        code.push(Pop).push(Iconst(0)).push(Ireturn);
    });
    assert_eq!(uncaught_class(result), INSTANTIATION_ERROR);
}

#[test]
fn test_interface_call_on_non_implementor() {
    let result = run_main(|code| {
        construct(code, BLOB);
        code.push(Invokeinterface(MethodRef::new(SIDED, "sides", "()I")))
            .push(Ireturn);
    });
    assert_eq!(uncaught_class(result), INCOMPATIBLE_CLASS_CHANGE_ERROR);
}

#[test]
fn test_static_call_to_instance_method() {
    let result = run_main(|code| {
        code.push(Invokestatic(MethodRef::new(SQUARE, "sides", "()I")))
            .push(Ireturn);
    });
    assert_eq!(uncaught_class(result), INCOMPATIBLE_CLASS_CHANGE_ERROR);
}

#[test]
fn test_unresolved_symbols() {
    let result = run_main(|code| {
        construct(code, SQUARE);
        code.push(Invokevirtual(MethodRef::new(SQUARE, "corners", "()I")))
            .push(Ireturn);
    });
    assert_eq!(uncaught_class(result), NO_SUCH_METHOD_ERROR);

    let result = run_main(|code| {
        construct(code, "dispatch/Circle");
        code.push(Pop).push(Iconst(0)).push(Ireturn);
    });
    assert_eq!(uncaught_class(result), NO_CLASS_DEF_FOUND_ERROR);
}

#[test]
fn test_call_site_dispatches_on_each_receiver() {
    let result = run_main(|code| {
        for class_name in [SQUARE, TRIANGLE, SQUARE] {
            construct(code, class_name);
            code.push(Invokestatic(MethodRef::new(MAIN, "describe", "(Ldispatch/Shape;)I")));
        }
        code.push(Iadd).push(Iadd).push(Ireturn);
    });
    assert_eq!(result, Ok(Some(Value::Int(110))));

    let result = run_main(|code| {
        for class_name in [TRIANGLE, SQUARE] {
            construct(code, class_name);
            code.push(Invokestatic(MethodRef::new(MAIN, "sides", "(Ldispatch/Sided;)I")));
        }
        code.push(Imul).push(Ireturn);
    });
    assert_eq!(result, Ok(Some(Value::Int(12))));
}

#[test]
fn test_failed_resolution_is_retried() {
    let result = run_main(|code| {
        code.push(Invokestatic(MethodRef::new(MAIN, "missingTwice", "()I")))
            .push(Invokestatic(MethodRef::new(MAIN, "missingTwice", "()I")))
            .push(Iadd)
            .push(Ireturn);
    });
    assert_eq!(result, Ok(Some(Value::Int(4))));
}

#[test]
fn test_invocation_kind_must_match_class_kind() {
    let result = run_main(|code| {
        construct(code, SQUARE);
        code.push(Invokevirtual(MethodRef::new(SIDED, "sides", "()I")))
            .push(Ireturn);
    });
    assert_eq!(uncaught_class(result), INCOMPATIBLE_CLASS_CHANGE_ERROR);

    let result = run_main(|code| {
        construct(code, SQUARE);
        code.push(Invokeinterface(MethodRef::new(SQUARE, "sides", "()I")))
            .push(Ireturn);
    });
    assert_eq!(uncaught_class(result), INCOMPATIBLE_CLASS_CHANGE_ERROR);
}
