use crate::utils::build_class;
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassAccessFlags;
use class_model::constant::Constant;
use class_model::field_descriptor::FieldAccessFlags;
use class_model::instruction::Instruction::*;
use class_model::instruction::{FieldRef, MethodRef};
use class_model::method_descriptor::MethodAccessFlags;
use class_model::program_error::ProgramError;

/// ```java
/// public class Counter {
///     public static final int LIMIT = 3;
///     private int count;
///     public int bump() {
///         switch (count) {
///             case 0: case 1: case 2: return ++count;
///             default: return count;
///         }
///     }
/// }
/// ```
#[test]
fn test_build_counter() {
    let mut builder = ClassBuilder::new("Counter");
    builder
        .constant_field("LIMIT", "I", Constant::Int(3))
        .unwrap()
        .field("count", "I", FieldAccessFlags::PRIVATE)
        .unwrap()
        .default_constructor()
        .unwrap()
        .method("bump", "()I", MethodAccessFlags::PUBLIC, |code| {
            let count = FieldRef::new("Counter", "count", "I");
            let (increment, unchanged) = (code.fresh_label(), code.fresh_label());
            code.push(Aload(0)).push(Getfield(count.clone()));
            code.push_switch(&[(0, increment), (1, increment), (2, increment)], unchanged)?;
            code.place_label(increment)?;
            code.push(Aload(0))
                .push(Dup)
                .push(Getfield(count.clone()))
                .push(Iconst(1))
                .push(Iadd)
                .push(Putfield(count.clone()));
            code.place_label(unchanged)?;
            code.push(Aload(0)).push(Getfield(count)).push(Ireturn);
            Ok(())
        })
        .unwrap();
    let class = build_class(builder);

    assert_eq!(
        class.access_flags,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER
    );
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
    let names: Vec<&str> = class.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["LIMIT", "count"]);
    assert!(class.field("LIMIT").unwrap().is_static());

    let bump = class.method("bump", "()I").unwrap();
    let code = bump.code.as_ref().unwrap();
    assert_eq!(code.max_locals, 1);
    match &code.instructions[2] {
        Tableswitch(table) => {
            assert_eq!((table.low, table.high), (0, 2));
            assert_eq!(table.targets, vec![3, 3, 3]);
            assert_eq!(table.default, 9);
        }
        other => panic!("expected a tableswitch, got {:?}", other),
    }
    assert!(class.to_string().starts_with("class Counter extends java/lang/Object\n"));
}

#[test]
fn test_interface_members() {
    let mut builder = ClassBuilder::interface("Shape");
    builder.abstract_method("area", "()D").unwrap();
    let class = build_class(builder);
    assert!(class.is_interface());
    let area = class.method("area", "()D").unwrap();
    assert!(area.is_abstract());
    assert!(area.code.is_none());
}

#[test]
fn test_invalid_members_are_rejected() {
    let mut builder = ClassBuilder::new("Broken");
    builder.field("x", "I", FieldAccessFlags::PUBLIC).unwrap();
    assert!(matches!(
        builder.field("x", "J", FieldAccessFlags::PUBLIC),
        Err(ProgramError::DuplicateMember(_))
    ));
    assert!(matches!(
        builder.field("y", "Q", FieldAccessFlags::PUBLIC),
        Err(ProgramError::InvalidDescriptor(_))
    ));
    assert!(matches!(
        builder.method("run", "(I", MethodAccessFlags::STATIC, |code| {
            code.push(Return);
            Ok(())
        }),
        Err(ProgramError::InvalidDescriptor(_))
    ));
    let result = builder.method("jump", "()V", MethodAccessFlags::STATIC, |code| {
        let nowhere = code.fresh_label();
        code.push(Invokestatic(MethodRef::new("Broken", "jump", "()V")))
            .push_branch(Goto, nowhere);
        Ok(())
    });
    assert!(matches!(result, Err(ProgramError::UnboundLabel(_))));
}
