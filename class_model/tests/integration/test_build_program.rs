use crate::utils::build_class;
use class_model::class_builder::ClassBuilder;
use class_model::instruction::Instruction::*;
use class_model::instruction::{FieldRef, MethodRef};
use class_model::method_descriptor::MethodAccessFlags;
use class_model::switch_table::BranchTable;

/// `static int pick(int k) { try { switch (k) { ... } } finally { Counter.hits++; } }`
#[test]
fn test_switch_inside_try_finally() {
    let hits = FieldRef::new("Picker", "hits", "I");
    let mut picker = ClassBuilder::new("Picker");
    picker
        .field(
            "hits",
            "I",
            class_model::field_descriptor::FieldAccessFlags::STATIC,
        )
        .unwrap()
        .method(
            "pick",
            "(I)I",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            |code| {
                let (start, end, handler) =
                    (code.fresh_label(), code.fresh_label(), code.fresh_label());
                let cases: Vec<_> = (0..4).map(|_| code.fresh_label()).collect();
                let default = code.fresh_label();
                let exit = code.fresh_label();

                code.place_label(start)?;
                code.push(Iload(0));
                code.push_switch(
                    &[(1, cases[0]), (2, cases[1]), (3, cases[2]), (4, cases[3])],
                    default,
                )?;
                for (value, label) in cases.iter().enumerate() {
                    code.place_label(*label)?;
                    code.push(Iconst(value as i32 * 10))
                        .push(Istore(1))
                        .push_branch(Goto, exit);
                }
                code.place_label(default)?;
                code.push(Iconst(-1)).push(Istore(1));
                code.place_label(exit)?;
                code.push(Getstatic(hits.clone()))
                    .push(Iconst(1))
                    .push(Iadd)
                    .push(Putstatic(hits.clone()))
                    .push(Iload(1));
                code.place_label(end)?;
                code.push(Ireturn);
                code.place_label(handler)?;
                code.push(Astore(2))
                    .push(Getstatic(hits.clone()))
                    .push(Iconst(1))
                    .push(Iadd)
                    .push(Putstatic(hits.clone()))
                    .push(Aload(2))
                    .push(Athrow);
                code.try_range(start, end, handler, None);
                Ok(())
            },
        )
        .unwrap();
    let picker = build_class(picker);

    let code = picker.method("pick", "(I)I").unwrap().code.as_ref().unwrap();
    assert_eq!(code.max_locals, 3);
    assert_eq!(code.exception_table.len(), 1);
    assert!(code.exception_table[0].is_catch_all());
    match &code.instructions[1] {
        Tableswitch(table) => {
            assert_eq!(table.dispatch(1), 2);
            assert_eq!(table.dispatch(4), 11);
            assert_eq!(table.dispatch(999), 14);
        }
        other => panic!("expected tableswitch, got {other:?}"),
    }
    for (index, instruction) in code.instructions.iter().enumerate() {
        if let Goto(target) = instruction {
            assert!(*target > index);
            assert_eq!(code.instructions[*target], Getstatic(hits.clone()));
        }
    }
    assert!(code.to_string().contains("Exception table"));
}

#[test]
fn test_subclass_constructor_chains_to_super() {
    let mut child = ClassBuilder::new("Child");
    child
        .extends("Parent")
        .implements("Marker")
        .default_constructor()
        .unwrap();
    let child = build_class(child);
    assert_eq!(child.interfaces, vec!["Marker".to_string()]);
    let constructor = child.method("<init>", "()V").unwrap();
    assert_eq!(
        constructor.code.as_ref().unwrap().instructions,
        vec![
            Aload(0),
            Invokespecial(MethodRef::new("Parent", "<init>", "()V")),
            Return
        ]
    );
    assert!(child.to_string().starts_with("class Child extends Parent implements Marker"));
}
