//! 手工降级源码时反复出现的指令片段

use crate::assertion::{
    assert_equals, ASSERT_BOOLEANS, ASSERT_DOUBLES, ASSERT_FLOATS, ASSERT_INTS, ASSERT_LONGS,
    ASSERT_OBJECTS,
};
use class_model::code_builder::CodeBuilder;
use class_model::instruction::Instruction::*;
use class_model::instruction::{FieldRef, MethodRef};
use class_model::method_descriptor::MethodAccessFlags;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
pub const JAVA_LANG_EXCEPTION: &str = "java/lang/Exception";
pub const JAVA_LANG_RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";

/// `public static` 测试入口
pub const TEST_ENTRY: MethodAccessFlags = MethodAccessFlags::PUBLIC.union(MethodAccessFlags::STATIC);

/// `new C()`：new、dup、invokespecial `<init>()V`，对象留在栈顶
pub fn construct(code: &mut CodeBuilder, class_name: &str) {
    code.push(New(class_name.to_string()))
        .push(Dup)
        .push(Invokespecial(MethodRef::new(class_name, "<init>", "()V")));
}

/// `throw new C()`
pub fn throw_new(code: &mut CodeBuilder, class_name: &str) {
    construct(code, class_name);
    code.push(Athrow);
}

/// `C.field += delta`（int 静态字段）
pub fn add_to_static(code: &mut CodeBuilder, field: &FieldRef, delta: i32) {
    code.push(Getstatic(field.clone()))
        .push(Iconst(delta))
        .push(Iadd)
        .push(Putstatic(field.clone()));
}

/// 源码中的字面量，以及与它配对的 `assertEquals` 重载
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
}

impl Literal {
    pub fn push(&self, code: &mut CodeBuilder) {
        match *self {
            Literal::Boolean(b) => code.push(Iconst(i32::from(b))),
            Literal::Int(i) => code.push(Iconst(i)),
            Literal::Long(l) => code.push(Lconst(l)),
            Literal::Float(f) => code.push(Fconst(f)),
            Literal::Double(d) => code.push(Dconst(d)),
            Literal::Null => code.push(AconstNull),
        };
    }

    pub fn assertion(&self) -> &'static str {
        match self {
            Literal::Boolean(_) => ASSERT_BOOLEANS,
            Literal::Int(_) => ASSERT_INTS,
            Literal::Long(_) => ASSERT_LONGS,
            Literal::Float(_) => ASSERT_FLOATS,
            Literal::Double(_) => ASSERT_DOUBLES,
            Literal::Null => ASSERT_OBJECTS,
        }
    }

    /// 实际值已在栈顶：压入期望值并断言相等
    pub fn assert_top_equals(&self, code: &mut CodeBuilder) {
        self.push(code);
        code.push(assert_equals(self.assertion()));
    }
}

/// 字段声明中的初始化表达式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Initializer {
    Literal(Literal),
    NewObject,
}

/// 字段声明：`type name [= initializer];`
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub descriptor: &'static str,
    pub initializer: Option<Initializer>,
}

impl FieldSpec {
    pub fn new(name: String, descriptor: &'static str, initializer: Option<Initializer>) -> Self {
        FieldSpec {
            name,
            descriptor,
            initializer,
        }
    }

    pub fn field_ref(&self, owner: &str) -> FieldRef {
        FieldRef::new(owner, &self.name, self.descriptor)
    }

    fn push_initial_value(&self, code: &mut CodeBuilder) {
        match self.initializer {
            Some(Initializer::Literal(literal)) => literal.push(code),
            Some(Initializer::NewObject) => construct(code, JAVA_LANG_OBJECT),
            None => {}
        }
    }
}

fn initialized(fields: &[FieldSpec]) -> impl Iterator<Item = &FieldSpec> {
    fields.iter().filter(|field| field.initializer.is_some())
}

/// `<clinit>` 中按声明顺序给静态字段赋初值，没有初始化表达式的字段不生成代码
pub fn initialize_static_fields(code: &mut CodeBuilder, owner: &str, fields: &[FieldSpec]) {
    for field in initialized(fields) {
        field.push_initial_value(code);
        code.push(Putstatic(field.field_ref(owner)));
    }
}

/// `<init>` 中在调用父类构造方法之后给实例字段赋初值
pub fn initialize_instance_fields(code: &mut CodeBuilder, owner: &str, fields: &[FieldSpec]) {
    for field in initialized(fields) {
        code.push(Aload(0));
        field.push_initial_value(code);
        code.push(Putfield(field.field_ref(owner)));
    }
}

/// 按初始化表达式断言字段的值；`new Object()` 初始化的字段只能断言与自身相同。
/// `load` 生成读取字段的指令（getstatic，或 aload + getfield）
pub fn assert_fields_initialized<F>(code: &mut CodeBuilder, fields: &[FieldSpec], mut load: F)
where
    F: FnMut(&mut CodeBuilder, &FieldSpec),
{
    for field in fields {
        match field.initializer {
            Some(Initializer::Literal(literal)) => {
                load(code, field);
                literal.assert_top_equals(code);
            }
            Some(Initializer::NewObject) => {
                load(code, field);
                load(code, field);
                code.push(assert_equals(ASSERT_OBJECTS));
            }
            None => {}
        }
    }
}
