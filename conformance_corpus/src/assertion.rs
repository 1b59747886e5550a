use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassDescriptor;
use class_model::instruction::{Instruction, MethodRef};
use class_model::method_descriptor::MethodAccessFlags;
use class_model::program_error::Result;
use lite_vm::java_exception::InvokeMethodResult;
use lite_vm::jvm_exceptions::ASSERTION_ERROR;
use lite_vm::jvm_values::Value;
use lite_vm::virtual_machine::VirtualMachine;

pub const ASSERTION_CLASS: &str = "vadeen/test/Assertion";

pub const ASSERT_BOOLEANS: &str = "(ZZ)V";
pub const ASSERT_SHORTS: &str = "(SS)V";
pub const ASSERT_INTS: &str = "(II)V";
pub const ASSERT_LONGS: &str = "(JJ)V";
pub const ASSERT_FLOATS: &str = "(FF)V";
pub const ASSERT_DOUBLES: &str = "(DD)V";
pub const ASSERT_OBJECTS: &str = "(Ljava/lang/Object;Ljava/lang/Object;)V";

const ASSERT_EQUALS_OVERLOADS: [&str; 7] = [
    ASSERT_BOOLEANS,
    ASSERT_SHORTS,
    ASSERT_INTS,
    ASSERT_LONGS,
    ASSERT_FLOATS,
    ASSERT_DOUBLES,
    ASSERT_OBJECTS,
];

/// `vadeen.test.Assertion`：只有 native 静态方法
pub fn assertion_class() -> Result<ClassDescriptor> {
    let mut class = ClassBuilder::new(ASSERTION_CLASS);
    let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
    for descriptor in ASSERT_EQUALS_OVERLOADS {
        class.native_method("assertEquals", descriptor, flags)?;
    }
    class.native_method("fail", "()V", flags)?;
    Ok(class.build())
}

/// 把断言的实现注册到虚拟机的 native 方法表
pub fn register_assertions(vm: &mut VirtualMachine) {
    for descriptor in ASSERT_EQUALS_OVERLOADS {
        vm.registry_native_method(ASSERTION_CLASS, "assertEquals", descriptor, java_assert_equals);
    }
    vm.registry_native_method(ASSERTION_CLASS, "fail", "()V", java_fail);
}

/// `invokestatic vadeen/test/Assertion.assertEquals`，实际值在前，期望值在后
pub fn assert_equals(descriptor: &str) -> Instruction {
    Instruction::Invokestatic(MethodRef::new(ASSERTION_CLASS, "assertEquals", descriptor))
}

pub fn assert_fail() -> Instruction {
    Instruction::Invokestatic(MethodRef::new(ASSERTION_CLASS, "fail", "()V"))
}

/// 基本类型按 `==` 比较（NaN 不等于自身），引用按同一性比较
fn java_assert_equals(vm: &mut VirtualMachine, args: &[Value]) -> InvokeMethodResult {
    match args {
        [actual, expected] if actual == expected => Ok(None),
        [actual, expected] => {
            let message = format!("expected {} but was {}", expected, actual);
            Err(vm.throw_new(ASSERTION_ERROR, Some(message)))
        }
        _ => Err(vm.throw_new(ASSERTION_ERROR, Some("assertEquals takes two operands".to_string()))),
    }
}

fn java_fail(vm: &mut VirtualMachine, _args: &[Value]) -> InvokeMethodResult {
    Err(vm.throw_new(ASSERTION_ERROR, Some("fail() reached".to_string())))
}
