use crate::jvm_error::VmExecResult;
use crate::jvm_values::Value;
use class_model::field_descriptor::{FieldAccessFlags, FieldDescriptor};
use class_model::type_descriptor::TypeTag;

pub struct RuntimeFieldInfo {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub type_tag: TypeTag,
    /// 实例字段在对象中的槽位（包含继承来的字段）；静态字段为声明类静态区中的槽位
    pub slot: usize,
    /// 准备阶段写入的初始值：常量初始化值或类型默认值
    pub initial_value: Value,
}

impl RuntimeFieldInfo {
    pub fn from(field: FieldDescriptor, slot: usize) -> VmExecResult<RuntimeFieldInfo> {
        let type_tag = field.type_tag()?;
        let initial_value = match field.constant_value {
            Some(constant) if field.is_static() => Value::from(constant),
            _ => Value::zero_value(&type_tag),
        };
        Ok(RuntimeFieldInfo {
            access_flags: field.access_flags,
            name: field.name,
            descriptor: field.descriptor,
            type_tag,
            slot,
            initial_value,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}
