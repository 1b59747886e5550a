use crate::jvm_error::{VmError, VmExecResult};
use crate::jvm_values::Value;
use crate::loaded_class::ClassRef;
use std::collections::HashMap;

/// 静态区。每个声明类拥有一组静态字段槽位，在类初始化的准备阶段创建
pub(crate) struct StaticArea<'a> {
    fields: HashMap<ClassRef<'a>, Vec<Value>>,
}

impl<'a> StaticArea<'a> {
    pub(crate) fn new() -> StaticArea<'a> {
        StaticArea {
            fields: HashMap::new(),
        }
    }

    /// 写入常量初始值或类型默认值
    pub(crate) fn prepare(&mut self, class_ref: ClassRef<'a>) {
        let slots = class_ref
            .static_fields
            .values()
            .map(|field| field.initial_value)
            .collect();
        self.fields.insert(class_ref, slots);
    }

    pub(crate) fn get_static_field(&self, class_ref: ClassRef<'a>, slot: usize) -> VmExecResult<Value> {
        self.fields
            .get(class_ref)
            .and_then(|slots| slots.get(slot))
            .copied()
            .ok_or_else(|| VmError::ExecuteCodeError(format!("{} is not prepared", class_ref.name)))
    }

    pub(crate) fn set_static_field(
        &mut self,
        class_ref: ClassRef<'a>,
        slot: usize,
        value: Value,
    ) -> VmExecResult<()> {
        let field = self
            .fields
            .get_mut(class_ref)
            .and_then(|slots| slots.get_mut(slot))
            .ok_or_else(|| VmError::ExecuteCodeError(format!("{} is not prepared", class_ref.name)))?;
        *field = value;
        Ok(())
    }
}
