use crate::java_exception::InvokeMethodResult;
use crate::jvm_exceptions::JAVA_LANG_OBJECT;
use crate::jvm_values::Value;
use crate::virtual_machine::VirtualMachine;
use std::collections::HashMap;

/// native 方法的实现。实例方法的接收者作为第一个参数传入
pub type NativeMethod<'a> = fn(&mut VirtualMachine<'a>, &[Value]) -> InvokeMethodResult;

/// (类名, 方法名, 描述符)
type NativeKey = (String, String, String);

/// native 方法表，由宿主在运行前注册
pub struct NativeMethodArea<'a> {
    native_methods: HashMap<NativeKey, NativeMethod<'a>>,
}

impl<'a> NativeMethodArea<'a> {
    pub fn new_with_default_native() -> NativeMethodArea<'a> {
        let mut area = NativeMethodArea {
            native_methods: HashMap::new(),
        };
        area.registry_native_method(JAVA_LANG_OBJECT, "hashCode", "()I", object_hash_code);
        area
    }

    /// 同一个方法重复注册时后注册的生效
    pub fn registry_native_method(
        &mut self,
        class_name: &str,
        method_name: &str,
        method_descriptor: &str,
        method: NativeMethod<'a>,
    ) {
        let key = (
            class_name.to_string(),
            method_name.to_string(),
            method_descriptor.to_string(),
        );
        self.native_methods.insert(key, method);
    }

    pub fn get_method(
        &self,
        class_name: &str,
        method_name: &str,
        method_descriptor: &str,
    ) -> Option<NativeMethod<'a>> {
        let key = (
            class_name.to_string(),
            method_name.to_string(),
            method_descriptor.to_string(),
        );
        self.native_methods.get(&key).copied()
    }
}

/// 对象的标识哈希：堆中的下标
fn object_hash_code(_vm: &mut VirtualMachine, args: &[Value]) -> InvokeMethodResult {
    let hash = match args.first() {
        Some(Value::ObjectRef(object)) => object.0 as i32,
        Some(Value::ArrayRef(array)) => array.0 as i32,
        _ => 0,
    };
    Ok(Some(Value::Int(hash)))
}
