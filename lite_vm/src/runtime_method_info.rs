use crate::jvm_error::VmExecResult;
use crate::runtime_constant_pool::RuntimeConstantPool;
use class_model::method_descriptor::{Code, MethodAccessFlags, MethodDescriptor};
use class_model::type_descriptor::MethodSignature;
use indexmap::Equivalent;
use std::fmt::{Display, Formatter};

pub struct RuntimeMethodInfo<'a> {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub signature: MethodSignature,
    //除了native和abstract方法应该都有code
    pub code: Option<Code>,
    pub(crate) constant_pool: RuntimeConstantPool<'a>,
}

impl<'a> RuntimeMethodInfo<'a> {
    pub fn from(method: MethodDescriptor) -> VmExecResult<RuntimeMethodInfo<'a>> {
        let signature = MethodSignature::parse(&method.descriptor)?;
        let code_length = method.code.as_ref().map_or(0, |code| code.instructions.len());
        Ok(RuntimeMethodInfo {
            access_flags: method.access_flags,
            name: method.name,
            descriptor: method.descriptor,
            signature,
            code: method.code,
            constant_pool: RuntimeConstantPool::new(code_length),
        })
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    /// 参与虚方法分派：非静态、非私有、也不是初始化方法
    pub fn is_virtual(&self) -> bool {
        !self.is_static()
            && !self.access_flags.contains(MethodAccessFlags::PRIVATE)
            && !self.name.starts_with('<')
    }

    pub fn key(&self) -> MethodKey {
        MethodKey::new(&self.name, &self.descriptor)
    }
}

impl Display for RuntimeMethodInfo<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// 方法签名：名称 + 描述符
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct MethodKey {
    name: String,
    descriptor: String,
}

impl MethodKey {
    pub fn new(name: &str, descriptor: &str) -> MethodKey {
        MethodKey {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// 不分配字符串即可在以 [`MethodKey`] 为键的表中查找。
/// 字段顺序与 `MethodKey` 一致，派生出的哈希值相同
#[derive(Hash)]
pub(crate) struct MethodKeyRef<'b> {
    name: &'b str,
    descriptor: &'b str,
}

impl<'b> MethodKeyRef<'b> {
    pub(crate) fn new(name: &'b str, descriptor: &'b str) -> MethodKeyRef<'b> {
        MethodKeyRef { name, descriptor }
    }
}

impl Equivalent<MethodKey> for MethodKeyRef<'_> {
    fn equivalent(&self, key: &MethodKey) -> bool {
        self.name == key.name && self.descriptor == key.descriptor
    }
}
