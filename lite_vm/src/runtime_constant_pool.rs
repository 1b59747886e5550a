use crate::loaded_class::{ClassRef, FieldRef, MethodRef};
use class_model::instruction::CodeIndex;
use std::cell::OnceCell;

/// 指令中符号引用的解析结果
#[derive(Clone, Copy)]
pub(crate) enum ResolvedRef<'a> {
    //new
    Class(ClassRef<'a>),
    //声明该字段的类
    StaticField(ClassRef<'a>, FieldRef<'a>),
    InstanceField(FieldRef<'a>),
    //invokestatic、invokespecial，以及不参与虚分派的方法
    Method(ClassRef<'a>, MethodRef<'a>),
    //符号引用中的类，方法在其虚方法表中的下标
    VirtualMethod {
        class_ref: ClassRef<'a>,
        index: usize,
        parameter_count: usize,
    },
    //方法在接口自身虚方法表中的下标
    InterfaceMethod {
        interface: ClassRef<'a>,
        index: usize,
        parameter_count: usize,
    },
}

/// 运行时常量池：每个方法一张，按指令下标保存已解析的符号引用。
///
/// 指令第一次执行时解析，之后直接取用。解析抛出的异常不会记录，下次执行重新解析
pub(crate) struct RuntimeConstantPool<'a> {
    entries: Vec<OnceCell<ResolvedRef<'a>>>,
}

impl<'a> RuntimeConstantPool<'a> {
    pub(crate) fn new(code_length: usize) -> RuntimeConstantPool<'a> {
        RuntimeConstantPool {
            entries: (0..code_length).map(|_| OnceCell::new()).collect(),
        }
    }

    pub(crate) fn resolve<E, F>(&self, pc: CodeIndex, resolver: F) -> Result<ResolvedRef<'a>, E>
    where
        F: FnOnce() -> Result<ResolvedRef<'a>, E>,
    {
        let entry = match self.entries.get(pc) {
            Some(entry) => entry,
            None => return resolver(),
        };
        if let Some(resolved) = entry.get() {
            return Ok(*resolved);
        }
        let resolved = resolver()?;
        Ok(*entry.get_or_init(|| resolved))
    }
}
