use crate::loaded_class::{ClassRef, MethodRef};
use crate::stack_trace_element::StackTraceElement;
use class_model::instruction::CodeIndex;

/// 调用栈中一个活动方法的位置信息。
/// 解释器每执行一条指令都会更新栈顶的 pc，异常创建时据此记录调用栈
pub(crate) struct ActiveFrame<'a> {
    class_ref: ClassRef<'a>,
    method_ref: MethodRef<'a>,
    pc: CodeIndex,
}

pub struct CallStack<'a> {
    frames: Vec<ActiveFrame<'a>>,
}

impl<'a> CallStack<'a> {
    pub(crate) fn new() -> CallStack<'a> {
        CallStack { frames: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self, class_ref: ClassRef<'a>, method_ref: MethodRef<'a>) {
        self.frames.push(ActiveFrame {
            class_ref,
            method_ref,
            pc: 0,
        });
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    //内部错误中止执行时丢弃尚未返回的方法
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub(crate) fn set_pc(&mut self, pc: CodeIndex) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pc = pc;
        }
    }

    /// 由内向外
    pub fn stack_trace(&self) -> Vec<StackTraceElement> {
        self.frames
            .iter()
            .rev()
            .map(|frame| StackTraceElement {
                declaring_class: frame.class_ref.name.clone(),
                method_name: frame.method_ref.name.clone(),
                descriptor: frame.method_ref.descriptor.clone(),
                pc: if frame.method_ref.is_native() {
                    None
                } else {
                    Some(frame.pc)
                },
            })
            .collect()
    }
}
