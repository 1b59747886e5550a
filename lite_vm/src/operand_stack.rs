use crate::jvm_error::{VmError, VmExecResult};
use crate::jvm_values::Value;
use log::trace;

/// 操作数栈。long 和 double 在栈上只占一项，
/// `pop2`/`dup2` 一类指令按计算类型区分一项还是两项
#[derive(Debug)]
pub struct OperandStack {
    stack: Vec<Value>,
    max_size: usize,
}

impl OperandStack {
    pub(crate) fn new(max_size: usize) -> OperandStack {
        OperandStack {
            stack: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn clear(&mut self) {
        self.stack.clear();
    }

    pub(crate) fn pop_n(&mut self, n: usize) -> VmExecResult<Vec<Value>> {
        if n > self.stack.len() {
            return Err(VmError::PopFromEmptyStack);
        }
        let values = self.stack.split_off(self.stack.len() - n);
        trace!("--- value stack --- {:?}", self.stack);
        Ok(values)
    }

    pub(crate) fn pop(&mut self) -> VmExecResult<Value> {
        let result = self.stack.pop().ok_or(VmError::PopFromEmptyStack);
        trace!("--- value stack --- {:?}", self.stack);
        result
    }

    pub(crate) fn push(&mut self, value: Value) -> VmExecResult<()> {
        if self.stack.len() < self.max_size {
            self.stack.push(value);
            trace!("--- value stack --- {:?}", self.stack);
            Ok(())
        } else {
            Err(VmError::StackOverFlow)
        }
    }

    fn pop_category1(&mut self) -> VmExecResult<Value> {
        let value = self.pop()?;
        if value.is_category2() {
            return Err(VmError::ValueTypeMismatch);
        }
        Ok(value)
    }

    /// 弹出一个第二类值，或者两个第一类值（按压栈顺序返回）
    fn pop_two_words(&mut self) -> VmExecResult<Vec<Value>> {
        let value = self.pop()?;
        if value.is_category2() {
            Ok(vec![value])
        } else {
            let below = self.pop_category1()?;
            Ok(vec![below, value])
        }
    }

    fn push_all(&mut self, values: &[Value]) -> VmExecResult<()> {
        for value in values {
            self.push(*value)?;
        }
        Ok(())
    }

    pub fn pop2(&mut self) -> VmExecResult<()> {
        self.pop_two_words().map(|_| ())
    }

    pub fn dup(&mut self) -> VmExecResult<()> {
        match self.stack.last() {
            None => Err(VmError::PopFromEmptyStack),
            Some(head) if head.is_category2() => Err(VmError::ValueTypeMismatch),
            Some(head) => {
                let head = *head;
                self.push(head)
            }
        }
    }

    pub fn dup_x1(&mut self) -> VmExecResult<()> {
        let value1 = self.pop_category1()?;
        let value2 = self.pop_category1()?;
        self.push(value1)?;
        self.push(value2)?;
        self.push(value1)
    }

    pub fn dup_x2(&mut self) -> VmExecResult<()> {
        let value1 = self.pop_category1()?;
        let below = self.pop_two_words()?;
        self.push(value1)?;
        self.push_all(&below)?;
        self.push(value1)
    }

    pub fn dup2(&mut self) -> VmExecResult<()> {
        let top = self.pop_two_words()?;
        self.push_all(&top)?;
        self.push_all(&top)
    }

    pub fn dup2_x1(&mut self) -> VmExecResult<()> {
        let top = self.pop_two_words()?;
        let value3 = self.pop_category1()?;
        self.push_all(&top)?;
        self.push(value3)?;
        self.push_all(&top)
    }

    pub fn dup2_x2(&mut self) -> VmExecResult<()> {
        let top = self.pop_two_words()?;
        let below = self.pop_two_words()?;
        self.push_all(&top)?;
        self.push_all(&below)?;
        self.push_all(&top)
    }

    pub fn swap(&mut self) -> VmExecResult<()> {
        let value1 = self.pop_category1()?;
        let value2 = self.pop_category1()?;
        self.push(value1)?;
        self.push(value2)
    }
}
