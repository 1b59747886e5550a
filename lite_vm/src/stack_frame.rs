use crate::java_exception::{Completion, MethodCallError};
use crate::jvm_error::{VmError, VmExecResult};
use crate::jvm_exceptions::{
    ARITHMETIC_EXCEPTION, ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION, ARRAY_STORE_EXCEPTION,
    CLASS_CAST_EXCEPTION, INCOMPATIBLE_CLASS_CHANGE_ERROR, NO_SUCH_METHOD_ERROR,
    NULL_POINTER_EXCEPTION,
};
use crate::jvm_values::Value::{ArrayRef, Double, Float, Int, Long, Null, ObjectRef, Uninitialized};
use crate::jvm_values::{ArrayReference, ObjectReference, Value};
use crate::loaded_class::{ClassRef, FieldRef, MethodRef};
use crate::operand_stack::OperandStack;
use crate::runtime_constant_pool::ResolvedRef;
use crate::virtual_machine::VirtualMachine;
use class_model::instruction::{self, CodeIndex, Instruction};
use class_model::method_descriptor::{Code, ExceptionRange};
use class_model::switch_table::BranchTable;
use class_model::type_descriptor::TypeTag;
use log::{debug, log_enabled, trace, Level};
use std::cmp::Ordering;

pub(crate) enum InstructionResult<'a> {
    ReturnFromMethod(Option<Value>),
    ContinueMethodExecution,
    //调用指令：参数已经出栈，pc 停在调用指令上
    InvokeMethod(ClassRef<'a>, MethodRef<'a>, Vec<Value>),
}

/// 栈帧交还给虚拟机的控制权：发起一次方法调用，或者栈帧结束
pub(crate) enum FrameEvent<'a> {
    Invoke {
        class_ref: ClassRef<'a>,
        method_ref: MethodRef<'a>,
        args: Vec<Value>,
    },
    Complete(Completion),
}

#[derive(Debug)]
pub(crate) enum LocalValue {
    Entry(Value),
    //long/double 的第二个槽位
    PlaceHolder,
}

/// 栈帧中异常路由的状态。
///
/// 正常执行为 `Running`；指令抛出异常后进入 `Unwinding`，
/// 按异常表查找处理器：找到则 `Handled`，随后回到 `Running`；
/// 找不到则 `Propagating`，栈帧结束（`Terminated`）并把异常交给调用者
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FrameState {
    Running,
    Unwinding(ObjectReference),
    Handled {
        exception: ObjectReference,
        handler: CodeIndex,
    },
    Propagating(ObjectReference),
    Terminated,
}

pub struct StackFrame<'a> {
    pub(crate) class_ref: ClassRef<'a>,
    pub(crate) method_ref: MethodRef<'a>,
    code: &'a Code,
    pub(crate) pc: CodeIndex,
    //跳转指令写入，否则为 pc + 1
    next_pc: CodeIndex,
    pub(crate) local_var_table: Vec<LocalValue>,
    pub(crate) op_stack: OperandStack,
    state: FrameState,
}

type InvokeResult<T> = Result<T, MethodCallError>;

macro_rules! generate_get_local {
    ($name:ident, $variant:ident, $type:ty) => {
        fn $name(&self, index: u16) -> InvokeResult<$type> {
            match self.get_local(index as usize)? {
                Value::$variant(value) => Ok(value),
                _ => Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_pop {
    ($name:ident, $variant:ident, $type:ty) => {
        fn $name(&mut self) -> InvokeResult<$type> {
            match self.pop()? {
                Value::$variant(value) => Ok(value),
                _ => Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_array_load {
    ($name:ident, $($variant:ident),+) => {
        fn $name(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<()> {
            let (array, index) = self.pop_array_and_index(vm)?;
            let value = vm.heap().get_element(array, index)?;
            match value {
                $(Value::$variant(..) => self.push(value),)+
                _ => Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_array_store {
    ($name:ident, $variant:ident) => {
        fn $name(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<()> {
            let value = self.pop()?;
            let (array, index) = self.pop_array_and_index(vm)?;
            match value {
                Value::$variant(..) => {
                    vm.heap_mut().set_element(array, index, value)?;
                    Ok(())
                }
                _ => Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_return {
    ($name:ident, $($variant:ident),+) => {
        fn $name(&mut self) -> InvokeResult<InstructionResult<'a>> {
            let value = self.pop()?;
            match value {
                $($variant(..) => Ok(InstructionResult::ReturnFromMethod(Some(value))),)+
                _ => Err(MethodCallError::from(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_load {
    ($name:ident, $($variant:ident),+) => {
        fn $name(&mut self, index: u16) -> InvokeResult<()> {
            let local = self.get_local(index as usize)?;
            match local {
                $($variant(..) => self.push(local),)+
                _ => Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_store {
    ($name:ident, $($variant:ident),+) => {
        fn $name(&mut self, index: u16) -> InvokeResult<()> {
            let value = self.pop()?;
            match value {
                $($variant(..) => {
                    self.set_local(index as usize, value)?;
                    Ok(())
                })+
                _ => Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
            }
        }
    };
}

macro_rules! generate_convert {
    ($name:ident, $variant:ident, $target:ident, $type:ty) => {
        fn $name(&mut self) -> InvokeResult<()> {
            if let $variant(v) = self.pop()? {
                //浮点转整数时 `as` 饱和截断，NaN 得 0
                self.push($target(v as $type))
            } else {
                Err(MethodCallError::InternalError(VmError::ExecuteCodeError(
                    "convert Error".to_string(),
                )))
            }
        }
    };
}

macro_rules! generate_int_convert {
    ($name:ident, $type:ty) => {
        fn $name(&mut self) -> InvokeResult<()> {
            if let Int(v) = self.pop()? {
                self.push(Int((v as $type) as i32))
            } else {
                Err(MethodCallError::InternalError(VmError::ExecuteCodeError(
                    "convert Error".to_string(),
                )))
            }
        }
    };
}

macro_rules! generate_if_cmp {
    ($name:ident, $variant:ident, $type:ty) => {
        fn $name<T>(&mut self, target: CodeIndex, evaluator: T) -> InvokeResult<()>
        where
            T: FnOnce($type, $type) -> bool,
        {
            let val2 = if let $variant(v) = self.pop()? {
                v
            } else {
                return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
            };
            let val1 = if let $variant(v) = self.pop()? {
                v
            } else {
                return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
            };
            if evaluator(val1, val2) {
                self.goto(target);
            }
            Ok(())
        }
    };
}

macro_rules! generate_math {
    ($name:ident, $variant:ident, $type:ty) => {
        fn $name<T>(&mut self, evaluator: T) -> InvokeResult<()>
        where
            T: FnOnce($type, $type) -> InvokeResult<$type>,
        {
            let val2 = if let $variant(v) = self.pop()? {
                v
            } else {
                return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
            };
            let val1 = if let $variant(v) = self.pop()? {
                v
            } else {
                return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
            };
            let result = evaluator(val1, val2)?;
            self.push($variant(result))
        }
    };
}

macro_rules! generate_cmp {
    ($name:ident, $variant:ident) => {
        /// `nan_result` 是任一操作数为 NaN 时的结果：`*cmpg` 为 1，`*cmpl` 为 -1
        fn $name(&mut self, nan_result: i32) -> InvokeResult<()> {
            let val2 = if let $variant(v) = self.pop()? {
                v
            } else {
                return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
            };
            let val1 = if let $variant(v) = self.pop()? {
                v
            } else {
                return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
            };
            let value = match val1.partial_cmp(&val2) {
                Some(Ordering::Greater) => 1,
                Some(Ordering::Less) => -1,
                Some(Ordering::Equal) => 0,
                None => nan_result,
            };
            self.push(Int(value))
        }
    };
}

impl<'a> StackFrame<'a> {
    /// `args` 为实参，实例方法的接收者在最前面；
    /// long/double 参数各占两个局部变量槽位
    pub fn new(
        class_ref: ClassRef<'a>,
        method_ref: MethodRef<'a>,
        args: Vec<Value>,
        max_operand_stack: usize,
    ) -> VmExecResult<StackFrame<'a>> {
        let code = method_ref.code.as_ref().ok_or_else(|| {
            VmError::ExecuteCodeError(format!("{}.{} has no code", class_ref.name, method_ref))
        })?;
        let mut frame = StackFrame {
            class_ref,
            method_ref,
            code,
            pc: 0,
            next_pc: 0,
            local_var_table: Vec::with_capacity(code.max_locals as usize),
            op_stack: OperandStack::new((code.max_stack as usize).min(max_operand_stack)),
            state: FrameState::Running,
        };
        for value in args {
            frame.push_local(value);
        }
        let n = (code.max_locals as usize).saturating_sub(frame.local_var_table.len());
        (0..n).for_each(|_| frame.push_local(Uninitialized));
        Ok(frame)
    }

    fn get_local(&self, offset: usize) -> VmExecResult<Value> {
        match self.local_var_table.get(offset) {
            Some(LocalValue::Entry(e)) => Ok(*e),
            Some(LocalValue::PlaceHolder) => Err(VmError::InvalidOffset(offset)),
            None => Err(VmError::IndexOutOfBounds),
        }
    }

    fn push_local(&mut self, value: Value) {
        self.local_var_table.push(LocalValue::Entry(value));
        if value.is_category2() {
            self.local_var_table.push(LocalValue::PlaceHolder);
        }
        trace!("--- local variables --- {:?}", self.local_var_table);
    }

    fn set_local(&mut self, offset: usize, value: Value) -> VmExecResult<()> {
        let width = if value.is_category2() { 2 } else { 1 };
        if offset + width > self.local_var_table.len() {
            return Err(VmError::IndexOutOfBounds);
        }
        //覆盖了 long/double 的后半部分，前半部分随之失效
        if let LocalValue::PlaceHolder = self.local_var_table[offset] {
            self.local_var_table[offset - 1] = LocalValue::Entry(Uninitialized);
        }
        self.local_var_table[offset] = LocalValue::Entry(value);
        if width == 2 {
            self.local_var_table[offset + 1] = LocalValue::PlaceHolder;
        }
        Ok(())
    }

    generate_pop!(pop_int, Int, i32);
    generate_pop!(pop_long, Long, i64);
    generate_pop!(pop_float, Float, f32);
    generate_pop!(pop_double, Double, f64);
    generate_get_local!(get_local_int, Int, i32);

    generate_array_load!(exec_iaload, Int);
    generate_array_load!(exec_laload, Long);
    generate_array_load!(exec_faload, Float);
    generate_array_load!(exec_daload, Double);
    //boolean/byte/char/short 数组在写入时已经规整，读出即是扩展后的 int
    generate_array_load!(exec_baload, Int);
    generate_array_load!(exec_caload, Int);
    generate_array_load!(exec_saload, Int);

    generate_array_store!(exec_lastore, Long);
    generate_array_store!(exec_fastore, Float);
    generate_array_store!(exec_dastore, Double);

    /// `iastore`/`bastore`/`castore`/`sastore`：按数组的元素类型截断
    fn exec_int_array_store(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<()> {
        let value = self.pop_int()?;
        let (array, index) = self.pop_array_and_index(vm)?;
        let value = match vm.heap().array_element_type(array)? {
            TypeTag::Boolean => value & 1,
            TypeTag::Byte => value as i8 as i32,
            TypeTag::Char => value as u16 as i32,
            TypeTag::Short => value as i16 as i32,
            TypeTag::Int => value,
            _ => return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch)),
        };
        vm.heap_mut().set_element(array, index, Int(value))?;
        Ok(())
    }

    fn exec_aaload(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<()> {
        let (array, index) = self.pop_array_and_index(vm)?;
        let value = vm.heap().get_element(array, index)?;
        if value.is_reference_or_null() {
            self.push(value)
        } else {
            Err(MethodCallError::InternalError(VmError::ValueTypeMismatch))
        }
    }

    fn exec_aastore(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<()> {
        let value = self.pop_reference_or_null()?;
        let (array, index) = self.pop_array_and_index(vm)?;
        let element_type = vm.heap().array_element_type(array)?.clone();
        if value != Null && !vm.is_instance_of(value, &element_type)? {
            let message = format!("cannot store into an array of {}", element_type);
            return Err(vm.throw_new(ARRAY_STORE_EXCEPTION, Some(message)));
        }
        vm.heap_mut().set_element(array, index, value)?;
        Ok(())
    }

    fn exec_aload(&mut self, index: u16) -> InvokeResult<()> {
        let local = self.get_local(index as usize)?;
        if local.is_reference_or_null() {
            self.push(local)
        } else {
            Err(MethodCallError::InternalError(VmError::ValueTypeMismatch))
        }
    }

    generate_load!(exec_dload, Double);
    generate_load!(exec_fload, Float);
    generate_load!(exec_iload, Int);
    generate_load!(exec_lload, Long);

    fn exec_astore(&mut self, index: u16) -> InvokeResult<()> {
        let value = self.pop_reference_or_null()?;
        self.set_local(index as usize, value)
            .map_err(MethodCallError::from)
    }

    generate_store!(exec_dstore, Double);
    generate_store!(exec_fstore, Float);
    generate_store!(exec_istore, Int);
    generate_store!(exec_lstore, Long);

    generate_convert!(exec_d2f, Double, Float, f32);
    generate_convert!(exec_d2l, Double, Long, i64);
    generate_convert!(exec_d2i, Double, Int, i32);
    generate_convert!(exec_f2d, Float, Double, f64);
    generate_convert!(exec_f2i, Float, Int, i32);
    generate_convert!(exec_f2l, Float, Long, i64);

    generate_int_convert!(exec_i2b, i8);
    generate_int_convert!(exec_i2c, u16);
    generate_convert!(exec_i2d, Int, Double, f64);
    generate_convert!(exec_i2f, Int, Float, f32);
    generate_convert!(exec_i2l, Int, Long, i64);
    generate_int_convert!(exec_i2s, i16);

    generate_convert!(exec_l2d, Long, Double, f64);
    generate_convert!(exec_l2f, Long, Float, f32);
    generate_convert!(exec_l2i, Long, Int, i32);

    generate_math!(exec_double_math, Double, f64);
    generate_math!(exec_float_math, Float, f32);
    generate_math!(exec_int_math, Int, i32);
    generate_math!(exec_long_math, Long, i64);

    generate_cmp!(exec_dcmp, Double);
    generate_cmp!(exec_fcmp, Float);
    generate_cmp!(exec_lcmp, Long);

    generate_return!(exec_dreturn, Double);
    generate_return!(exec_freturn, Float);
    generate_return!(exec_lreturn, Long);
    generate_return!(exec_ireturn, Int);

    fn exec_areturn(&mut self) -> InvokeResult<InstructionResult<'a>> {
        let value = self.pop_reference_or_null()?;
        Ok(InstructionResult::ReturnFromMethod(Some(value)))
    }

    generate_if_cmp!(exec_if_icmp, Int, i32);

    fn exec_if_acmp<T>(&mut self, target: CodeIndex, evaluator: T) -> InvokeResult<()>
    where
        T: FnOnce(Value, Value) -> bool,
    {
        let val2 = self.pop_reference_or_null()?;
        let val1 = self.pop_reference_or_null()?;
        if evaluator(val1, val2) {
            self.goto(target);
        }
        Ok(())
    }

    fn exec_if<T>(&mut self, target: CodeIndex, evaluator: T) -> InvokeResult<()>
    where
        T: FnOnce(i32) -> bool,
    {
        let value = self.pop_int()?;
        if evaluator(value) {
            self.goto(target);
        }
        Ok(())
    }

    fn exec_long_shift<T>(&mut self, evaluator: T) -> InvokeResult<()>
    where
        T: FnOnce(i64, u32) -> i64,
    {
        let val2 = self.pop_int()?;
        let val1 = self.pop_long()?;
        self.push(Long(evaluator(val1, val2 as u32)))
    }

    fn exec_switch(&mut self, table: &dyn BranchTable) -> InvokeResult<()> {
        let key = self.pop_int()?;
        let target = table.dispatch(key);
        if target == table.default_target() {
            trace!("switch on {} -> default {}", key, target);
        } else {
            trace!("switch on {} -> {}", key, target);
        }
        self.goto(target);
        Ok(())
    }

    /// 依次弹出下标与数组引用，检查空引用与越界
    fn pop_array_and_index(
        &mut self,
        vm: &mut VirtualMachine<'a>,
    ) -> InvokeResult<(ArrayReference, usize)> {
        let index = self.pop_int()?;
        let array = self.pop_array(vm)?;
        let length = vm.heap().array_length(array)?;
        if index < 0 || index as usize >= length {
            let message = format!("Index {} out of bounds for length {}", index, length);
            return Err(vm.throw_new(ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION, Some(message)));
        }
        Ok((array, index as usize))
    }

    fn pop_array(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<ArrayReference> {
        match self.pop()? {
            ArrayRef(array) => Ok(array),
            Null => Err(vm.throw_new(NULL_POINTER_EXCEPTION, None)),
            _ => Err(MethodCallError::InternalError(VmError::ExecuteCodeError(
                "ShouldBeArray".to_string(),
            ))),
        }
    }

    fn pop_object(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<ObjectReference> {
        match self.pop()? {
            ObjectRef(object) => Ok(object),
            Null => Err(vm.throw_new(NULL_POINTER_EXCEPTION, None)),
            _ => Err(MethodCallError::InternalError(VmError::ExecuteCodeError(
                "ShouldBeObject".to_string(),
            ))),
        }
    }

    fn pop_reference_or_null(&mut self) -> InvokeResult<Value> {
        let value = self.pop()?;
        if value.is_reference_or_null() {
            Ok(value)
        } else {
            Err(MethodCallError::InternalError(VmError::ExecuteCodeError(
                "ShouldBeObjectOrNull".to_string(),
            )))
        }
    }

    fn pop_n(&mut self, n: usize) -> InvokeResult<Vec<Value>> {
        self.op_stack
            .pop_n(n)
            .map_err(MethodCallError::InternalError)
    }

    fn pop(&mut self) -> InvokeResult<Value> {
        self.op_stack.pop().map_err(MethodCallError::from)
    }

    fn push(&mut self, value: Value) -> InvokeResult<()> {
        self.op_stack.push(value).map_err(MethodCallError::from)
    }

    fn goto(&mut self, target: CodeIndex) {
        self.next_pc = target;
    }

    fn execute_instruction(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        instruction: &'a Instruction,
    ) -> InvokeResult<InstructionResult<'a>> {
        if log_enabled!(Level::Trace) {
            let depth = "\t".repeat(vm.call_depth());
            trace!("{}{:>4}: {:?}", depth, self.pc, instruction);
        }
        match instruction {
            Instruction::Nop => {}
            Instruction::AconstNull => self.push(Null)?,
            Instruction::Iconst(value) => self.push(Int(*value))?,
            Instruction::Lconst(value) => self.push(Long(*value))?,
            Instruction::Fconst(value) => self.push(Float(*value))?,
            Instruction::Dconst(value) => self.push(Double(*value))?,

            Instruction::Iload(index) => self.exec_iload(*index)?,
            Instruction::Lload(index) => self.exec_lload(*index)?,
            Instruction::Fload(index) => self.exec_fload(*index)?,
            Instruction::Dload(index) => self.exec_dload(*index)?,
            Instruction::Aload(index) => self.exec_aload(*index)?,
            Instruction::Istore(index) => self.exec_istore(*index)?,
            Instruction::Lstore(index) => self.exec_lstore(*index)?,
            Instruction::Fstore(index) => self.exec_fstore(*index)?,
            Instruction::Dstore(index) => self.exec_dstore(*index)?,
            Instruction::Astore(index) => self.exec_astore(*index)?,
            Instruction::Iinc(index, to_add) => {
                let local = self.get_local_int(*index)?;
                self.set_local(*index as usize, Int(local.wrapping_add(*to_add)))?;
            }

            Instruction::Iaload => self.exec_iaload(vm)?,
            Instruction::Laload => self.exec_laload(vm)?,
            Instruction::Faload => self.exec_faload(vm)?,
            Instruction::Daload => self.exec_daload(vm)?,
            Instruction::Aaload => self.exec_aaload(vm)?,
            Instruction::Baload => self.exec_baload(vm)?,
            Instruction::Caload => self.exec_caload(vm)?,
            Instruction::Saload => self.exec_saload(vm)?,
            Instruction::Iastore
            | Instruction::Bastore
            | Instruction::Castore
            | Instruction::Sastore => self.exec_int_array_store(vm)?,
            Instruction::Lastore => self.exec_lastore(vm)?,
            Instruction::Fastore => self.exec_fastore(vm)?,
            Instruction::Dastore => self.exec_dastore(vm)?,
            Instruction::Aastore => self.exec_aastore(vm)?,
            Instruction::Arraylength => {
                let array = self.pop_array(vm)?;
                let length = vm.heap().array_length(array)?;
                self.push(Int(length as i32))?;
            }
            Instruction::Newarray(primitive_type) => {
                let count = self.pop_int()?;
                let array = vm.new_array(primitive_type.type_tag(), count)?;
                self.push(ArrayRef(array))?;
            }
            Instruction::Anewarray(element_type) => self.exec_anewarray(vm, element_type)?,

            Instruction::Pop => {
                let value = self.pop()?;
                if value.is_category2() {
                    return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
                }
            }
            Instruction::Pop2 => self.op_stack.pop2()?,
            Instruction::Dup => self.op_stack.dup()?,
            Instruction::DupX1 => self.op_stack.dup_x1()?,
            Instruction::DupX2 => self.op_stack.dup_x2()?,
            Instruction::Dup2 => self.op_stack.dup2()?,
            Instruction::Dup2X1 => self.op_stack.dup2_x1()?,
            Instruction::Dup2X2 => self.op_stack.dup2_x2()?,
            Instruction::Swap => self.op_stack.swap()?,

            Instruction::Iadd => self.exec_int_math(|i1, i2| Ok(i1.wrapping_add(i2)))?,
            Instruction::Ladd => self.exec_long_math(|l1, l2| Ok(l1.wrapping_add(l2)))?,
            Instruction::Fadd => self.exec_float_math(|v1, v2| Ok(v1 + v2))?,
            Instruction::Dadd => self.exec_double_math(|v1, v2| Ok(v1 + v2))?,
            Instruction::Isub => self.exec_int_math(|i1, i2| Ok(i1.wrapping_sub(i2)))?,
            Instruction::Lsub => self.exec_long_math(|l1, l2| Ok(l1.wrapping_sub(l2)))?,
            Instruction::Fsub => self.exec_float_math(|v1, v2| Ok(v1 - v2))?,
            Instruction::Dsub => self.exec_double_math(|v1, v2| Ok(v1 - v2))?,
            Instruction::Imul => self.exec_int_math(|i1, i2| Ok(i1.wrapping_mul(i2)))?,
            Instruction::Lmul => self.exec_long_math(|l1, l2| Ok(l1.wrapping_mul(l2)))?,
            Instruction::Fmul => self.exec_float_math(|v1, v2| Ok(v1 * v2))?,
            Instruction::Dmul => self.exec_double_math(|v1, v2| Ok(v1 * v2))?,
            // i32::MIN / -1 按补码回绕
            Instruction::Idiv => self.exec_int_math(|i1, i2| match i2 {
                0 => Err(divide_by_zero(vm)),
                _ => Ok(i1.wrapping_div(i2)),
            })?,
            Instruction::Ldiv => self.exec_long_math(|l1, l2| match l2 {
                0 => Err(divide_by_zero(vm)),
                _ => Ok(l1.wrapping_div(l2)),
            })?,
            Instruction::Fdiv => self.exec_float_math(|v1, v2| Ok(v1 / v2))?,
            Instruction::Ddiv => self.exec_double_math(|v1, v2| Ok(v1 / v2))?,
            Instruction::Irem => self.exec_int_math(|i1, i2| match i2 {
                0 => Err(divide_by_zero(vm)),
                _ => Ok(i1.wrapping_rem(i2)),
            })?,
            Instruction::Lrem => self.exec_long_math(|l1, l2| match l2 {
                0 => Err(divide_by_zero(vm)),
                _ => Ok(l1.wrapping_rem(l2)),
            })?,
            Instruction::Frem => self.exec_float_math(|v1, v2| Ok(v1 % v2))?,
            Instruction::Drem => self.exec_double_math(|v1, v2| Ok(v1 % v2))?,
            Instruction::Ineg => {
                let value = self.pop_int()?;
                self.push(Int(value.wrapping_neg()))?;
            }
            Instruction::Lneg => {
                let value = self.pop_long()?;
                self.push(Long(value.wrapping_neg()))?;
            }
            Instruction::Fneg => {
                let value = self.pop_float()?;
                self.push(Float(-value))?;
            }
            Instruction::Dneg => {
                let value = self.pop_double()?;
                self.push(Double(-value))?;
            }
            //移位只取低 5 位（int）或低 6 位（long）
            Instruction::Ishl => self.exec_int_math(|i1, i2| Ok(i1.wrapping_shl(i2 as u32)))?,
            Instruction::Ishr => self.exec_int_math(|i1, i2| Ok(i1.wrapping_shr(i2 as u32)))?,
            Instruction::Iushr => {
                self.exec_int_math(|i1, i2| Ok((i1 as u32).wrapping_shr(i2 as u32) as i32))?
            }
            Instruction::Lshl => self.exec_long_shift(|l1, l2| l1.wrapping_shl(l2))?,
            Instruction::Lshr => self.exec_long_shift(|l1, l2| l1.wrapping_shr(l2))?,
            Instruction::Lushr => {
                self.exec_long_shift(|l1, l2| (l1 as u64).wrapping_shr(l2) as i64)?
            }
            Instruction::Iand => self.exec_int_math(|i1, i2| Ok(i1 & i2))?,
            Instruction::Land => self.exec_long_math(|l1, l2| Ok(l1 & l2))?,
            Instruction::Ior => self.exec_int_math(|i1, i2| Ok(i1 | i2))?,
            Instruction::Lor => self.exec_long_math(|l1, l2| Ok(l1 | l2))?,
            Instruction::Ixor => self.exec_int_math(|i1, i2| Ok(i1 ^ i2))?,
            Instruction::Lxor => self.exec_long_math(|l1, l2| Ok(l1 ^ l2))?,

            Instruction::I2l => self.exec_i2l()?,
            Instruction::I2f => self.exec_i2f()?,
            Instruction::I2d => self.exec_i2d()?,
            Instruction::L2i => self.exec_l2i()?,
            Instruction::L2f => self.exec_l2f()?,
            Instruction::L2d => self.exec_l2d()?,
            Instruction::F2i => self.exec_f2i()?,
            Instruction::F2l => self.exec_f2l()?,
            Instruction::F2d => self.exec_f2d()?,
            Instruction::D2i => self.exec_d2i()?,
            Instruction::D2l => self.exec_d2l()?,
            Instruction::D2f => self.exec_d2f()?,
            Instruction::I2b => self.exec_i2b()?,
            Instruction::I2c => self.exec_i2c()?,
            Instruction::I2s => self.exec_i2s()?,

            Instruction::Lcmp => self.exec_lcmp(0)?,
            Instruction::Fcmpl => self.exec_fcmp(-1)?,
            Instruction::Fcmpg => self.exec_fcmp(1)?,
            Instruction::Dcmpl => self.exec_dcmp(-1)?,
            Instruction::Dcmpg => self.exec_dcmp(1)?,

            Instruction::Ifeq(target) => self.exec_if(*target, |i1| i1 == 0)?,
            Instruction::Ifne(target) => self.exec_if(*target, |i1| i1 != 0)?,
            Instruction::Iflt(target) => self.exec_if(*target, |i1| i1 < 0)?,
            Instruction::Ifge(target) => self.exec_if(*target, |i1| i1 >= 0)?,
            Instruction::Ifgt(target) => self.exec_if(*target, |i1| i1 > 0)?,
            Instruction::Ifle(target) => self.exec_if(*target, |i1| i1 <= 0)?,
            Instruction::IfIcmpeq(target) => self.exec_if_icmp(*target, |i1, i2| i1 == i2)?,
            Instruction::IfIcmpne(target) => self.exec_if_icmp(*target, |i1, i2| i1 != i2)?,
            Instruction::IfIcmplt(target) => self.exec_if_icmp(*target, |i1, i2| i1 < i2)?,
            Instruction::IfIcmpge(target) => self.exec_if_icmp(*target, |i1, i2| i1 >= i2)?,
            Instruction::IfIcmpgt(target) => self.exec_if_icmp(*target, |i1, i2| i1 > i2)?,
            Instruction::IfIcmple(target) => self.exec_if_icmp(*target, |i1, i2| i1 <= i2)?,
            Instruction::IfAcmpeq(target) => self.exec_if_acmp(*target, |a1, a2| a1 == a2)?,
            Instruction::IfAcmpne(target) => self.exec_if_acmp(*target, |a1, a2| a1 != a2)?,
            Instruction::Ifnull(target) => {
                if let Null = self.pop_reference_or_null()? {
                    self.goto(*target);
                }
            }
            Instruction::Ifnonnull(target) => {
                if Null != self.pop_reference_or_null()? {
                    self.goto(*target);
                }
            }
            Instruction::Goto(target) => self.goto(*target),
            Instruction::Tableswitch(table) => self.exec_switch(&**table)?,
            Instruction::Lookupswitch(table) => self.exec_switch(&**table)?,

            Instruction::Getstatic(field) => self.exec_get_static(vm, field)?,
            Instruction::Putstatic(field) => self.exec_put_static(vm, field)?,
            Instruction::Getfield(field) => self.exec_get_field(vm, field)?,
            Instruction::Putfield(field) => self.exec_put_field(vm, field)?,
            Instruction::Invokevirtual(method) => return self.exec_invoke_virtual(vm, method),
            Instruction::Invokespecial(method) => return self.exec_invoke_special(vm, method),
            Instruction::Invokestatic(method) => return self.exec_invoke_static(vm, method),
            Instruction::Invokeinterface(method) => return self.exec_invoke_interface(vm, method),
            Instruction::New(class_name) => {
                let resolved =
                    self.resolve(|| Ok(ResolvedRef::Class(vm.resolve_class(class_name)?)))?;
                let class_ref = match resolved {
                    ResolvedRef::Class(class_ref) => class_ref,
                    _ => return Err(self.resolution_mismatch()),
                };
                vm.initialize_class(class_ref)?;
                let object = vm.new_object(class_ref)?;
                self.push(ObjectRef(object))?;
            }
            Instruction::Checkcast(type_tag) => {
                let value = self.pop_reference_or_null()?;
                if value != Null && !vm.is_instance_of(value, type_tag)? {
                    let message = format!(
                        "{} cannot be cast to {}",
                        vm.type_name_of(value)?,
                        type_tag
                    );
                    return Err(vm.throw_new(CLASS_CAST_EXCEPTION, Some(message)));
                }
                self.push(value)?;
            }
            Instruction::Instanceof(type_tag) => {
                let value = self.pop_reference_or_null()?;
                let result = vm.is_instance_of(value, type_tag)?;
                self.push(Int(result as i32))?;
            }
            Instruction::Athrow => return self.exec_athrow(vm),

            Instruction::Ireturn => return self.exec_ireturn(),
            Instruction::Lreturn => return self.exec_lreturn(),
            Instruction::Freturn => return self.exec_freturn(),
            Instruction::Dreturn => return self.exec_dreturn(),
            Instruction::Areturn => return self.exec_areturn(),
            Instruction::Return => return Ok(InstructionResult::ReturnFromMethod(None)),
        }
        Ok(InstructionResult::ContinueMethodExecution)
    }

    fn exec_anewarray(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        element_type: &TypeTag,
    ) -> InvokeResult<()> {
        let count = self.pop_int()?;
        if let TypeTag::Reference(class_name) = element_type {
            vm.resolve_class(class_name)?;
        }
        let array = vm.new_array(element_type.clone(), count)?;
        self.push(ArrayRef(array))
    }

    fn exec_athrow(&mut self, vm: &mut VirtualMachine<'a>) -> InvokeResult<InstructionResult<'a>> {
        let exception = self.pop_object(vm)?;
        if !vm.is_throwable(vm.heap().get_class(exception)?) {
            return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
        }
        Err(MethodCallError::ExceptionThrown(exception))
    }

    /// 本条指令的符号引用，第一次执行时解析
    fn resolve<F>(&self, resolver: F) -> InvokeResult<ResolvedRef<'a>>
    where
        F: FnOnce() -> InvokeResult<ResolvedRef<'a>>,
    {
        self.method_ref.constant_pool.resolve(self.pc, resolver)
    }

    fn resolution_mismatch(&self) -> MethodCallError {
        MethodCallError::InternalError(VmError::ExecuteCodeError(format!(
            "{}.{} resolved an unexpected reference at {}",
            self.class_ref.name, self.method_ref, self.pc
        )))
    }

    fn resolve_instance_field(
        &self,
        vm: &mut VirtualMachine<'a>,
        field: &instruction::FieldRef,
    ) -> InvokeResult<FieldRef<'a>> {
        let resolved =
            self.resolve(|| Ok(ResolvedRef::InstanceField(vm.resolve_instance_field(field)?)))?;
        match resolved {
            ResolvedRef::InstanceField(field_ref) => Ok(field_ref),
            _ => Err(self.resolution_mismatch()),
        }
    }

    /// 每次执行都要确认声明该字段的类已经初始化
    fn resolve_static_field(
        &self,
        vm: &mut VirtualMachine<'a>,
        field: &instruction::FieldRef,
    ) -> InvokeResult<(ClassRef<'a>, FieldRef<'a>)> {
        let resolved = self.resolve(|| {
            let (class_ref, field_ref) = vm.resolve_static_field(field)?;
            Ok(ResolvedRef::StaticField(class_ref, field_ref))
        })?;
        match resolved {
            ResolvedRef::StaticField(class_ref, field_ref) => {
                vm.initialize_class(class_ref)?;
                Ok((class_ref, field_ref))
            }
            _ => Err(self.resolution_mismatch()),
        }
    }

    fn exec_get_field(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        field: &instruction::FieldRef,
    ) -> InvokeResult<()> {
        let object = self.pop_object(vm)?;
        let field_ref = self.resolve_instance_field(vm, field)?;
        let value = vm.heap().get_field(object, field_ref.slot)?;
        self.push(value)
    }

    fn exec_put_field(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        field: &instruction::FieldRef,
    ) -> InvokeResult<()> {
        let value = self.pop()?;
        let object = self.pop_object(vm)?;
        let field_ref = self.resolve_instance_field(vm, field)?;
        if !value.matches_type(&field_ref.type_tag) {
            return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
        }
        vm.heap_mut().set_field(object, field_ref.slot, value)?;
        Ok(())
    }

    fn exec_get_static(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        field: &instruction::FieldRef,
    ) -> InvokeResult<()> {
        let (class_ref, field_ref) = self.resolve_static_field(vm, field)?;
        let value = vm.get_static(class_ref, field_ref.slot)?;
        self.push(value)
    }

    fn exec_put_static(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        field: &instruction::FieldRef,
    ) -> InvokeResult<()> {
        let value = self.pop()?;
        let (class_ref, field_ref) = self.resolve_static_field(vm, field)?;
        if !value.matches_type(&field_ref.type_tag) {
            return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
        }
        vm.put_static(class_ref, field_ref.slot, value)?;
        Ok(())
    }

    /// 弹出实参与接收者，接收者放在实参之前
    fn pop_receiver_and_args(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        parameter_count: usize,
    ) -> InvokeResult<Vec<Value>> {
        let args = self.pop_n(parameter_count)?;
        let receiver = self.pop_reference_or_null()?;
        if receiver == Null {
            return Err(vm.throw_new(NULL_POINTER_EXCEPTION, None));
        }
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(receiver);
        values.extend(args);
        Ok(values)
    }

    fn exec_invoke_static(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        method: &instruction::MethodRef,
    ) -> InvokeResult<InstructionResult<'a>> {
        let resolved = self.resolve(|| {
            let class_ref = vm.resolve_class(&method.class)?;
            let (class_ref, method_ref) = find_method(vm, class_ref, method)?;
            if !method_ref.is_static() {
                let message = format!("Expected static method {}", method);
                return Err(vm.throw_new(INCOMPATIBLE_CLASS_CHANGE_ERROR, Some(message)));
            }
            Ok(ResolvedRef::Method(class_ref, method_ref))
        })?;
        let (class_ref, method_ref) = match resolved {
            ResolvedRef::Method(class_ref, method_ref) => (class_ref, method_ref),
            _ => return Err(self.resolution_mismatch()),
        };
        vm.initialize_class(class_ref)?;
        let args = self.pop_n(method_ref.signature.parameters.len())?;
        Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args))
    }

    /// 构造方法、私有方法与 super 调用：按符号引用中的类精确查找，不看接收者的运行时类型
    fn exec_invoke_special(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        method: &instruction::MethodRef,
    ) -> InvokeResult<InstructionResult<'a>> {
        let resolved = self.resolve(|| {
            let class_ref = vm.resolve_class(&method.class)?;
            let (class_ref, method_ref) = find_method(vm, class_ref, method)?;
            if method_ref.is_static() {
                let message = format!("Expecting non-static method {}", method);
                return Err(vm.throw_new(INCOMPATIBLE_CLASS_CHANGE_ERROR, Some(message)));
            }
            Ok(ResolvedRef::Method(class_ref, method_ref))
        })?;
        let (class_ref, method_ref) = match resolved {
            ResolvedRef::Method(class_ref, method_ref) => (class_ref, method_ref),
            _ => return Err(self.resolution_mismatch()),
        };
        let args = self.pop_receiver_and_args(vm, method_ref.signature.parameters.len())?;
        Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args))
    }

    fn exec_invoke_virtual(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        method: &instruction::MethodRef,
    ) -> InvokeResult<InstructionResult<'a>> {
        let resolved = self.resolve(|| {
            let static_class = vm.resolve_class(&method.class)?;
            if static_class.is_interface() {
                let message = format!("Found interface {}, but class was expected", static_class.name);
                return Err(vm.throw_new(INCOMPATIBLE_CLASS_CHANGE_ERROR, Some(message)));
            }
            let (class_ref, method_ref) = find_method(vm, static_class, method)?;
            //私有方法不在虚方法表中，直接调用解析到的方法
            Ok(
                match static_class.vtable_index(&method.name, &method.descriptor) {
                    Some(index) => ResolvedRef::VirtualMethod {
                        class_ref: static_class,
                        index,
                        parameter_count: method_ref.signature.parameters.len(),
                    },
                    None => ResolvedRef::Method(class_ref, method_ref),
                },
            )
        })?;
        match resolved {
            ResolvedRef::VirtualMethod {
                class_ref: static_class,
                index,
                parameter_count,
            } => {
                let args = self.pop_receiver_and_args(vm, parameter_count)?;
                let receiver_class = vm.class_of(args[0])?;
                if !receiver_class.is_subclass_of(static_class) {
                    return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
                }
                match receiver_class.virtual_method_at(index) {
                    Some((class_ref, method_ref)) => {
                        Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args))
                    }
                    None => Err(no_such_method(vm, method)),
                }
            }
            ResolvedRef::Method(class_ref, method_ref) => {
                let args = self.pop_receiver_and_args(vm, method_ref.signature.parameters.len())?;
                Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args))
            }
            _ => Err(self.resolution_mismatch()),
        }
    }

    fn exec_invoke_interface(
        &mut self,
        vm: &mut VirtualMachine<'a>,
        method: &instruction::MethodRef,
    ) -> InvokeResult<InstructionResult<'a>> {
        let resolved = self.resolve(|| {
            let interface = vm.resolve_class(&method.class)?;
            if !interface.is_interface() {
                let message = format!("Found class {}, but interface was expected", interface.name);
                return Err(vm.throw_new(INCOMPATIBLE_CLASS_CHANGE_ERROR, Some(message)));
            }
            let (class_ref, method_ref) = find_method(vm, interface, method)?;
            Ok(
                match interface.vtable_index(&method.name, &method.descriptor) {
                    Some(index) => ResolvedRef::InterfaceMethod {
                        interface,
                        index,
                        parameter_count: method_ref.signature.parameters.len(),
                    },
                    None => ResolvedRef::Method(class_ref, method_ref),
                },
            )
        })?;
        match resolved {
            ResolvedRef::InterfaceMethod {
                interface,
                index,
                parameter_count,
            } => {
                let args = self.pop_receiver_and_args(vm, parameter_count)?;
                let receiver_class = vm.class_of(args[0])?;
                if !receiver_class.is_assignable_to(interface) {
                    let message = format!(
                        "{} does not implement {}",
                        receiver_class.name, interface.name
                    );
                    return Err(vm.throw_new(INCOMPATIBLE_CLASS_CHANGE_ERROR, Some(message)));
                }
                match receiver_class.interface_method_at(interface, index) {
                    Some((class_ref, method_ref)) => {
                        Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args))
                    }
                    None => Err(no_such_method(vm, method)),
                }
            }
            ResolvedRef::Method(class_ref, method_ref) => {
                let args = self.pop_receiver_and_args(vm, method_ref.signature.parameters.len())?;
                Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args))
            }
            _ => Err(self.resolution_mismatch()),
        }
    }

    /// 在异常表中按声明顺序查找第一个覆盖 pc 且类型匹配的处理器
    fn find_handler(
        &self,
        vm: &VirtualMachine<'a>,
        exception: ObjectReference,
    ) -> VmExecResult<Option<&'a ExceptionRange>> {
        let exception_class = vm.heap().get_class(exception)?;
        let code = self.code;
        let handler = code.exception_table.iter().find(|range| {
            range.covers(self.pc)
                && match &range.catch_type {
                    None => true,
                    Some(catch_type) => vm
                        .get_class(catch_type)
                        .map_or(false, |catch_class| exception_class.is_assignable_to(catch_class)),
                }
        });
        Ok(handler)
    }

    fn transition(&mut self, state: FrameState) {
        trace!(
            "{}.{} @{}: {:?} -> {:?}",
            self.class_ref.name,
            self.method_ref,
            self.pc,
            self.state,
            state
        );
        self.state = state;
    }

    /// 执行方法体，直到发起方法调用、返回，或者异常逃出本栈帧。
    /// 发起调用后栈帧停在调用指令上，由 [`StackFrame::resume`] 继续
    pub(crate) fn execute(&mut self, vm: &mut VirtualMachine<'a>) -> VmExecResult<FrameEvent<'a>> {
        loop {
            match self.state {
                FrameState::Running => {
                    vm.set_current_pc(self.pc);
                    let code = self.code;
                    let instruction = code.instructions.get(self.pc).ok_or_else(|| {
                        VmError::ExecuteCodeError(format!(
                            "{}.{} runs off the end of its code at {}",
                            self.class_ref.name, self.method_ref, self.pc
                        ))
                    })?;
                    self.next_pc = self.pc + 1;
                    match self.execute_instruction(vm, instruction) {
                        Ok(InstructionResult::ContinueMethodExecution) => self.pc = self.next_pc,
                        Ok(InstructionResult::ReturnFromMethod(value)) => {
                            self.transition(FrameState::Terminated);
                            return Ok(FrameEvent::Complete(Completion::Return(value)));
                        }
                        Ok(InstructionResult::InvokeMethod(class_ref, method_ref, args)) => {
                            return Ok(FrameEvent::Invoke {
                                class_ref,
                                method_ref,
                                args,
                            })
                        }
                        Err(MethodCallError::ExceptionThrown(exception)) => {
                            self.transition(FrameState::Unwinding(exception))
                        }
                        Err(MethodCallError::InternalError(e)) => return Err(e),
                    }
                }
                FrameState::Unwinding(exception) => match self.find_handler(vm, exception)? {
                    Some(range) => {
                        debug!(
                            "exception@{} caught in {}.{} at {} -> {}",
                            exception.0, self.class_ref.name, self.method_ref, self.pc, range.handler
                        );
                        self.transition(FrameState::Handled {
                            exception,
                            handler: range.handler,
                        })
                    }
                    None => self.transition(FrameState::Propagating(exception)),
                },
                FrameState::Handled { exception, handler } => {
                    self.op_stack.clear();
                    self.op_stack.push(ObjectRef(exception))?;
                    self.pc = handler;
                    self.transition(FrameState::Running);
                }
                FrameState::Propagating(exception) => {
                    debug!(
                        "exception@{} propagates out of {}.{}",
                        exception.0, self.class_ref.name, self.method_ref
                    );
                    self.transition(FrameState::Terminated);
                    return Ok(FrameEvent::Complete(Completion::Throw(exception)));
                }
                FrameState::Terminated => {
                    return Err(VmError::ExecuteCodeError(format!(
                        "{}.{} has already completed",
                        self.class_ref.name, self.method_ref
                    )))
                }
            }
        }
    }

    /// 被调用的方法结束后继续执行：返回值压栈并前进到下一条指令，
    /// 异常则从调用指令处开始查找处理器
    pub(crate) fn resume(&mut self, completion: Completion) -> VmExecResult<()> {
        if self.state != FrameState::Running {
            return Err(VmError::ExecuteCodeError(format!(
                "{}.{} is not waiting for a call",
                self.class_ref.name, self.method_ref
            )));
        }
        match completion {
            Completion::Return(value) => {
                if let Some(value) = value {
                    self.op_stack.push(value)?;
                }
                self.pc = self.next_pc;
            }
            Completion::Throw(exception) => self.transition(FrameState::Unwinding(exception)),
        }
        Ok(())
    }
}

fn divide_by_zero(vm: &mut VirtualMachine) -> MethodCallError {
    vm.throw_new(ARITHMETIC_EXCEPTION, Some("/ by zero".to_string()))
}

fn no_such_method(vm: &mut VirtualMachine, method: &instruction::MethodRef) -> MethodCallError {
    vm.throw_new(NO_SUCH_METHOD_ERROR, Some(method.to_string()))
}

/// 从符号引用中的类开始查找方法（父类链，然后是接口）
fn find_method<'a>(
    vm: &mut VirtualMachine<'a>,
    class_ref: ClassRef<'a>,
    method: &instruction::MethodRef,
) -> InvokeResult<(ClassRef<'a>, MethodRef<'a>)> {
    match class_ref.find_method(&method.name, &method.descriptor) {
        Some(found) => Ok(found),
        None => Err(no_such_method(vm, method)),
    }
}
