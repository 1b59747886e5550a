use crate::java_exception::{
    Completion, InvokeMethodResult, MethodCallError, RunError, UncaughtException,
};
use crate::jvm_error::{VmError, VmExecResult};
use crate::jvm_exceptions::{
    ABSTRACT_METHOD_ERROR, INSTANTIATION_ERROR, JAVA_LANG_OBJECT, JAVA_LANG_THROWABLE,
    NEGATIVE_ARRAY_SIZE_EXCEPTION,
    NO_CLASS_DEF_FOUND_ERROR, NO_SUCH_FIELD_ERROR, NO_SUCH_METHOD_ERROR, NULL_POINTER_EXCEPTION,
    OUT_OF_MEMORY_ERROR, STACK_OVERFLOW_ERROR, UNSATISFIED_LINK_ERROR,
};
use crate::jvm_values::{ArrayReference, ObjectReference, Value};
use crate::loaded_class::{Class, ClassRef, ClassStatus, FieldRef, MethodRef};
use crate::method_area::MethodArea;
use crate::native_method_area::{NativeMethod, NativeMethodArea};
use crate::object_heap::{ObjectHeap, ThrowableInfo};
use crate::stack::CallStack;
use crate::stack_frame::{FrameEvent, StackFrame};
use crate::static_field_area::StaticArea;
use class_model::class_descriptor::ClassDescriptor;
use class_model::instruction::{self, CodeIndex};
use class_model::type_descriptor::TypeTag;
use log::{debug, error, info, log_enabled, Level};
use typed_arena::Arena;

enum MethodEntry<'a> {
    Frame(StackFrame<'a>),
    //native 方法已经执行完
    Completed(Option<Value>),
}

/// 虚拟机的运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// 调用深度超过该值时抛出 StackOverflowError
    pub max_call_depth: usize,
    /// 堆中对象（实例与数组）的最大个数，超出后抛出 OutOfMemoryError
    pub heap_capacity: usize,
    /// 单个栈帧操作数栈的上限，与方法自身的 max_stack 取较小值
    pub max_operand_stack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: 1024,
            heap_capacity: 1 << 20,
            max_operand_stack: u16::MAX as usize,
        }
    }
}

/// 虚拟机实现。虚拟机是总入口
///
/// 启动时由引导类加载器预置 `java/lang/Object` 与异常类，
/// 然后一次性加载程序给出的全部类描述。类在首次主动使用时初始化：
/// `new`、`getstatic`/`putstatic`、`invokestatic` 以及作为入口被调用。
///
/// https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-5.html#jvms-5.5
///
/// 解释执行的方法调用不占用 Rust 调用栈：[`VirtualMachine::invoke_method`] 在一个循环里驱动栈帧，
/// 调用指令压入新栈帧，返回或抛出异常时弹出并把结果交给调用者。
/// 只有 `<clinit>` 与 native 方法中的调用会进入新的循环。
/// `call_stack` 记录活动方法与 pc，用于创建异常时填写调用栈
pub struct VirtualMachine<'a> {
    method_area: MethodArea<'a>,
    throwable_class: ClassRef<'a>,
    object_heap: ObjectHeap<'a>,
    static_area: StaticArea<'a>,
    native_method_area: NativeMethodArea<'a>,
    call_stack: CallStack<'a>,
    config: VmConfig,
}

impl<'a> VirtualMachine<'a> {
    pub fn new(
        arena: &'a Arena<Class<'a>>,
        descriptors: Vec<ClassDescriptor>,
    ) -> VmExecResult<VirtualMachine<'a>> {
        Self::with_config(arena, descriptors, VmConfig::default())
    }

    pub fn with_config(
        arena: &'a Arena<Class<'a>>,
        descriptors: Vec<ClassDescriptor>,
        config: VmConfig,
    ) -> VmExecResult<VirtualMachine<'a>> {
        let method_area = MethodArea::load(arena, descriptors)?;
        let throwable_class = method_area
            .get_class(JAVA_LANG_THROWABLE)
            .ok_or_else(|| VmError::ClassNotFound(JAVA_LANG_THROWABLE.to_string()))?;
        Ok(VirtualMachine {
            method_area,
            throwable_class,
            object_heap: ObjectHeap::new(config.heap_capacity),
            static_area: StaticArea::new(),
            native_method_area: NativeMethodArea::new_with_default_native(),
            call_stack: CallStack::new(),
            config,
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn heap(&self) -> &ObjectHeap<'a> {
        &self.object_heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap<'a> {
        &mut self.object_heap
    }

    pub fn method_area(&self) -> &MethodArea<'a> {
        &self.method_area
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    pub(crate) fn set_current_pc(&mut self, pc: CodeIndex) {
        self.call_stack.set_pc(pc);
    }

    pub fn registry_native_method(
        &mut self,
        class_name: &str,
        method_name: &str,
        method_descriptor: &str,
        method: NativeMethod<'a>,
    ) {
        self.native_method_area.registry_native_method(
            class_name,
            method_name,
            method_descriptor,
            method,
        );
    }

    /// 只查表，不触发初始化
    pub fn get_class(&self, class_name: &str) -> Option<ClassRef<'a>> {
        self.method_area.get_class(class_name)
    }

    /// 解析符号引用中的类，不存在时抛出 NoClassDefFoundError
    pub fn resolve_class(&mut self, class_name: &str) -> Result<ClassRef<'a>, MethodCallError> {
        match self.method_area.get_class(class_name) {
            Some(class_ref) => Ok(class_ref),
            None => Err(self.throw_new(NO_CLASS_DEF_FOUND_ERROR, Some(class_name.to_string()))),
        }
    }

    /// 类的初始化。先准备静态字段，再初始化父类，最后执行 `<clinit>`。
    ///
    /// 正在初始化的类再次被触发时直接返回，视为已经初始化；
    /// `<clinit>` 抛出异常后类进入 Erroneous 状态，之后的使用都抛出 NoClassDefFoundError
    pub fn initialize_class(&mut self, class_ref: ClassRef<'a>) -> Result<(), MethodCallError> {
        match class_ref.status() {
            ClassStatus::Initialized | ClassStatus::Initializing => return Ok(()),
            ClassStatus::Erroneous => {
                let message = format!("Could not initialize class {}", class_ref.name);
                return Err(self.throw_new(NO_CLASS_DEF_FOUND_ERROR, Some(message)));
            }
            ClassStatus::Loaded => {}
        }
        class_ref.set_status(ClassStatus::Initializing);
        let result = self.do_initialize(class_ref);
        match &result {
            Ok(()) => {
                class_ref.set_status(ClassStatus::Initialized);
                info!("initialized class {}", class_ref.name);
            }
            Err(_) => {
                class_ref.set_status(ClassStatus::Erroneous);
                debug!("initialization of {} failed", class_ref.name);
            }
        }
        result
    }

    fn do_initialize(&mut self, class_ref: ClassRef<'a>) -> Result<(), MethodCallError> {
        self.static_area.prepare(class_ref);
        if !class_ref.is_interface() {
            if let Some(super_class) = class_ref.super_class {
                self.initialize_class(super_class)?;
            }
        }
        if let Some(method_ref) = class_ref.get_method("<clinit>", "()V") {
            self.invoke_method(class_ref, method_ref, Vec::new())?;
        }
        Ok(())
    }

    /// 静态字段解析：本类、接口、父类依次查找。不触发初始化，由使用者初始化声明该字段的类
    pub fn resolve_static_field(
        &mut self,
        field: &instruction::FieldRef,
    ) -> Result<(ClassRef<'a>, FieldRef<'a>), MethodCallError> {
        let class_ref = self.resolve_class(&field.class)?;
        match class_ref.resolve_static_field(&field.name) {
            Some((declaring_class, field_ref)) if field_ref.descriptor == field.descriptor => {
                Ok((declaring_class, field_ref))
            }
            _ => Err(self.throw_new(NO_SUCH_FIELD_ERROR, Some(field.to_string()))),
        }
    }

    /// 实例字段解析：从符号引用中的类向上查找，子类中同名字段不影响父类的槽位
    pub fn resolve_instance_field(
        &mut self,
        field: &instruction::FieldRef,
    ) -> Result<FieldRef<'a>, MethodCallError> {
        let class_ref = self.resolve_class(&field.class)?;
        match class_ref.resolve_instance_field(&field.name) {
            Some((_, field_ref)) if field_ref.descriptor == field.descriptor => Ok(field_ref),
            _ => Err(self.throw_new(NO_SUCH_FIELD_ERROR, Some(field.to_string()))),
        }
    }

    pub fn get_static(&self, class_ref: ClassRef<'a>, slot: usize) -> VmExecResult<Value> {
        self.static_area.get_static_field(class_ref, slot)
    }

    pub fn put_static(&mut self, class_ref: ClassRef<'a>, slot: usize, value: Value) -> VmExecResult<()> {
        self.static_area.set_static_field(class_ref, slot, value)
    }

    /// 按名称读取静态字段，会触发类的初始化
    pub fn get_static_by_name(
        &mut self,
        class_name: &str,
        field_name: &str,
    ) -> Result<Value, MethodCallError> {
        let class_ref = self.resolve_class(class_name)?;
        let (declaring_class, field_ref) = match class_ref.resolve_static_field(field_name) {
            Some(found) => found,
            None => {
                let message = format!("{}.{}", class_name, field_name);
                return Err(self.throw_new(NO_SUCH_FIELD_ERROR, Some(message)));
            }
        };
        self.initialize_class(declaring_class)?;
        Ok(self.get_static(declaring_class, field_ref.slot)?)
    }

    /// 所有字段置为默认值。抽象类与接口不能实例化；Throwable 对象记录当前调用栈
    pub fn new_object(&mut self, class_ref: ClassRef<'a>) -> Result<ObjectReference, MethodCallError> {
        if class_ref.is_abstract() || class_ref.is_interface() {
            return Err(self.throw_new(INSTANTIATION_ERROR, Some(class_ref.name.clone())));
        }
        let object = match self.object_heap.allocate_object(class_ref) {
            Some(object) => object,
            None => return Err(self.out_of_memory()),
        };
        if self.is_throwable(class_ref) {
            let info = ThrowableInfo {
                message: None,
                stack_trace: self.call_stack.stack_trace(),
            };
            self.object_heap.set_throwable_info(object, info);
        }
        Ok(object)
    }

    pub fn new_array(
        &mut self,
        element_type: TypeTag,
        length: i32,
    ) -> Result<ArrayReference, MethodCallError> {
        if length < 0 {
            return Err(self.throw_new(NEGATIVE_ARRAY_SIZE_EXCEPTION, Some(length.to_string())));
        }
        match self.object_heap.allocate_array(element_type, length as usize) {
            Some(array) => Ok(array),
            None => Err(self.out_of_memory()),
        }
    }

    fn out_of_memory(&mut self) -> MethodCallError {
        let message = format!("heap capacity {} exhausted", self.config.heap_capacity);
        self.throw_new(OUT_OF_MEMORY_ERROR, Some(message))
    }

    /// 创建一个虚拟机自身抛出的异常对象。
    /// 返回值直接作为指令的错误结果，类不存在时是内部错误
    pub fn throw_new(&mut self, class_name: &str, message: Option<String>) -> MethodCallError {
        let class_ref = match self.method_area.get_class(class_name) {
            Some(class_ref) => class_ref,
            None => return MethodCallError::InternalError(VmError::ClassNotFound(class_name.to_string())),
        };
        debug!(
            "throw {}{}",
            class_name,
            message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
        );
        let info = ThrowableInfo {
            message,
            stack_trace: self.call_stack.stack_trace(),
        };
        MethodCallError::ExceptionThrown(self.object_heap.allocate_throwable(class_ref, info))
    }

    pub fn is_throwable(&self, class_ref: ClassRef<'a>) -> bool {
        class_ref.is_subclass_of(self.throwable_class)
    }

    /// 引用值的运行时类，数组视为 `java/lang/Object`
    pub fn class_of(&mut self, value: Value) -> Result<ClassRef<'a>, MethodCallError> {
        match value {
            Value::ObjectRef(object) => Ok(self.object_heap.get_class(object)?),
            Value::ArrayRef(_) => self
                .method_area
                .get_class(JAVA_LANG_OBJECT)
                .ok_or_else(|| VmError::ClassNotFound(JAVA_LANG_OBJECT.to_string()).into()),
            Value::Null => Err(self.throw_new(NULL_POINTER_EXCEPTION, None)),
            _ => Err(VmError::ValueTypeMismatch.into()),
        }
    }

    /// 用于异常信息的类型名
    pub fn type_name_of(&self, value: Value) -> VmExecResult<String> {
        match value {
            Value::ObjectRef(object) => Ok(self.object_heap.get_class(object)?.name.clone()),
            Value::ArrayRef(array) => Ok(format!("[{}", self.object_heap.array_element_type(array)?)),
            Value::Null => Ok("null".to_string()),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    /// `instanceof` 的语义：null 不是任何类型的实例
    pub fn is_instance_of(&self, value: Value, target: &TypeTag) -> VmExecResult<bool> {
        match value {
            Value::Null => Ok(false),
            Value::ObjectRef(object) => {
                let class_ref = self.object_heap.get_class(object)?;
                Ok(match target {
                    TypeTag::Reference(name) => self
                        .method_area
                        .get_class(name)
                        .map_or(false, |target_class| class_ref.is_assignable_to(target_class)),
                    _ => false,
                })
            }
            Value::ArrayRef(array) => {
                let element_type = self.object_heap.array_element_type(array)?;
                Ok(self.is_type_assignable(&TypeTag::Array(Box::new(element_type.clone())), target))
            }
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    /// 引用类型之间的赋值兼容：数组可以赋给 Object，
    /// 引用类型数组之间按元素类型递归判断，基本类型数组要求元素类型相同
    pub fn is_type_assignable(&self, from: &TypeTag, to: &TypeTag) -> bool {
        match (from, to) {
            (_, TypeTag::Reference(name)) if name == JAVA_LANG_OBJECT => from.is_reference(),
            (TypeTag::Reference(from_name), TypeTag::Reference(to_name)) => {
                match (
                    self.method_area.get_class(from_name),
                    self.method_area.get_class(to_name),
                ) {
                    (Some(from_class), Some(to_class)) => from_class.is_assignable_to(to_class),
                    _ => false,
                }
            }
            (TypeTag::Array(from_element), TypeTag::Array(to_element)) => {
                if from_element.is_reference() && to_element.is_reference() {
                    self.is_type_assignable(from_element, to_element)
                } else {
                    from_element == to_element
                }
            }
            _ => false,
        }
    }

    /// 调用一个已经解析好的方法。`args` 中实例方法的接收者在最前面
    pub fn invoke_method(
        &mut self,
        class_ref: ClassRef<'a>,
        method_ref: MethodRef<'a>,
        args: Vec<Value>,
    ) -> InvokeMethodResult {
        let base_depth = self.call_stack.depth();
        let frame = match self.enter_method(class_ref, method_ref, args)? {
            MethodEntry::Frame(frame) => frame,
            MethodEntry::Completed(value) => return Ok(value),
        };
        let result = self.run_frames(frame);
        self.call_stack.truncate(base_depth);
        result
    }

    /// 栈帧循环。栈顶栈帧发起调用时压入被调用者的栈帧；
    /// 栈帧结束时弹出，返回值或异常交给下面的调用者，直到入口栈帧结束
    fn run_frames(&mut self, entry: StackFrame<'a>) -> InvokeMethodResult {
        let mut frames = vec![entry];
        loop {
            let event = match frames.last_mut() {
                Some(frame) => frame.execute(self)?,
                None => return Err(VmError::ExecuteCodeError("no active frame".to_string()).into()),
            };
            let completion = match event {
                FrameEvent::Invoke {
                    class_ref,
                    method_ref,
                    args,
                } => match self.enter_method(class_ref, method_ref, args) {
                    Ok(MethodEntry::Frame(callee)) => {
                        frames.push(callee);
                        continue;
                    }
                    Ok(MethodEntry::Completed(value)) => Completion::Return(value),
                    Err(MethodCallError::ExceptionThrown(exception)) => Completion::Throw(exception),
                    Err(MethodCallError::InternalError(e)) => return Err(e.into()),
                },
                FrameEvent::Complete(completion) => {
                    frames.pop();
                    self.call_stack.pop_frame();
                    if frames.is_empty() {
                        return completion.into_result();
                    }
                    completion
                }
            };
            if let Some(caller) = frames.last_mut() {
                caller.resume(completion)?;
            }
        }
    }

    /// 进入一个方法：native 方法直接执行完，解释执行的方法返回新栈帧
    fn enter_method(
        &mut self,
        class_ref: ClassRef<'a>,
        method_ref: MethodRef<'a>,
        args: Vec<Value>,
    ) -> Result<MethodEntry<'a>, MethodCallError> {
        if self.call_stack.depth() >= self.config.max_call_depth {
            return Err(self.throw_new(STACK_OVERFLOW_ERROR, None));
        }
        if log_enabled!(Level::Debug) {
            let depth = "\t".repeat(self.call_stack.depth());
            debug!(
                "{}=> invoke_method {}:{}{} {:?}",
                depth, class_ref.name, method_ref.name, method_ref.descriptor, args
            );
        }
        if method_ref.is_native() {
            let value = self.invoke_native_method(class_ref, method_ref, args)?;
            return Ok(MethodEntry::Completed(value));
        }
        if method_ref.is_abstract() {
            let message = format!("{}.{}", class_ref.name, method_ref);
            return Err(self.throw_new(ABSTRACT_METHOD_ERROR, Some(message)));
        }
        let frame = StackFrame::new(class_ref, method_ref, args, self.config.max_operand_stack)?;
        self.call_stack.push_frame(class_ref, method_ref);
        Ok(MethodEntry::Frame(frame))
    }

    fn invoke_native_method(
        &mut self,
        class_ref: ClassRef<'a>,
        method_ref: MethodRef<'a>,
        args: Vec<Value>,
    ) -> InvokeMethodResult {
        let native_method = match self.native_method_area.get_method(
            &class_ref.name,
            &method_ref.name,
            &method_ref.descriptor,
        ) {
            Some(native_method) => native_method,
            None => {
                let message = format!("{}.{}", class_ref.name, method_ref);
                return Err(self.throw_new(UNSATISFIED_LINK_ERROR, Some(message)));
            }
        };
        let parameters = &method_ref.signature.parameters;
        let receiver = usize::from(!method_ref.is_static());
        if args.len() != parameters.len() + receiver
            || !args[receiver..]
                .iter()
                .zip(parameters)
                .all(|(value, tag)| value.matches_type(tag))
        {
            return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
        }
        self.call_stack.push_frame(class_ref, method_ref);
        let result = native_method(self, &args);
        self.call_stack.pop_frame();
        let value = result?;
        let well_typed = match (&method_ref.signature.return_type, &value) {
            (None, None) => true,
            (Some(tag), Some(value)) => value.matches_type(tag),
            _ => false,
        };
        if !well_typed {
            return Err(MethodCallError::InternalError(VmError::ValueTypeMismatch));
        }
        Ok(value)
    }

    /// 入口：初始化类后调用静态方法。
    /// 传播到最外层的异常转换为 [`RunError::Uncaught`]
    pub fn run_static(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, RunError> {
        let result = self.call_static(class_name, method_name, descriptor, args);
        match result {
            Ok(value) => Ok(value),
            Err(MethodCallError::InternalError(e)) => Err(RunError::Internal(e)),
            Err(MethodCallError::ExceptionThrown(exception)) => {
                let uncaught = self.describe_exception(exception)?;
                error!("Exception in thread \"main\" {}", uncaught);
                Err(RunError::Uncaught(uncaught))
            }
        }
    }

    fn call_static(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> InvokeMethodResult {
        let class_ref = self
            .method_area
            .get_class(class_name)
            .ok_or_else(|| VmError::ClassNotFound(class_name.to_string()))?;
        let method_ref = match class_ref.get_method(method_name, descriptor) {
            Some(method_ref) if method_ref.is_static() => method_ref,
            _ => {
                let message = format!("{}.{}{}", class_name, method_name, descriptor);
                return Err(self.throw_new(NO_SUCH_METHOD_ERROR, Some(message)));
            }
        };
        self.initialize_class(class_ref)?;
        self.invoke_method(class_ref, method_ref, args)
    }

    pub fn describe_exception(&self, exception: ObjectReference) -> VmExecResult<UncaughtException> {
        let class_ref = self.object_heap.get_class(exception)?;
        let (message, stack_trace) = match self.object_heap.throwable_info(exception) {
            Some(info) => (info.message.clone(), info.stack_trace.clone()),
            None => (None, Vec::new()),
        };
        Ok(UncaughtException {
            class_name: class_ref.name.clone(),
            message,
            stack_trace,
        })
    }
}
