use crate::jvm_error::{VmError, VmExecResult};
use crate::jvm_values::{ArrayReference, ObjectReference, Value};
use crate::loaded_class::ClassRef;
use crate::stack_trace_element::StackTraceElement;
use class_model::type_descriptor::TypeTag;

/// Throwable 对象创建时记录的调用栈与详细信息
#[derive(Debug, Clone, PartialEq)]
pub struct ThrowableInfo {
    pub message: Option<String>,
    pub stack_trace: Vec<StackTraceElement>,
}

pub(crate) enum HeapObject<'a> {
    Instance {
        class_ref: ClassRef<'a>,
        fields: Vec<Value>,
        throwable: Option<Box<ThrowableInfo>>,
    },
    Array {
        element_type: TypeTag,
        data: Vec<Value>,
    },
}

/// 对象堆。所有实例和数组都归堆所有，引用只是下标。
///
/// 运行期间不回收任何对象，可达对象自然不会被释放；
/// `capacity` 限制对象个数，超出后分配失败，由虚拟机抛出 OutOfMemoryError
pub struct ObjectHeap<'a> {
    objects: Vec<HeapObject<'a>>,
    capacity: usize,
}

impl<'a> ObjectHeap<'a> {
    pub(crate) fn new(capacity: usize) -> ObjectHeap<'a> {
        ObjectHeap {
            objects: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn is_full(&self) -> bool {
        self.objects.len() >= self.capacity
    }

    /// 所有字段置为默认值
    pub fn allocate_object(&mut self, class_ref: ClassRef<'a>) -> Option<ObjectReference> {
        if self.is_full() {
            return None;
        }
        Some(self.push_instance(class_ref, None))
    }

    /// 虚拟机自身抛出的异常不受容量限制，否则 OutOfMemoryError 本身都无法分配
    pub(crate) fn allocate_throwable(
        &mut self,
        class_ref: ClassRef<'a>,
        info: ThrowableInfo,
    ) -> ObjectReference {
        self.push_instance(class_ref, Some(Box::new(info)))
    }

    fn push_instance(
        &mut self,
        class_ref: ClassRef<'a>,
        throwable: Option<Box<ThrowableInfo>>,
    ) -> ObjectReference {
        self.objects.push(HeapObject::Instance {
            class_ref,
            fields: class_ref.instance_template().to_vec(),
            throwable,
        });
        ObjectReference(self.objects.len() - 1)
    }

    pub fn allocate_array(&mut self, element_type: TypeTag, length: usize) -> Option<ArrayReference> {
        if self.is_full() {
            return None;
        }
        let zero = Value::zero_value(&element_type);
        self.objects.push(HeapObject::Array {
            element_type,
            data: vec![zero; length],
        });
        Some(ArrayReference(self.objects.len() - 1))
    }

    fn instance(&self, object: ObjectReference) -> VmExecResult<&HeapObject<'a>> {
        match self.objects.get(object.0) {
            Some(instance @ HeapObject::Instance { .. }) => Ok(instance),
            _ => Err(VmError::InvalidReference(object.0)),
        }
    }

    pub fn get_class(&self, object: ObjectReference) -> VmExecResult<ClassRef<'a>> {
        match self.instance(object)? {
            HeapObject::Instance { class_ref, .. } => Ok(*class_ref),
            HeapObject::Array { .. } => Err(VmError::InvalidReference(object.0)),
        }
    }

    pub fn get_field(&self, object: ObjectReference, slot: usize) -> VmExecResult<Value> {
        match self.instance(object)? {
            HeapObject::Instance { fields, .. } => {
                fields.get(slot).copied().ok_or(VmError::IndexOutOfBounds)
            }
            HeapObject::Array { .. } => Err(VmError::InvalidReference(object.0)),
        }
    }

    pub fn set_field(&mut self, object: ObjectReference, slot: usize, value: Value) -> VmExecResult<()> {
        match self.objects.get_mut(object.0) {
            Some(HeapObject::Instance { fields, .. }) => {
                let field = fields.get_mut(slot).ok_or(VmError::IndexOutOfBounds)?;
                *field = value;
                Ok(())
            }
            _ => Err(VmError::InvalidReference(object.0)),
        }
    }

    pub fn throwable_info(&self, object: ObjectReference) -> Option<&ThrowableInfo> {
        match self.objects.get(object.0) {
            Some(HeapObject::Instance {
                throwable: Some(info),
                ..
            }) => Some(info.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn set_throwable_info(&mut self, object: ObjectReference, info: ThrowableInfo) {
        if let Some(HeapObject::Instance { throwable, .. }) = self.objects.get_mut(object.0) {
            *throwable = Some(Box::new(info));
        }
    }

    fn array(&self, array: ArrayReference) -> VmExecResult<(&TypeTag, &Vec<Value>)> {
        match self.objects.get(array.0) {
            Some(HeapObject::Array { element_type, data }) => Ok((element_type, data)),
            _ => Err(VmError::InvalidReference(array.0)),
        }
    }

    pub fn array_length(&self, array: ArrayReference) -> VmExecResult<usize> {
        Ok(self.array(array)?.1.len())
    }

    pub fn array_element_type(&self, array: ArrayReference) -> VmExecResult<&TypeTag> {
        Ok(self.array(array)?.0)
    }

    pub fn get_element(&self, array: ArrayReference, index: usize) -> VmExecResult<Value> {
        self.array(array)?
            .1
            .get(index)
            .copied()
            .ok_or(VmError::IndexOutOfBounds)
    }

    pub fn set_element(&mut self, array: ArrayReference, index: usize, value: Value) -> VmExecResult<()> {
        match self.objects.get_mut(array.0) {
            Some(HeapObject::Array { data, .. }) => {
                let element = data.get_mut(index).ok_or(VmError::IndexOutOfBounds)?;
                *element = value;
                Ok(())
            }
            _ => Err(VmError::InvalidReference(array.0)),
        }
    }
}
