use crate::jvm_error::{VmError, VmExecResult};
use class_model::constant::Constant;
use class_model::type_descriptor::TypeTag;
use std::fmt::{Display, Formatter};

/// 对象引用，堆中对象的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectReference(pub(crate) usize);

/// 数组引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayReference(pub(crate) usize);

///https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-2.html#jvms-2.2
///
/// 操作数栈、局部变量、字段与数组元素中的值。
/// boolean/byte/char/short 在运行时都以 `Int` 表示
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Value {
    #[default]
    Uninitialized,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ObjectRef(ObjectReference),
    ArrayRef(ArrayReference),
    Null,
}

impl Value {
    /// 字段、数组元素的默认值：false/0/0.0/null
    pub fn zero_value(type_tag: &TypeTag) -> Value {
        match type_tag {
            TypeTag::Boolean | TypeTag::Byte | TypeTag::Char | TypeTag::Short | TypeTag::Int => {
                Value::Int(0)
            }
            TypeTag::Long => Value::Long(0),
            TypeTag::Float => Value::Float(0f32),
            TypeTag::Double => Value::Double(0f64),
            TypeTag::Reference(_) | TypeTag::Array(_) => Value::Null,
        }
    }

    /// long 和 double 属于第二类计算类型
    pub fn is_category2(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    pub fn is_reference_or_null(&self) -> bool {
        matches!(self, Value::ObjectRef(_) | Value::ArrayRef(_) | Value::Null)
    }

    /// 值能否存入声明为 `type_tag` 的槽位
    pub fn matches_type(&self, type_tag: &TypeTag) -> bool {
        match self {
            Value::Int(_) => type_tag.is_int_like(),
            Value::Long(_) => *type_tag == TypeTag::Long,
            Value::Float(_) => *type_tag == TypeTag::Float,
            Value::Double(_) => *type_tag == TypeTag::Double,
            Value::ObjectRef(_) | Value::ArrayRef(_) | Value::Null => type_tag.is_reference(),
            Value::Uninitialized => false,
        }
    }

    pub fn get_int(&self) -> VmExecResult<i32> {
        match self {
            Value::Int(v) => Ok(*v),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    pub fn get_long(&self) -> VmExecResult<i64> {
        match self {
            Value::Long(v) => Ok(*v),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    pub fn get_float(&self) -> VmExecResult<f32> {
        match self {
            Value::Float(v) => Ok(*v),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    pub fn get_double(&self) -> VmExecResult<f64> {
        match self {
            Value::Double(v) => Ok(*v),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    pub fn get_object(&self) -> VmExecResult<Option<ObjectReference>> {
        match self {
            Value::ObjectRef(v) => Ok(Some(*v)),
            Value::Null => Ok(None),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }

    pub fn get_array(&self) -> VmExecResult<Option<ArrayReference>> {
        match self {
            Value::ArrayRef(v) => Ok(Some(*v)),
            Value::Null => Ok(None),
            _ => Err(VmError::ValueTypeMismatch),
        }
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        match constant {
            Constant::Int(i) => Value::Int(i),
            Constant::Long(l) => Value::Long(l),
            Constant::Float(f) => Value::Float(f),
            Constant::Double(d) => Value::Double(d),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Uninitialized => write!(f, "<uninitialized>"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::ObjectRef(r) => write!(f, "object@{}", r.0),
            Value::ArrayRef(r) => write!(f, "array@{}", r.0),
            Value::Null => write!(f, "null"),
        }
    }
}
