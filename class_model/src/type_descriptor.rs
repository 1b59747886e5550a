use crate::program_error::{ProgramError, Result};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// ## 类型描述符
/// [jvms-4.3.2](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.3.2)
///
/// | 字符 | 类型 |
/// | ---- | ---- |
/// | B | byte |
/// | C | char |
/// | D | double |
/// | F | float |
/// | I | int |
/// | J | long |
/// | L ClassName ; | reference |
/// | S | short |
/// | Z | boolean |
/// | [ | array |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference(String),
    Array(Box<TypeTag>),
}

/// Element kinds accepted by `newarray`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveType {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl PrimitiveType {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            PrimitiveType::Boolean => TypeTag::Boolean,
            PrimitiveType::Char => TypeTag::Char,
            PrimitiveType::Float => TypeTag::Float,
            PrimitiveType::Double => TypeTag::Double,
            PrimitiveType::Byte => TypeTag::Byte,
            PrimitiveType::Short => TypeTag::Short,
            PrimitiveType::Int => TypeTag::Int,
            PrimitiveType::Long => TypeTag::Long,
        }
    }
}

impl TypeTag {
    pub fn parse(descriptor: &str) -> Result<TypeTag> {
        let (tag, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(ProgramError::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(tag)
    }

    /// 解析一个类型，返回剩余未解析的部分
    fn parse_prefix(descriptor: &str) -> Result<(TypeTag, &str)> {
        let invalid = || ProgramError::InvalidDescriptor(descriptor.to_string());
        let mut chars = descriptor.chars();
        let tag = match chars.next().ok_or_else(invalid)? {
            'Z' => TypeTag::Boolean,
            'B' => TypeTag::Byte,
            'C' => TypeTag::Char,
            'S' => TypeTag::Short,
            'I' => TypeTag::Int,
            'J' => TypeTag::Long,
            'F' => TypeTag::Float,
            'D' => TypeTag::Double,
            'L' => {
                let end = descriptor.find(';').ok_or_else(invalid)?;
                let class_name = &descriptor[1..end];
                if class_name.is_empty() {
                    return Err(invalid());
                }
                return Ok((
                    TypeTag::Reference(class_name.to_string()),
                    &descriptor[end + 1..],
                ));
            }
            '[' => {
                let (element, rest) = Self::parse_prefix(&descriptor[1..])?;
                return Ok((TypeTag::Array(Box::new(element)), rest));
            }
            _ => return Err(invalid()),
        };
        Ok((tag, &descriptor[1..]))
    }

    /// long 与 double 在局部变量表中占两个槽位
    pub fn slot_size(&self) -> usize {
        match self {
            TypeTag::Long | TypeTag::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeTag::Reference(_) | TypeTag::Array(_))
    }

    /// boolean/byte/char/short/int 在操作数栈上都以 int 表示
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            TypeTag::Boolean | TypeTag::Byte | TypeTag::Char | TypeTag::Short | TypeTag::Int
        )
    }

    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTag::Boolean => write!(f, "Z"),
            TypeTag::Byte => write!(f, "B"),
            TypeTag::Char => write!(f, "C"),
            TypeTag::Short => write!(f, "S"),
            TypeTag::Int => write!(f, "I"),
            TypeTag::Long => write!(f, "J"),
            TypeTag::Float => write!(f, "F"),
            TypeTag::Double => write!(f, "D"),
            TypeTag::Reference(class_name) => write!(f, "L{class_name};"),
            TypeTag::Array(element) => write!(f, "[{element}"),
        }
    }
}

impl FromStr for TypeTag {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self> {
        TypeTag::parse(s)
    }
}

/// 方法描述符 `(参数类型*)返回类型`，返回类型为`V`时表示无返回值
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub parameters: Vec<TypeTag>,
    pub return_type: Option<TypeTag>,
}

impl MethodSignature {
    pub fn parse(descriptor: &str) -> Result<MethodSignature> {
        let invalid = || ProgramError::InvalidDescriptor(descriptor.to_string());
        let mut rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
        let mut parameters = Vec::new();
        while !rest.starts_with(')') {
            if rest.is_empty() {
                return Err(invalid());
            }
            let (tag, remaining) = TypeTag::parse_prefix(rest).map_err(|_| invalid())?;
            parameters.push(tag);
            rest = remaining;
        }
        let return_type = match &rest[1..] {
            "V" => None,
            other => Some(TypeTag::parse(other).map_err(|_| invalid())?),
        };
        Ok(MethodSignature {
            parameters,
            return_type,
        })
    }

    /// 参数在局部变量表中占用的槽位数（不含 this）
    pub fn parameter_slots(&self) -> usize {
        self.parameters.iter().map(TypeTag::slot_size).sum()
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for parameter in &self.parameters {
            write!(f, "{parameter}")?;
        }
        match &self.return_type {
            Some(tag) => write!(f, "){tag}"),
            None => write!(f, ")V"),
        }
    }
}
