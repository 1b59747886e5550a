use crate::class_descriptor::{ClassAccessFlags, ClassDescriptor};
use crate::code_builder::CodeBuilder;
use crate::constant::Constant;
use crate::field_descriptor::{FieldAccessFlags, FieldDescriptor};
use crate::instruction::{Instruction, MethodRef};
use crate::method_descriptor::{Code, MethodAccessFlags, MethodDescriptor};
use crate::program_error::{ProgramError, Result};
use crate::type_descriptor::{MethodSignature, TypeTag};
use indexmap::map::Entry;
use indexmap::IndexMap;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// Builds a [`ClassDescriptor`] member by member.
///
/// ```ignore
/// let mut class = ClassBuilder::new("Counter");
/// class.field("count", "I", FieldAccessFlags::PRIVATE)?
///     .default_constructor()?
///     .method("get", "()I", MethodAccessFlags::PUBLIC, |code| {
///         code.push(Aload(0))
///             .push(Getfield(FieldRef::new("Counter", "count", "I")))
///             .push(Ireturn);
///         Ok(())
///     })?;
/// let class = class.build();
/// ```
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    access_flags: ClassAccessFlags,
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    // 按声明顺序保存，键用于发现重复成员
    fields: IndexMap<String, FieldDescriptor>,
    methods: IndexMap<(String, String), MethodDescriptor>,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(name: &str) -> ClassBuilder {
        ClassBuilder {
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: name.to_string(),
            super_class: Some(JAVA_LANG_OBJECT.to_string()),
            interfaces: Vec::new(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    pub fn interface(name: &str) -> ClassBuilder {
        let mut builder = ClassBuilder::new(name);
        builder.access_flags =
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        builder
    }

    /// A class without a super class; only the root of the hierarchy is built this way.
    pub fn root(name: &str) -> ClassBuilder {
        let mut builder = ClassBuilder::new(name);
        builder.super_class = None;
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extends(&mut self, super_class: &str) -> &mut Self {
        self.super_class = Some(super_class.to_string());
        self
    }

    pub fn implements(&mut self, interface: &str) -> &mut Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn access_flags(&mut self, access_flags: ClassAccessFlags) -> &mut Self {
        self.access_flags = access_flags;
        self
    }

    pub fn field(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: FieldAccessFlags,
    ) -> Result<&mut Self> {
        self.add_field(name, descriptor, access_flags, None)
    }

    /// A `static final` field whose value is set when the class is prepared.
    pub fn constant_field(
        &mut self,
        name: &str,
        descriptor: &str,
        value: Constant,
    ) -> Result<&mut Self> {
        self.add_field(
            name,
            descriptor,
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            Some(value),
        )
    }

    fn add_field(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: FieldAccessFlags,
        constant_value: Option<Constant>,
    ) -> Result<&mut Self> {
        TypeTag::parse(descriptor)?;
        match self.fields.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ProgramError::DuplicateMember(format!(
                "{}.{name}",
                self.name
            ))),
            Entry::Vacant(entry) => {
                entry.insert(FieldDescriptor {
                    access_flags,
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    constant_value,
                });
                Ok(self)
            }
        }
    }

    /// Adds a method whose body is emitted by `body`.
    pub fn method<F>(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: MethodAccessFlags,
        body: F,
    ) -> Result<&mut Self>
    where
        F: FnOnce(&mut CodeBuilder) -> Result<()>,
    {
        let is_static = access_flags.contains(MethodAccessFlags::STATIC);
        let mut code = CodeBuilder::for_method(descriptor, is_static)?;
        body(&mut code)?;
        let code = code.build()?;
        self.add_method(name, descriptor, access_flags, Some(code))
    }

    /// A method whose implementation is bound through the native registry.
    pub fn native_method(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: MethodAccessFlags,
    ) -> Result<&mut Self> {
        self.add_method(
            name,
            descriptor,
            access_flags | MethodAccessFlags::NATIVE,
            None,
        )
    }

    pub fn abstract_method(&mut self, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.add_method(
            name,
            descriptor,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            None,
        )
    }

    /// `<init>()V` that only chains to the super class constructor.
    pub fn default_constructor(&mut self) -> Result<&mut Self> {
        let super_class = self.super_class.clone();
        self.method("<init>", "()V", MethodAccessFlags::PUBLIC, |code| {
            if let Some(super_class) = super_class {
                code.push(Instruction::Aload(0))
                    .push(Instruction::Invokespecial(MethodRef::new(
                        &super_class,
                        "<init>",
                        "()V",
                    )));
            }
            code.push(Instruction::Return);
            Ok(())
        })
    }

    fn add_method(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: MethodAccessFlags,
        code: Option<Code>,
    ) -> Result<&mut Self> {
        MethodSignature::parse(descriptor)?;
        match self.methods.entry((name.to_string(), descriptor.to_string())) {
            Entry::Occupied(_) => Err(ProgramError::DuplicateMember(format!(
                "{}.{name}{descriptor}",
                self.name
            ))),
            Entry::Vacant(entry) => {
                entry.insert(MethodDescriptor {
                    access_flags,
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    code,
                });
                Ok(self)
            }
        }
    }

    pub fn build(self) -> ClassDescriptor {
        ClassDescriptor {
            access_flags: self.access_flags,
            name: self.name,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields.into_values().collect(),
            methods: self.methods.into_values().collect(),
        }
    }
}
