use crate::jvm_error::VmExecResult;
use crate::jvm_values::Value;
use crate::runtime_field_info::RuntimeFieldInfo;
use crate::runtime_method_info::{MethodKey, MethodKeyRef, RuntimeMethodInfo};
use class_model::class_descriptor::{ClassAccessFlags, ClassDescriptor};
use indexmap::IndexMap;
use std::cell::Cell;
use std::hash::{Hash, Hasher};

/// 类的生命周期：加载完成后首次主动使用时初始化，且只初始化一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStatus {
    Loaded,
    Initializing,
    Initialized,
    //<clinit>抛出异常后不可再使用
    Erroneous,
}

/// 虚方法表的一项，指向声明该方法的类中的方法下标
#[derive(Clone, Copy)]
enum DispatchEntry<'a> {
    Declared(usize),
    Inherited(ClassRef<'a>, usize),
}

impl<'a> DispatchEntry<'a> {
    fn inherited_from(self, class_ref: ClassRef<'a>) -> DispatchEntry<'a> {
        match self {
            DispatchEntry::Declared(index) => DispatchEntry::Inherited(class_ref, index),
            inherited => inherited,
        }
    }
}

/// 类实现的一个接口。表项与接口自身的虚方法表逐项对应，指向本类虚方法表中的实现
struct InterfaceTable<'a> {
    interface: ClassRef<'a>,
    entries: Vec<Option<DispatchEntry<'a>>>,
}

/// 表示加载的类。加载时完成字段布局与虚方法表的构建，之后除初始化状态外不可变。
///
/// - 实例字段：父类的槽位在前，本类声明的字段依次追加。同名字段在子类中再次声明时两个槽位并存
/// - 虚方法表：前面的表项与父类逐项对应，重写的方法原地替换，新方法追加在后面
/// - 接口表：实现的每个接口（包括父类和父接口带来的）各一张
pub struct Class<'a> {
    pub name: String,
    pub access_flags: ClassAccessFlags,
    //超类解析
    pub super_class: Option<ClassRef<'a>>,
    //接口解析
    pub interfaces: Vec<ClassRef<'a>>,
    //方法解析
    pub methods: IndexMap<MethodKey, RuntimeMethodInfo<'a>>,
    //字段解析
    pub instance_fields: IndexMap<String, RuntimeFieldInfo>,
    pub static_fields: IndexMap<String, RuntimeFieldInfo>,
    //包含父类的实例字段总数
    pub total_num_of_fields: usize,
    status: Cell<ClassStatus>,
    instance_template: Vec<Value>,
    vtable: IndexMap<MethodKey, DispatchEntry<'a>>,
    itables: Vec<InterfaceTable<'a>>,
}

pub type ClassRef<'a> = &'a Class<'a>;

pub type MethodRef<'a> = &'a RuntimeMethodInfo<'a>;

pub type FieldRef<'a> = &'a RuntimeFieldInfo;

impl<'a> Class<'a> {
    pub(crate) fn new(
        descriptor: ClassDescriptor,
        super_class: Option<ClassRef<'a>>,
        interfaces: Vec<ClassRef<'a>>,
    ) -> VmExecResult<Class<'a>> {
        let inherited_fields = super_class.map_or(0, |c| c.total_num_of_fields);
        let mut instance_template = super_class
            .map(|c| c.instance_template.clone())
            .unwrap_or_default();
        let mut instance_fields: IndexMap<String, RuntimeFieldInfo> = IndexMap::new();
        let mut static_fields: IndexMap<String, RuntimeFieldInfo> = IndexMap::new();
        for field in descriptor.fields {
            if field.is_static() {
                let field = RuntimeFieldInfo::from(field, static_fields.len())?;
                static_fields.insert(field.name.clone(), field);
            } else {
                let slot = inherited_fields + instance_fields.len();
                let field = RuntimeFieldInfo::from(field, slot)?;
                instance_template.push(field.initial_value);
                instance_fields.insert(field.name.clone(), field);
            }
        }

        let mut methods: IndexMap<MethodKey, RuntimeMethodInfo<'a>> = IndexMap::new();
        for method in descriptor.methods {
            let method = RuntimeMethodInfo::from(method)?;
            methods.insert(method.key(), method);
        }
        let vtable = Self::build_vtable(super_class, &interfaces, &methods);
        let itables = Self::build_itables(super_class, &interfaces, &vtable);

        Ok(Class {
            name: descriptor.name,
            access_flags: descriptor.access_flags,
            super_class,
            interfaces,
            methods,
            total_num_of_fields: inherited_fields + instance_fields.len(),
            instance_fields,
            static_fields,
            status: Cell::new(ClassStatus::Loaded),
            instance_template,
            vtable,
            itables,
        })
    }

    fn build_vtable(
        super_class: Option<ClassRef<'a>>,
        interfaces: &[ClassRef<'a>],
        methods: &IndexMap<MethodKey, RuntimeMethodInfo<'a>>,
    ) -> IndexMap<MethodKey, DispatchEntry<'a>> {
        let mut vtable = IndexMap::new();
        if let Some(super_class) = super_class {
            for (key, entry) in &super_class.vtable {
                vtable.insert(key.clone(), entry.inherited_from(super_class));
            }
        }
        for (index, (key, method)) in methods.iter().enumerate() {
            if method.is_virtual() {
                vtable.insert(key.clone(), DispatchEntry::Declared(index));
            }
        }

        let is_abstract = |entry: &DispatchEntry<'a>| match entry {
            DispatchEntry::Declared(index) => methods
                .get_index(*index)
                .map_or(true, |(_, m)| m.is_abstract()),
            DispatchEntry::Inherited(class_ref, index) => class_ref
                .methods
                .get_index(*index)
                .map_or(true, |(_, m)| m.is_abstract()),
        };
        let mut all_interfaces = Vec::new();
        collect_interfaces(interfaces, &mut all_interfaces);
        // 接口方法只补充缺失的表项，或用默认方法替换抽象方法
        for interface in all_interfaces {
            for (index, (key, method)) in interface.methods.iter().enumerate() {
                if !method.is_virtual() {
                    continue;
                }
                let replace = match vtable.get(key) {
                    None => true,
                    Some(entry) => !method.is_abstract() && is_abstract(entry),
                };
                if replace {
                    vtable.insert(key.clone(), DispatchEntry::Inherited(interface, index));
                }
            }
        }
        vtable
    }

    fn build_itables(
        super_class: Option<ClassRef<'a>>,
        interfaces: &[ClassRef<'a>],
        vtable: &IndexMap<MethodKey, DispatchEntry<'a>>,
    ) -> Vec<InterfaceTable<'a>> {
        let mut all_interfaces: Vec<ClassRef<'a>> = super_class
            .map(|c| c.itables.iter().map(|table| table.interface).collect())
            .unwrap_or_default();
        collect_interfaces(interfaces, &mut all_interfaces);
        all_interfaces
            .into_iter()
            .map(|interface| InterfaceTable {
                interface,
                entries: interface
                    .vtable
                    .keys()
                    .map(|key| vtable.get(key).copied())
                    .collect(),
            })
            .collect()
    }

    pub fn status(&self) -> ClassStatus {
        self.status.get()
    }

    pub(crate) fn set_status(&self, status: ClassStatus) {
        self.status.set(status)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }

    pub(crate) fn instance_template(&self) -> &[Value] {
        &self.instance_template
    }

    /// 只在本类声明的方法中查找
    pub fn get_method(&'a self, method_name: &str, descriptor: &str) -> Option<MethodRef<'a>> {
        self.methods.get(&MethodKeyRef::new(method_name, descriptor))
    }

    /// 从本类开始沿父类链精确查找，找不到时再查接口（默认方法）。
    /// 用于 invokestatic 与 invokespecial，不看接收者的运行时类型
    pub fn find_method(
        &'a self,
        method_name: &str,
        descriptor: &str,
    ) -> Option<(ClassRef<'a>, MethodRef<'a>)> {
        let mut current = Some(self);
        while let Some(class_ref) = current {
            if let Some(method) = class_ref.get_method(method_name, descriptor) {
                return Some((class_ref, method));
            }
            current = class_ref.super_class;
        }
        let mut current = Some(self);
        while let Some(class_ref) = current {
            for interface in &class_ref.interfaces {
                if let Some(found) = interface.find_method(method_name, descriptor) {
                    return Some(found);
                }
            }
            current = class_ref.super_class;
        }
        None
    }

    pub fn vtable_index(&self, method_name: &str, descriptor: &str) -> Option<usize> {
        self.vtable
            .get_index_of(&MethodKeyRef::new(method_name, descriptor))
    }

    /// 按虚方法表下标分派。下标来自符号引用中的类，本类是它的子类，表项逐项对齐
    pub fn virtual_method_at(&'a self, index: usize) -> Option<(ClassRef<'a>, MethodRef<'a>)> {
        let (_, entry) = self.vtable.get_index(index)?;
        self.dispatch(*entry)
    }

    /// 接口方法分派。`index` 是方法在接口自身虚方法表中的下标
    pub fn interface_method_at(
        &'a self,
        interface: ClassRef<'a>,
        index: usize,
    ) -> Option<(ClassRef<'a>, MethodRef<'a>)> {
        let table = self
            .itables
            .iter()
            .find(|table| std::ptr::eq(table.interface, interface))?;
        let entry = table.entries.get(index).copied().flatten()?;
        self.dispatch(entry)
    }

    pub fn virtual_method(
        &'a self,
        method_name: &str,
        descriptor: &str,
    ) -> Option<(ClassRef<'a>, MethodRef<'a>)> {
        let entry = self
            .vtable
            .get(&MethodKeyRef::new(method_name, descriptor))?;
        self.dispatch(*entry)
    }

    fn dispatch(&'a self, entry: DispatchEntry<'a>) -> Option<(ClassRef<'a>, MethodRef<'a>)> {
        match entry {
            DispatchEntry::Declared(index) => self.methods.get_index(index).map(|(_, m)| (self, m)),
            DispatchEntry::Inherited(class_ref, index) => class_ref
                .methods
                .get_index(index)
                .map(|(_, m)| (class_ref, m)),
        }
    }

    /// 从静态类型开始向上查找声明该实例字段的类
    pub fn resolve_instance_field(&'a self, field_name: &str) -> Option<(ClassRef<'a>, FieldRef<'a>)> {
        let mut current = Some(self);
        while let Some(class_ref) = current {
            if let Some(field) = class_ref.instance_fields.get(field_name) {
                return Some((class_ref, field));
            }
            current = class_ref.super_class;
        }
        None
    }

    /// 静态字段的查找顺序：本类、直接接口（递归）、父类
    pub fn resolve_static_field(&'a self, field_name: &str) -> Option<(ClassRef<'a>, FieldRef<'a>)> {
        if let Some(field) = self.static_fields.get(field_name) {
            return Some((self, field));
        }
        for interface in &self.interfaces {
            if let Some(found) = interface.resolve_static_field(field_name) {
                return Some(found);
            }
        }
        self.super_class?.resolve_static_field(field_name)
    }

    pub fn is_subclass_of(&self, other: &Class<'a>) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match self.super_class {
            Some(super_class) => super_class.is_subclass_of(other),
            None => false,
        }
    }

    /// 本类或任一父类直接或间接实现了该接口
    pub fn implements(&self, interface: &Class<'a>) -> bool {
        let direct = self
            .interfaces
            .iter()
            .any(|i| std::ptr::eq(*i, interface) || i.implements(interface));
        direct
            || self
                .super_class
                .map_or(false, |super_class| super_class.implements(interface))
    }

    pub fn is_assignable_to(&self, target: &Class<'a>) -> bool {
        if target.is_interface() {
            std::ptr::eq(self, target) || self.implements(target)
        } else {
            self.is_subclass_of(target)
        }
    }
}

fn collect_interfaces<'a>(interfaces: &[ClassRef<'a>], all: &mut Vec<ClassRef<'a>>) {
    for interface in interfaces {
        if !all.iter().any(|i| std::ptr::eq(*i, *interface)) {
            all.push(*interface);
            collect_interfaces(&interface.interfaces, all);
        }
    }
}

impl<'a> Hash for Class<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl<'a> PartialEq<Self> for Class<'a> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<'a> Eq for Class<'a> {}
