use crate::bootstrap_class_loader::bootstrap_classes;
use crate::jvm_error::{VmError, VmExecResult};
use crate::loaded_class::{Class, ClassRef};
use class_model::class_descriptor::ClassDescriptor;
use indexmap::IndexMap;
use log::debug;
use typed_arena::Arena;

/// 方法区：程序中所有类的表，按类名索引。
///
/// 一次性加载引导类和程序给出的全部类描述，每个类在其父类和接口之后加载；
/// 加载完成后只读，类的初始化状态单独记录在各个类上。
/// 类本身分配在调用者持有的 arena 中，因此 `ClassRef<'a>` 可以在整个运行期间自由复制
pub struct MethodArea<'a> {
    classes: IndexMap<String, ClassRef<'a>>,
}

impl<'a> MethodArea<'a> {
    pub fn load(
        arena: &'a Arena<Class<'a>>,
        descriptors: Vec<ClassDescriptor>,
    ) -> VmExecResult<MethodArea<'a>> {
        let mut pending: IndexMap<String, ClassDescriptor> = IndexMap::new();
        for descriptor in bootstrap_classes()?.into_iter().chain(descriptors) {
            if pending.contains_key(&descriptor.name) {
                return Err(VmError::DuplicateClass(descriptor.name));
            }
            pending.insert(descriptor.name.clone(), descriptor);
        }

        let names: Vec<String> = pending.keys().cloned().collect();
        let mut area = MethodArea {
            classes: IndexMap::with_capacity(names.len()),
        };
        let mut loading = Vec::new();
        for name in &names {
            area.do_class_loading(arena, &mut pending, &mut loading, name)?;
        }
        Ok(area)
    }

    fn do_class_loading(
        &mut self,
        arena: &'a Arena<Class<'a>>,
        pending: &mut IndexMap<String, ClassDescriptor>,
        loading: &mut Vec<String>,
        class_name: &str,
    ) -> VmExecResult<ClassRef<'a>> {
        if let Some(class_ref) = self.classes.get(class_name) {
            return Ok(*class_ref);
        }
        if loading.iter().any(|name| name == class_name) {
            return Err(VmError::ClassCircularity(class_name.to_string()));
        }
        let descriptor = pending
            .shift_remove(class_name)
            .ok_or_else(|| VmError::ClassNotFound(class_name.to_string()))?;

        loading.push(class_name.to_string());
        //解析super_class
        let super_class = match &descriptor.super_class {
            Some(super_class_name) => {
                Some(self.do_class_loading(arena, pending, loading, super_class_name)?)
            }
            None => None,
        };
        //解析加载接口
        let mut interfaces = Vec::with_capacity(descriptor.interfaces.len());
        for interface_name in &descriptor.interfaces {
            interfaces.push(self.do_class_loading(arena, pending, loading, interface_name)?);
        }
        loading.pop();

        let class_ref: ClassRef<'a> = arena.alloc(Class::new(descriptor, super_class, interfaces)?);
        debug!(
            "loaded class {} ({} instance slots)",
            class_ref.name, class_ref.total_num_of_fields
        );
        self.classes.insert(class_ref.name.clone(), class_ref);
        Ok(class_ref)
    }

    pub fn get_class(&self, class_name: &str) -> Option<ClassRef<'a>> {
        self.classes.get(class_name).copied()
    }

    pub fn is_class_loaded(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// 按加载顺序遍历，父类总在子类之前
    pub fn classes(&self) -> impl Iterator<Item = ClassRef<'a>> + '_ {
        self.classes.values().copied()
    }
}
