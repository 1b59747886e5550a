use crate::jvm_error::VmExecResult;
use crate::jvm_exceptions::{JAVA_LANG_OBJECT, THROWABLE_HIERARCHY};
use class_model::class_builder::ClassBuilder;
use class_model::class_descriptor::ClassDescriptor;
use class_model::method_descriptor::MethodAccessFlags;

/// 引导类加载器预置的类：`java/lang/Object` 以及虚拟机会抛出的 Throwable 层次。
///
/// 这些类没有字段；`Object.<init>` 为空实现，其余类的 `<init>()V` 只调用父类构造方法。
/// `Object.hashCode()I` 是 native 方法，返回对象的标识哈希
pub fn bootstrap_classes() -> VmExecResult<Vec<ClassDescriptor>> {
    let mut classes = Vec::with_capacity(THROWABLE_HIERARCHY.len() + 1);

    let mut object = ClassBuilder::root(JAVA_LANG_OBJECT);
    object
        .default_constructor()?
        .native_method("hashCode", "()I", MethodAccessFlags::PUBLIC)?;
    classes.push(object.build());

    for (name, super_class) in THROWABLE_HIERARCHY {
        let mut throwable = ClassBuilder::new(name);
        throwable.extends(super_class).default_constructor()?;
        classes.push(throwable.build());
    }
    Ok(classes)
}
