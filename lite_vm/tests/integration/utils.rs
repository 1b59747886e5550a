use class_model::class_descriptor::ClassDescriptor;
use class_model::method_descriptor::MethodAccessFlags;
use lite_vm::java_exception::RunError;
use lite_vm::jvm_values::Value;
use lite_vm::virtual_machine::{VirtualMachine, VmConfig};
use log::info;
use typed_arena::Arena;

pub const STATIC: MethodAccessFlags = MethodAccessFlags::PUBLIC.union(MethodAccessFlags::STATIC);

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 在一个新虚拟机中执行 `f`
pub fn with_vm<F, R>(classes: Vec<ClassDescriptor>, config: VmConfig, f: F) -> R
where
    F: for<'a> FnOnce(&mut VirtualMachine<'a>) -> R,
{
    init_log();
    let arena = Arena::new();
    let mut vm = VirtualMachine::with_config(&arena, classes, config).unwrap();
    f(&mut vm)
}

pub fn run_static(
    classes: Vec<ClassDescriptor>,
    class_name: &str,
    method_name: &str,
    descriptor: &str,
) -> Result<Option<Value>, RunError> {
    with_vm(classes, VmConfig::default(), |vm| {
        let result = vm.run_static(class_name, method_name, descriptor, Vec::new());
        info!("{}.{}{} => {:?}", class_name, method_name, descriptor, result);
        result
    })
}

/// 未捕获异常的类名，正常返回或内部错误时 panic
pub fn uncaught_class(result: Result<Option<Value>, RunError>) -> String {
    match result {
        Err(RunError::Uncaught(uncaught)) => uncaught.class_name,
        other => panic!("expected an uncaught exception, got {:?}", other),
    }
}
