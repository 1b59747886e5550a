use crate::assertion::register_assertions;
use class_model::class_descriptor::ClassDescriptor;
use lite_vm::java_exception::RunError;
use lite_vm::virtual_machine::{VirtualMachine, VmConfig};
use log::{debug, info, warn};
use typed_arena::Arena;

pub const TEST_PREFIX: &str = "test_";

/// 一个测试入口的运行结果
#[derive(Debug, PartialEq)]
pub struct TestOutcome {
    pub class_name: String,
    pub method_name: String,
    pub result: Result<(), RunError>,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// 测试入口是 `test_` 开头、签名为 `()V` 的静态方法。
/// 每个入口在一个全新的虚拟机中运行，静态状态互不影响
pub struct TestRunner {
    classes: Vec<ClassDescriptor>,
    config: VmConfig,
}

impl TestRunner {
    pub fn new(classes: Vec<ClassDescriptor>, config: VmConfig) -> TestRunner {
        TestRunner { classes, config }
    }

    /// 按类与方法的声明顺序列出全部入口
    pub fn entry_points(&self) -> Vec<(String, String)> {
        self.classes
            .iter()
            .flat_map(|class| {
                class
                    .methods
                    .iter()
                    .filter(|m| {
                        m.is_static() && m.name.starts_with(TEST_PREFIX) && m.descriptor == "()V"
                    })
                    .map(move |m| (class.name.clone(), m.name.clone()))
            })
            .collect()
    }

    pub fn run(&self, class_name: &str, method_name: &str) -> TestOutcome {
        let arena = Arena::new();
        let result = VirtualMachine::with_config(&arena, self.classes.clone(), self.config.clone())
            .map_err(RunError::from)
            .and_then(|mut vm| {
                register_assertions(&mut vm);
                vm.run_static(class_name, method_name, "()V", Vec::new())
            })
            .map(|_| ());
        match &result {
            Ok(()) => debug!("{}.{} passed", class_name, method_name),
            Err(e) => warn!("{}.{} failed: {}", class_name, method_name, e),
        }
        TestOutcome {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            result,
        }
    }

    /// 运行类名或方法名包含 `filter` 的入口
    pub fn run_all(&self, filter: Option<&str>) -> Vec<TestOutcome> {
        let selected: Vec<(String, String)> = self
            .entry_points()
            .into_iter()
            .filter(|(class_name, method_name)| match filter {
                Some(pattern) => class_name.contains(pattern) || method_name.contains(pattern),
                None => true,
            })
            .collect();
        info!("running {} test entries", selected.len());
        selected
            .iter()
            .map(|(class_name, method_name)| self.run(class_name, method_name))
            .collect()
    }
}
