use crate::{
    array_tests, assertion, control_flow_tests, exception_tests, fields_tests, invocation_tests,
    semantics_tests, special_invocation_tests, virtual_invocation_tests,
};
use class_model::class_descriptor::ClassDescriptor;
use class_model::program_error::Result;

/// 全部测试类及其辅助类，连同断言类一起交给虚拟机加载
pub struct Corpus;

impl Corpus {
    pub fn all() -> Result<Vec<ClassDescriptor>> {
        let mut classes = vec![assertion::assertion_class()?];
        classes.extend(array_tests::classes()?);
        classes.extend(control_flow_tests::classes()?);
        classes.extend(exception_tests::classes()?);
        classes.extend(fields_tests::classes()?);
        classes.extend(invocation_tests::classes()?);
        classes.extend(special_invocation_tests::classes()?);
        classes.extend(virtual_invocation_tests::classes()?);
        classes.extend(semantics_tests::classes()?);
        Ok(classes)
    }
}
