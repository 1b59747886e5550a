//! 降级后的 Java 测试程序：每个测试类以 [`ClassDescriptor`](class_model::class_descriptor::ClassDescriptor)
//! 的形式给出，断言通过 `vadeen/test/Assertion` 的 native 方法实现

pub mod assertion;
pub mod corpus;
pub mod lowering;
pub mod runner;
