pub mod bootstrap_class_loader;
pub mod java_exception;
pub mod jvm_error;
pub mod jvm_exceptions;
pub mod jvm_values;
pub mod loaded_class;
pub mod method_area;
pub mod native_method_area;
pub mod object_heap;
pub mod operand_stack;
pub mod runtime_constant_pool;
pub mod runtime_field_info;
pub mod runtime_method_info;
pub mod stack;
pub mod stack_frame;
pub mod stack_trace_element;
pub mod static_field_area;
pub mod virtual_machine;
