pub mod class_builder;
pub mod class_descriptor;
pub mod code_builder;
pub mod constant;
pub mod field_descriptor;
pub mod instruction;
pub mod method_descriptor;
pub mod program_error;
pub mod switch_table;
pub mod type_descriptor;
