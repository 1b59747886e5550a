//! 虚拟机自身会抛出的异常类

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
pub const JAVA_LANG_THROWABLE: &str = "java/lang/Throwable";

pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
pub const ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION: &str = "java/lang/ArrayIndexOutOfBoundsException";
pub const ARITHMETIC_EXCEPTION: &str = "java/lang/ArithmeticException";
pub const ARRAY_STORE_EXCEPTION: &str = "java/lang/ArrayStoreException";
pub const CLASS_CAST_EXCEPTION: &str = "java/lang/ClassCastException";
pub const NEGATIVE_ARRAY_SIZE_EXCEPTION: &str = "java/lang/NegativeArraySizeException";

pub const ASSERTION_ERROR: &str = "java/lang/AssertionError";
pub const NO_SUCH_FIELD_ERROR: &str = "java/lang/NoSuchFieldError";
pub const NO_SUCH_METHOD_ERROR: &str = "java/lang/NoSuchMethodError";
pub const INCOMPATIBLE_CLASS_CHANGE_ERROR: &str = "java/lang/IncompatibleClassChangeError";
pub const ABSTRACT_METHOD_ERROR: &str = "java/lang/AbstractMethodError";
pub const INSTANTIATION_ERROR: &str = "java/lang/InstantiationError";
pub const NO_CLASS_DEF_FOUND_ERROR: &str = "java/lang/NoClassDefFoundError";
pub const UNSATISFIED_LINK_ERROR: &str = "java/lang/UnsatisfiedLinkError";
pub const STACK_OVERFLOW_ERROR: &str = "java/lang/StackOverflowError";
pub const OUT_OF_MEMORY_ERROR: &str = "java/lang/OutOfMemoryError";

/// 启动时预置的 Throwable 类层次：(类名, 父类名)，父类总在子类之前
pub const THROWABLE_HIERARCHY: &[(&str, &str)] = &[
    (JAVA_LANG_THROWABLE, JAVA_LANG_OBJECT),
    ("java/lang/Exception", JAVA_LANG_THROWABLE),
    ("java/lang/Error", JAVA_LANG_THROWABLE),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    (NULL_POINTER_EXCEPTION, "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    (
        ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
        "java/lang/IndexOutOfBoundsException",
    ),
    (ARITHMETIC_EXCEPTION, "java/lang/RuntimeException"),
    (ARRAY_STORE_EXCEPTION, "java/lang/RuntimeException"),
    (CLASS_CAST_EXCEPTION, "java/lang/RuntimeException"),
    (NEGATIVE_ARRAY_SIZE_EXCEPTION, "java/lang/RuntimeException"),
    (ASSERTION_ERROR, "java/lang/Error"),
    ("java/lang/LinkageError", "java/lang/Error"),
    (INCOMPATIBLE_CLASS_CHANGE_ERROR, "java/lang/LinkageError"),
    (NO_SUCH_FIELD_ERROR, INCOMPATIBLE_CLASS_CHANGE_ERROR),
    (NO_SUCH_METHOD_ERROR, INCOMPATIBLE_CLASS_CHANGE_ERROR),
    (ABSTRACT_METHOD_ERROR, INCOMPATIBLE_CLASS_CHANGE_ERROR),
    (INSTANTIATION_ERROR, INCOMPATIBLE_CLASS_CHANGE_ERROR),
    (NO_CLASS_DEF_FOUND_ERROR, "java/lang/LinkageError"),
    (UNSATISFIED_LINK_ERROR, "java/lang/LinkageError"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    (STACK_OVERFLOW_ERROR, "java/lang/VirtualMachineError"),
    (OUT_OF_MEMORY_ERROR, "java/lang/VirtualMachineError"),
];
