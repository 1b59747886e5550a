mod test_class_init;
mod test_dispatch;
mod test_exceptions;
mod test_limits;
mod test_natives;
mod utils;
