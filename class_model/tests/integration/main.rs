mod test_build_class;
