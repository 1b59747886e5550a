use conformance_corpus::corpus::Corpus;
use conformance_corpus::runner::{TestOutcome, TestRunner};
use lite_vm::virtual_machine::VmConfig;
use log::info;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn corpus_runner() -> TestRunner {
    init_log();
    TestRunner::new(Corpus::all().unwrap(), VmConfig::default())
}

pub fn run_entry(class_name: &str, method_name: &str) -> TestOutcome {
    let outcome = corpus_runner().run(class_name, method_name);
    info!("{}.{}: {:?}", class_name, method_name, outcome.result);
    outcome
}

pub fn assert_passes(class_name: &str, method_name: &str) {
    let outcome = run_entry(class_name, method_name);
    assert!(
        outcome.passed(),
        "{}.{} failed: {:?}",
        class_name,
        method_name,
        outcome.result
    );
}
