use clap::Parser;
use conformance_corpus::corpus::Corpus;
use conformance_corpus::runner::TestRunner;
use lite_vm::java_exception::RunError;
use lite_vm::virtual_machine::VmConfig;
use log::error;
use std::process::ExitCode;

/// 在解释器上运行降级后的 Java 测试程序
#[derive(Parser)]
#[command(name = "lite-vm")]
#[command(about = "Runs the lowered Java test programs on the interpreter", long_about = None)]
#[command(version)]
struct Cli {
    /// Only run entries whose class or method name contains this text
    #[arg(short, long)]
    filter: Option<String>,
    /// List the entry points without running them
    #[arg(short, long)]
    list: bool,
    /// Call depth at which StackOverflowError is thrown
    #[arg(long)]
    max_call_depth: Option<usize>,
    /// Maximum number of live objects and arrays
    #[arg(long)]
    heap_capacity: Option<usize>,
}

impl Cli {
    fn vm_config(&self) -> VmConfig {
        let defaults = VmConfig::default();
        VmConfig {
            max_call_depth: self.max_call_depth.unwrap_or(defaults.max_call_depth),
            heap_capacity: self.heap_capacity.unwrap_or(defaults.heap_capacity),
            ..defaults
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let classes = match Corpus::all() {
        Ok(classes) => classes,
        Err(e) => {
            error!("could not build the test classes: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let runner = TestRunner::new(classes, cli.vm_config());

    if cli.list {
        for (class_name, method_name) in runner.entry_points() {
            println!("{}.{}", class_name.replace('/', "."), method_name);
        }
        return ExitCode::SUCCESS;
    }

    let outcomes = runner.run_all(cli.filter.as_deref());
    for outcome in &outcomes {
        let status = if outcome.passed() { "PASS" } else { "FAIL" };
        println!(
            "{} {}.{}",
            status,
            outcome.class_name.replace('/', "."),
            outcome.method_name
        );
    }

    let failures: Vec<_> = outcomes.iter().filter(|o| !o.passed()).collect();
    for outcome in &failures {
        println!();
        println!("{}.{}:", outcome.class_name.replace('/', "."), outcome.method_name);
        match &outcome.result {
            Err(RunError::Uncaught(uncaught)) => println!("{}", uncaught),
            Err(e) => println!("internal error: {}", e),
            Ok(()) => {}
        }
    }
    println!();
    println!(
        "{} passed, {} failed, {} total",
        outcomes.len() - failures.len(),
        failures.len(),
        outcomes.len()
    );

    if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
