#![allow(missing_docs)]
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use brazier::command::{Command, HandlerError};
use brazier::context::CommandContext;
use brazier::input::CommandInput;
use brazier::manager::{CommandManager, ManagerSettings};
use brazier::parser::numeric::NumberParser;
use brazier::parser::string::StringParser;

type Sender = &'static str;

fn manager() -> CommandManager<Sender> {
    let manager = CommandManager::new(ManagerSettings::default());
    for root in ["alpha", "beta", "gamma", "delta"] {
        let command = Command::builder(root)
            .literal("set")
            .required("value", NumberParser::<i64>::range(0, 1_000_000))
            .optional_with_default("label", StringParser::single(), "default")
            .handler(|_: &mut CommandContext<Sender>| -> Result<(), HandlerError> { Ok(()) })
            .build()
            .expect("build");
        manager.register(command).expect("register");
    }
    manager.lock_registration();
    manager
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("input tokenize", |b| {
        b.iter(|| {
            let mut input = CommandInput::new(black_box(r#"alpha set 42 "labelled value""#));
            while input.read().is_ok() {}
            black_box(input.is_empty());
        });
    });
}

fn bench_execute(c: &mut Criterion) {
    let manager = manager();
    c.bench_function("execute alpha set 42", |b| {
        b.iter(|| {
            black_box(futures::executor::block_on(
                manager.execute("bench", black_box("alpha set 42 tagged")),
            ))
            .expect("execute");
        });
    });
}

fn bench_execute_with_default(c: &mut Criterion) {
    let manager = manager();
    c.bench_function("execute with default", |b| {
        b.iter(|| {
            black_box(futures::executor::block_on(
                manager.execute("bench", black_box("gamma set 7")),
            ))
            .expect("execute");
        });
    });
}

fn bench_suggest(c: &mut Criterion) {
    let manager = manager();
    c.bench_function("suggest mid token", |b| {
        b.iter(|| {
            black_box(futures::executor::block_on(
                manager.suggest("bench", black_box("al")),
            ));
        });
    });
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_execute,
    bench_execute_with_default,
    bench_suggest,
);
criterion_main!(benches);
