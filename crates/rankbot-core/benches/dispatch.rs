//! Benchmarks for message parsing, rank lookup and the full dispatch path.

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rankbot_core::{
    Chat, Command, CommandDescriptor, CommandResult, Dispatcher, Gate, IncomingMessage,
    InvocationContext, MemberRole, MemoryStore, MessengerError, Messenger, ProgressionEngine,
    RankTable, Registry, ReplyTarget, ResolveError, RoleResolver, UserRef, level_for, parse,
};
use std::sync::Arc;

const SIMPLE: &str = "/hi";
const WITH_FLAGS: &str = "/ban 12345 --reason=Repeated spam in the group -q";
const LONG_TEXT: &str = "/rank --caption=You have been grinding all week and it shows, well done everyone in the chat";

struct Silent;

#[async_trait]
impl Messenger for Silent {
    async fn send_text(&self, _target: ReplyTarget, _text: &str) -> Result<(), MessengerError> {
        Ok(())
    }

    async fn send_photo(
        &self,
        _target: ReplyTarget,
        _photo: Vec<u8>,
        _caption: &str,
    ) -> Result<(), MessengerError> {
        Ok(())
    }
}

struct NoRoles;

#[async_trait]
impl RoleResolver for NoRoles {
    async fn member_role(&self, _chat: i64, _user: i64) -> Result<MemberRole, ResolveError> {
        Ok(MemberRole::Member)
    }

    async fn bot_role(&self, _chat: i64) -> Result<MemberRole, ResolveError> {
        Ok(MemberRole::Member)
    }
}

struct Hi;

#[async_trait]
impl Command for Hi {
    async fn execute(&self, _msg: &IncomingMessage, _ctx: &InvocationContext) -> CommandResult {
        Ok(())
    }
}

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Context Parsing");

    for (name, raw) in [("simple", SIMPLE), ("flags", WITH_FLAGS), ("long_text", LONG_TEXT)] {
        group.bench_with_input(BenchmarkId::new("parse", name), raw, |b, raw| {
            b.iter(|| black_box(parse(black_box(raw), "/")))
        });
    }

    group.bench_function("not_command", |b| {
        b.iter(|| black_box(parse(black_box("just chatting about rust"), "/")))
    });

    group.finish();
}

fn benchmark_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rank Lookup");
    let table = RankTable::standard();

    for xp in [0u64, 1_500, 480_000, 5_000_000] {
        group.bench_with_input(BenchmarkId::new("rank_for", xp), &xp, |b, &xp| {
            b.iter(|| black_box(table.rank_for(black_box(xp))))
        });
    }

    group.bench_function("level_for_max", |b| {
        b.iter(|| black_box(level_for(black_box(u64::MAX))))
    });

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(rt) => rt,
        Err(e) => panic!("failed to build runtime: {e}"),
    };

    let store = Arc::new(MemoryStore::new());
    let mut registry = Registry::new();
    if let Err(e) = registry.register(CommandDescriptor::new("hi", "general").xp(1), Arc::new(Hi)) {
        panic!("failed to register: {e}");
    }
    let gate = Gate::new(store.clone(), Arc::new(NoRoles), [1]);
    let progression = Arc::new(ProgressionEngine::new(store, RankTable::standard()));
    let dispatcher = Dispatcher::new("/", registry, gate, progression, Arc::new(Silent));

    let msg = IncomingMessage::new(1, Chat::private(2), UserRef::new(2), SIMPLE);

    let mut group = c.benchmark_group("Dispatch");
    group.bench_function("hi_private", |b| {
        b.iter(|| runtime.block_on(async { black_box(dispatcher.dispatch(&msg).await) }))
    });
    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_rank, benchmark_dispatch);
criterion_main!(benches);
