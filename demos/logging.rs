//! Walks through the registry with logging enabled
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```
//!
//! Set `INVOKE_DI_LOG=invoke_di=trace` to also see every resolution.

use invoke_di::{Injectable, ProviderOption, Registry};

#[allow(dead_code)]
#[derive(Clone)]
struct Database {
    url: String,
}

impl Injectable for Database {}

#[derive(Clone)]
struct UserService {
    db: Database,
}

impl Injectable for UserService {}

#[derive(Clone)]
struct RequestContext {
    request_id: String,
}

impl Injectable for RequestContext {}

#[derive(Clone)]
struct Worker {
    name: &'static str,
}

impl Injectable for Worker {}

fn main() {
    // JSON if logging-json is enabled, pretty otherwise
    invoke_di::logging::init();

    println!("=== invoke-di Logging Demo ===\n");

    // Logs: "Creating new root registry"
    let registry = Registry::new();

    // Logs: "Registering value provider"
    registry.must_provide_value(
        Database {
            url: "postgres://localhost/mydb".into(),
        },
        &[],
    );

    // Logs: "Registering factory provider"; the factory runs on first use
    registry.must_provide(
        |db: Database| {
            println!("  [App] UserService being created...");
            UserService { db }
        },
        &[],
    );

    // Logs: "Invoking factory" once, then hits the cache
    let _users = registry.get::<UserService>().unwrap();
    let _users = registry.get::<UserService>().unwrap();

    // Each resolution hands out the next worker
    registry.must_provide_value(
        vec![Worker { name: "w1" }, Worker { name: "w2" }],
        &[ProviderOption::RoundRobin],
    );
    let names = registry
        .invoke(|a: Worker, b: Worker, c: Worker| [a.name, b.name, c.name])
        .unwrap();
    println!("  [App] Workers picked: {names:?}");

    // A missing parameter fails the whole call
    let err = registry.invoke(|_ctx: RequestContext| ()).unwrap_err();
    println!("  [App] Expected failure: {err}");

    // Logs: "Creating child registry"
    let request = registry.scope();
    request.must_provide_value(
        RequestContext {
            request_id: "req-12345".into(),
        },
        &[],
    );

    // Local provider plus a fallback to the parent
    let summary = request
        .invoke(|ctx: RequestContext, users: UserService| {
            format!("{} served by {}", ctx.request_id, users.db.url)
        })
        .unwrap();
    println!("  [App] {summary}");

    // The parent never sees the child's providers
    assert!(!registry.contains::<RequestContext>());

    println!("\n=== Demo Complete ===");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}
