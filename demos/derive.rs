//! Shows the `Injectable` and `Inject` derives
//!
//! Run with:
//!   cargo run --example derive --features derive

use invoke_di::{Inject, Injectable, Registry};
use std::sync::Arc;

#[derive(Clone, Injectable)]
struct Database {
    url: String,
}

#[derive(Clone, Injectable)]
struct Cache {
    size: usize,
}

#[allow(dead_code)]
#[derive(Clone, Injectable)]
struct Logger {
    level: String,
}

#[derive(Clone, Injectable, Inject)]
struct UserService {
    #[inject]
    db: Arc<Database>,
    #[inject]
    cache: Cache,
    #[inject(optional)]
    logger: Option<Logger>,
    // Non-injected field uses Default
    request_count: u64,
}

impl UserService {
    fn describe(&self) -> String {
        let logger_status = if self.logger.is_some() {
            "with logging"
        } else {
            "without logging"
        };
        format!(
            "UserService connected to {} with cache size {} ({}, requests: {})",
            self.db.url, self.cache.size, logger_status, self.request_count
        )
    }
}

// Depends on a type that is itself built by from_registry
#[derive(Inject)]
struct ApiController {
    #[inject]
    users: UserService,
}

fn main() {
    println!("=== invoke-di Derive Demo ===\n");

    let registry = Registry::new();
    registry.must_provide_value(
        Arc::new(Database {
            url: "postgres://localhost:5432/myapp".into(),
        }),
        &[],
    );
    registry.must_provide_value(Cache { size: 1024 }, &[]);
    // Logger is not provided, so the optional field stays None

    // from_registry doubles as a factory, since the registry provides itself
    registry.must_provide(|r: Registry| UserService::from_registry(&r), &[]);

    let controller = match ApiController::from_registry(&registry) {
        Ok(controller) => controller,
        Err(err) => {
            eprintln!("Failed to build ApiController: {err}");
            return;
        }
    };
    println!("{}", controller.users.describe());

    // A child with a logger builds its own UserService
    let verbose = registry.scope();
    verbose.must_provide_value(
        Logger {
            level: "debug".into(),
        },
        &[],
    );
    match UserService::from_registry(&verbose) {
        Ok(users) => println!("{}", users.describe()),
        Err(err) => eprintln!("Failed to build UserService: {err}"),
    }

    println!("\n=== Demo Complete ===");
}
