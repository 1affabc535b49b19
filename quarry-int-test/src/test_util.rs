use quarry::common::Value;
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use fake::Fake;
use quarry::errors::QuarryResult;
use quarry::store::memory::{InMemoryDriver, InMemoryServer};
use quarry::{doc, val, Connection, Model, Record, Schema};
use std::backtrace::Backtrace;
use std::thread;
use std::time::{Duration, Instant};

pub const TEST_DATABASE: &str = "test";

/// Runs a test between its setup and teardown, retrying a failed attempt.
/// Teardown runs even when the test fails.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> QuarryResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> QuarryResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> QuarryResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx).map_err(|e| {
                        (format!("After run failed: {:?}", e), backtrace.to_string())
                    }),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();
        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                if !bt.is_empty() && !bt.contains("disabled") {
                    format!("{}\n{}", e, bt)
                } else {
                    e
                }
            }
            Err(panic_err) => {
                if let Some(s) = panic_err.downcast_ref::<&str>() {
                    format!("Panic: {}", s)
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    format!("Panic: {}", s)
                } else {
                    "Panic: unknown payload".to_string()
                }
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("{}", error);
            thread::sleep(Duration::from_millis(50 * attempt as u64));
        }
        last_error = Some(error);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A connection to a fresh in-memory server owned by one test.
#[derive(Clone)]
pub struct TestContext {
    driver: InMemoryDriver,
    server: InMemoryServer,
    connection: Connection,
}

impl TestContext {
    pub fn driver(&self) -> InMemoryDriver {
        self.driver.clone()
    }

    pub fn server(&self) -> InMemoryServer {
        self.server.clone()
    }

    pub fn connection(&self) -> Connection {
        self.connection.clone()
    }

    pub fn address(&self) -> String {
        format!("memory://{}", self.server.name())
    }

    /// Registers a bare schema and returns its model.
    pub fn model(&self, name: &str) -> Model {
        self.connection.model(Schema::builder(name).build())
    }
}

pub fn random_server_name() -> String {
    format!("test-{}", uuid::Uuid::new_v4().simple())
}

pub fn create_test_context() -> QuarryResult<TestContext> {
    create_test_context_with(|builder| builder)
}

/// Like [create_test_context] with extra connection settings.
pub fn create_test_context_with<F>(configure: F) -> QuarryResult<TestContext>
where
    F: FnOnce(quarry::ConnectionBuilder) -> quarry::ConnectionBuilder,
{
    let driver = InMemoryDriver::new();
    let name = random_server_name();
    let server = driver.server(&name);
    register_functions(&server);

    let builder = Connection::builder()
        .driver(driver.clone())
        .configure(&format!("memory://{}", name), TEST_DATABASE);
    let connection = configure(builder).build();

    Ok(TestContext {
        driver,
        server,
        connection,
    })
}

/// Restores the server and drops every collection the test created.
pub fn cleanup(ctx: TestContext) -> QuarryResult<()> {
    let server = ctx.server();
    server.start();
    server.set_read_only(false);
    server.set_latency(None);

    let connection = ctx.connection();
    connection.configure(&ctx.address(), TEST_DATABASE);
    for name in server.collection_names(TEST_DATABASE) {
        connection.drop_collection(&name)?;
    }
    log::debug!("Cleaned up {}", ctx.address());
    Ok(())
}

/// Map, reduce, finalize and predicate bodies used across the tests.
pub fn register_functions(server: &InMemoryServer) {
    server.register_map("function() { emit(this.tag, this.votes); }", |doc, _scope, emitter| {
        if let (Some(tag), Some(votes)) = (doc.get("tag"), doc.get("votes")) {
            emitter.emit(tag.clone(), votes.clone());
        }
    });
    server.register_map("function() { emit(this.author, 1); }", |doc, _scope, emitter| {
        if let Some(author) = doc.get("author") {
            emitter.emit(author.clone(), 1);
        }
    });
    server.register_reduce(
        "function(key, values) { return Array.sum(values); }",
        |_key, values, _scope| val!(values.iter().filter_map(Value::as_i64).sum::<i64>()),
    );
    server.register_finalize(
        "function(key, value) { return value * factor; }",
        |_key, value, scope| {
            let factor = scope.get("factor").and_then(Value::as_i64).unwrap_or(1);
            val!(value.as_i64().unwrap_or(0) * factor)
        },
    );
    server.register_predicate("this.votes > this.views", |doc| {
        let votes = doc.get("votes").and_then(Value::as_i64).unwrap_or(0);
        let views = doc.get("views").and_then(Value::as_i64).unwrap_or(0);
        votes > views
    });
}

/// Saves one person per age.
pub fn insert_people(model: &Model, ages: &[i64]) -> QuarryResult<Vec<Record>> {
    let mut people = Vec::with_capacity(ages.len());
    for age in ages {
        let name: String = Name().fake();
        let mut person = model.create(doc! { name: name, age: (*age) })?;
        person.save()?;
        people.push(person);
    }
    Ok(people)
}

/// Saves one post per `(tag, votes)` pair, with a random title.
pub fn insert_posts(model: &Model, posts: &[(&str, i64)]) -> QuarryResult<()> {
    for (tag, votes) in posts {
        let title: String = Sentence(3..6).fake();
        model
            .create(doc! { title: title, tag: (*tag), votes: (*votes) })?
            .save()?;
    }
    Ok(())
}
