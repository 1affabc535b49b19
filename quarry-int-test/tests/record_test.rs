use chrono::{TimeZone, Utc};
use quarry::common::{ObjectId, Value};
use quarry::errors::{ErrorKind, QuarryError};
use quarry::record::LifecycleEvent;
use quarry::{doc, val, FieldValue, Schema};
use quarry_int_test::test_util::{cleanup, create_test_context, run_test, TEST_DATABASE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_new_record_flags() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.new_record();
            assert!(post.is_new_record());
            assert!(!post.is_saved());

            post.set("title", "hello")?;
            assert!(post.is_new_record());
            assert!(!post.is_saved());

            post.save()?;
            assert!(!post.is_new_record());
            assert!(post.is_saved());
            assert_eq!(ctx.server().documents(TEST_DATABASE, "posts").len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_saving_twice_writes_once() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.create(doc! { title: "once" })?;
            post.save()?;
            post.save()?;
            assert_eq!(ctx.server().write_count(), 1);

            post.set("title", "twice")?;
            post.save()?;
            assert_eq!(ctx.server().write_count(), 2);

            let stored = ctx.server().documents(TEST_DATABASE, "posts");
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].get("title"), Some(&val!("twice")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_round_trip_through_the_store() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.create(doc! {
                title: "round trip",
                votes: 7,
                tags: ["a", "b"],
                meta: { lang: "en" },
            })?;
            post.save()?;
            let id = post.id();

            let loaded = posts.find_by_id(id).fetch_one()?;
            let mut loaded = loaded.expect("saved post is found");
            assert!(!loaded.is_new_record());
            assert!(loaded.is_saved());

            let mut original = post.to_array(false)?;
            let mut reloaded = loaded.to_array(false)?;
            // timestamps are stored with second precision
            for key in ["created_at", "updated_at"] {
                assert!(original.remove(key).is_some());
                assert!(reloaded.remove(key).is_some());
            }
            assert_eq!(original, reloaded);
            assert_eq!(reloaded.get("id"), Some(&val!(id.to_hex())));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_containers_are_mutable_in_place() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.create(doc! { tags: ["rust"] })?;
            post.save()?;

            let mut tags = post.get("tags")?;
            let container = match &mut tags {
                FieldValue::Container(container) => container,
                other => panic!("expected a container, found {:?}", other),
            };
            container.push("db")?;
            assert_eq!(container.at(1), Some(&val!("db")));
            post.set("tags", tags)?;
            post.save()?;

            let stored = ctx.server().documents(TEST_DATABASE, "posts");
            assert_eq!(stored[0].get("tags"), Some(&val!(vec![val!("rust"), val!("db")])));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_identity_is_generated_and_fixed() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.new_record();
            let id = post.id();
            assert_eq!(post.get("id")?, val!(id.to_hex()));
            assert_eq!(post.get("_id")?, val!(id));

            post.set("_id", id.to_hex())?;
            let err = post.set("id", ObjectId::new()).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidId);

            let err = post.set("_id", 42).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidId);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_read_identity_is_persisted() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.new_record();
            let id = match post.get("id")? {
                FieldValue::Value(Value::String(hex)) => ObjectId::parse_str(&hex)?,
                other => panic!("expected hex text, found {:?}", other),
            };
            assert!(!post.is_saved());

            post.save()?;
            assert!(!post.is_new_record());
            assert!(post.is_saved());

            let loaded = posts.find_by_id(id).fetch_one()?;
            assert_eq!(loaded.and_then(|r| r.stored_id()), Some(id));
            assert_eq!(ctx.server().write_count(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_timestamps_are_stamped_on_create_and_update() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.create(doc! { title: "stamped" })?;
            post.save()?;

            let created = post.get("created_at")?.as_datetime();
            let updated = post.get("updated_at")?.as_datetime();
            assert!(created.is_some());
            assert!(updated >= created);

            let stored = ctx.server().documents(TEST_DATABASE, "posts");
            assert!(matches!(stored[0].get("created_at"), Some(Value::Timestamp(_))));

            let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
            post.set("created_at", past)?;
            assert_eq!(post.get("created_at")?.as_datetime(), Some(past));

            let err = post.set("updated_at", "yesterday").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_resets_the_record() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.create(doc! { title: "short lived" })?;
            post.save()?;
            let id = post.id();

            assert!(post.delete()?);
            assert!(post.is_new_record());
            assert!(post.fields().is_empty());
            assert!(post.to_array(false)?.is_empty());
            assert!(ctx.server().documents(TEST_DATABASE, "posts").is_empty());

            let missing = posts.find_by_id(id).select()?;
            assert!(missing.is_single());
            assert!(missing.into_single().is_none());

            assert!(!post.delete()?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_hooks_run_in_order() {
    run_test(
        create_test_context,
        |ctx| {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut schema = Schema::builder("Post");
            for event in [
                LifecycleEvent::BeforeSave,
                LifecycleEvent::BeforeCreate,
                LifecycleEvent::AfterCreate,
                LifecycleEvent::BeforeUpdate,
                LifecycleEvent::AfterUpdate,
                LifecycleEvent::AfterSave,
            ] {
                let calls = calls.clone();
                schema = schema.hook(event, move |record| {
                    let step = calls.fetch_add(1, Ordering::SeqCst);
                    record.set(&event.to_string(), step as i64)
                });
            }
            let posts = ctx.connection().model(schema.build());

            let mut post = posts.create(doc! { title: "hooked" })?;
            post.save()?;
            assert_eq!(post.get("before_save")?, val!(0));
            assert_eq!(post.get("before_create")?, val!(1));
            assert_eq!(post.get("after_create")?, val!(2));
            assert_eq!(post.get("after_save")?, val!(3));
            assert!(!post.has("before_update"));

            // the after hooks left changes behind, so this is an update
            post.save()?;
            assert_eq!(post.get("before_update")?, val!(5));
            assert_eq!(post.get("after_update")?, val!(6));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failing_hook_aborts_the_save() {
    run_test(
        create_test_context,
        |ctx| {
            let schema = Schema::builder("Post")
                .before_create(|record| {
                    if record.has("title") {
                        Ok(())
                    } else {
                        Err(QuarryError::new("a post needs a title", ErrorKind::InvalidOperation))
                    }
                })
                .build();
            let posts = ctx.connection().model(schema);

            let mut post = posts.create(doc! { votes: 1 })?;
            let err = post.save().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            assert!(post.is_new_record());
            assert_eq!(ctx.server().write_count(), 0);

            post.set("title", "fixed")?;
            post.save()?;
            assert_eq!(ctx.server().write_count(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_getter_and_setter_overrides() {
    run_test(
        create_test_context,
        |ctx| {
            let schema = Schema::builder("User")
                .setter("email", |value| {
                    Ok(FieldValue::from(value.as_str().unwrap_or_default().to_lowercase()))
                })
                .getter("name", |value| {
                    Ok(FieldValue::from(format!("Dr. {}", value.as_str().unwrap_or_default())))
                })
                .build();
            let users = ctx.connection().model(schema);

            let mut user = users.create(doc! { name: "Who", email: "WHO@TARDIS.ORG" })?;
            user.save()?;
            assert_eq!(user.get("name")?, val!("Dr. Who"));
            assert_eq!(user.get("email")?, val!("who@tardis.org"));

            let stored = ctx.server().documents(TEST_DATABASE, "users");
            assert_eq!(stored[0].get("name"), Some(&val!("Who")));
            assert_eq!(stored[0].get("email"), Some(&val!("who@tardis.org")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unacknowledged_write_is_persistence_error() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            ctx.server().set_read_only(true);

            let mut post = posts.create(doc! { title: "refused" })?;
            let err = post.save().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::PersistenceError);
            assert!(post.is_new_record());
            assert!(!post.is_saved());

            ctx.server().set_read_only(false);
            post.save()?;
            assert!(post.is_saved());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unset_marks_dirty() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            let mut post = posts.create(doc! { title: "t", draft: true })?;
            post.save()?;

            assert!(post.unset("draft")?);
            assert!(!post.is_saved());
            assert!(!post.unset("draft")?);
            assert_eq!(post.unset("_id").unwrap_err().kind(), &ErrorKind::InvalidOperation);

            post.save()?;
            let stored = ctx.server().documents(TEST_DATABASE, "posts");
            assert!(stored[0].get("draft").is_none());
            Ok(())
        },
        cleanup,
    )
}
