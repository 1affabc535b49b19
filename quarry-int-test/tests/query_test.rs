use quarry::common::{SortOrder, Value};
use quarry::errors::ErrorKind;
use quarry::{doc, val, Selection};
use quarry_int_test::test_util::{
    cleanup, create_test_context, insert_people, insert_posts, run_test, TEST_DATABASE,
};
use rand::seq::SliceRandom;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn ages(records: &mut [quarry::Record]) -> quarry::QuarryResult<Vec<i64>> {
    let mut ages = Vec::with_capacity(records.len());
    for record in records.iter_mut() {
        ages.push(record.get("age")?.as_i64().unwrap_or(-1));
    }
    Ok(ages)
}

#[test]
fn test_range_conditions_compose() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            insert_people(&people, &[5, 12, 15, 19, 20, 30])?;

            let mut teens = people.find().gt("age", 10).lt("age", 20).sort("age", true).fetch()?;
            assert_eq!(ages(&mut teens)?, vec![12, 15, 19]);

            let mut query = people.find().gt("age", 10).lt("age", 20);
            assert_eq!(query.filter(), &doc! { age: { "$gt": 10, "$lt": 20 } });
            assert_eq!(query.count()?, 3);

            let mut between = people.find().range("age", 12, 20).sort("age", true).fetch()?;
            assert_eq!(ages(&mut between)?, vec![15, 19]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_limit_bounds_the_count() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            let mut all_ages: Vec<i64> = (0..100).collect();
            all_ages.shuffle(&mut rand::rng());
            insert_people(&people, &all_ages)?;

            assert_eq!(people.find().limit(5).count()?, 5);
            assert_eq!(people.find().count()?, 100);
            assert_eq!(people.find().skip(98).limit(5).count()?, 2);

            let mut query = people.find().limit(5);
            assert_eq!(query.fetch()?.len(), 5);
            assert_eq!(query.cached_count(), Some(5));

            // zero means no limit
            assert_eq!(people.find().limit(0).fetch()?.len(), 100);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_descending_with_limit() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            insert_people(&people, &[1, 2, 3])?;

            let mut query = people.find().sort("age", false).limit(2);
            assert_eq!(query.sort_spec(), Some(&("age".to_string(), SortOrder::Descending)));
            let mut oldest = query.fetch()?;
            assert_eq!(ages(&mut oldest)?, vec![3, 2]);

            let mut skipped = people.find().sort("age", true).skip(1).fetch()?;
            assert_eq!(ages(&mut skipped)?, vec![2, 3]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_by_id() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            let mut saved = insert_people(&people, &[40, 41])?;
            let id = saved[1].id();

            let found = people.find_by_id(id.to_hex()).select()?;
            let mut found = found.into_single().expect("person is found");
            assert_eq!(found.get("age")?, val!(41));

            match people.find_by_id(quarry::common::ObjectId::new()).select()? {
                Selection::Single(None) => {}
                other => panic!("expected an empty single selection, found {:?}", other),
            }

            let ids = vec![saved[0].id(), id];
            assert_eq!(people.find_by_ids(ids).count()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_membership_and_negation() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            insert_posts(&posts, &[("rust", 5), ("go", 3), ("c", 1), ("rust", 2)])?;

            assert_eq!(posts.find().in_values("tag", ["rust", "c"]).count()?, 3);
            assert_eq!(posts.find().not_in("tag", ["rust"]).count()?, 2);
            assert_eq!(posts.find().not_equal("tag", "rust").count()?, 2);
            assert_eq!(posts.find().not("votes", 5).count()?, 3);
            assert_eq!(posts.find().is("tag", "rust").is("votes", 2).count()?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_text_matching() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            for name in ["Alice Smith", "alice jones", "Bob Stone", "Al.ice"] {
                people.create(doc! { name: name })?.save()?;
            }

            assert_eq!(people.find().regex("name", "/^alice/i").count()?, 2);
            assert_eq!(people.find().regex("name", "^Alice").count()?, 1);
            assert_eq!(people.find().like("name", "ALICE").count()?, 2);
            // like matches text literally
            assert_eq!(people.find().like("name", "l.i").count()?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_array_and_existence_conditions() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            posts.create(doc! { tags: ["a", "b", "c"], votes: 9 })?.save()?;
            posts.create(doc! { tags: ["a"], votes: 4 })?.save()?;
            posts.create(doc! { votes: 6 })?.save()?;

            assert_eq!(posts.find().size("tags", 3).count()?, 1);
            assert_eq!(posts.find().all("tags", ["a", "b"]).count()?, 1);
            assert_eq!(posts.find().exists("tags", true).count()?, 2);
            assert_eq!(posts.find().exists("tags", false).count()?, 1);
            assert_eq!(posts.find().modulo("votes", 3, 0).count()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_near_orders_by_distance() {
    run_test(
        create_test_context,
        |ctx| {
            let places = ctx.model("Place");
            for (name, lat, lng) in [("far", 10.0, 10.0), ("near", 1.0, 1.0), ("mid", 3.0, 3.0)] {
                places.create(doc! { name: name, loc: [lat, lng] })?.save()?;
            }

            let mut nearest = places.find().near("loc", 0.0, 0.0, None).fetch()?;
            let mut names = Vec::new();
            for place in nearest.iter_mut() {
                names.push(place.get("name")?);
            }
            assert_eq!(names, vec![val!("near"), val!("mid"), val!("far")]);

            assert_eq!(places.find().near("loc", 0.0, 0.0, Some(5.0)).count()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_where_expression() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            posts.create(doc! { votes: 10, views: 3 })?.save()?;
            posts.create(doc! { votes: 1, views: 30 })?.save()?;

            let mut popular = posts.find().jsfunc("this.votes > this.views").fetch()?;
            assert_eq!(popular.len(), 1);
            assert_eq!(popular[0].get("votes")?, val!(10));

            let err = posts.find().jsfunc("this.unknown()").count().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_projection() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.model("Post");
            posts
                .create(doc! { title: "t", body: "long", comments: [1, 2, 3, 4] })?
                .save()?;

            let mut post = posts
                .find_one()
                .exclude("body")
                .slice("comments", -2)
                .fetch_one()?
                .expect("post is found");
            assert!(!post.has("body"));
            assert_eq!(post.get("title")?, val!("t"));
            let comments = post.get("comments")?;
            let comments = comments.as_container().expect("comments are an array");
            assert_eq!(comments.value(), &val!(vec![3, 4]));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_results_are_restartable() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            insert_people(&people, &[1, 2, 3])?;

            let mut query = people.find().gte("age", 2);
            assert_eq!(query.iter()?.count(), 2);
            assert_eq!(query.iter()?.count(), 2);

            insert_people(&people, &[4])?;
            assert_eq!(query.iter()?.len(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_by_query() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            insert_people(&people, &[1, 2, 3, 4])?;

            assert_eq!(people.find().gt("age", 2).remove(true)?, 1);
            assert_eq!(people.find().gt("age", 1).remove(false)?, 2);
            assert_eq!(ctx.server().documents(TEST_DATABASE, "people").len(), 1);

            ctx.server().set_read_only(true);
            let err = people.find().remove(false).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::PersistenceError);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_identity_is_deferred() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            let mut query = people.find().is("id", "not-an-id");
            assert!(query.error().is_some());
            let err = query.count().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidId);
            assert_eq!(query.fetch().unwrap_err().kind(), &ErrorKind::InvalidId);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_queries_against_stored_values() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.model("Person");
            insert_people(&people, &[33])?;
            let stored = ctx.server().documents(TEST_DATABASE, "people");
            let name = stored[0].get("name").cloned().unwrap_or(Value::Null);

            let mut found = people.find().is("name", name.clone()).fetch()?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].get("name")?, name);
            Ok(())
        },
        cleanup,
    )
}
