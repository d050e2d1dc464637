use bson::{Bson, doc};
use mongofluent::{Config, MemoryConnector, MongoDb};

fn connect(dbname: &str) -> MongoDb {
    MongoDb::connect(&Config::new("localhost", dbname), &MemoryConnector::shared()).unwrap()
}

fn seed_people(db: &mut MongoDb) {
    db.insert_batch(
        "people",
        vec![
            doc! {"name": "alice", "age": 30, "city": "berlin"},
            doc! {"name": "bob", "age": 40, "city": "paris"},
            doc! {"name": "carol", "age": 35, "city": "berlin"},
            doc! {"name": "dave", "age": 22, "city": "madrid"},
        ],
    )
    .unwrap();
}

#[test]
fn where_eq_narrows_results() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let docs = db.where_eq("city", "berlin").get("people", None, None).unwrap().result().unwrap();
    assert_eq!(docs.len(), 2);
}

#[test]
fn comparison_chain_accumulates_on_one_field() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let docs = db
        .where_gte("age", 30)
        .where_lt("age", 40)
        .get("people", None, None)
        .unwrap()
        .result()
        .unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| {
        let age = d.get_i32("age").unwrap();
        (30..40).contains(&age)
    }));
}

#[test]
fn where_between_bounds_are_inclusive() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let n = db.where_between("age", 22, 30).count_all_results("people").unwrap();
    assert_eq!(n, 2);
    let n = db.where_between_ne("age", 22, 30).count_all_results("people").unwrap();
    assert_eq!(n, 0);
}

#[test]
fn where_in_and_not_in() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let n = db
        .where_in("city", vec!["berlin".into(), "paris".into()])
        .count_all_results("people")
        .unwrap();
    assert_eq!(n, 3);
    let n = db
        .where_not_in("city", vec!["berlin".into()])
        .count_all_results("people")
        .unwrap();
    assert_eq!(n, 2);
}

#[test]
fn or_where_builds_alternatives() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let n = db
        .or_where(doc! {"name": "alice"})
        .or_where(doc! {"age": {"$gt": 38}})
        .count_all_results("people")
        .unwrap();
    assert_eq!(n, 2);
}

#[test]
fn select_projects_fields_and_keeps_id() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let docs = db
        .select(["name"])
        .where_eq("name", "alice")
        .get("people", None, None)
        .unwrap()
        .result()
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].contains_key("_id"));
    assert!(docs[0].contains_key("name"));
    assert!(!docs[0].contains_key("age"));
}

#[test]
fn order_by_with_window() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let docs = db
        .order_by("age", "desc")
        .limit(2)
        .offset(1)
        .get("people", None, None)
        .unwrap()
        .result()
        .unwrap();
    let names: Vec<_> = docs.iter().map(|d| d.get_str("name").unwrap()).collect();
    assert_eq!(names, vec!["carol", "alice"]);
}

#[test]
fn order_by_accepts_numeric_and_bool_directions() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let asc = db.order_by("age", 1).get("people", None, None).unwrap().result().unwrap();
    assert_eq!(asc[0].get_str("name").unwrap(), "dave");
    let desc = db.order_by("age", false).get("people", None, None).unwrap().result().unwrap();
    assert_eq!(desc[0].get_str("name").unwrap(), "bob");
}

#[test]
fn where_doc_merges_and_get_where_is_shorthand() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let a = db
        .where_doc(doc! {"city": "berlin", "age": {"$gte": 35}})
        .get("people", None, None)
        .unwrap()
        .result()
        .unwrap();
    let b = db
        .get_where("people", doc! {"city": "berlin", "age": {"$gte": 35}}, None, None)
        .unwrap()
        .result()
        .unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].get_str("name").unwrap(), b[0].get_str("name").unwrap());
}

#[test]
fn where_ne_excludes_matches() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let n = db.where_ne("city", "berlin").count_all_results("people").unwrap();
    assert_eq!(n, 2);
}

#[test]
fn distinct_respects_filters() {
    let mut db = connect("builder");
    seed_people(&mut db);
    let cities = db.where_gt("age", 25).distinct("people", "city").unwrap();
    assert_eq!(cities.len(), 2);
    assert!(cities.contains(&Bson::String("berlin".into())));
    assert!(cities.contains(&Bson::String("paris".into())));
}

#[test]
fn numeric_equality_spans_bson_types() {
    let mut db = connect("builder");
    db.insert_batch(
        "readings",
        vec![
            doc! {"sensor": "a", "value": 30},
            doc! {"sensor": "b", "value": 30.0},
            doc! {"sensor": "c", "value": Bson::Int64(30)},
            doc! {"sensor": "d", "value": 31},
        ],
    )
    .unwrap();
    // Int32, Int64 and Double thirty are the same value
    assert_eq!(db.where_eq("value", 30).count_all_results("readings").unwrap(), 3);
    assert_eq!(db.where_eq("value", 30.0).count_all_results("readings").unwrap(), 3);
    assert_eq!(db.where_ne("value", 30).count_all_results("readings").unwrap(), 1);
    let n = db
        .where_in("value", vec![Bson::Double(30.0), Bson::Int32(31)])
        .count_all_results("readings")
        .unwrap();
    assert_eq!(n, 4);
}

#[test]
fn count_all_ignores_filters_but_clears_them() {
    let mut db = connect("builder");
    seed_people(&mut db);
    db.where_eq("city", "berlin");
    assert_eq!(db.count_all("people").unwrap(), 4);
    // the filter did not survive into the next chain
    assert_eq!(db.count_all_results("people").unwrap(), 4);
}
