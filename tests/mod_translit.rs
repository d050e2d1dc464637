use bson::doc;
use mongofluent::{Config, MemoryConnector, MongoDb};

fn connect() -> MongoDb {
    let mut db =
        MongoDb::connect(&Config::new("localhost", "translit"), &MemoryConnector::shared())
            .unwrap();
    db.insert_batch(
        "users",
        vec![
            doc! {"name": "John"},
            doc! {"name": "banjo"},
            doc! {"name": "José"},
            doc! {"name": "Péter"},
            doc! {"name": "v1.2"},
            doc! {"name": "v122"},
        ],
    )
    .unwrap();
    db
}

#[test]
fn like_is_substring_by_default() {
    let mut db = connect();
    let n = db.like("name", "jo", "i", false, false).count_all_results("users").unwrap();
    assert_eq!(n, 3);
}

#[test]
fn like_anchors_pin_the_match() {
    let mut db = connect();
    let n = db.like("name", "jo", "i", true, false).count_all_results("users").unwrap();
    assert_eq!(n, 2);
    let n = db.like("name", "jo", "i", false, true).count_all_results("users").unwrap();
    assert_eq!(n, 1);
}

#[test]
fn like_flags_control_case_sensitivity() {
    let mut db = connect();
    let n = db.like("name", "john", "", true, true).count_all_results("users").unwrap();
    assert_eq!(n, 0);
    let n = db.like("name", "john", "i", true, true).count_all_results("users").unwrap();
    assert_eq!(n, 1);
}

#[test]
fn like_matches_accented_variants() {
    let mut db = connect();
    let n = db.like_ci("name", "jose").count_all_results("users").unwrap();
    assert_eq!(n, 1);
    let n = db.like_ci("name", "peter").count_all_results("users").unwrap();
    assert_eq!(n, 1);
}

#[test]
fn like_escapes_regex_metacharacters() {
    let mut db = connect();
    // the dot is literal, so "v1.2" must not match "v122"
    let docs = db
        .like("name", "v1.2", "", true, true)
        .get("users", None, None)
        .unwrap()
        .result()
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get_str("name").unwrap(), "v1.2");
}

#[test]
fn or_like_matches_any_pattern() {
    let mut db = connect();
    let n = db
        .or_like("name", ["banjo", "peter"], "i")
        .count_all_results("users")
        .unwrap();
    assert_eq!(n, 2);
}

#[test]
fn not_like_excludes_patterns() {
    let mut db = connect();
    // case-sensitive: only "banjo" carries a lowercase "jo"
    let n = db.not_like("name", ["jo"]).count_all_results("users").unwrap();
    assert_eq!(n, 5);
    // "an" removes banjo, "v1" removes both version strings
    let n = db.not_like("name", ["an", "v1"]).count_all_results("users").unwrap();
    assert_eq!(n, 3);
}
