// tests/join_tests.rs

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use jtx::{CompileOptions, ErrorKind, TransformContext, Transformer, Value};

const FLEET: &str = r#"{
    "Drivers": [
        {"Name": "Ann", "CarId": 2},
        {"Name": "Bob", "CarId": 9},
        {"Name": "Cy", "CarId": 1}
    ],
    "Cars": [
        {"Id": 1, "Model": "Camaro"},
        {"Id": 2, "Model": "Mustang"},
        {"Id": 2, "Model": "Mustang GT"}
    ]
}"#;

fn run(transform: &str, input: &str) -> String {
    let transformer = Transformer::compile(transform).unwrap_or_else(|e| panic!("Failed to compile: {}", e));
    transformer
        .transform_str(input, &TransformContext::new())
        .unwrap_or_else(|e| panic!("Failed to transform: {}", e))
}

// ============================================================================
// Inner Join
// ============================================================================

#[test]
fn test_inner_join_drops_unmatched_left() {
    let out = run(
        r##"{"#foreach(innerjoin(Drivers, Cars, left.CarId == right.Id), Assignments)": {
            "Driver": "#(left.Name)",
            "Car": "#(right.Model)"
        }}"##,
        FLEET,
    );
    assert_eq!(
        out,
        r#"{"Assignments":[{"Driver":"Ann","Car":"Mustang"},{"Driver":"Ann","Car":"Mustang GT"},{"Driver":"Cy","Car":"Camaro"}]}"#
    );
}

#[test]
fn test_inner_join_as_value_directive() {
    let out = run(
        r##"{"Rows": "#innerjoin(Drivers[Name == 'Cy'], Cars, left.CarId == right.Id)"}"##,
        FLEET,
    );
    assert_eq!(
        out,
        r#"{"Rows":[{"left":{"Name":"Cy","CarId":1},"right":{"Id":1,"Model":"Camaro"}}]}"#
    );
}

#[test]
fn test_inner_join_in_expression() {
    assert_eq!(
        run(r##"{"Matches": "#(count(innerjoin(Drivers, Cars, left.CarId == right.Id)))"}"##, FLEET),
        r#"{"Matches":3}"#
    );
}

#[test]
fn test_root_level_join() {
    assert_eq!(
        run(r##""#innerjoin(Drivers[Name == 'Ann'], Cars[Id == 2], true)""##, FLEET),
        r#"[{"left":{"Name":"Ann","CarId":2},"right":{"Id":2,"Model":"Mustang"}},{"left":{"Name":"Ann","CarId":2},"right":{"Id":2,"Model":"Mustang GT"}}]"#
    );
}

// ============================================================================
// Outer Join
// ============================================================================

#[test]
fn test_outer_join_keeps_unmatched_left_with_null() {
    let out = run(
        r##"{"#foreach(outerjoin(Drivers, Cars, left.CarId == right.Id), Assignments)": {
            "Driver": "#(left.Name)",
            "Car": "#(right.Model ?? 'none')"
        }}"##,
        FLEET,
    );
    assert_eq!(
        out,
        r#"{"Assignments":[{"Driver":"Ann","Car":"Mustang"},{"Driver":"Ann","Car":"Mustang GT"},{"Driver":"Bob","Car":"none"},{"Driver":"Cy","Car":"Camaro"}]}"#
    );
}

#[test]
fn test_outer_join_row_shape() {
    assert_eq!(
        run(r##"{"Rows": "#outerjoin(Drivers[Name == 'Bob'], Cars, left.CarId == right.Id)"}"##, FLEET),
        r#"{"Rows":[{"left":{"Name":"Bob","CarId":9},"right":null}]}"#
    );
}

#[test]
fn test_joins_over_empty_sequences() {
    let input = r#"{"Empty": [], "Items": [1, 2]}"#;
    assert_eq!(run(r##"{"R": "#innerjoin(Empty, Items, true)"}"##, input), r#"{"R":[]}"#);
    assert_eq!(run(r##"{"R": "#innerjoin(Items, Missing, true)"}"##, input), r#"{"R":[]}"#);
    assert_eq!(
        run(r##"{"R": "#outerjoin(Items, Empty, true)"}"##, input),
        r#"{"R":[{"left":1,"right":null},{"left":2,"right":null}]}"#
    );
}

// ============================================================================
// Placement
// ============================================================================

#[test]
fn test_join_node_not_allowed_as_member() {
    let err = Transformer::compile(r##"{"#innerjoin(Drivers, Cars, true)": {}}"##).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn test_join_node_with_wrong_arity() {
    let err = Transformer::compile(r##"{"R": "#outerjoin(Drivers, Cars)"}"##).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

// ============================================================================
// Laziness and Errors
// ============================================================================

fn counting_transformer(hits: &Arc<AtomicUsize>, transform: &str) -> Transformer {
    let hits = Arc::clone(hits);
    Transformer::compile_with(
        transform,
        CompileOptions::new().with_function("tally", move |args: &[Value]| -> Result<Value, String> {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(args.first().cloned().unwrap_or(Value::Null))
        }),
    )
    .unwrap()
}

#[test]
fn test_foreach_over_join_is_lazy() {
    let hits = Arc::new(AtomicUsize::new(0));
    let transformer = counting_transformer(
        &hits,
        r##"{"#foreach(innerjoin(Drivers, Cars, tally(left.CarId == right.Id)), Rows)": {
            "#assert(left.Name != 'Ann')": "#('stopped at ' + left.Name)"
        }}"##,
    );

    let err = transformer.transform_str(FLEET, &TransformContext::new()).unwrap_err();
    assert_eq!(err.to_string(), "Assertion failed: stopped at Ann");
    // Ann's first match is Cars[1]; no later pair was tried.
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_predicate_evaluated_for_every_pair() {
    let hits = Arc::new(AtomicUsize::new(0));
    let transformer = counting_transformer(&hits, r##"{"R": "#innerjoin(Drivers, Cars, tally(false))"}"##);

    let out = transformer.transform_str(FLEET, &TransformContext::new()).unwrap();
    assert_eq!(out, r#"{"R":[]}"#);
    assert_eq!(hits.load(Ordering::SeqCst), 9);
}

#[test]
fn test_predicate_error_stops_join() {
    let transformer = Transformer::compile(r##"{"R": "#innerjoin(Drivers, Cars, left.CarId / 0 == 1)"}"##).unwrap();
    let err = transformer.transform_str(FLEET, &TransformContext::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DivisionByZero);
}
