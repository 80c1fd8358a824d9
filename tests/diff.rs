use yang_core::context::{Context, ContextFlags};
use yang_core::diff::{schema_diff, SchemaAttribute, SchemaDiff};
use yang_core::schema::{SchemaInputFormat, SchemaNode};

static OLD_DIR: &str = "./assets/yang-old/";
static NEW_DIR: &str = "./assets/yang/";

static MODULE: &str = r###"
module mod {
  namespace "urn:mod";
  prefix m;

  container conf {
    leaf speed {
      type uint32;
      description "Speed.";
    }
  }
}
"###;

fn create_context(dir: &str) -> Context {
    let mut ctx = Context::new_with_searchdirs(ContextFlags::NO_YANGLIBRARY, &[dir])
        .expect("Failed to create context");
    ctx.load_module("yolo-system", None, &["*"])
        .expect("Failed to load module");
    ctx
}

fn no_exclusion(_: &SchemaNode<'_>) -> bool {
    false
}

fn lines(diffs: &[SchemaDiff<'_>]) -> Vec<String> {
    diffs.iter().map(|diff| diff.to_string()).collect()
}

#[test]
fn diff_same_schema() {
    let old = create_context(NEW_DIR);
    let new = create_context(NEW_DIR);

    assert!(schema_diff(&old, &new, no_exclusion).is_empty());
    assert!(schema_diff(&old, &old, no_exclusion).is_empty());
}

#[test]
fn diff_description() {
    let mut old = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
    old.parse_module(MODULE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    let mut new = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
    new.parse_module(
        &MODULE.replace("\"Speed.\"", "\"Port speed.\""),
        SchemaInputFormat::YANG,
        &[],
    )
    .expect("Failed to parse module");

    let diffs = schema_diff(&old, &new, no_exclusion);
    assert_eq!(
        lines(&diffs),
        vec![
            "-/mod:conf/speed: description \"Speed.\"",
            "+/mod:conf/speed: description \"Port speed.\"",
        ]
    );
    assert!(diffs
        .iter()
        .all(|diff| diff.attribute() == Some(SchemaAttribute::Description)));
    assert!(matches!(diffs[0], SchemaDiff::AttributeRemoved(_)));
    assert!(matches!(diffs[1], SchemaDiff::AttributeAdded(_)));
}

#[test]
fn diff_versions() {
    let old = create_context(OLD_DIR);
    let new = create_context(NEW_DIR);
    let diffs = schema_diff(&old, &new, no_exclusion);
    let lines = lines(&diffs);

    for expected in [
        "-/yolo-system:conf/hostname: description \"The host name.\"",
        "+/yolo-system:conf/hostname: description \"The host name of the system.\"",
        "+/yolo-system:conf/hostname-ref: added node",
        "+/yolo-system:conf/full: added node",
        "-/yolo-system:conf/speed: base-type \"uint32\"",
        "+/yolo-system:conf/speed: base-type \"uint64\"",
        "+/yolo-system:conf/speed: default \"4000\"",
        "-/yolo-system:conf/number: node-type \"leaf\"",
        "+/yolo-system:conf/number: node-type \"leaf-list\"",
        "+/yolo-system:conf/number: ordered-by \"system\"",
        "-/yolo-system:conf/deprecated-leaf: status \"current\"",
        "+/yolo-system:conf/deprecated-leaf: status \"deprecated\"",
        "-/yolo-system:conf/obsolete-leaf: status \"current\"",
        "+/yolo-system:conf/obsolete-leaf: status \"obsolete\"",
        "-/yolo-system:conf/url/proto: enum \"sftp\"",
        "-/yolo-system:conf/url/proto: enum-status \"ftp current\"",
        "+/yolo-system:conf/url/proto: enum-status \"ftp deprecated\"",
        "+/yolo-system:conf/url/enabled: added node",
        "+/yolo-system:conf/url/fetch: added node",
        "+/yolo-system:conf/url/fetch/input/timeout: added node",
        "+/yolo-system:conf/url/fetch/output/result: added node",
        "+/yolo-system:state/full: added node",
        "+/yolo-system:state/speed: base-type \"uint64\"",
        "+/yolo-system:alarm-triggered: added node",
        "+/yolo-system:alarm-triggered/severity: added node",
    ] {
        assert!(
            lines.iter().any(|line| line == expected),
            "missing \"{}\" in {:#?}",
            expected,
            lines
        );
    }

    // Unchanged nodes are not reported.
    assert!(!lines
        .iter()
        .any(|line| line.starts_with("+/yolo-system:conf/url/path:")
            || line.starts_with("-/yolo-system:conf/url/path:")));

    // Sorted by schema path.
    let paths: Vec<String> = diffs.iter().map(|diff| diff.path()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn diff_removed_nodes() {
    let old = create_context(OLD_DIR);
    let new = create_context(NEW_DIR);

    // Reversed comparison: nodes of the new version are removed.
    let lines = lines(&schema_diff(&new, &old, no_exclusion));
    assert!(lines
        .iter()
        .any(|line| line == "-/yolo-system:conf/full: removed status=current node"));
    assert!(lines
        .iter()
        .any(|line| line == "+/yolo-system:conf/url/proto: enum \"sftp\""));
}

#[test]
fn diff_exclude() {
    let old = create_context(OLD_DIR);
    let new = create_context(NEW_DIR);

    let diffs = schema_diff(&old, &new, |node: &SchemaNode<'_>| node.is_state());
    assert!(!diffs.is_empty());
    assert!(diffs
        .iter()
        .all(|diff| !diff.path().starts_with("/yolo-system:state")));
}
