use yang_core::context::{Context, ContextFlags};
use yang_core::data::{
    Data, DataFormat, DataParserFlags, DataTree, DataValidationFlags,
};
use yang_core::logging::LogLevel;
use yang_core::schema::SchemaInputFormat;
use yang_core::ErrorCode;

static MODULE_RULES: &str = r###"
module rules {
  namespace "urn:rules";
  prefix r;

  container conf {
    leaf enabled {
      type boolean;
    }
    leaf port {
      when "../enabled = 'true'";
      type uint16;
    }
    leaf limit {
      type uint32;
      must ". <= 100" {
        error-message "Limit too high.";
        error-app-tag "limit-exceeded";
      }
    }
  }

  container state {
    config false;
    leaf used {
      type uint32;
      must ". <= 100";
    }
  }
}
"###;

static MODULE_LISTS: &str = r###"
module lists {
  namespace "urn:lists";
  prefix l;

  container servers {
    list server {
      key "name";
      unique "ip port";
      max-elements 2;
      leaf name {
        type string;
      }
      leaf ip {
        type string;
      }
      leaf port {
        type uint16;
      }
    }
    leaf-list tag {
      type string;
      min-elements 1;
    }
  }
}
"###;

fn create_context(module: &str) -> Context {
    let mut ctx =
        Context::new(ContextFlags::NO_YANGLIBRARY).expect("Failed to create context");
    ctx.parse_module(module, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    ctx
}

fn parse_json_data<'a>(ctx: &'a Context, string: &str) -> DataTree<'a> {
    DataTree::parse_string(
        ctx,
        string,
        DataFormat::JSON,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree")
}

#[test]
fn validate_when() {
    let ctx = create_context(MODULE_RULES);

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"rules:conf": {"enabled": false, "port": 80}}"#,
    );
    let err = dtree.validate(DataValidationFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::WhenViolation);
    assert_eq!(err.path.as_deref(), Some("/rules:conf/port"));

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"rules:conf": {"enabled": true, "port": 80}}"#,
    );
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}

#[test]
fn validate_must() {
    let ctx = create_context(MODULE_RULES);

    let mut dtree = parse_json_data(&ctx, r#"{"rules:conf": {"limit": 500}}"#);
    let err = dtree.validate(DataValidationFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::MustViolation);
    assert_eq!(err.msg.as_deref(), Some("Limit too high."));
    assert_eq!(err.apptag.as_deref(), Some("limit-exceeded"));
    assert_eq!(err.path.as_deref(), Some("/rules:conf/limit"));

    let mut dtree = parse_json_data(&ctx, r#"{"rules:conf": {"limit": 50}}"#);
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}

#[test]
fn validate_must_state() {
    let ctx = create_context(MODULE_RULES);
    ctx.errors();

    // A failing must on state data is only reported as a warning.
    let mut dtree = parse_json_data(&ctx, r#"{"rules:state": {"used": 500}}"#);
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
    let records = ctx.errors();
    assert!(records.iter().any(|record| record.level == LogLevel::Warning
        && record.msg.contains(". <= 100")
        && record.data_path.as_ref().or(record.schema_path.as_ref())
            == Some(&"/rules:state/used".to_owned())));
}

#[test]
fn validate_max_elements() {
    let ctx = create_context(MODULE_LISTS);

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"lists:servers": {"tag": ["a"], "server": [
            {"name": "a"}, {"name": "b"}, {"name": "c"}
        ]}}"#,
    );
    let err = dtree.validate(DataValidationFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Cardinality);
    assert_eq!(
        err.path.as_deref(),
        Some("/lists:servers/server[name='c']")
    );
}

#[test]
fn validate_min_elements() {
    let ctx = create_context(MODULE_LISTS);
    assert_eq!(
        ctx.find_path("/lists:servers/tag").unwrap().min_elements(),
        Some(1)
    );
    assert_eq!(
        ctx.find_path("/lists:servers/server").unwrap().min_elements(),
        None
    );

    let mut dtree =
        parse_json_data(&ctx, r#"{"lists:servers": {"server": [{"name": "a"}]}}"#);
    let err = dtree.validate(DataValidationFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Cardinality);

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"lists:servers": {"tag": ["a"], "server": [{"name": "a"}]}}"#,
    );
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}

#[test]
fn validate_unique() {
    let ctx = create_context(MODULE_LISTS);

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"lists:servers": {"tag": ["a"], "server": [
            {"name": "a", "ip": "10.0.0.1", "port": 22},
            {"name": "b", "ip": "10.0.0.1", "port": 22}
        ]}}"#,
    );
    let err = dtree.validate(DataValidationFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Unique);
    assert_eq!(
        err.path.as_deref(),
        Some("/lists:servers/server[name='b']")
    );

    // Entries missing one of the unique leaves do not conflict.
    let mut dtree = parse_json_data(
        &ctx,
        r#"{"lists:servers": {"tag": ["a"], "server": [
            {"name": "a", "ip": "10.0.0.1", "port": 22},
            {"name": "b", "ip": "10.0.0.1"}
        ]}}"#,
    );
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}

#[test]
fn validate_merge_contexts() {
    let ctx1 = create_context(MODULE_RULES);
    let ctx2 = create_context(MODULE_RULES);

    let mut dtree1 = parse_json_data(&ctx1, r#"{"rules:conf": {"limit": 1}}"#);
    let dtree2 = parse_json_data(&ctx2, r#"{"rules:conf": {"limit": 2}}"#);
    let err = dtree1.merge(&dtree2).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::MergeConflict);

    // Trees of the same context merge.
    let dtree3 = parse_json_data(&ctx1, r#"{"rules:conf": {"limit": 3}}"#);
    dtree1.merge(&dtree3).expect("Failed to merge data trees");
    assert_eq!(
        dtree1
            .find_path("/rules:conf/limit")
            .unwrap()
            .value_canonical(),
        Some("3".to_owned())
    );
}
