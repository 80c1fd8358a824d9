use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use yang_core::context::{searchdirs_from_env, Context, ContextFlags};
use yang_core::data::{
    Data, DataFormat, DataNewPathFlags, DataParserFlags, DataPrinterFlags,
    DataTree, DataValidationFlags,
};
use yang_core::extension::{
    ExtensionError, ExtensionInstance, ExtensionPlugin, PluginStatus,
};
use yang_core::logging::{LogCallback, LogLevel};
use yang_core::schema::{
    DataValue, SchemaInputFormat, SchemaOutputFormat, SchemaPathFormat,
    SchemaPrinterFlags,
};
use yang_core::ErrorCode;

static SEARCH_DIR: &str = "./assets/yang/";

static MODULE_CONF: &str = r###"
module mod {
  namespace "urn:mod";
  prefix m;

  container conf {
    leaf speed {
      type uint32;
    }
  }
}
"###;

static MODULE_PATTERN: &str = r###"
module pat {
  namespace "urn:pat";
  prefix p;

  leaf x {
    type string {
      pattern "a.*";
    }
  }
}
"###;

static MODULE_LEAFREF: &str = r###"
module ref {
  yang-version 1.1;
  namespace "urn:ref";
  prefix r;

  list server {
    key "name";
    leaf name {
      type string;
    }
  }

  leaf strict {
    type leafref {
      path "/r:server/r:name";
    }
  }

  leaf loose {
    type leafref {
      path "/r:server/r:name";
      require-instance false;
    }
  }
}
"###;

static MODULE_KEYS: &str = r###"
module keys {
  namespace "urn:keys";
  prefix k;

  list single {
    key "id";
    leaf id {
      type uint8;
    }
  }

  list composite {
    key "a b";
    leaf a {
      type string;
    }
    leaf b {
      type uint16;
    }
    leaf c {
      type string;
    }
  }
}
"###;

fn create_context() -> Context {
    Context::new_with_searchdirs(ContextFlags::NO_YANGLIBRARY, &[SEARCH_DIR])
        .expect("Failed to create context")
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
fn context_create_path_print() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_CONF, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let mut dtree = DataTree::new(&ctx);
    dtree
        .new_path("/mod:conf/speed", Some("1000"), false)
        .expect("Failed to edit data tree");

    assert_eq!(
        dtree
            .print_string(
                DataFormat::JSON,
                DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::SHRINK
            )
            .expect("Failed to print data"),
        "{\"mod:conf\":{\"speed\":1000}}"
    );
}

#[test]
fn context_create_path_unchanged() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_CONF, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let mut dtree = DataTree::new(&ctx);
    dtree
        .new_path("/mod:conf/speed", Some("1000"), false)
        .expect("Failed to edit data tree");

    // Writing the same value returns the existing node.
    let dnode = dtree
        .new_path("/mod:conf/speed", Some("1000"), false)
        .expect("Failed to edit data tree")
        .expect("Missing node");
    assert_eq!(dnode.value(), Some(DataValue::Uint32(1000)));
    assert_eq!(dtree.traverse().count(), 2);

    // Without the update option an existing leaf is an error.
    assert!(dtree
        .new_path2(
            "/mod:conf/speed",
            Some("10"),
            DataNewPathFlags::empty()
        )
        .is_err());
}

#[test]
fn context_pattern() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_PATTERN, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let mut dtree = DataTree::new(&ctx);
    let err = dtree.new_path("/pat:x", Some("banana"), false).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::PatternMismatch);
    assert!(dtree.reference().is_none());

    dtree
        .new_path("/pat:x", Some("apple"), false)
        .expect("Failed to edit data tree");
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}

#[test]
fn context_leafref_require_instance() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_LEAFREF, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let mut dtree = parse_json_data(&ctx, r#"{"ref:strict": "nowhere"}"#);
    assert!(dtree.validate(DataValidationFlags::empty()).is_err());

    let mut dtree = parse_json_data(&ctx, r#"{"ref:loose": "nowhere"}"#);
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
    assert_eq!(
        dtree.find_path("/ref:loose").unwrap().value_canonical(),
        Some("nowhere".to_owned())
    );

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"ref:server": [{"name": "a"}], "ref:strict": "a"}"#,
    );
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}

#[test]
fn context_key_conflict() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_KEYS, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    for json in [
        r#"{"keys:single": [{"id": 1}, {"id": 1}]}"#,
        r#"{"keys:composite": [{"a": "x", "b": 1}, {"a": "x", "b": 1, "c": "y"}]}"#,
    ] {
        let err = DataTree::parse_string(
            &ctx,
            json,
            DataFormat::JSON,
            DataParserFlags::empty(),
            DataValidationFlags::empty(),
        )
        .unwrap_err();
        assert_eq!(err.errcode, ErrorCode::KeyConflict);
    }

    let mut dtree = DataTree::new(&ctx);
    let mut root = dtree.root_mut();
    let module = ctx.get_module_implemented("keys").unwrap();
    root.new_list2(Some(&module), "composite", &["x", "1"])
        .expect("Failed to create list entry");
    root.new_list2(Some(&module), "composite", &["x", "2"])
        .expect("Failed to create list entry");
    let err = root
        .new_list2(Some(&module), "composite", &["x", "1"])
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::KeyConflict);
}

#[test]
fn context_range_narrowing() {
    let mut ctx = create_context();
    let err = ctx
        .parse_module(
            r###"
            module narrow {
              namespace "urn:narrow";
              prefix n;

              typedef percent {
                type int32 {
                  range "0..100";
                }
              }

              leaf value {
                type percent {
                  range "50..200";
                }
              }
            }"###,
            SchemaInputFormat::YANG,
            &[],
        )
        .map(|module| module.name().to_owned())
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Compile);

    // Nothing of the failed module is left behind.
    assert!(ctx.get_module_latest("narrow").is_none());
    assert_eq!(ctx.modules(true).count(), 0);
}

#[test]
fn context_search_dirs() {
    let mut ctx = create_context();
    assert_eq!(ctx.searchdirs().count(), 1);

    let module = ctx
        .load_module("acme-system", None, &[])
        .expect("Failed to load module");
    assert_eq!(module.revision(), Some("2023-05-10"));

    // The imported module is loaded but not implemented.
    let imported = ctx.get_module_latest("acme-extensions").unwrap();
    assert!(!imported.is_implemented());

    // Nodes of the submodule belong to the main module.
    let snode = ctx
        .find_path("/acme-system:system/ntp/server")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.module().name(), "acme-system");
    assert!(snode.is_user_ordered());
    assert_eq!(snode.max_elements(), Some(4));

    let err = ctx
        .load_module("does-not-exist", None, &[])
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::ModuleNotFound);

    ctx.unset_searchdirs();
    assert_eq!(ctx.searchdirs().count(), 0);
    assert!(ctx.set_searchdir("./assets/nonexistent/").is_err());
}

#[test]
fn context_import_callback() {
    let mut ctx = Context::new(
        ContextFlags::NO_YANGLIBRARY | ContextFlags::DISABLE_SEARCHDIRS,
    )
    .expect("Failed to create context");
    ctx.set_module_import_callback(
        |name: &str, _revision: Option<&str>, _sub: Option<&str>, _subrev: Option<&str>| {
            (name == "mod").then(|| (MODULE_CONF.to_owned(), SchemaInputFormat::YANG))
        },
    );

    ctx.load_module("mod", None, &[])
        .expect("Failed to load module");
    assert!(ctx.find_path("/mod:conf/speed").is_ok());
    assert!(ctx.load_module("ietf-interfaces", None, &[]).is_err());
}

#[test]
fn context_implemented() {
    let mut ctx = create_context();
    ctx.load_module("iana-if-type", None, &[])
        .expect("Failed to load module");

    assert!(!ctx
        .get_module_latest("ietf-interfaces")
        .unwrap()
        .is_implemented());
    assert!(ctx.find_path("/ietf-interfaces:interfaces").is_err());

    ctx.set_implemented("ietf-interfaces", None)
        .expect("Failed to implement module");
    assert!(ctx.find_path("/ietf-interfaces:interfaces").is_ok());
}

#[test]
fn context_yanglib_data() {
    let mut ctx = Context::new_with_searchdirs(ContextFlags::empty(), &[SEARCH_DIR])
        .expect("Failed to create context");
    ctx.load_module("ietf-interfaces", None, &["if-mib"])
        .expect("Failed to load module");

    let dtree = ctx.get_yanglib_data().expect("Failed to build yang-library data");
    let base = "/ietf-yang-library:yang-library/module-set[name='complete']/module[name='ietf-interfaces']";
    assert_eq!(
        dtree
            .find_path(&format!("{}/revision", base))
            .unwrap()
            .value_canonical(),
        Some("2018-02-20".to_owned())
    );
    assert!(dtree
        .find_path(&format!("{}/feature[.='if-mib']", base))
        .is_ok());
    assert!(dtree
        .find_path(&format!("{}/feature[.='arbitrary-names']", base))
        .is_err());

    let ctx = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
    assert!(ctx.get_yanglib_data().is_err());
}

#[derive(Default)]
struct Recorder {
    records: Mutex<Vec<(LogLevel, String)>>,
}

struct SharedRecorder(Arc<Recorder>);

impl LogCallback for SharedRecorder {
    fn log<'a>(
        &'a self,
        level: LogLevel,
        msg: Option<Cow<'a, str>>,
        _data_path: Option<Cow<'a, str>>,
        _schema_path: Option<Cow<'a, str>>,
        _line: u64,
    ) {
        if let Some(msg) = msg {
            self.0.records.lock().unwrap().push((level, msg.into_owned()));
        }
    }
}

#[test]
fn context_logging() {
    let recorder = Arc::new(Recorder::default());
    let mut ctx = create_context();
    ctx.set_log_callback(SharedRecorder(recorder.clone()));

    assert!(ctx.load_module("does-not-exist", None, &[]).is_err());
    let records = recorder.records.lock().unwrap();
    assert!(records
        .iter()
        .any(|(level, msg)| *level == LogLevel::Error
            && msg.contains("does-not-exist")));
}

#[test]
fn context_errors() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_PATTERN, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    ctx.errors();

    let mut dtree = DataTree::new(&ctx);
    assert!(dtree.new_path("/pat:x", Some("banana"), false).is_err());

    // Most recent first.
    let records = ctx.errors();
    assert_eq!(records[0].errcode, ErrorCode::PatternMismatch);
    assert!(ctx.errors().is_empty());
}

struct Label {
    seen: Arc<Mutex<Vec<String>>>,
}

impl ExtensionPlugin for Label {
    fn module(&self) -> &str {
        "acme-extensions"
    }

    fn name(&self) -> &str {
        "label"
    }

    fn compile(
        &self,
        ext: &mut ExtensionInstance<'_>,
    ) -> Result<(), ExtensionError> {
        match ext.argument() {
            Some("") | None => Err(ExtensionError::new(
                PluginStatus::InvalidInput,
                "empty label",
            )),
            Some(label) => {
                self.seen.lock().unwrap().push(label.to_owned());
                ext.set_data(Arc::new(label.to_uppercase()));
                Ok(())
            }
        }
    }
}

#[test]
fn context_extension_plugin() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = create_context();
    ctx.register_extension_plugin(Box::new(Label { seen: seen.clone() }));
    ctx.load_module("acme-system", None, &[])
        .expect("Failed to load module");

    let mut labels = seen.lock().unwrap().clone();
    labels.sort();
    assert_eq!(labels, vec!["Host name", "System"]);

    let snode = ctx
        .find_path("/acme-system:system/hostname")
        .expect("Failed to lookup schema node");
    let ext = snode.extensions().next().expect("Missing extension instance");
    assert_eq!(ext.module(), "acme-extensions");
    assert_eq!(ext.name(), "label");
    assert_eq!(ext.argument(), Some("Host name"));
    assert_eq!(
        ext.data()
            .and_then(|data| data.downcast_ref::<String>())
            .map(String::as_str),
        Some("HOST NAME")
    );
    assert_eq!(
        snode.path(SchemaPathFormat::DATA),
        "/acme-system:system/hostname"
    );
}

#[test]
fn context_extension_plugin_failure() {
    let mut ctx = create_context();
    ctx.register_extension_plugin(Box::new(Label {
        seen: Arc::new(Mutex::new(Vec::new())),
    }));
    let err = ctx
        .parse_module(
            r###"
            module bad-label {
              namespace "urn:bad-label";
              prefix bl;

              import acme-extensions {
                prefix acme-ext;
              }

              leaf x {
                type string;
                acme-ext:label "";
              }
            }"###,
            SchemaInputFormat::YANG,
            &[],
        )
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Plugin);
    assert!(ctx.get_module_latest("bad-label").is_none());
}

#[test]
fn context_validate_idempotent() {
    let mut ctx = create_context();
    ctx.load_module("acme-system", None, &[])
        .expect("Failed to load module");

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"acme-system:system": {"hostname": "router1", "ntp": {"server": ["b", "a"]}}}"#,
    );
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
    let first = dtree
        .print_string(DataFormat::JSON, DataPrinterFlags::WD_ALL)
        .unwrap();
    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
    let second = dtree
        .print_string(DataFormat::JSON, DataPrinterFlags::WD_ALL)
        .unwrap();
    assert_eq!(first, second);

    // User-ordered leaf-lists keep their order.
    assert_eq!(
        dtree
            .find_xpath("/acme-system:system/ntp/server")
            .unwrap()
            .map(|dnode| dnode.value_canonical().unwrap())
            .collect::<Vec<_>>(),
        vec!["b", "a"]
    );

    // Defaults were added by the validation.
    let timezone = dtree.find_path("/acme-system:system/timezone").unwrap();
    assert!(timezone.is_default());
    assert_eq!(timezone.value_canonical(), Some("UTC".to_owned()));
}

#[test]
fn context_module_files() {
    let yang_dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let yin_dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let yang_path = yang_dir.path().join("mod.yang");
    std::fs::write(&yang_path, MODULE_CONF).unwrap();

    // Parse the module from its file and save it in the YIN format.
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
    let module = ctx
        .parse_module_file(&yang_path, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module file");
    assert!(module.filepath().is_some_and(|path| path.ends_with("mod.yang")));
    let yin = std::fs::File::create(yin_dir.path().join("mod.yin")).unwrap();
    module
        .print_file(yin, SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .expect("Failed to print module");

    // Load it back through the search directories.
    let var = "YANG_CORE_TEST_MODULE_FILES";
    let joined =
        std::env::join_paths([yang_dir.path(), yin_dir.path()]).unwrap();
    std::env::set_var(var, &joined);
    let dirs = searchdirs_from_env(var);
    assert_eq!(dirs, vec![yang_dir.path().to_path_buf(), yin_dir.path().to_path_buf()]);
    assert!(searchdirs_from_env("YANG_CORE_TEST_UNSET").is_empty());

    let mut ctx = Context::new_with_searchdirs(
        ContextFlags::NO_YANGLIBRARY | ContextFlags::DISABLE_SEARCHDIR_CWD,
        &dirs[1..],
    )
    .unwrap();
    let module = ctx
        .load_module("mod", None, &[])
        .expect("Failed to load module");
    assert!(module.filepath().is_some_and(|path| path.ends_with("mod.yin")));
    assert!(ctx.find_path("/mod:conf/speed").is_ok());

    // Missing files are reported.
    let err = ctx
        .parse_module_file(
            yang_dir.path().join("missing.yang"),
            SchemaInputFormat::YANG,
            &[],
        )
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::ModuleNotFound);
}

#[test]
fn context_shared_between_threads() {
    fn is_send<T: Send>() {}
    fn is_sync<T: Sync>() {}
    is_send::<Context>();
    is_sync::<Context>();

    let mut ctx = create_context();
    ctx.parse_module(MODULE_CONF, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    let ctx = &ctx;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|speed| {
                scope.spawn(move || {
                    let dtree = DataTree::parse_string(
                        ctx,
                        &format!("{{\"mod:conf\":{{\"speed\":{}}}}}", speed),
                        DataFormat::JSON,
                        DataParserFlags::empty(),
                        DataValidationFlags::empty(),
                    )
                    .expect("Failed to parse data tree");
                    let value = dtree
                        .find_path("/mod:conf/speed")
                        .unwrap()
                        .value_canonical();
                    value
                })
            })
            .collect();
        for (speed, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(speed.to_string()));
        }
    });
}

#[test]
fn context_print_siblings() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_CONF, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    ctx.parse_module(MODULE_PATTERN, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let mut dtree = DataTree::new(&ctx);
    dtree
        .new_path("/mod:conf/speed", Some("1000"), false)
        .expect("Failed to edit data tree");
    dtree
        .new_path("/pat:x", Some("apple"), false)
        .expect("Failed to edit data tree");

    // Only the first top-level node without the siblings option.
    let single = dtree
        .print_string(DataFormat::JSON, DataPrinterFlags::SHRINK)
        .expect("Failed to print data");
    assert_ne!(single.contains("mod:conf"), single.contains("pat:x"));

    let all = dtree
        .print_string(
            DataFormat::JSON,
            DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::SHRINK,
        )
        .expect("Failed to print data");
    assert!(all.contains("mod:conf") && all.contains("pat:x"));
}

#[test]
fn context_relink_nodes() {
    let mut ctx = create_context();
    ctx.load_module("acme-system", None, &[])
        .expect("Failed to load module");

    let mut dtree = parse_json_data(
        &ctx,
        r#"{"acme-system:system": {"hostname": "router1", "ntp": {"server": ["a", "b", "c"]}}}"#,
    );
    let servers = |dtree: &DataTree<'_>| {
        dtree
            .find_xpath("/acme-system:system/ntp/server")
            .unwrap()
            .map(|dnode| dnode.value_canonical().unwrap())
            .collect::<Vec<_>>()
    };

    // Positional moves within a user-ordered leaf-list.
    let c = dtree
        .find_path_mut("/acme-system:system/ntp/server[.='c']")
        .unwrap()
        .id()
        .unwrap();
    dtree
        .find_path_mut("/acme-system:system/ntp/server[.='a']")
        .unwrap()
        .insert_before(c)
        .expect("Failed to move node");
    assert_eq!(servers(&dtree), vec!["c", "a", "b"]);
    dtree
        .find_path_mut("/acme-system:system/ntp/server[.='b']")
        .unwrap()
        .insert_after(c)
        .expect("Failed to move node");
    assert_eq!(servers(&dtree), vec!["a", "b", "c"]);

    // Unlink, then insert back under the same parent.
    let mut hostname = dtree
        .find_path_mut("/acme-system:system/hostname")
        .unwrap();
    let id = hostname.id().unwrap();
    hostname.unlink().expect("Failed to unlink node");
    assert!(dtree.find_path("/acme-system:system/hostname").is_err());

    // Schema placement is enforced.
    let err = dtree
        .find_path_mut("/acme-system:system/ntp")
        .unwrap()
        .insert_child(id)
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Validation);
    let err = dtree.root_mut().insert_child(id).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Validation);

    dtree
        .find_path_mut("/acme-system:system/ntp")
        .unwrap()
        .insert_sibling(id)
        .expect("Failed to insert node");
    assert_eq!(
        dtree
            .find_path("/acme-system:system/hostname")
            .unwrap()
            .value_canonical(),
        Some("router1".to_owned())
    );
    // Schema order is kept: hostname comes before ntp.
    let names: Vec<String> = dtree
        .find_path("/acme-system:system")
        .unwrap()
        .children()
        .map(|dnode| dnode.name().to_owned())
        .collect();
    assert_eq!(names, vec!["hostname", "ntp"]);

    // Only user-ordered instances can be positioned.
    let ntp = dtree
        .find_path_mut("/acme-system:system/ntp")
        .unwrap()
        .id()
        .unwrap();
    let err = dtree
        .find_path_mut("/acme-system:system/hostname")
        .unwrap()
        .insert_before(ntp)
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Validation);

    // A node cannot be moved into its own subtree.
    let system = dtree
        .find_path_mut("/acme-system:system")
        .unwrap()
        .id()
        .unwrap();
    let err = dtree
        .find_path_mut("/acme-system:system/ntp")
        .unwrap()
        .insert_child(system)
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Validation);

    dtree
        .validate(DataValidationFlags::empty())
        .expect("Failed to validate data tree");
}
