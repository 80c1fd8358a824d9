use yang_core::context::{Context, ContextFlags};
use yang_core::schema::{
    DataValue, DataValueType, SchemaInputFormat, SchemaNodeKind,
    SchemaOutputFormat, SchemaPathFormat, SchemaPrinterFlags, Status,
};

static SEARCH_DIR: &str = "./assets/yang/";

static MODULE_TREE: &str = r###"
module mod {
  yang-version 1.1;
  namespace "urn:mod";
  prefix m;

  container conf {
    leaf speed {
      type uint32;
    }
    leaf name {
      type string;
      mandatory true;
    }
    list peer {
      key "addr";
      leaf addr {
        type string;
      }
      leaf-list tag {
        type string;
      }
    }
  }

  rpc reset {
    input {
      leaf delay {
        type uint8;
      }
    }
  }
}
"###;

fn create_context() -> Context {
    // Initialize context.
    let mut ctx = Context::new_with_searchdirs(
        ContextFlags::NO_YANGLIBRARY,
        &[SEARCH_DIR],
    )
    .expect("Failed to create context");

    // Load YANG modules.
    for module_name in &["ietf-interfaces", "iana-if-type"] {
        ctx.load_module(module_name, None, &[])
            .expect("Failed to load module");
    }

    ctx
}

#[test]
fn schema_find_xpath() {
    let ctx = create_context();

    assert_eq!(
        ctx.find_xpath("/ietf-interfaces:interfaces/*")
            .expect("Failed to lookup schema data")
            .map(|snode| snode.path(SchemaPathFormat::DATA))
            .collect::<Vec<String>>(),
        vec!["/ietf-interfaces:interfaces/interface"]
    );

    assert_eq!(
        ctx.find_xpath("/ietf-interfaces:interfaces/interface/*")
            .expect("Failed to lookup schema data")
            .map(|snode| snode.path(SchemaPathFormat::DATA))
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface/name",
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/type",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/oper-status",
            "/ietf-interfaces:interfaces/interface/last-change",
            "/ietf-interfaces:interfaces/interface/phys-address",
            "/ietf-interfaces:interfaces/interface/higher-layer-if",
            "/ietf-interfaces:interfaces/interface/lower-layer-if",
            "/ietf-interfaces:interfaces/interface/speed",
            "/ietf-interfaces:interfaces/interface/statistics",
        ]
    );
}

#[test]
fn schema_find_path() {
    let ctx = create_context();

    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface")
        .is_ok());
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/nonexistent")
        .is_err());
    assert!(ctx
        .find_schema_path("/ietf-interfaces:interfaces/nonexistent", false)
        .expect("Failed to lookup schema data")
        .is_empty());
}

#[test]
fn schema_feature_pruning() {
    let mut ctx = create_context();

    // Nodes of disabled features are not part of the compiled schema.
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/if-index")
        .is_err());

    ctx.feature_enable("ietf-interfaces", "if-mib")
        .expect("Failed to enable feature");
    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/if-index")
        .expect("Failed to lookup schema node");
    assert!(snode.is_state());
    assert!(snode.is_mandatory());

    let module = ctx.get_module_implemented("ietf-interfaces").unwrap();
    assert_eq!(module.feature_value("if-mib").ok(), Some(true));
    assert_eq!(module.feature_value("pre-provisioning").ok(), Some(false));
    assert!(module.feature_value("bogus").is_err());
}

#[test]
fn schema_iterator_traverse() {
    let ctx = create_context();
    let snode_top = ctx
        .find_path("/ietf-interfaces:interfaces")
        .expect("Failed to lookup schema node");

    assert_eq!(
        snode_top
            .traverse()
            .map(|snode| snode.path(SchemaPathFormat::DATA))
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces",
            "/ietf-interfaces:interfaces/interface",
            "/ietf-interfaces:interfaces/interface/name",
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/type",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/oper-status",
            "/ietf-interfaces:interfaces/interface/last-change",
            "/ietf-interfaces:interfaces/interface/phys-address",
            "/ietf-interfaces:interfaces/interface/higher-layer-if",
            "/ietf-interfaces:interfaces/interface/lower-layer-if",
            "/ietf-interfaces:interfaces/interface/speed",
            "/ietf-interfaces:interfaces/interface/statistics",
            "/ietf-interfaces:interfaces/interface/statistics/discontinuity-time",
            "/ietf-interfaces:interfaces/interface/statistics/in-octets",
            "/ietf-interfaces:interfaces/interface/statistics/in-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-errors",
            "/ietf-interfaces:interfaces/interface/statistics/out-octets",
            "/ietf-interfaces:interfaces/interface/statistics/out-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-errors",
        ]
    );
}

#[test]
fn schema_iterator_ancestors() {
    let ctx = create_context();

    assert_eq!(
        ctx.find_path("/ietf-interfaces:interfaces/interface/statistics/discontinuity-time")
            .expect("Failed to lookup schema data")
            .ancestors()
            .map(|snode| snode.path(SchemaPathFormat::DATA))
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface/statistics",
            "/ietf-interfaces:interfaces/interface",
            "/ietf-interfaces:interfaces",
        ]
    );
}

#[test]
fn schema_iterator_siblings() {
    let ctx = create_context();

    assert_eq!(
        ctx.find_path("/ietf-interfaces:interfaces/interface/name")
            .expect("Failed to lookup schema data")
            .siblings()
            .map(|snode| snode.path(SchemaPathFormat::DATA))
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/type",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/oper-status",
            "/ietf-interfaces:interfaces/interface/last-change",
            "/ietf-interfaces:interfaces/interface/phys-address",
            "/ietf-interfaces:interfaces/interface/higher-layer-if",
            "/ietf-interfaces:interfaces/interface/lower-layer-if",
            "/ietf-interfaces:interfaces/interface/speed",
            "/ietf-interfaces:interfaces/interface/statistics",
        ]
    );
}

#[test]
fn schema_iterator_children() {
    let ctx = create_context();

    assert_eq!(
        ctx.find_path("/ietf-interfaces:interfaces/interface/statistics")
            .expect("Failed to lookup schema data")
            .children()
            .map(|snode| snode.path(SchemaPathFormat::DATA))
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface/statistics/discontinuity-time",
            "/ietf-interfaces:interfaces/interface/statistics/in-octets",
            "/ietf-interfaces:interfaces/interface/statistics/in-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-errors",
            "/ietf-interfaces:interfaces/interface/statistics/out-octets",
            "/ietf-interfaces:interfaces/interface/statistics/out-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-errors",
        ]
    );
}

#[test]
fn schema_node_attributes() {
    let ctx = create_context();

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/enabled")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.name(), "enabled");
    assert_eq!(snode.kind(), SchemaNodeKind::Leaf);
    assert!(snode.description().is_some());
    assert!(snode.reference().is_none());
    assert!(snode.is_config());
    assert!(!snode.is_mandatory());
    assert_eq!(snode.default_value_canonical(), Some("true"));
    assert_eq!(snode.default_value(), Some(DataValue::Bool(true)));
    assert_eq!(
        snode.leaf_type().map(|ty| ty.base_type()),
        Some(DataValueType::Bool)
    );
    assert!(snode.units().is_none());
    assert!(snode.musts().next().is_none());
    assert!(snode.whens().next().is_none());

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.name(), "interface");
    assert_eq!(snode.kind(), SchemaNodeKind::List);
    assert!(snode.description().is_some());
    assert!(snode.is_config());
    assert!(!snode.is_mandatory());
    assert!(!snode.is_keyless_list());
    assert!(!snode.is_user_ordered());
    assert_eq!(snode.min_elements(), None);
    assert_eq!(snode.max_elements(), None);
    assert_eq!(
        snode.list_keys().map(|key| key.name()).collect::<Vec<_>>(),
        vec!["name"]
    );
    assert!(snode.actions().next().is_none());
    assert!(snode.notifications().next().is_none());

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/higher-layer-if")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.kind(), SchemaNodeKind::LeafList);
    assert!(snode.is_state());
    let ty = snode.leaf_type().expect("Missing leaf type");
    assert_eq!(ty.base_type(), DataValueType::LeafRef);
    assert_eq!(ty.typedef_name(), Some("interface-ref"));
    assert_eq!(
        ty.leafref_target().map(|target| target.path(SchemaPathFormat::DATA)),
        Some("/ietf-interfaces:interfaces/interface/name".to_owned())
    );
    assert_eq!(
        ty.leafref_real_type().map(|real| real.base_type()),
        Some(DataValueType::String)
    );

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/speed")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.units(), Some("bits/second"));
    assert_eq!(
        snode.leaf_type().map(|ty| ty.base_type()),
        Some(DataValueType::Uint64)
    );
}

#[test]
fn schema_identities() {
    let ctx = create_context();

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/type")
        .expect("Failed to lookup schema node");
    let ty = snode.leaf_type().expect("Missing leaf type");
    assert_eq!(ty.base_type(), DataValueType::IdentityRef);
    assert_eq!(
        ty.bases().collect::<Vec<_>>(),
        vec!["ietf-interfaces:interface-type"]
    );

    let module = ctx.get_module_implemented("iana-if-type").unwrap();
    let identities = module
        .identities()
        .map(|identity| identity.name())
        .collect::<Vec<_>>();
    assert!(identities.contains(&"ethernetCsmacd"));
    assert!(identities.contains(&"ieee8023adLag"));

    let ethernet = module
        .identities()
        .find(|identity| identity.name() == "ethernetCsmacd")
        .unwrap();
    assert_eq!(ethernet.module().name(), "iana-if-type");
    assert_eq!(ethernet.status(), Status::Current);
    assert!(ethernet.is_enabled());
    let bases = ethernet.bases().map(|base| base.name()).collect::<Vec<_>>();
    assert_eq!(bases, vec!["iana-interface-type"]);

    // The root identity lists its derived identities.
    let root = ctx
        .get_module_implemented("ietf-interfaces")
        .unwrap()
        .identities()
        .find(|identity| identity.name() == "interface-type")
        .unwrap();
    assert!(root.description().is_some());
    let derived = root.derived().map(|d| d.name()).collect::<Vec<_>>();
    assert_eq!(derived, vec!["iana-interface-type"]);
}

#[test]
fn schema_modules() {
    let ctx = create_context();

    let names = ctx
        .modules(true)
        .map(|module| module.name().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["ietf-interfaces", "iana-if-type"]);

    let module = ctx.get_module_latest("ietf-interfaces").unwrap();
    assert_eq!(module.revision(), Some("2018-02-20"));
    assert_eq!(
        module.namespace(),
        "urn:ietf:params:xml:ns:yang:ietf-interfaces"
    );
    assert_eq!(module.prefix(), "if");
    assert!(module.is_implemented());
    assert!(!module.is_internal());
    assert!(module
        .filepath()
        .is_some_and(|path| path.ends_with("ietf-interfaces@2018-02-20.yang")));
}

#[test]
fn schema_print_tree() {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    let module = ctx
        .parse_module(MODULE_TREE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    assert_eq!(
        module
            .print_string(SchemaOutputFormat::TREE, SchemaPrinterFlags::empty())
            .expect("Failed to print module"),
        "module: mod\n\
         \x20 +--rw conf\n\
         \x20    +--rw speed?   uint32\n\
         \x20    +--rw name     string\n\
         \x20    +--rw peer* [addr]\n\
         \x20       +--rw addr   string\n\
         \x20       +--rw tag*   string\n\
         \n\
         \x20 rpcs:\n\
         \x20   +---x reset\n\
         \x20      +---w input\n\
         \x20         +---w delay?   uint8\n"
    );
}

#[test]
fn schema_print_yang_round_trip() {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    let printed = ctx
        .parse_module(MODULE_TREE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module")
        .print_string(SchemaOutputFormat::YANG, SchemaPrinterFlags::empty())
        .expect("Failed to print module");
    let yin = ctx
        .get_module_latest("mod")
        .unwrap()
        .print_string(SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .expect("Failed to print module");

    let paths = |ctx: &Context| {
        ctx.traverse()
            .map(|snode| {
                let base = snode.leaf_type().map(|ty| ty.base_type());
                (snode.path(SchemaPathFormat::LOG), snode.kind(), base)
            })
            .collect::<Vec<_>>()
    };

    for (text, format) in [
        (printed, SchemaInputFormat::YANG),
        (yin, SchemaInputFormat::YIN),
    ] {
        let mut ctx2 = Context::new(ContextFlags::NO_YANGLIBRARY)
            .expect("Failed to create context");
        ctx2.parse_module(&text, format, &[])
            .expect("Failed to parse printed module");
        assert_eq!(paths(&ctx), paths(&ctx2));
    }
}

#[test]
fn schema_print_json() {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    let module = ctx
        .parse_module(MODULE_TREE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    let printed = module
        .print_string(SchemaOutputFormat::JSON, SchemaPrinterFlags::SHRINK)
        .expect("Failed to print module");

    let json: serde_json::Value =
        serde_json::from_str(&printed).expect("Invalid JSON summary");
    assert_eq!(json["name"], "mod");
    assert_eq!(json["namespace"], "urn:mod");
    assert_eq!(json["data"][0]["name"], "conf");
    assert_eq!(json["data"][0]["children"][2]["keys"][0], "addr");
    assert_eq!(json["rpcs"][0]["name"], "reset");
}
