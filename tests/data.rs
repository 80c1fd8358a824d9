use yang_core::context::{Context, ContextFlags};
use yang_core::data::{
    Data, DataDiffFlags, DataDiffOp, DataFormat, DataImplicitFlags,
    DataParserFlags, DataPrinterFlags, DataTree, DataValidationFlags,
};
use yang_core::keyed_list::{DictValue, ListKey};
use yang_core::schema::DataValue;
use yang_core::ErrorCode;

static SEARCH_DIR: &str = "./assets/yang/";
static JSON_TREE1: &str = r###"
    {
        "ietf-interfaces:interfaces":{
            "interface": [
                {
                    "name": "eth/0/0",
                    "description": "ENG",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                },
                {
                    "name": "eth/0/1",
                    "description": "MKT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ]
        }
    }"###;
static JSON_TREE2: &str = r###"
    {
        "ietf-interfaces:interfaces":{
            "interface": [
                {
                    "name": "eth/0/0",
                    "description": "ENG",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": false
                },
                {
                    "name": "eth/0/2",
                    "description": "MGMT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ]
        }
    }"###;
static JSON_MERGE: &str = r###"
    {
        "ietf-interfaces:interfaces":{
            "interface": [
                {
                    "name": "eth/0/0",
                    "description": "ENG",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": false
                },
                {
                    "name": "eth/0/1",
                    "description": "MKT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                },
                {
                    "name": "eth/0/2",
                    "description": "MGMT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ]
        }
    }"###;

static JSON_DIFF: &str = r###"
    {
      "ietf-interfaces:interfaces": {
        "@": {
          "yang:operation": "none"
        },
        "interface": [
          {
            "@": {
              "yang:operation": "none"
            },
            "name": "eth/0/0",
            "enabled": false,
            "@enabled": {
              "yang:operation": "replace",
              "yang:orig-value": "true"
            }
          },
          {
            "@": {
              "yang:operation": "delete"
            },
            "name": "eth/0/1",
            "description": "MKT",
            "type": "iana-if-type:ethernetCsmacd",
            "enabled": true
          },
          {
            "@": {
              "yang:operation": "create"
            },
            "name": "eth/0/2",
            "description": "MGMT",
            "type": "iana-if-type:ethernetCsmacd",
            "enabled": true
          }
        ]
      }
    }
"###;

macro_rules! assert_data_eq {
    ($dtree1:expr, $dtree2:expr) => {
        let json1 = $dtree1
            .print_string(DataFormat::JSON, DataPrinterFlags::WITH_SIBLINGS)
            .expect("Failed to print data");
        let json2 = $dtree2
            .print_string(DataFormat::JSON, DataPrinterFlags::WITH_SIBLINGS)
            .expect("Failed to print data");

        assert_eq!(json1, json2);
    };
}

fn create_context() -> Context {
    // Initialize context.
    let mut ctx = Context::new_with_searchdirs(
        ContextFlags::NO_YANGLIBRARY,
        &[SEARCH_DIR],
    )
    .expect("Failed to create context");

    // Load YANG modules.
    for module_name in &["ietf-interfaces", "iana-if-type", "ietf-ip"] {
        ctx.load_module(module_name, None, &[])
            .expect("Failed to load module");
    }

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
fn data_find_xpath() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_xpath("/ietf-interfaces:interfaces/interface")
            .expect("Failed to lookup data")
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']"
        ]
    );

    assert_eq!(
        dtree1
            .find_xpath("/ietf-interfaces:interfaces/interface[name='eth/0/0']/*")
            .expect("Failed to lookup data")
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
        ]
    );

    assert_eq!(
        dtree1
            .find_xpath(
                "/ietf-interfaces:interfaces/interface[description='MKT']/name"
            )
            .expect("Failed to lookup data")
            .map(|dnode| dnode.value_canonical().unwrap())
            .collect::<Vec<String>>(),
        vec!["eth/0/1"]
    );
}

#[test]
fn data_find_path() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert!(dtree1
        .find_path("/ietf-interfaces:interfaces/interface")
        .is_err());
    assert!(dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/0']")
        .is_ok());

    let err = dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/9']")
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::NotFound);
}

#[test]
fn data_edit() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);

    enum Operation {
        Modify(&'static str, Option<&'static str>),
        Delete(&'static str),
    }

    let changes = [
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            Some("false"),
        ),
        Operation::Delete(
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
        ),
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/2']/description",
            Some("MGMT"),
        ),
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/2']/type",
            Some("iana-if-type:ethernetCsmacd"),
        ),
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/2']/enabled",
            Some("true"),
        ),
    ];
    for change in &changes {
        match change {
            Operation::Modify(xpath, value) => {
                dtree1
                    .new_path(xpath, *value, false)
                    .expect("Failed to edit data tree");
            }
            Operation::Delete(xpath) => {
                dtree1.remove(xpath).expect("Failed to edit data tree")
            }
        };
    }

    assert_data_eq!(&dtree1, &dtree2);
}

#[test]
fn data_edit_invalid_value() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let err = dtree1
        .new_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            Some("maybe"),
            false,
        )
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::InvalidValue);

    // The tree is left untouched.
    assert_eq!(
        dtree1
            .find_path(
                "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled"
            )
            .unwrap()
            .value(),
        Some(DataValue::Bool(true))
    );
}

#[test]
fn data_edit_augment() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);

    dtree1
        .new_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/ietf-ip:ipv4/address[ip='10.0.0.1']/prefix-length",
            Some("24"),
            false,
        )
        .expect("Failed to edit data tree");

    let dnode = dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/0']/ietf-ip:ipv4/address[ip='10.0.0.1']/prefix-length")
        .expect("Failed to lookup data");
    assert_eq!(dnode.value(), Some(DataValue::Uint8(24)));
    assert_eq!(
        dnode.path(),
        "/ietf-interfaces:interfaces/interface[name='eth/0/0']/ietf-ip:ipv4/address[ip='10.0.0.1']/prefix-length"
    );

    assert!(dtree1
        .new_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/ietf-ip:ipv4/address[ip='10.0.0.2']/prefix-length",
            Some("33"),
            false,
        )
        .is_err());
}

#[test]
fn data_validate() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);

    // Mandatory node "oper-status" instance does not exist.
    // (path: /ietf-interfaces:interfaces/interface/oper-status)
    assert!(dtree1.validate(DataValidationFlags::PRESENT).is_err());

    // Implicit state nodes added above are dropped, explicit config is valid.
    dtree1
        .validate(DataValidationFlags::PRESENT | DataValidationFlags::NO_STATE)
        .expect("Failed to validate data tree");
    assert!(dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/0']/statistics")
        .is_err());

    // Config-only tree validated without state data from the start.
    let mut dtree2 = parse_json_data(&ctx, JSON_TREE1);
    dtree2
        .validate(DataValidationFlags::PRESENT | DataValidationFlags::NO_STATE)
        .expect("Failed to validate data tree");

    // Explicit state data is rejected.
    let mut dtree3 = parse_json_data(
        &ctx,
        r###"
        {
            "ietf-interfaces:interfaces":{
                "interface": [
                    {
                        "name": "eth/0/0",
                        "type": "iana-if-type:ethernetCsmacd",
                        "oper-status": "up"
                    }
                ]
            }
        }"###,
    );
    let err = dtree3
        .validate(DataValidationFlags::PRESENT | DataValidationFlags::NO_STATE)
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Validation);
    assert_eq!(
        err.path.as_deref(),
        Some("/ietf-interfaces:interfaces/interface[name='eth/0/0']/oper-status")
    );
}

#[test]
fn data_validate_choice() {
    let ctx = create_context();
    let mut dtree = parse_json_data(
        &ctx,
        r###"
        {
            "ietf-interfaces:interfaces":{
                "interface": [
                    {
                        "name": "lo",
                        "type": "iana-if-type:softwareLoopback",
                        "ietf-ip:ipv4": {
                            "address": [
                                { "ip": "127.0.0.1" }
                            ]
                        }
                    }
                ]
            }
        }"###,
    );

    // Mandatory choice "subnet" has no case instantiated.
    let err = dtree
        .validate(DataValidationFlags::NO_STATE)
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Mandatory);
}

#[test]
fn data_implicit() {
    let ctx = create_context();
    let mut dtree = parse_json_data(
        &ctx,
        r###"
        {
            "ietf-interfaces:interfaces":{
                "interface": [
                    {
                        "name": "eth/0/0",
                        "type": "iana-if-type:ethernetCsmacd"
                    }
                ]
            }
        }"###,
    );
    dtree
        .add_implicit(DataImplicitFlags::NO_STATE)
        .expect("Failed to add implicit nodes");

    let enabled = dtree
        .find_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
        )
        .expect("Failed to lookup data");
    assert!(enabled.is_default());
    assert_eq!(enabled.value(), Some(DataValue::Bool(true)));

    // Default nodes are trimmed from the output unless requested.
    let json = dtree
        .print_string(DataFormat::JSON, DataPrinterFlags::WITH_SIBLINGS)
        .unwrap();
    assert!(!json.contains("enabled"));
    let json = dtree
        .print_string(
            DataFormat::JSON,
            DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::WD_ALL,
        )
        .unwrap();
    assert!(json.contains("\"enabled\": true"));
}

#[test]
fn data_duplicate() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dup = dtree1.duplicate().expect("Failed to duplicate data");

    assert_data_eq!(&dtree1, &dup);
}

#[test]
fn data_duplicate_subtree() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dnode = dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/1']")
        .expect("Failed to lookup data");
    let dup = dnode.duplicate(true).expect("Failed to duplicate data");

    assert_eq!(
        dup.traverse()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/enabled"
        ]
    );
}

#[test]
fn data_merge() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);
    let dtree_merge = parse_json_data(&ctx, JSON_MERGE);

    dtree1.merge(&dtree2).expect("Failed to merge data trees");
    assert_data_eq!(&dtree1, &dtree_merge);
}

#[test]
fn data_diff() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);
    let dtree_diff = parse_json_data(&ctx, JSON_DIFF);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    assert_data_eq!(&diff, &dtree_diff);

    assert_eq!(
        diff.iter()
            .map(|(op, dnode)| (op, dnode.path()))
            .collect::<Vec<_>>(),
        vec![
            (
                DataDiffOp::Replace,
                "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled"
                    .to_owned()
            ),
            (
                DataDiffOp::Delete,
                "/ietf-interfaces:interfaces/interface[name='eth/0/1']"
                    .to_owned()
            ),
            (
                DataDiffOp::Create,
                "/ietf-interfaces:interfaces/interface[name='eth/0/2']"
                    .to_owned()
            ),
        ]
    );
}

#[test]
fn data_diff_identical() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dup = dtree1.duplicate().unwrap();

    let diff = dtree1
        .diff(&dup, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    assert_eq!(diff.iter().count(), 0);
}

#[test]
fn data_diff_apply() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    dtree1.diff_apply(&diff).expect("Failed to apply diff");

    assert_data_eq!(&dtree1, &dtree2);
}

#[test]
fn data_diff_reverse() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let mut dtree2 = parse_json_data(&ctx, JSON_TREE2);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    let reversed = diff.reverse().expect("Failed to reverse diff");
    dtree2.diff_apply(&reversed).expect("Failed to apply diff");

    assert_data_eq!(&dtree2, &dtree1);
}

#[test]
fn data_print_xml() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dnode = dtree1
        .find_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
        )
        .expect("Failed to lookup data");

    assert_eq!(
        dnode
            .print_string(DataFormat::XML, DataPrinterFlags::SHRINK)
            .expect("Failed to print data"),
        "<type xmlns=\"urn:ietf:params:xml:ns:yang:ietf-interfaces\" xmlns:ianaift=\"urn:ietf:params:xml:ns:yang:iana-if-type\">ianaift:ethernetCsmacd</type>"
    );
}

#[test]
fn data_xml_json() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let xml = dtree1
        .print_string(DataFormat::XML, DataPrinterFlags::WITH_SIBLINGS)
        .expect("Failed to print data");
    let dtree2 = DataTree::parse_string(
        &ctx,
        &xml,
        DataFormat::XML,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree");

    assert_data_eq!(&dtree1, &dtree2);
}

#[test]
fn data_lyb() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let lyb = dtree1
        .print_bytes(DataFormat::LYB, DataPrinterFlags::WITH_SIBLINGS)
        .expect("Failed to print data");
    let dtree2 = DataTree::parse_string(
        &ctx,
        &lyb,
        DataFormat::LYB,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree");

    assert_data_eq!(&dtree1, &dtree2);

    // Truncated input.
    assert!(DataTree::parse_string(
        &ctx,
        &lyb[..lyb.len() / 2],
        DataFormat::LYB,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .is_err());
}

#[test]
fn data_strict_unknown() {
    let ctx = create_context();
    let json = r###"
        {
            "ietf-interfaces:interfaces":{
                "bogus": 1
            }
        }"###;

    assert!(DataTree::parse_string(
        &ctx,
        json,
        DataFormat::JSON,
        DataParserFlags::NO_VALIDATION | DataParserFlags::STRICT,
        DataValidationFlags::empty(),
    )
    .is_err());

    let dtree = DataTree::parse_string(
        &ctx,
        json,
        DataFormat::JSON,
        DataParserFlags::NO_VALIDATION | DataParserFlags::OPAQ,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree");
    let bogus = dtree
        .traverse()
        .find(|dnode| dnode.name() == "bogus")
        .expect("Opaque node not found");
    assert!(bogus.is_opaque());
    assert!(bogus.schema().is_none());
}

#[test]
fn data_to_dict() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let DictValue::Map(root) = dtree1.to_dict().expect("Failed to export data")
    else {
        panic!("Unexpected root");
    };
    let Some(DictValue::Map(interfaces)) = root.get("interfaces") else {
        panic!("Missing interfaces");
    };
    let Some(DictValue::List(list)) = interfaces.get("interface") else {
        panic!("Missing interface list");
    };
    assert_eq!(list.len(), 2);

    let Some(DictValue::Map(eth1)) = list.get(&ListKey::from("eth/0/1")) else {
        panic!("Missing eth/0/1");
    };
    assert_eq!(
        eth1.get("enabled"),
        Some(&DictValue::Value(DataValue::Bool(true)))
    );
    assert_eq!(
        eth1.get("description"),
        Some(&DictValue::Value(DataValue::Other("MKT".to_owned())))
    );
}

#[test]
fn data_iterator_traverse() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .traverse()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/enabled"
        ]
    );
}

#[test]
fn data_iterator_ancestors() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path(
                "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            )
            .expect("Failed to lookup data")
            .ancestors()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces",
        ]
    );
}

#[test]
fn data_iterator_siblings() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path(
                "/ietf-interfaces:interfaces/interface[name='eth/0/0']"
            )
            .expect("Failed to lookup data")
            .siblings()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec!["/ietf-interfaces:interfaces/interface[name='eth/0/1']",]
    );
}

#[test]
fn data_iterator_children() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path("/ietf-interfaces:interfaces")
            .expect("Failed to lookup data")
            .children()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
        ]
    );
}

#[test]
fn data_list_keys() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path(
                "/ietf-interfaces:interfaces/interface[name='eth/0/1']"
            )
            .expect("Failed to lookup data")
            .list_keys()
            .map(|dnode| dnode.value_canonical().unwrap())
            .collect::<Vec<String>>(),
        vec!["eth/0/1"]
    );
}
