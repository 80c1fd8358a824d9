use yang_core::context::{Context, ContextFlags};
use yang_core::schema::SchemaInputFormat;
use yang_core::ErrorCode;

static MODULE_BASE: &str = r###"
module base {
  namespace "urn:base";
  prefix b;

  container top {
    leaf gone {
      type string;
    }
    leaf speed {
      type uint32;
    }
    leaf mtu {
      type uint16;
      units "octets";
      default "1500";
      must ". >= 68";
    }
    leaf name {
      type string;
      default "none";
    }
  }
}
"###;

static MODULE_DEVIATIONS: &str = r###"
module dev {
  namespace "urn:dev";
  prefix d;

  import base {
    prefix b;
  }

  deviation "/b:top/b:gone" {
    deviate not-supported;
  }
  deviation "/b:top/b:speed" {
    deviate add {
      units "Mbps";
      default "1000";
    }
  }
  deviation "/b:top/b:mtu" {
    deviate replace {
      type uint32;
    }
    deviate delete {
      must ". >= 68";
    }
  }
}
"###;

static MODULE_GROUPING: &str = r###"
module grp {
  namespace "urn:grp";
  prefix g;

  grouping link {
    leaf mtu {
      type uint16;
      default "1500";
      description "MTU.";
    }
  }

  container wan {
    uses link {
      refine mtu {
        default "9000";
        description "Jumbo MTU.";
      }
    }
  }
  container lan {
    uses link;
  }
}
"###;

fn create_context() -> Context {
    Context::new(ContextFlags::NO_YANGLIBRARY).expect("Failed to create context")
}

fn compile_error(ctx: &mut Context, module: &str) -> yang_core::Error {
    ctx.parse_module(module, SchemaInputFormat::YANG, &[])
        .map(|module| module.name().to_owned())
        .unwrap_err()
}

#[test]
fn compile_augment_target() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_BASE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let err = compile_error(
        &mut ctx,
        r###"
        module aug {
          namespace "urn:aug";
          prefix a;

          import base {
            prefix b;
          }

          augment "/b:top/b:missing" {
            leaf extra {
              type string;
            }
          }
        }"###,
    );
    assert_eq!(err.errcode, ErrorCode::AugmentTarget);
    assert!(err.msg.unwrap().contains("/b:top/b:missing"));
    assert!(ctx.get_module_latest("aug").is_none());

    // The same augment against an existing node compiles.
    ctx.parse_module(
        r###"
        module aug {
          namespace "urn:aug";
          prefix a;

          import base {
            prefix b;
          }

          augment "/b:top" {
            leaf extra {
              type string;
            }
          }
        }"###,
        SchemaInputFormat::YANG,
        &[],
    )
    .expect("Failed to parse module");
    assert_eq!(
        ctx.find_path("/base:top/aug:extra")
            .expect("Missing augmented node")
            .module()
            .name(),
        "aug"
    );
}

#[test]
fn compile_deviations() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_BASE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    ctx.parse_module(MODULE_DEVIATIONS, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    // not-supported
    assert!(ctx.find_path("/base:top/gone").is_err());

    // add
    let speed = ctx.find_path("/base:top/speed").unwrap();
    assert_eq!(speed.units(), Some("Mbps"));
    assert_eq!(speed.default_value_canonical(), Some("1000"));

    // replace and delete
    let mtu = ctx.find_path("/base:top/mtu").unwrap();
    assert_eq!(mtu.leaf_type().unwrap().typedef_name(), None);
    assert_eq!(
        mtu.leaf_type().unwrap().base_type(),
        yang_core::schema::DataValueType::Uint32
    );
    assert_eq!(mtu.musts().count(), 0);
    assert_eq!(mtu.units(), Some("octets"));
}

#[test]
fn compile_deviation_mismatch() {
    for (deviate, property) in [
        ("deviate delete { default \"other\"; }", "default"),
        ("deviate delete { units \"bytes\"; }", "units"),
        ("deviate delete { must \". < 10\"; }", "must"),
    ] {
        let mut ctx = create_context();
        ctx.parse_module(MODULE_BASE, SchemaInputFormat::YANG, &[])
            .expect("Failed to parse module");
        let module = format!(
            r###"
            module dev {{
              namespace "urn:dev";
              prefix d;

              import base {{
                prefix b;
              }}

              deviation "/b:top/b:{}" {{
                {}
              }}
            }}"###,
            if property == "default" { "name" } else { "mtu" },
            deviate
        );
        let err = compile_error(&mut ctx, &module);
        assert_eq!(err.errcode, ErrorCode::Compile);
        let msg = err.msg.unwrap();
        assert!(msg.contains("value does not match"), "{}", msg);
        assert!(msg.contains(property), "{}", msg);

        // The target keeps its properties.
        assert_eq!(
            ctx.find_path("/base:top/name")
                .unwrap()
                .default_value_canonical(),
            Some("none")
        );
    }
}

#[test]
fn compile_deviation_add_existing() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_BASE, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    let err = compile_error(
        &mut ctx,
        r###"
        module dev {
          namespace "urn:dev";
          prefix d;

          import base {
            prefix b;
          }

          deviation "/b:top/b:mtu" {
            deviate add {
              default "9000";
            }
          }
        }"###,
    );
    assert_eq!(err.errcode, ErrorCode::Compile);
    assert!(err.msg.unwrap().contains("property already exists"));
}

#[test]
fn compile_typedef_cycle() {
    let mut ctx = create_context();
    let err = compile_error(
        &mut ctx,
        r###"
        module cycle {
          namespace "urn:cycle";
          prefix c;

          typedef a {
            type b;
          }
          typedef b {
            type a;
          }

          leaf x {
            type a;
          }
        }"###,
    );
    assert_eq!(err.errcode, ErrorCode::CyclicDefinition);
    assert!(err.msg.unwrap().contains("circular chain of typedefs"));
}

#[test]
fn compile_leafref_cycle() {
    let mut ctx = create_context();
    let err = compile_error(
        &mut ctx,
        r###"
        module cycle {
          namespace "urn:cycle";
          prefix c;

          leaf a {
            type leafref {
              path "/c:b";
            }
          }
          leaf b {
            type leafref {
              path "/c:a";
            }
          }
        }"###,
    );
    assert_eq!(err.errcode, ErrorCode::CyclicDefinition);
    assert!(err.msg.unwrap().contains("circular chain of leafrefs"));
}

#[test]
fn compile_refine_per_uses() {
    let mut ctx = create_context();
    ctx.parse_module(MODULE_GROUPING, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let wan = ctx.find_path("/grp:wan/mtu").unwrap();
    assert_eq!(wan.default_value_canonical(), Some("9000"));
    assert_eq!(wan.description(), Some("Jumbo MTU."));

    // The refine only applies to the instance it is attached to.
    let lan = ctx.find_path("/grp:lan/mtu").unwrap();
    assert_eq!(lan.default_value_canonical(), Some("1500"));
    assert_eq!(lan.description(), Some("MTU."));
}
