use serde_json::json;
use yang_core::dict_path::{
    xpath_del, xpath_get, xpath_get_all, xpath_move, xpath_set, xpath_set_default,
};
use yang_core::keyed_list::{DictValue, KeyedList};
use yang_core::schema::DataValue;
use yang_core::ErrorCode;

// Plain JSON arrays become ordered arrays.
fn dict(value: serde_json::Value) -> DictValue {
    match value {
        serde_json::Value::Object(members) => DictValue::Map(
            members
                .into_iter()
                .map(|(name, value)| (name, dict(value)))
                .collect(),
        ),
        serde_json::Value::Array(items) => DictValue::Array(items.into_iter().map(dict).collect()),
        serde_json::Value::Bool(value) => DictValue::Value(DataValue::Bool(value)),
        serde_json::Value::Number(value) => {
            DictValue::Value(DataValue::Int64(value.as_i64().unwrap()))
        }
        serde_json::Value::String(value) => DictValue::Value(DataValue::Other(value)),
        serde_json::Value::Null => DictValue::Value(DataValue::Empty),
    }
}

fn keyed(key_names: &[&str], items: serde_json::Value) -> DictValue {
    let mut list = KeyedList::new_list(key_names.iter().copied());
    let DictValue::Array(items) = dict(items) else {
        panic!("expected an array");
    };
    list.extend(items).unwrap();
    DictValue::List(list)
}

fn leaf_list(items: serde_json::Value) -> DictValue {
    let mut list = KeyedList::new_leaf_list();
    let DictValue::Array(items) = dict(items) else {
        panic!("expected an array");
    };
    list.extend(items).unwrap();
    DictValue::LeafList(list)
}

fn set_member(map: &mut DictValue, path: &[&str], value: DictValue) {
    let mut current = map;
    for name in &path[..path.len() - 1] {
        let DictValue::Map(members) = current else {
            panic!("expected a map");
        };
        current = members.get_mut(*name).unwrap();
    }
    let DictValue::Map(members) = current else {
        panic!("expected a map");
    };
    members.insert(path[path.len() - 1].to_owned(), value);
}

fn eth1_addresses(ipv4: serde_json::Value, ipv6: serde_json::Value) -> DictValue {
    let mut eth1 = dict(json!({"name": "eth1", "ipv4": {}, "ipv6": {}}));
    set_member(&mut eth1, &["ipv4", "address"], keyed(&["ip"], ipv4));
    set_member(&mut eth1, &["ipv6", "address"], keyed(&["ip", "prefixlen"], ipv6));
    eth1
}

fn sample() -> DictValue {
    let mut data = dict(json!({
        "cont1": {"leaf1": "coucou1"},
        "cont2": {"leaf2": "coucou2"},
        "iface": [
            {
                "name": "eth0",
                "ipv4": {"address": [{"ip": "10.0.0.1"}, {"ip": "10.0.0.153"}]},
                "ipv6": {"address": [{"ip": "3ffe::123:1"}, {"ip": "3ffe::c00:c00"}]}
            }
        ],
        "lst2": ["a", "b", "c"],
        "lstnum": [10, 20, 30, 40],
        "val": 42
    }));
    let DictValue::Map(members) = &mut data else {
        unreachable!();
    };
    let Some(DictValue::Array(ifaces)) = members.get_mut("iface") else {
        unreachable!();
    };
    ifaces.push(eth1_addresses(
        json!([{"ip": "10.0.0.2"}, {"ip": "10.0.0.6"}]),
        json!([
            {"ip": "3ffe::321:8", "prefixlen": 64, "tentative": false},
            {"ip": "3ffe::ff12", "prefixlen": 96, "tentative": true}
        ]),
    ));
    set_member(
        &mut data,
        &["iface2"],
        keyed(
            &["name"],
            json!([{"name": "eth2", "mtu": 1500}, {"name": "eth3", "mtu": 1000}]),
        ),
    );
    data
}

#[test]
fn dict_path_get() {
    let data = sample();

    assert_eq!(xpath_get(&data, "/val").unwrap(), Some(&dict(json!(42))));
    assert_eq!(xpath_get(&data, "val").unwrap(), Some(&dict(json!(42))));
    assert_eq!(
        xpath_get(&data, "lst2").unwrap(),
        Some(&dict(json!(["a", "b", "c"])))
    );
    assert_eq!(
        xpath_get(&data, "iface[name='eth0']/ipv4/address").unwrap(),
        Some(&dict(json!([{"ip": "10.0.0.1"}, {"ip": "10.0.0.153"}])))
    );
    // Keyed lookup, predicates in any order.
    for path in [
        "/iface[name='eth1']/ipv6/address[ip='3ffe::321:8'][prefixlen='64']",
        "/iface[name='eth1']/ipv6/address[prefixlen='64'][ip='3ffe::321:8']",
    ] {
        assert_eq!(
            xpath_get(&data, path).unwrap(),
            Some(&dict(
                json!({"ip": "3ffe::321:8", "prefixlen": 64, "tentative": false})
            ))
        );
    }
    assert_eq!(
        xpath_get(&data, "/p:cont1/p:leaf1").unwrap(),
        Some(&dict(json!("coucou1")))
    );
    assert_eq!(
        xpath_get(&data, "cont2/leaf2").unwrap(),
        Some(&dict(json!("coucou2")))
    );
    assert_eq!(xpath_get(&data, "cont1/leaf2").unwrap(), None);
    assert_eq!(xpath_get(&data, "iface[name='eth9']/ipv4").unwrap(), None);
    assert_eq!(xpath_get(&data, "iface2[name='eth3']/mtu").unwrap(), Some(&dict(json!(1000))));

    // Structure mismatch.
    let err = xpath_get(&data, "/val/x").unwrap_err();
    assert_eq!(err.errcode, ErrorCode::InvalidValue);
}

#[test]
fn dict_path_get_all() {
    let data = dict(json!({
        "config": {
            "vrf": [
                {"name": "vrf0", "routing": {"a1": [1, 8]}},
                {"name": "vrf1", "routing": {"a2": 55}},
                {"name": "vrf2", "snmp": {"a3": 12, "c": 5}}
            ]
        }
    }));
    let sorted = |path: &str| {
        let mut values: Vec<String> = xpath_get_all(&data, path)
            .unwrap()
            .into_iter()
            .map(|value| format!("{:?}", value))
            .collect();
        values.sort();
        values
    };

    assert_eq!(
        xpath_get_all(&data, "/config/vrf/name").unwrap(),
        vec![&dict(json!("vrf0")), &dict(json!("vrf1")), &dict(json!("vrf2"))]
    );
    assert_eq!(
        xpath_get_all(&data, "/config/vrf/routing").unwrap(),
        vec![&dict(json!({"a1": [1, 8]})), &dict(json!({"a2": 55}))]
    );
    assert!(xpath_get_all(&data, "/config/vrf/routing/b").unwrap().is_empty());
    assert_eq!(
        sorted("/config/vrf/*/a*"),
        sorted_debug(&[json!(1), json!(8), json!(55), json!(12)])
    );
    assert_eq!(
        xpath_get_all(&data, "/config/vrf[name='vrf1']/routing/a2").unwrap(),
        vec![&dict(json!(55))]
    );
}

fn sorted_debug(values: &[serde_json::Value]) -> Vec<String> {
    let mut values: Vec<String> = values
        .iter()
        .map(|value| format!("{:?}", dict(value.clone())))
        .collect();
    values.sort();
    values
}

#[test]
fn dict_path_set() {
    let mut data = sample();

    xpath_set(&mut data, "/val", dict(json!(43)), true, None).unwrap();
    xpath_set(&mut data, "/cont1/leaf1", dict(json!("foo")), true, None).unwrap();
    xpath_set(&mut data, "/cont1/leaf2", dict(json!("bar")), true, None).unwrap();
    xpath_set(
        &mut data,
        "/iface[name='eth0']",
        dict(json!({"name": "eth0", "up": false})),
        true,
        None,
    )
    .unwrap();
    xpath_set(
        &mut data,
        "/iface[name='eth1']/ipv4/address[ip='10.0.0.2']/mtu",
        dict(json!(1500)),
        true,
        None,
    )
    .unwrap();
    xpath_set(
        &mut data,
        "/iface[name='eth1']/ipv6/address[ip='3ffe::ffff'][prefixlen='100']",
        dict(json!({"ip": "3ffe::ffff", "prefixlen": 100, "tentative": false})),
        true,
        None,
    )
    .unwrap();
    xpath_set(&mut data, "/lstnum[.='100']", dict(json!(100)), true, None).unwrap();
    xpath_set(&mut data, "/lstnum[.='1']", dict(json!(1)), true, Some("")).unwrap();

    let err = xpath_set(
        &mut data,
        "/lstnum[.='1000']",
        dict(json!(1000)),
        true,
        Some("1000000"),
    )
    .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::NotFound);
    let err = xpath_set(
        &mut data,
        "/iface[name='eth1']/ipv4/address[ip='10.0.0.3']",
        dict(json!({"ip": "10.0.0.3"})),
        true,
        Some("[ip='10.0.0.55']"),
    )
    .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::InvalidValue);

    xpath_set(
        &mut data,
        "/iface[name='eth1']/ipv4/address[ip='10.0.0.3']",
        dict(json!({"ip": "10.0.0.3"})),
        true,
        None,
    )
    .unwrap();
    xpath_set(
        &mut data,
        "/cont2/newlist[foo='bar']",
        dict(json!({"foo": "bar", "name": "baz"})),
        true,
        None,
    )
    .unwrap();
    xpath_set(&mut data, "/cont2/newll[.='12']", dict(json!(12)), true, None).unwrap();

    let mut expected = dict(json!({
        "cont1": {"leaf1": "foo", "leaf2": "bar"},
        "cont2": {"leaf2": "coucou2"},
        "iface": [{"name": "eth0", "up": false}],
        "lst2": ["a", "b", "c"],
        "lstnum": [1, 10, 20, 30, 40, 100],
        "val": 43
    }));
    set_member(
        &mut expected,
        &["cont2", "newlist"],
        keyed(&["foo"], json!([{"foo": "bar", "name": "baz"}])),
    );
    set_member(&mut expected, &["cont2", "newll"], leaf_list(json!([12])));
    let DictValue::Map(members) = &mut expected else {
        unreachable!();
    };
    let Some(DictValue::Array(ifaces)) = members.get_mut("iface") else {
        unreachable!();
    };
    ifaces.push(eth1_addresses(
        json!([{"ip": "10.0.0.2", "mtu": 1500}, {"ip": "10.0.0.6"}, {"ip": "10.0.0.3"}]),
        json!([
            {"ip": "3ffe::321:8", "prefixlen": 64, "tentative": false},
            {"ip": "3ffe::ff12", "prefixlen": 96, "tentative": true},
            {"ip": "3ffe::ffff", "prefixlen": 100, "tentative": false}
        ]),
    ));
    set_member(
        &mut expected,
        &["iface2"],
        keyed(
            &["name"],
            json!([{"name": "eth2", "mtu": 1500}, {"name": "eth3", "mtu": 1000}]),
        ),
    );
    assert_eq!(data, expected);
}

#[test]
fn dict_path_set_default() {
    let mut data = sample();

    // Existing values are kept.
    assert_eq!(
        *xpath_set_default(&mut data, "/val", dict(json!(1))).unwrap(),
        dict(json!(42))
    );
    assert_eq!(
        *xpath_set_default(
            &mut data,
            "/iface2[name='eth2']",
            dict(json!({"name": "eth2", "mtu": 9000}))
        )
        .unwrap(),
        dict(json!({"name": "eth2", "mtu": 1500}))
    );

    // Missing ones are created, parents included.
    assert_eq!(
        *xpath_set_default(&mut data, "/cont3/sub/leaf", dict(json!("x"))).unwrap(),
        dict(json!("x"))
    );
    assert_eq!(
        xpath_get(&data, "/cont3/sub/leaf").unwrap(),
        Some(&dict(json!("x")))
    );
}

#[test]
fn dict_path_del() {
    let mut data = sample();

    assert!(xpath_del(&mut data, "/val").unwrap());
    assert!(!xpath_del(&mut data, "/val").unwrap());
    assert!(!xpath_del(&mut data, "/nowhere/leaf").unwrap());

    assert!(xpath_del(&mut data, "/lst2[.='b']").unwrap());
    assert_eq!(
        xpath_get(&data, "/lst2").unwrap(),
        Some(&dict(json!(["a", "c"])))
    );
    assert!(!xpath_del(&mut data, "/lst2[.='b']").unwrap());

    assert!(xpath_del(&mut data, "/iface[name='eth1']/ipv4/address[ip='10.0.0.2']").unwrap());
    assert!(xpath_del(&mut data, "/iface[name='eth1']/ipv4/address[ip='10.0.0.6']").unwrap());
    // The emptied list goes away.
    assert_eq!(
        xpath_get(&data, "/iface[name='eth1']/ipv4").unwrap(),
        Some(&dict(json!({})))
    );

    assert!(xpath_del(&mut data, "/iface2[name='eth3']").unwrap());
    assert!(!xpath_del(&mut data, "/iface2[name='eth3']").unwrap());
    assert_eq!(xpath_get(&data, "/iface2[name='eth2']/mtu").unwrap(), Some(&dict(json!(1500))));
}

#[test]
fn dict_path_move() {
    let mut data = sample();
    let lstnum = |data: &DictValue| xpath_get(data, "/lstnum").unwrap().cloned();

    xpath_move(&mut data, "/lstnum[.='30']", Some("")).unwrap();
    assert_eq!(lstnum(&data), Some(dict(json!([30, 10, 20, 40]))));
    xpath_move(&mut data, "/lstnum[.='30']", None).unwrap();
    assert_eq!(lstnum(&data), Some(dict(json!([10, 20, 40, 30]))));
    xpath_move(&mut data, "/lstnum[.='10']", Some("20")).unwrap();
    assert_eq!(lstnum(&data), Some(dict(json!([20, 10, 40, 30]))));
    xpath_move(&mut data, "/lstnum[.='30']", Some("20")).unwrap();
    assert_eq!(lstnum(&data), Some(dict(json!([20, 30, 10, 40]))));

    xpath_move(&mut data, "/iface[name='eth1']", Some("")).unwrap();
    assert_eq!(
        xpath_get_all(&data, "/iface/name").unwrap(),
        vec![&dict(json!("eth1")), &dict(json!("eth0"))]
    );
    xpath_move(&mut data, "/iface[name='eth1']", Some("[name='eth0']")).unwrap();
    assert_eq!(
        xpath_get_all(&data, "/iface/name").unwrap(),
        vec![&dict(json!("eth0")), &dict(json!("eth1"))]
    );

    let err = xpath_move(&mut data, "/lstnum[.='99']", None).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::NotFound);
    let err = xpath_move(&mut data, "/lstnum[.='10']", Some("99")).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::NotFound);
    let err = xpath_move(&mut data, "/iface2[name='eth2']", None).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::InvalidValue);
    let err = xpath_move(&mut data, "/lstnum", None).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::InvalidValue);
}
