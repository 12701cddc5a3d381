// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! End-to-end scenarios exercising the registry, the generic dispatch,
//! and the polymorphic layer together, the way application code wires
//! them up.

use crate::poly::{self, Poly};
use crate::registry::{Reflect, TypeCodecBuilder};
use crate::{tree_codec, type_tag, CodecError, TreeCodec, TypeTag, TYPENAME_KEY};
use serde_json::json;
use std::collections::BTreeMap;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Fixture types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Down = 0,
    Negotiating = 1,
    Up = 2,
}

crate::enum_codec!(LinkState as u32 { Down, Negotiating, Up });

impl Default for LinkState {
    fn default() -> Self {
        LinkState::Down
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bias {
    Negative = -1,
    Neutral = 0,
    Positive = 1,
}

crate::enum_codec!(Bias as i16 { Negative, Neutral, Positive });

#[derive(Debug, Default, Clone, PartialEq)]
struct Endpoint {
    address: String,
    port: u16,
}

impl Reflect for Endpoint {
    fn configure(builder: &mut TypeCodecBuilder<Self>) {
        builder.default_construction();
        builder.register_field("Address", |e: &Self| &e.address, |e, v| e.address = v);
        builder.register_field("Port", |e: &Self| &e.port, |e, v| e.port = v);
    }
}

tree_codec!(Endpoint);

#[derive(Debug, Default, PartialEq)]
struct LinkReport {
    state: LinkState,
    endpoint: Endpoint,
    rtt_ms: f64,
    peers: Vec<String>,
    flags: Vec<BTreeMap<i32, bool>>,
}

impl Reflect for LinkReport {
    fn configure(builder: &mut TypeCodecBuilder<Self>) {
        builder.default_construction();
        builder.register_field("State", |r: &Self| &r.state, |r, v| r.state = v);
        builder.register_field("Endpoint", |r: &Self| &r.endpoint, |r, v| r.endpoint = v);
        builder.register_field("RttMs", |r: &Self| &r.rtt_ms, |r, v| r.rtt_ms = v);
        builder.register_field("Peers", |r: &Self| &r.peers, |r, v| r.peers = v);
        builder.register_field("Flags", |r: &Self| &r.flags, |r, v| r.flags = v);
    }
}

tree_codec!(LinkReport);

// Non-default-constructible: the session id is fixed at construction and
// only readable through a getter.
#[derive(Debug, PartialEq)]
struct Session {
    id: u64,
    label: String,
}

impl Session {
    fn open(id: u64) -> Self {
        Self {
            id,
            label: String::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl Reflect for Session {
    fn configure(builder: &mut TypeCodecBuilder<Self>) {
        let id = builder.constructor_param("Id", |s: &Self| s.id());
        builder.register_constructor(move |object| Ok(Session::open(id.extract(object)?)));
        builder.register_field("Label", |s: &Self| &s.label, |s, v| s.label = v);
    }
}

tree_codec!(Session);

// A small hierarchy with sibling payload kinds.
trait Metric: TypeTag {
    fn as_f64(&self) -> f64;
}

crate::polymorphic_base!(Metric);

#[derive(Debug, Default, PartialEq)]
struct Counter {
    count: i64,
}

impl Metric for Counter {
    fn as_f64(&self) -> f64 {
        self.count as f64
    }
}

impl Reflect for Counter {
    fn configure(builder: &mut TypeCodecBuilder<Self>) {
        builder.default_construction();
        builder.register_field("Count", |c: &Self| &c.count, |c, v| c.count = v);
    }
}

tree_codec!(Counter);
type_tag!(Counter);

#[derive(Debug, Default, PartialEq)]
struct Gauge {
    reading: f64,
}

impl Metric for Gauge {
    fn as_f64(&self) -> f64 {
        self.reading
    }
}

impl Reflect for Gauge {
    fn configure(builder: &mut TypeCodecBuilder<Self>) {
        builder.default_construction();
        builder.register_field("Reading", |g: &Self| &g.reading, |g, v| g.reading = v);
    }
}

tree_codec!(Gauge);
type_tag!(Gauge);

fn wire_metrics() {
    poly::register::<dyn Metric, Counter>(|child| child);
    poly::register::<dyn Metric, Gauge>(|child| child);
}

#[derive(Debug)]
struct MetricSet {
    name: String,
    metrics: Vec<Poly<dyn Metric>>,
}

impl Default for MetricSet {
    fn default() -> Self {
        Self {
            name: String::new(),
            metrics: Vec::new(),
        }
    }
}

impl Reflect for MetricSet {
    fn configure(builder: &mut TypeCodecBuilder<Self>) {
        builder.default_construction();
        builder.register_field("Name", |m: &Self| &m.name, |m, v| m.name = v);
        builder.register_field("Metrics", |m: &Self| &m.metrics, |m, v| m.metrics = v);
    }
}

tree_codec!(MetricSet);

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_three_field_object_shape() {
    #[derive(Debug, Default, PartialEq)]
    struct Triple {
        a: i32,
        b: Vec<u32>,
        c: String,
    }

    impl Reflect for Triple {
        fn configure(builder: &mut TypeCodecBuilder<Self>) {
            builder.default_construction();
            builder.register_field("A", |t: &Self| &t.a, |t, v| t.a = v);
            builder.register_field("B", |t: &Self| &t.b, |t, v| t.b = v);
            builder.register_field("C", |t: &Self| &t.c, |t, v| t.c = v);
        }
    }

    crate::tree_codec!(Triple);

    let triple = Triple {
        a: 42,
        b: vec![1, 2, 3],
        c: "x".to_owned(),
    };
    let node = triple.serialize().expect("serialize");
    assert_eq!(node, json!({"A": 42, "B": [1, 2, 3], "C": "x"}));
    assert!(Triple::validate(&node));
    assert_eq!(Triple::deserialize(&node).expect("deserialize"), triple);
}

#[test]
fn test_serialized_shape_is_stable() {
    let report = LinkReport {
        state: LinkState::Up,
        endpoint: Endpoint {
            address: "10.0.0.2".to_owned(),
            port: 7400,
        },
        rtt_ms: 1.25,
        peers: vec!["a".to_owned(), "b".to_owned()],
        flags: vec![BTreeMap::from([(1, true), (2, false)])],
    };

    let node = report.serialize().expect("serialize");
    assert_eq!(
        node,
        json!({
            "State": 2,
            "Endpoint": {"Address": "10.0.0.2", "Port": 7400},
            "RttMs": 1.25,
            "Peers": ["a", "b"],
            "Flags": [[{"1": 1, "2": true}, {"1": 2, "2": false}]],
        })
    );
}

#[test]
fn test_nested_round_trip() {
    let report = LinkReport {
        state: LinkState::Negotiating,
        endpoint: Endpoint {
            address: "fe80::1".to_owned(),
            port: 0,
        },
        rtt_ms: -3.5,
        peers: Vec::new(),
        flags: vec![BTreeMap::new(), BTreeMap::from([(-7, true)])],
    };

    let node = report.serialize().expect("serialize");
    assert!(LinkReport::validate(&node));
    assert_eq!(LinkReport::deserialize(&node).expect("deserialize"), report);
}

#[test]
fn test_validate_gates_deserialize() {
    let mut node = LinkReport::default().serialize().expect("serialize");
    node.as_object_mut()
        .expect("object")
        .insert("Surplus".to_owned(), json!(1));

    assert!(!LinkReport::validate(&node));
    assert_eq!(
        LinkReport::deserialize(&node).expect_err("gate"),
        CodecError::Validation {
            type_name: "LinkReport"
        }
    );
}

#[test]
fn test_float_field_accepts_integer_node() {
    // Writers that emit a whole number for a float field stay readable.
    let node = json!({
        "State": 0,
        "Endpoint": {"Address": "", "Port": 0},
        "RttMs": 4,
        "Peers": [],
        "Flags": [],
    });
    assert!(LinkReport::validate(&node));
    let report = LinkReport::deserialize(&node).expect("deserialize");
    assert_eq!(report.rtt_ms, 4.0);
}

#[test]
fn test_unsigned_field_rejects_negative_node() {
    let node = json!({"Address": "x", "Port": -1});
    assert!(!Endpoint::validate(&node));
}

#[test]
fn test_enum_round_trip_both_representations() {
    for state in [LinkState::Down, LinkState::Negotiating, LinkState::Up] {
        let node = state.serialize().expect("serialize");
        assert_eq!(LinkState::deserialize(&node).expect("deserialize"), state);
    }
    for bias in [Bias::Negative, Bias::Neutral, Bias::Positive] {
        let node = bias.serialize().expect("serialize");
        assert_eq!(Bias::deserialize(&node).expect("deserialize"), bias);
    }
}

#[test]
fn test_enum_rejects_unknown_discriminant() {
    assert_eq!(
        LinkState::deserialize(&json!(3)).expect_err("unknown"),
        CodecError::UnknownEnumValue {
            type_name: "LinkState",
            value: 3
        }
    );
    assert_eq!(
        Bias::deserialize(&json!(-2)).expect_err("unknown"),
        CodecError::UnknownEnumValue {
            type_name: "Bias",
            value: -2
        }
    );
}

#[test]
fn test_construction_recipe_round_trip() {
    let mut session = Session::open(0xDEAD_BEEF);
    session.label = "primary".to_owned();

    let node = session.serialize().expect("serialize");
    assert_eq!(node, json!({"Id": 3_735_928_559_u64, "Label": "primary"}));

    let rebuilt = Session::deserialize(&node).expect("deserialize");
    assert_eq!(rebuilt, session);
}

#[test]
fn test_shared_pointer_deserializes_fresh() {
    let shared = Rc::new(Endpoint {
        address: "host".to_owned(),
        port: 1,
    });
    let node = shared.serialize().expect("serialize");

    let first: Rc<Endpoint> = Rc::deserialize(&node).expect("deserialize");
    let second: Rc<Endpoint> = Rc::deserialize(&node).expect("deserialize");
    assert_eq!(first, second);
    assert!(!Rc::ptr_eq(&first, &second));
    assert!(!Rc::ptr_eq(&shared, &first));
}

#[test]
fn test_polymorphic_siblings_keep_their_payloads() {
    wire_metrics();

    let counter: Box<dyn Metric> = Box::new(Counter { count: 12 });
    let gauge: Box<dyn Metric> = Box::new(Gauge { reading: 0.75 });

    let counter_node = poly::serialize::<dyn Metric>(&*counter).expect("serialize");
    let gauge_node = poly::serialize::<dyn Metric>(&*gauge).expect("serialize");
    assert_eq!(counter_node, json!({"Count": 12, TYPENAME_KEY: "Counter"}));
    assert_eq!(gauge_node, json!({"Reading": 0.75, TYPENAME_KEY: "Gauge"}));

    let rebuilt = poly::deserialize::<dyn Metric>(&gauge_node).expect("deserialize");
    assert_eq!(rebuilt.type_name(), "Gauge");
    assert_eq!(rebuilt.as_f64(), 0.75);
}

#[test]
fn test_polymorphic_field_inside_registered_type() {
    wire_metrics();

    let set = MetricSet {
        name: "net".to_owned(),
        metrics: vec![
            Poly::new(Box::new(Counter { count: 2 }) as Box<dyn Metric>),
            Poly::new(Box::new(Gauge { reading: 9.5 }) as Box<dyn Metric>),
        ],
    };

    let node = set.serialize().expect("serialize");
    assert!(MetricSet::validate(&node));

    let rebuilt = MetricSet::deserialize(&node).expect("deserialize");
    assert_eq!(rebuilt.name, "net");
    assert_eq!(rebuilt.metrics.len(), 2);
    assert_eq!(rebuilt.metrics[0].type_name(), "Counter");
    assert_eq!(rebuilt.metrics[0].as_f64(), 2.0);
    assert_eq!(rebuilt.metrics[1].type_name(), "Gauge");
    assert_eq!(rebuilt.metrics[1].as_f64(), 9.5);
}

#[test]
fn test_polymorphic_tag_protocol_violations() {
    wire_metrics();

    assert_eq!(
        poly::deserialize::<dyn Metric>(&json!({"Count": 1})).err(),
        Some(CodecError::MissingTypeTag { base: "dyn Metric" })
    );
    assert_eq!(
        poly::deserialize::<dyn Metric>(&json!({"Count": 1, TYPENAME_KEY: "Histogram"})).err(),
        Some(CodecError::UnregisteredTag {
            base: "dyn Metric",
            tag: "Histogram".to_owned()
        })
    );
    assert!(!poly::validate::<dyn Metric>(&json!({"Count": 1})));
}

#[test]
fn test_randomized_report_round_trips() {
    fastrand::seed(0x5EED);
    for _ in 0..64 {
        let report = LinkReport {
            state: match fastrand::u32(0..3) {
                0 => LinkState::Down,
                1 => LinkState::Negotiating,
                _ => LinkState::Up,
            },
            endpoint: Endpoint {
                address: std::iter::repeat_with(fastrand::alphanumeric)
                    .take(fastrand::usize(0..12))
                    .collect(),
                port: fastrand::u16(..),
            },
            rtt_ms: f64::from(fastrand::i32(..)) / 16.0,
            peers: (0..fastrand::usize(0..4))
                .map(|i| format!("peer-{i}"))
                .collect(),
            flags: (0..fastrand::usize(0..3))
                .map(|_| {
                    (0..fastrand::usize(0..4))
                        .map(|_| (fastrand::i32(..), fastrand::bool()))
                        .collect()
                })
                .collect(),
        };

        let node = report.serialize().expect("serialize");
        assert!(LinkReport::validate(&node));
        assert_eq!(LinkReport::deserialize(&node).expect("deserialize"), report);
    }
}
