use rusonoff::uiid::{self, KNOWN_UIIDS, UiidParams};
use rusonoff::{Parameter, SonoffError};
use serde_json::{Value, json};

fn invalid_field(uiid: u32, params: Value) -> String {
    match uiid::project(uiid, &params) {
        Err(SonoffError::Validation(e)) => e.field,
        other => panic!("uiid {uiid}: expected a validation error, got {other:?}"),
    }
}

#[test]
fn every_known_uiid_accepts_an_empty_payload() {
    for &uiid in KNOWN_UIIDS {
        let states = uiid::project(uiid, &json!({}))
            .unwrap_or_else(|e| panic!("uiid {uiid}: {e}"))
            .unwrap_or_else(|| panic!("uiid {uiid} has no model"));
        assert!(states.is_empty(), "uiid {uiid} projected absent fields");
    }
}

// Zigbee sub-devices report no Wi-Fi health fields.
const SUB_DEVICE_UIIDS: &[u32] = &[195, 1770, 1771];

#[test]
fn health_fields_project_for_every_wifi_model() {
    let params = json!({"fwVersion": "3.5.0", "rssi": -61, "unknownField": [1, 2]});
    for uiid in KNOWN_UIIDS.iter().copied().filter(|u| !SUB_DEVICE_UIIDS.contains(u)) {
        let states = uiid::project(uiid, &params).unwrap().unwrap();
        assert_eq!(
            states.device_value(Parameter::FirmwareVersion),
            Some(&json!("3.5.0")),
            "uiid {uiid}"
        );
        assert!(states.channel.is_empty(), "uiid {uiid}");
    }
}

#[test]
fn non_object_payloads_are_rejected() {
    for &uiid in KNOWN_UIIDS {
        assert!(uiid::project(uiid, &json!([1, 2, 3])).is_err(), "uiid {uiid}");
    }
}

#[test]
fn unknown_uiids_are_present_but_unparseable() {
    for uiid in [0, 10, 13, 26, 1000, 1772] {
        assert!(!uiid::is_known(uiid));
        assert!(uiid::project(uiid, &json!({"switch": "on"})).unwrap().is_none());
    }
}

#[test]
fn out_of_range_values_name_the_field() {
    assert_eq!(invalid_field(1, json!({"switch": "maybe"})), "switch");
    assert_eq!(invalid_field(36, json!({"bright": 5})), "bright");
    assert_eq!(invalid_field(33, json!({"colorR": 300})), "colorR");
    assert_eq!(
        invalid_field(7, json!({"switches": [{"switch": "on", "outlet": 0}, {"switch": "up", "outlet": 1}]})),
        "switches[1].switch"
    );
}

#[test]
fn numeric_strings_are_normalized() {
    let parsed = UiidParams::parse(36, &json!({"switch": "on", "bright": "55"}))
        .unwrap()
        .unwrap();
    let states = parsed.to_states();
    assert!(states.channel.iter().any(|e| e.value == json!(55)));
}

#[test]
fn nullable_outlet_arrays_keep_health_fields() {
    for params in [
        json!({"switches": null, "fwVersion": "3.5.0"}),
        json!({"switches": [{"switch": "on"}], "fwVersion": "3.5.0"}),
        json!({"switches": [{"switch": null, "outlet": 1}], "fwVersion": "3.5.0"}),
    ] {
        let states = UiidParams::parse(7, &params)
            .unwrap_or_else(|e| panic!("{params}: {e}"))
            .unwrap()
            .to_states();
        assert_eq!(
            states.device_value(Parameter::FirmwareVersion),
            Some(&json!("3.5.0")),
            "{params}"
        );
        assert!(states.channel.is_empty(), "{params}");
    }
}

#[test]
fn null_outlet_items_name_the_field() {
    assert_eq!(invalid_field(7, json!({"switches": [null]})), "switches[0]");
}

#[test]
fn multi_outlet_switches_project_per_outlet() {
    let states = uiid::project(
        7,
        &json!({
            "switches": [
                {"switch": "on", "outlet": 0},
                {"switch": "off", "outlet": 1},
            ],
            "configure": [{"startup": "stay", "outlet": 1}],
        }),
    )
    .unwrap()
    .unwrap();
    assert_eq!(states.channel_value(Parameter::Switch, "switch_0"), Some(&json!("on")));
    assert_eq!(states.channel_value(Parameter::Switch, "switch_1"), Some(&json!("off")));
    assert_eq!(states.channel_value(Parameter::Startup, "switch_1"), Some(&json!("stay")));
    assert!(states.channel_value(Parameter::Startup, "switch_0").is_none());
}
