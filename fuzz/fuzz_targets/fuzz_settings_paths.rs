// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pipestore::Settings;
use serde_json::Value;

#[derive(Arbitrary, Debug)]
struct Input {
    document: String,
    path: Vec<String>,
    value: i64,
}

fuzz_target!(|input: Input| {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&input.document) else {
        return;
    };

    let mut settings = Settings::new();
    settings.initialize(map);
    let _ = settings.get_sub_property(&input.path);

    if settings.edit_sub_property(&input.path, input.value).is_ok() {
        assert_eq!(settings.get_sub_property(&input.path), Some(&Value::from(input.value)));
        assert!(settings.is_settings_changed());
    }
});
