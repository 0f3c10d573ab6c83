//! Collection payloads shaped like the service's responses.

use serde_json::{Value, json};

/// One series with `id`, titled `Series {id}`, with three volumes of which
/// the first is owned. Volume ids are `id * 100 + number`.
#[must_use]
pub fn series_json(id: i64) -> Value {
    let volumes: Vec<Value> = (1..=3)
        .map(|number| {
            json!({
                "id": id * 100 + number,
                "volume_number": number,
                "owned": number == 1,
            })
        })
        .collect();
    json!({
        "id": id,
        "title": format!("Series {id}"),
        "total_volumes": 3,
        "completed": false,
        "score": null,
        "tags": [],
        "volumes": volumes,
    })
}

/// A list response containing [`series_json`] for each id, in order.
#[must_use]
pub fn series_list(ids: &[i64]) -> Value {
    Value::Array(ids.iter().copied().map(series_json).collect())
}
