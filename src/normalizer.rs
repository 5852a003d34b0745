use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::model::{ActivityMeta, Lap, NormalizedActivity, Trackpoint};

type Node = Map<String, Value>;

/// Collapse the source format's singular/plural ambiguity into a plain
/// sequence: absent or null -> empty, a list -> its elements in order,
/// anything else -> a one-element sequence. Every repeated-field access
/// routes through here.
pub fn as_list(v: Option<&Value>) -> Vec<&Value> {
    match v {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

/// Normalize a parsed TCX document tree into the flat activity record.
///
/// Fails atomically: any structure or coercion error aborts the whole
/// document, tagged with the lap/trackpoint index it occurred at.
pub fn normalize(tree: &Value) -> Result<NormalizedActivity> {
    let doc = tree
        .as_object()
        .ok_or_else(|| anyhow!("document root is not an element"))?;
    let db = required_element(doc, "TrainingCenterDatabase")?;
    let activities = required_element(db, "Activities")?;
    let activity = required_element(activities, "Activity")?;

    let meta_activity = extract_meta(activity);

    let lap_value = activity
        .get("Lap")
        .ok_or_else(|| anyhow!("activity has no `Lap` element"))?;
    let mut meta_laps = Vec::new();
    for (idx, lap) in as_list(Some(lap_value)).into_iter().enumerate() {
        let lap = lap
            .as_object()
            .ok_or_else(|| anyhow!("lap {idx}: not an element"))?;
        meta_laps.push(extract_lap(lap).with_context(|| format!("lap {idx}"))?);
    }

    Ok(NormalizedActivity {
        meta_activity,
        meta_laps,
    })
}

fn extract_meta(activity: &Node) -> ActivityMeta {
    ActivityMeta {
        sport: opt_string(activity, "@Sport"),
        id: opt_string(activity, "Id"),
        notes: opt_string(activity, "Notes"),
        creator: activity
            .get("Creator")
            .and_then(Value::as_object)
            .and_then(|creator| opt_string(creator, "Name")),
    }
}

fn extract_lap(lap: &Node) -> Result<Lap> {
    let trackpoints: Vec<&Value> = match lap.get("Track") {
        None => bail!("missing `Track` element"),
        Some(Value::Null) => Vec::new(),
        Some(Value::Object(track)) => as_list(track.get("Trackpoint")),
        Some(other) => bail!("expected a single `Track` element, got: {other}"),
    };

    let reference = resolve_reference(lap, &trackpoints)?;

    let mut tracks = Vec::with_capacity(trackpoints.len());
    for (idx, tp) in trackpoints.into_iter().enumerate() {
        tracks.push(
            extract_trackpoint(tp, reference).with_context(|| format!("trackpoint {idx}"))?,
        );
    }

    Ok(Lap {
        start_time: opt_string(lap, "@StartTime"),
        total_time_seconds: f64_field(lap, "TotalTimeSeconds")?,
        distance_meters: f64_field(lap, "DistanceMeters")?,
        calories: u32_field(lap, "Calories")?,
        average_heart_rate_bpm: hr_summary(lap, "AverageHeartRateBpm")?,
        maximum_heart_rate_bpm: hr_summary(lap, "MaximumHeartRateBpm")?,
        intensity: opt_string(lap, "Intensity"),
        trigger_method: opt_string(lap, "TriggerMethod"),
        tracks,
    })
}

/// Trackpoint times are relative to the first trackpoint's absolute
/// timestamp, which may differ from the lap's declared StartTime. The
/// StartTime attribute is only consulted when the lap has no trackpoints;
/// a lap with neither has no usable time reference at all.
fn resolve_reference(lap: &Node, trackpoints: &[&Value]) -> Result<DateTime<FixedOffset>> {
    match trackpoints.first() {
        Some(first) => {
            let time = first
                .get("Time")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("trackpoint 0: missing `Time`"))?;
            parse_timestamp(time).context("trackpoint 0")
        }
        None => {
            let start = lap
                .get("@StartTime")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("lap has no trackpoints and no `StartTime` attribute"))?;
            parse_timestamp(start).context("`StartTime` attribute")
        }
    }
}

fn extract_trackpoint(tp: &Value, reference: DateTime<FixedOffset>) -> Result<Trackpoint> {
    let tp = tp.as_object().ok_or_else(|| anyhow!("not an element"))?;

    let raw_time = tp
        .get("Time")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing `Time`"))?;
    let time = parse_timestamp(raw_time)?;
    let elapsed = time.signed_duration_since(reference);
    let t = round2(elapsed.num_milliseconds() as f64 / 1000.0);

    let (lat, lon) = match tp.get("Position") {
        Some(Value::Object(pos)) => (
            Some(required_f64(pos, "LatitudeDegrees")?),
            Some(required_f64(pos, "LongitudeDegrees")?),
        ),
        Some(Value::Null) | None => (None, None),
        Some(other) => bail!("`Position` is not an element: {other}"),
    };

    // Per-trackpoint heart rate is optional telemetry: only a wrapper
    // element with a nested Value counts, any other shape stays null.
    // The lap-level summaries zero-default instead.
    let hr = match tp.get("HeartRateBpm") {
        Some(Value::Object(wrapper)) => {
            let value = wrapper
                .get("Value")
                .ok_or_else(|| anyhow!("`HeartRateBpm` has no `Value`"))?;
            Some(
                coerce_u32(value)
                    .ok_or_else(|| anyhow!("`HeartRateBpm` is not an integer: {value}"))?,
            )
        }
        _ => None,
    };

    let cad = match tp.get("Cadence") {
        None | Some(Value::Null) => None,
        Some(value) => {
            Some(coerce_f64(value).ok_or_else(|| anyhow!("`Cadence` is not a number: {value}"))?)
        }
    };

    // Three-tier presence: no Extensions element means no speed channel
    // (null); an Extensions element without the vendor speed path means a
    // zero reading.
    let speed = match tp.get("Extensions") {
        None | Some(Value::Null) => None,
        Some(Value::Object(ext)) => Some(vendor_speed(ext)?),
        Some(other) => bail!("`Extensions` is not an element: {other}"),
    };

    Ok(Trackpoint {
        t,
        lat,
        lon,
        alt: f64_field(tp, "AltitudeMeters")?,
        dist: f64_field(tp, "DistanceMeters")?,
        hr,
        cad,
        speed,
    })
}

/// Speed lives under the vendor-namespaced `ns3:TPX`/`ns3:Speed` path.
fn vendor_speed(ext: &Node) -> Result<f64> {
    let tpx = match ext.get("ns3:TPX") {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Object(tpx)) => tpx,
        Some(other) => bail!("`ns3:TPX` is not an element: {other}"),
    };
    match tpx.get("ns3:Speed") {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => {
            coerce_f64(value).ok_or_else(|| anyhow!("`ns3:Speed` is not a number: {value}"))
        }
    }
}

/// TCX timestamps end in a trailing `Z`; fold it into the offset form,
/// then parse as RFC 3339. No timezone handling beyond the UTC offset.
fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let normalized = match raw.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00:00"),
        None => raw.to_owned(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .map_err(|e| anyhow!("invalid timestamp {raw:?}: {e}"))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn required_element<'a>(node: &'a Node, key: &str) -> Result<&'a Node> {
    match node.get(key) {
        None => bail!("missing `{key}` element"),
        Some(Value::Object(child)) => Ok(child),
        Some(Value::Array(_)) => bail!("expected a single `{key}` element, found a list"),
        Some(other) => bail!("`{key}` is not an element: {other}"),
    }
}

fn opt_string(node: &Node, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Summary numerics are always present in the output: a missing key is a
/// zero, a present but unparseable value is an error.
fn f64_field(node: &Node, key: &str) -> Result<f64> {
    match node.get(key) {
        None => Ok(0.0),
        Some(value) => coerce_f64(value).ok_or_else(|| anyhow!("`{key}` is not a number: {value}")),
    }
}

fn u32_field(node: &Node, key: &str) -> Result<u32> {
    match node.get(key) {
        None => Ok(0),
        Some(value) => {
            coerce_u32(value).ok_or_else(|| anyhow!("`{key}` is not an integer: {value}"))
        }
    }
}

/// Lap-level heart rate wraps its reading in a `Value` child. Both a
/// missing wrapper and a wrapper without the child read as zero.
fn hr_summary(node: &Node, key: &str) -> Result<u32> {
    match node.get(key) {
        None => Ok(0),
        Some(Value::Object(wrapper)) => match wrapper.get("Value") {
            None => Ok(0),
            Some(value) => {
                coerce_u32(value).ok_or_else(|| anyhow!("`{key}` is not an integer: {value}"))
            }
        },
        Some(other) => bail!("`{key}` is not an element: {other}"),
    }
}

fn required_f64(node: &Node, key: &str) -> Result<f64> {
    let value = node.get(key).ok_or_else(|| anyhow!("missing `{key}`"))?;
    coerce_f64(value).ok_or_else(|| anyhow!("`{key}` is not a number: {value}"))
}

/// Leaf text arrives as strings from the tree parser; plain numbers are
/// accepted too so trees can be built programmatically.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn coerce_u32(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}
