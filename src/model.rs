use serde::{Deserialize, Serialize};

/// Root of the normalized output: activity-level metadata first, then one
/// record per lap in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedActivity {
    pub meta_activity: ActivityMeta,
    pub meta_laps: Vec<Lap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMeta {
    pub sport: Option<String>,
    pub id: Option<String>,
    pub notes: Option<String>,
    /// Device/software name from the activity's Creator sub-node.
    pub creator: Option<String>,
}

/// One source lap. Summary numeric fields are zero-defaulted, never null:
/// downstream consumers can always read them as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    /// The lap's StartTime attribute, passed through verbatim.
    pub start_time: Option<String>,
    pub total_time_seconds: f64,
    pub distance_meters: f64,
    pub calories: u32,
    pub average_heart_rate_bpm: u32,
    pub maximum_heart_rate_bpm: u32,
    pub intensity: Option<String>,
    pub trigger_method: Option<String>,
    pub tracks: Vec<Trackpoint>,
}

/// One sample. `t` is seconds since the lap's reference timestamp, rounded
/// to two decimals. Null means the channel was absent at the source, which
/// is not the same as a zero reading — see the speed and cadence rules in
/// the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trackpoint {
    pub t: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: f64,
    pub dist: f64,
    pub hr: Option<u32>,
    pub cad: Option<f64>,
    pub speed: Option<f64>,
}
