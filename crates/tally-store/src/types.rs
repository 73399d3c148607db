//! Domain types for the metric store.
//!
//! These types describe metric kinds, single updates, the structured batch
//! entry shape, and the point-in-time [`Snapshot`] used for listings and
//! persistence.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ParseKindError, RejectReason};

/// Metric name. Opaque to the store; counters and gauges use separate
/// namespaces.
pub type MetricName = String;

// ── Kind ───────────────────────────────────────────────────────────

/// The two metric types the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Additive: each update is a delta.
    Counter,
    /// Last-write-wins.
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

// ── Updates ────────────────────────────────────────────────────────

/// A single typed update, ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    Counter { name: MetricName, delta: i64 },
    Gauge { name: MetricName, value: f64 },
}

impl MetricUpdate {
    pub fn name(&self) -> &str {
        match self {
            MetricUpdate::Counter { name, .. } | MetricUpdate::Gauge { name, .. } => name,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricUpdate::Counter { .. } => MetricKind::Counter,
            MetricUpdate::Gauge { .. } => MetricKind::Gauge,
        }
    }
}

/// Structured metric entry: `{"id", "type", "delta"?, "value"?}`.
///
/// The type tag stays a raw string so that batches can carry unknown types
/// and have them rejected entry by entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricName,
    #[serde(rename = "type")]
    pub mtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Metric {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            mtype: MetricKind::Counter.to_string(),
            delta: Some(delta),
            value: None,
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            mtype: MetricKind::Gauge.to_string(),
            delta: None,
            value: Some(value),
        }
    }

    /// Parse the type tag only.
    pub fn kind(&self) -> Result<MetricKind, ParseKindError> {
        self.mtype.parse()
    }

    /// Convert into an applicable update, checking the tag and the payload
    /// field it requires.
    pub fn to_update(&self) -> Result<MetricUpdate, RejectReason> {
        let kind = self
            .kind()
            .map_err(|e| RejectReason::UnknownType(e.0))?;
        match kind {
            MetricKind::Counter => {
                let delta = self.delta.ok_or(RejectReason::MissingDelta)?;
                Ok(MetricUpdate::Counter {
                    name: self.id.clone(),
                    delta,
                })
            }
            MetricKind::Gauge => {
                let value = self.value.ok_or(RejectReason::MissingValue)?;
                Ok(MetricUpdate::Gauge {
                    name: self.id.clone(),
                    value,
                })
            }
        }
    }
}

// ── Snapshot ───────────────────────────────────────────────────────

/// Point-in-time copy of every counter and gauge.
///
/// Owns its data outright; later store mutations never show up here.
/// Serializes as `{"counter": {name: int}, "gauge": {name: float}}`.
/// Non-finite gauges are written as the strings `"NaN"`, `"+Inf"` and
/// `"-Inf"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "counter", default)]
    counters: BTreeMap<MetricName, i64>,
    #[serde(
        rename = "gauge",
        default,
        serialize_with = "serialize_gauges",
        deserialize_with = "deserialize_gauges"
    )]
    gauges: BTreeMap<MetricName, f64>,
}

impl Snapshot {
    pub fn new(counters: BTreeMap<MetricName, i64>, gauges: BTreeMap<MetricName, f64>) -> Self {
        Self { counters, gauges }
    }

    pub fn counters(&self) -> &BTreeMap<MetricName, i64> {
        &self.counters
    }

    pub fn gauges(&self) -> &BTreeMap<MetricName, f64> {
        &self.gauges
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).copied()
    }

    /// Total number of entries across both namespaces.
    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty()
    }

    pub fn into_parts(self) -> (BTreeMap<MetricName, i64>, BTreeMap<MetricName, f64>) {
        (self.counters, self.gauges)
    }
}

/// One gauge value on the wire. JSON numbers cannot carry NaN or the
/// infinities, so those travel as strings.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GaugeRepr {
    Number(f64),
    Text(String),
    /// Older dumps wrote non-finite values as `null`.
    Null,
}

impl From<f64> for GaugeRepr {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            GaugeRepr::Number(value)
        } else if value.is_nan() {
            GaugeRepr::Text("NaN".into())
        } else if value > 0.0 {
            GaugeRepr::Text("+Inf".into())
        } else {
            GaugeRepr::Text("-Inf".into())
        }
    }
}

impl GaugeRepr {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            GaugeRepr::Number(value) => Ok(value),
            GaugeRepr::Null => Ok(f64::NAN),
            GaugeRepr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "+Inf" | "Inf" => Ok(f64::INFINITY),
                "-Inf" => Ok(f64::NEG_INFINITY),
                _ => Err(format!("invalid gauge value {text:?}")),
            },
        }
    }
}

fn serialize_gauges<S>(gauges: &BTreeMap<MetricName, f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(
        gauges
            .iter()
            .map(|(name, value)| (name, GaugeRepr::from(*value))),
    )
}

fn deserialize_gauges<'de, D>(deserializer: D) -> Result<BTreeMap<MetricName, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<MetricName, GaugeRepr>::deserialize(deserializer)?
        .into_iter()
        .map(|(name, repr)| {
            repr.into_f64()
                .map(|value| (name, value))
                .map_err(D::Error::custom)
        })
        .collect()
}
