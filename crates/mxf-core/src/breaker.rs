// C5 Circuit Breaker (§4.5, §3 "CircuitBreakerState").
//
// Keeps the teacher's typed-config idiom (config struct, builder,
// Display, serde round-trip tests — see
// durable::reliability::circuit_breaker::CircuitBreakerConfig) but
// replaces its failure-threshold semantics with the loop-detection
// rules this spec actually calls for: consecutive-identity streaks and
// rolling-window frequency, not success/failure counting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tools known to legitimately repeat: web/filesystem-read/task-create/
/// messaging/ORPAR phase tools. Merged with, never replaced by, the
/// caller-configured exempt set.
pub fn default_exempt_tools() -> Vec<String> {
    [
        "web_search",
        "web_fetch",
        "read_file",
        "task_create",
        "messaging_send",
        "orpar_observe",
        "orpar_reason",
        "orpar_plan",
        "orpar_act",
        "orpar_reflect",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Same-params streak threshold for non-exempt tools.
    pub same_params_threshold: u32,
    /// Same-params streak threshold for exempt tools.
    pub same_params_threshold_exempt: u32,
    /// Same-tool (varying params) streak threshold for non-exempt tools.
    pub same_tool_threshold: u32,
    /// Same-tool streak threshold for exempt tools.
    pub same_tool_threshold_exempt: u32,
    /// Occurrences of the same `(name, digest)` within `window` that trip.
    pub window_frequency_threshold: u32,
    #[serde(with = "duration_millis")]
    pub window: Duration,
    pub exempt_tools: Vec<String>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            same_params_threshold: 3,
            same_params_threshold_exempt: 10,
            same_tool_threshold: 15,
            same_tool_threshold_exempt: 50,
            window_frequency_threshold: 3,
            window: Duration::from_secs(30),
            exempt_tools: default_exempt_tools(),
        }
    }
}

impl std::fmt::Display for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CircuitBreakerConfig(same_params={}/{}, same_tool={}/{}, window={}x{:?})",
            self.same_params_threshold,
            self.same_params_threshold_exempt,
            self.same_tool_threshold,
            self.same_tool_threshold_exempt,
            self.window_frequency_threshold,
            self.window
        )
    }
}

pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
        }
    }

    pub fn exempt_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        // Merged with, never replacing, the built-in defaults.
        let mut merged = self.config.exempt_tools.clone();
        for tool in tools {
            if !merged.contains(&tool) {
                merged.push(tool);
            }
        }
        self.config.exempt_tools = merged;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        self.config
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// A stable content hash of the JSON-normalized input, used to compare
/// calls for identity regardless of key order.
pub fn digest(input: &serde_json::Value) -> String {
    let normalized = normalize(input);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, normalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(normalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
struct CallRecord {
    tool_name: String,
    digest: String,
    at: SystemTime,
}

/// The structured intervention payload emitted on a trip, instructing
/// the agent to stop the offending tool, try an alternative, or
/// complete the task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakerIntervention {
    pub rule: TripRule,
    pub tool_name: String,
    pub streak_count: u32,
    pub window_count: u32,
    pub suggested_alternative: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripRule {
    SameParamsStreak,
    SameToolStreak,
    WindowFrequency,
}

/// Per-agent breaker state, ring-bounded for window lookups.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    ring: VecDeque<CallRecord>,
    consecutive_same_tool: u32,
    consecutive_same_params: u32,
    last_tool_name: Option<String>,
    last_digest: Option<String>,
    /// Monotonically increasing per P5; never reset by task changes.
    stuck_detections: u64,
}

const RING_CAPACITY: usize = 256;

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            ring: VecDeque::with_capacity(RING_CAPACITY),
            consecutive_same_tool: 0,
            consecutive_same_params: 0,
            last_tool_name: None,
            last_digest: None,
            stuck_detections: 0,
        }
    }

    pub fn stuck_detections(&self) -> u64 {
        self.stuck_detections
    }

    fn is_exempt(&self, tool_name: &str) -> bool {
        self.config.exempt_tools.iter().any(|t| t == tool_name)
    }

    /// Resets the streak counters on new task assignment. `stuckDetections`
    /// is intentionally left untouched (P5).
    pub fn reset_streaks(&mut self) {
        self.consecutive_same_tool = 0;
        self.consecutive_same_params = 0;
        self.last_tool_name = None;
        self.last_digest = None;
    }

    /// Evaluates whether `(tool_name, input)` should be blocked, and
    /// records the call regardless of the outcome (state is updated on
    /// every invocation per §4.5).
    pub fn check_and_record(&mut self, tool_name: &str, input: &serde_json::Value) -> Option<BreakerIntervention> {
        let call_digest = digest(input);
        let exempt = self.is_exempt(tool_name);
        let now = SystemTime::now();

        if self.last_digest.as_deref() == Some(call_digest.as_str()) && self.last_tool_name.as_deref() == Some(tool_name) {
            self.consecutive_same_params += 1;
        } else {
            self.consecutive_same_params = 1;
        }

        if self.last_tool_name.as_deref() == Some(tool_name) {
            self.consecutive_same_tool += 1;
        } else {
            self.consecutive_same_tool = 1;
        }

        self.last_tool_name = Some(tool_name.to_string());
        self.last_digest = Some(call_digest.clone());

        if self.ring.len() == RING_CAPACITY {
            self.ring.pop_front();
        }
        self.ring.push_back(CallRecord {
            tool_name: tool_name.to_string(),
            digest: call_digest.clone(),
            at: now,
        });

        let window_count = self.window_count(tool_name, &call_digest, now);

        let intervention = if !exempt && self.consecutive_same_params >= self.config.same_params_threshold {
            Some((TripRule::SameParamsStreak, self.consecutive_same_params))
        } else if exempt && self.consecutive_same_params >= self.config.same_params_threshold_exempt {
            Some((TripRule::SameParamsStreak, self.consecutive_same_params))
        } else if !exempt && self.consecutive_same_tool >= self.config.same_tool_threshold {
            Some((TripRule::SameToolStreak, self.consecutive_same_tool))
        } else if exempt && self.consecutive_same_tool >= self.config.same_tool_threshold_exempt {
            Some((TripRule::SameToolStreak, self.consecutive_same_tool))
        } else if !exempt && window_count >= self.config.window_frequency_threshold {
            Some((TripRule::WindowFrequency, window_count))
        } else {
            None
        };

        intervention.map(|(rule, streak_count)| {
            self.stuck_detections += 1;
            BreakerIntervention {
                rule,
                tool_name: tool_name.to_string(),
                streak_count,
                window_count,
                suggested_alternative: suggest_alternative(tool_name),
            }
        })
    }

    fn window_count(&self, tool_name: &str, call_digest: &str, now: SystemTime) -> u32 {
        let cutoff = now.checked_sub(self.config.window).unwrap_or(UNIX_EPOCH);
        self.ring
            .iter()
            .filter(|r| r.tool_name == tool_name && r.digest == call_digest && r.at >= cutoff)
            .count() as u32
    }
}

fn suggest_alternative(tool_name: &str) -> String {
    format!("stop calling {tool_name} with the same input; try a different approach or call task_complete")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_serde() {
        let config = CircuitBreakerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CircuitBreakerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.same_params_threshold, config.same_params_threshold);
        assert_eq!(parsed.window, config.window);
    }

    #[test]
    fn same_params_streak_trips_at_three() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let input = serde_json::json!({"query": "weather"});
        assert!(breaker.check_and_record("web_custom_tool", &input).is_none());
        assert!(breaker.check_and_record("web_custom_tool", &input).is_none());
        let trip = breaker.check_and_record("web_custom_tool", &input);
        assert!(trip.is_some());
        assert_eq!(trip.unwrap().rule, TripRule::SameParamsStreak);
        assert_eq!(breaker.stuck_detections(), 1);
    }

    #[test]
    fn exempt_tool_tolerates_twenty_varying_calls() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        for i in 0..20 {
            let input = serde_json::json!({"i": i});
            assert!(breaker.check_and_record("orpar_observe", &input).is_none());
        }
    }

    #[test]
    fn stuck_detections_is_monotonic_across_task_resets() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let input = serde_json::json!({"q": 1});
        for _ in 0..3 {
            breaker.check_and_record("web_custom_tool", &input);
        }
        assert_eq!(breaker.stuck_detections(), 1);
        breaker.reset_streaks();
        assert_eq!(breaker.stuck_detections(), 1);
        for _ in 0..3 {
            breaker.check_and_record("web_custom_tool", &input);
        }
        assert_eq!(breaker.stuck_detections(), 2);
    }

    #[test]
    fn digest_is_stable_under_key_reordering() {
        let a = serde_json::json!({"a": 1, "b": 2});
        let b = serde_json::json!({"b": 2, "a": 1});
        assert_eq!(digest(&a), digest(&b));
    }
}
