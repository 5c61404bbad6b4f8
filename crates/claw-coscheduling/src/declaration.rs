//! Parsing of gang declarations from members and group resources.
//!
//! Every field is parsed on its own and falls back to its default when the
//! declared value is invalid. The only field that gates a member declaration
//! as a whole is the minimum member count: without it the member simply
//! does not declare the gang's configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use claw_workload::keys::{
    ANNOTATION_GANG_GROUPS, ANNOTATION_GANG_MIN_NUM, ANNOTATION_GANG_MODE, ANNOTATION_GANG_NAME,
    ANNOTATION_GANG_TOTAL_NUM, ANNOTATION_GANG_WAIT_TIME, LABEL_LIGHTWEIGHT_GROUP_NAME,
    LABEL_LIGHTWEIGHT_MIN_AVAILABLE, LABEL_POD_GROUP,
};
use claw_workload::{Workload, object_key};

use crate::config::CoschedulingConfig;
use crate::group::GroupResource;

/// How many members must be admitted before a gang proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GangMode {
    /// Every declared member is required.
    #[default]
    Strict,
    /// The minimum quorum is enough.
    NonStrict,
}

impl GangMode {
    /// Parses a declared mode; anything unrecognized is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Strict" => Some(Self::Strict),
            "NonStrict" => Some(Self::NonStrict),
            _ => None,
        }
    }

    /// Returns the declared spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::NonStrict => "NonStrict",
        }
    }
}

impl fmt::Display for GangMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy deciding which members count towards a satisfied gang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GangMatchPolicy {
    /// Once the gang has been satisfied it stays satisfied.
    #[default]
    OnceSatisfied,
}

/// Which event source established a gang's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GangFrom {
    /// Declared through member annotations or lightweight labels.
    #[default]
    MemberAnnotation,
    /// Declared through a group resource.
    GroupResource,
}

/// Parsed gang-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GangSpec {
    /// Minimum members required for admission.
    pub min_required_number: usize,
    /// Total declared members.
    pub total_children_num: usize,
    /// Admission timeout.
    pub wait_time: Duration,
    /// Admission mode.
    pub mode: GangMode,
    /// Gangs admitted jointly with this one.
    pub gang_group: Vec<String>,
    /// Match policy.
    pub match_policy: GangMatchPolicy,
}

impl GangSpec {
    /// Parses a member's gang declaration.
    ///
    /// Returns `None` when the member carries no valid minimum member count.
    #[must_use]
    pub fn from_member(
        member: &Workload,
        gang_id: &str,
        config: &CoschedulingConfig,
    ) -> Option<Self> {
        let raw_min = member
            .annotation(ANNOTATION_GANG_MIN_NUM)
            .or_else(|| member.label(LABEL_LIGHTWEIGHT_MIN_AVAILABLE))?;
        let min_required_number = match raw_min.trim().parse::<usize>() {
            Ok(min) => min,
            Err(e) => {
                warn!(
                    gang = %gang_id,
                    member = %member,
                    value = raw_min,
                    error = %e,
                    "ignoring member gang declaration with invalid min-available"
                );
                return None;
            }
        };

        Some(Self {
            min_required_number,
            total_children_num: parse_total(
                member.annotation(ANNOTATION_GANG_TOTAL_NUM),
                min_required_number,
                gang_id,
            ),
            wait_time: parse_wait_time(
                member.annotation(ANNOTATION_GANG_WAIT_TIME),
                config.default_timeout,
                gang_id,
            ),
            mode: parse_mode(member.annotation(ANNOTATION_GANG_MODE), gang_id),
            gang_group: parse_gang_group(member.annotation(ANNOTATION_GANG_GROUPS), gang_id),
            match_policy: GangMatchPolicy::OnceSatisfied,
        })
    }

    /// Parses a group resource into gang configuration.
    #[must_use]
    pub fn from_group_resource(group: &GroupResource, config: &CoschedulingConfig) -> Self {
        let gang_id = group.key();
        let min_required_number = usize::try_from(group.min_member).unwrap_or_else(|_| {
            warn!(gang = %gang_id, min_member = group.min_member, "negative min member, using 0");
            0
        });
        let wait_time = match group.schedule_timeout_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(u64::from(secs.unsigned_abs())),
            Some(secs) => {
                warn!(
                    gang = %gang_id,
                    timeout = secs,
                    "non-positive schedule timeout, using default"
                );
                config.default_timeout
            }
            None => config.default_timeout,
        };

        Self {
            min_required_number,
            total_children_num: parse_total(
                group.annotation(ANNOTATION_GANG_TOTAL_NUM),
                min_required_number,
                &gang_id,
            ),
            wait_time,
            mode: parse_mode(group.annotation(ANNOTATION_GANG_MODE), &gang_id),
            gang_group: parse_gang_group(group.annotation(ANNOTATION_GANG_GROUPS), &gang_id),
            match_policy: GangMatchPolicy::OnceSatisfied,
        }
    }
}

/// Resolves the gang name a member belongs to.
///
/// The group-resource label wins over the gang annotation, which wins over
/// the lightweight label. Empty values are ignored.
#[must_use]
pub fn gang_name_of(member: &Workload) -> Option<&str> {
    [
        member.label(LABEL_POD_GROUP),
        member.annotation(ANNOTATION_GANG_NAME),
        member.label(LABEL_LIGHTWEIGHT_GROUP_NAME),
    ]
    .into_iter()
    .flatten()
    .find(|name| !name.is_empty())
}

/// Resolves the `namespace/name` gang id a member belongs to.
#[must_use]
pub fn gang_id_of(member: &Workload) -> Option<String> {
    gang_name_of(member).map(|name| object_key(&member.namespace, name))
}

/// Returns true if the member names its gang through the group-resource
/// label, in which case its own annotations never configure the gang.
#[must_use]
pub fn declares_via_group_resource(member: &Workload) -> bool {
    member.label(LABEL_POD_GROUP).is_some_and(|name| !name.is_empty())
}

/// Canonical id of a gang group: member ids sorted and joined with `,`.
#[must_use]
pub fn gang_group_id(gang_group: &[String]) -> String {
    let mut ids = gang_group.to_vec();
    ids.sort();
    ids.join(",")
}

fn parse_total(raw: Option<&str>, min: usize, gang_id: &str) -> usize {
    let Some(raw) = raw else {
        return min;
    };
    match raw.trim().parse::<usize>() {
        Ok(total) if total >= min => total,
        Ok(total) => {
            debug!(gang = %gang_id, total, min, "total-number below min-available, using min");
            min
        }
        Err(e) => {
            warn!(gang = %gang_id, value = raw, error = %e, "invalid total-number, using min");
            min
        }
    }
}

fn parse_wait_time(raw: Option<&str>, default: Duration, gang_id: &str) -> Duration {
    let Some(raw) = raw else {
        return default;
    };
    let parsed = humantime::parse_duration(raw.trim())
        .or_else(|e| parse_decimal_duration(raw.trim()).ok_or(e));
    match parsed {
        Ok(wait) if !wait.is_zero() => wait,
        Ok(_) => {
            warn!(gang = %gang_id, value = raw, "zero waiting-time, using default");
            default
        }
        Err(e) => {
            warn!(gang = %gang_id, value = raw, error = %e, "invalid waiting-time, using default");
            default
        }
    }
}

/// Parses durations with fractional components such as `1.5s` or `1h0.5m`.
fn parse_decimal_duration(raw: &str) -> Option<Duration> {
    if raw.is_empty() {
        return None;
    }
    let mut rest = raw;
    let mut secs = 0.0_f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1e-9,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        secs += number.parse::<f64>().ok()? * scale;
        rest = tail;
    }
    Duration::try_from_secs_f64(secs).ok()
}

fn parse_mode(raw: Option<&str>, gang_id: &str) -> GangMode {
    let Some(raw) = raw else {
        return GangMode::default();
    };
    GangMode::parse(raw).unwrap_or_else(|| {
        warn!(gang = %gang_id, value = raw, "unknown gang mode, using Strict");
        GangMode::default()
    })
}

fn parse_gang_group(raw: Option<&str>, gang_id: &str) -> Vec<String> {
    let own = || vec![gang_id.to_string()];
    let Some(raw) = raw else {
        return own();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(group) if !group.is_empty() => group,
        Ok(_) => own(),
        Err(e) => {
            warn!(
                gang = %gang_id,
                value = raw,
                error = %e,
                "malformed gang groups, using gang alone"
            );
            own()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn config() -> CoschedulingConfig {
        CoschedulingConfig::new().with_default_timeout(Duration::from_secs(600))
    }

    #[test]
    fn gang_name_resolution_order() {
        let member = Workload::new("default", "p")
            .with_label(LABEL_LIGHTWEIGHT_GROUP_NAME, "light")
            .with_annotation(ANNOTATION_GANG_NAME, "annotated")
            .with_label(LABEL_POD_GROUP, "crd");
        assert_eq!(gang_name_of(&member), Some("crd"));

        let member = Workload::new("default", "p")
            .with_label(LABEL_LIGHTWEIGHT_GROUP_NAME, "light")
            .with_annotation(ANNOTATION_GANG_NAME, "annotated");
        assert_eq!(gang_name_of(&member), Some("annotated"));

        let member =
            Workload::new("default", "p").with_label(LABEL_LIGHTWEIGHT_GROUP_NAME, "light");
        assert_eq!(gang_id_of(&member), Some("default/light".to_string()));
    }

    #[test]
    fn member_without_gang_is_ignored() {
        let member = Workload::new("default", "p")
            .with_label("test", "gang")
            .with_annotation("test", "gang");
        assert_eq!(gang_id_of(&member), None);
        assert!(!declares_via_group_resource(&member));
    }

    #[test]
    fn full_member_declaration() {
        let member = Workload::new("default", "pod1")
            .with_annotation(ANNOTATION_GANG_NAME, "ganga")
            .with_annotation(ANNOTATION_GANG_MIN_NUM, "2")
            .with_annotation(ANNOTATION_GANG_WAIT_TIME, "30s")
            .with_annotation(ANNOTATION_GANG_MODE, "NonStrict")
            .with_annotation(ANNOTATION_GANG_GROUPS, r#"["default/ganga","default/gangb"]"#);

        let spec = GangSpec::from_member(&member, "default/ganga", &config());
        assert_eq!(
            spec,
            Some(GangSpec {
                min_required_number: 2,
                total_children_num: 2,
                wait_time: Duration::from_secs(30),
                mode: GangMode::NonStrict,
                gang_group: vec!["default/ganga".into(), "default/gangb".into()],
                match_policy: GangMatchPolicy::OnceSatisfied,
            })
        );
    }

    #[test]
    fn invalid_min_means_no_declaration() {
        let member = Workload::new("default", "pod3")
            .with_annotation(ANNOTATION_GANG_NAME, "gangb")
            .with_annotation(ANNOTATION_GANG_MIN_NUM, "xxx");
        assert_eq!(GangSpec::from_member(&member, "default/gangb", &config()), None);

        let member =
            Workload::new("default", "pod3").with_annotation(ANNOTATION_GANG_NAME, "gangb");
        assert_eq!(GangSpec::from_member(&member, "default/gangb", &config()), None);
    }

    #[test]
    fn invalid_fields_fall_back_independently() {
        let member = Workload::new("default", "pod4")
            .with_annotation(ANNOTATION_GANG_NAME, "gangb")
            .with_annotation(ANNOTATION_GANG_MIN_NUM, "2")
            .with_annotation(ANNOTATION_GANG_TOTAL_NUM, "1")
            .with_annotation(ANNOTATION_GANG_MODE, "Sometimes")
            .with_annotation(ANNOTATION_GANG_WAIT_TIME, "soon")
            .with_annotation(ANNOTATION_GANG_GROUPS, "ganga,gangx");

        let spec = GangSpec::from_member(&member, "default/gangb", &config());
        assert_eq!(
            spec,
            Some(GangSpec {
                min_required_number: 2,
                total_children_num: 2,
                wait_time: Duration::from_secs(600),
                mode: GangMode::Strict,
                gang_group: vec!["default/gangb".into()],
                match_policy: GangMatchPolicy::OnceSatisfied,
            })
        );
    }

    #[test]
    fn lightweight_labels_declare_min() {
        let member = Workload::new("default", "pod1")
            .with_label(LABEL_LIGHTWEIGHT_GROUP_NAME, "ganga")
            .with_label(LABEL_LIGHTWEIGHT_MIN_AVAILABLE, "2");
        let spec = GangSpec::from_member(&member, "default/ganga", &config());
        assert_eq!(
            spec.map(|s| (s.min_required_number, s.wait_time)),
            Some((2, Duration::from_secs(600)))
        );
    }

    #[test_case(None, 600 ; "absent")]
    #[test_case(Some("30s"), 30 ; "seconds")]
    #[test_case(Some("3000s"), 3000 ; "large seconds")]
    #[test_case(Some("2m"), 120 ; "minutes")]
    #[test_case(Some("1h30m"), 5400 ; "compound")]
    #[test_case(Some("0"), 600 ; "zero")]
    #[test_case(Some("0.0s"), 600 ; "zero decimal")]
    #[test_case(Some("-20s"), 600 ; "negative")]
    #[test_case(Some("WenShiqi222"), 600 ; "garbage")]
    fn wait_time_parsing(raw: Option<&str>, expected_secs: u64) {
        assert_eq!(
            parse_wait_time(raw, Duration::from_secs(600), "default/g"),
            Duration::from_secs(expected_secs)
        );
    }

    #[test_case("1.5s", 1_500 ; "fractional seconds")]
    #[test_case("0.5h", 1_800_000 ; "fractional hours")]
    #[test_case("1h0.5m", 3_630_000 ; "mixed units")]
    #[test_case(".5s", 500 ; "leading point")]
    #[test_case("2.5ms", 2 ; "fractional millis")]
    fn wait_time_accepts_decimal_values(raw: &str, expected_millis: u128) {
        let wait = parse_wait_time(Some(raw), Duration::from_secs(600), "default/g");
        assert_eq!(wait.as_millis(), expected_millis);
    }

    #[test_case("1.5" ; "missing unit")]
    #[test_case("1.5d" ; "unknown unit")]
    #[test_case("s" ; "missing number")]
    #[test_case("1..5s" ; "two points")]
    fn wait_time_rejects_malformed_decimals(raw: &str) {
        assert_eq!(parse_decimal_duration(raw), None);
    }

    #[test_case(None, &["default/g"] ; "absent")]
    #[test_case(Some(r#"["default/a","default/b"]"#), &["default/a", "default/b"] ; "json list")]
    #[test_case(Some("[a,b]"), &["default/g"] ; "unquoted list")]
    #[test_case(Some("a,b"), &["default/g"] ; "comma separated")]
    #[test_case(Some("[]"), &["default/g"] ; "empty list")]
    fn gang_group_parsing(raw: Option<&str>, expected: &[&str]) {
        let expected: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
        assert_eq!(parse_gang_group(raw, "default/g"), expected);
    }

    #[test_case(None, 3, 3 ; "absent")]
    #[test_case(Some("5"), 3, 5 ; "above min")]
    #[test_case(Some("1"), 3, 3 ; "below min")]
    #[test_case(Some("many"), 3, 3 ; "garbage")]
    fn total_parsing(raw: Option<&str>, min: usize, expected: usize) {
        assert_eq!(parse_total(raw, min, "default/g"), expected);
    }

    #[test]
    fn group_resource_spec() {
        let group = GroupResource::new("default", "gangA")
            .with_min_member(4)
            .with_schedule_timeout_seconds(300)
            .with_annotation(ANNOTATION_GANG_MODE, "Sometimes")
            .with_annotation(ANNOTATION_GANG_GROUPS, "a,b")
            .with_annotation(ANNOTATION_GANG_TOTAL_NUM, "2");

        let spec = GangSpec::from_group_resource(&group, &config());
        assert_eq!(spec.min_required_number, 4);
        assert_eq!(spec.total_children_num, 4);
        assert_eq!(spec.wait_time, Duration::from_secs(300));
        assert_eq!(spec.mode, GangMode::Strict);
        assert_eq!(spec.gang_group, vec!["default/gangA".to_string()]);
    }

    #[test]
    fn group_resource_timeout_fallbacks() {
        let group = GroupResource::new("default", "g").with_min_member(-3);
        let spec = GangSpec::from_group_resource(&group, &config());
        assert_eq!(spec.min_required_number, 0);
        assert_eq!(spec.wait_time, Duration::from_secs(600));

        let group = group.with_schedule_timeout_seconds(0);
        let spec = GangSpec::from_group_resource(&group, &config());
        assert_eq!(spec.wait_time, Duration::from_secs(600));
    }

    #[test]
    fn gang_group_id_is_sorted() {
        let a = gang_group_id(&["default/b".into(), "default/a".into()]);
        let b = gang_group_id(&["default/a".into(), "default/b".into()]);
        assert_eq!(a, "default/a,default/b");
        assert_eq!(a, b);
        assert_eq!(gang_group_id(&["default/x".into()]), "default/x");
    }

    #[test]
    fn mode_roundtrip() {
        assert_eq!(GangMode::parse(GangMode::NonStrict.as_str()), Some(GangMode::NonStrict));
        assert_eq!(GangMode::parse("strict"), None);
        assert_eq!(GangMode::Strict.to_string(), "Strict");
    }
}
