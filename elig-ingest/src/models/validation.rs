//! Post-hoc integrity audit results

use serde::Serialize;

/// Raw and payload row counts for one vendor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorCounts {
    pub vendor: String,
    pub raw: i64,
    pub payload: i64,
}

/// Counts gathered by the validation stage for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub run_id: String,
    pub raw_count: i64,
    pub payload_count: i64,
    pub silver_count: i64,
    /// Raw rows with a payload row on the identity tuple
    pub joined: i64,
    pub raw_without_payload: i64,
    pub payload_without_raw: i64,
    /// Joined rows whose `record_hash_raw` agrees on both sides
    pub hash_matches: i64,
    pub per_vendor: Vec<VendorCounts>,
}

impl ValidationReport {
    /// Every broken invariant, in a stable order; empty means the run is sound
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.raw_count != self.payload_count {
            violations.push(format!(
                "raw_staging has {} rows but raw_staging_payload has {}",
                self.raw_count, self.payload_count
            ));
        }
        if self.joined != self.raw_count {
            violations.push(format!(
                "only {} of {} raw rows join to a payload row",
                self.joined, self.raw_count
            ));
        }
        if self.raw_without_payload > 0 {
            violations.push(format!("{} raw rows have no payload", self.raw_without_payload));
        }
        if self.payload_without_raw > 0 {
            violations.push(format!(
                "{} payload rows have no raw row",
                self.payload_without_raw
            ));
        }
        if self.hash_matches != self.joined {
            violations.push(format!(
                "{} of {} joined rows disagree on record_hash_raw",
                self.joined - self.hash_matches,
                self.joined
            ));
        }
        if self.silver_count != self.raw_count {
            violations.push(format!(
                "silver_members has {} rows but raw_staging has {}",
                self.silver_count, self.raw_count
            ));
        }
        for vendor in &self.per_vendor {
            if vendor.raw != vendor.payload {
                violations.push(format!(
                    "vendor {}: {} raw rows vs {} payload rows",
                    vendor.vendor, vendor.raw, vendor.payload
                ));
            }
        }

        violations
    }

    pub fn is_valid(&self) -> bool {
        self.violations().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(n: i64) -> ValidationReport {
        ValidationReport {
            run_id: "r".into(),
            raw_count: n,
            payload_count: n,
            silver_count: n,
            joined: n,
            hash_matches: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_sound_report_has_no_violations() {
        assert!(sound(3).is_valid());
        assert!(sound(0).is_valid());
    }

    #[test]
    fn test_missing_payload_is_reported_several_ways() {
        let report = ValidationReport {
            payload_count: 2,
            joined: 2,
            hash_matches: 2,
            raw_without_payload: 1,
            ..sound(3)
        };
        let violations = report.violations();
        assert_eq!(violations.len(), 3, "{:?}", violations);
        assert!(violations[0].contains("raw_staging has 3 rows"));
    }

    #[test]
    fn test_hash_disagreement_is_reported() {
        let report = ValidationReport {
            hash_matches: 1,
            ..sound(3)
        };
        assert_eq!(
            report.violations(),
            vec!["2 of 3 joined rows disagree on record_hash_raw".to_string()]
        );
    }
}
