//! Serde record types for the exported dataset file.
//!
//! The on-disk layout follows the COCO object-detection schema: a header,
//! image entries, annotation entries, and a category table. Field order is
//! fixed so that exporting the same state twice writes identical bytes.

use serde::{Deserialize, Serialize};

use crate::mask::RleMask;

/// The complete dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub info: DatasetInfo,
    #[serde(default)]
    pub licenses: Vec<LicenseRecord>,
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub categories: Vec<CategoryRecord>,
}

/// Dataset header metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    #[serde(default)]
    pub year: u32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contributor: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date_created: String,
}

impl DatasetInfo {
    /// Header stamped with the current date.
    pub fn new() -> Self {
        Self {
            year: current_year(),
            version: "0.1.0".to_string(),
            description: "Boxer: the simple bounding box and polygon annotation tool".to_string(),
            contributor: String::new(),
            url: String::new(),
            date_created: current_date(),
        }
    }
}

impl Default for DatasetInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// License entry. Carried through load and export unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// One image of the working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
    #[serde(default)]
    pub date_captured: String,
}

/// One category of the label table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: u32,
    pub name: String,
    pub supercategory: Option<String>,
}

/// One exported annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    /// `[x, y, width, height]` of the bounding box.
    pub bbox: [f32; 4],
    /// Box area, `width * height`.
    pub area: f32,
    pub segmentation: Segmentation,
    /// 1 when the segmentation is a run-length mask, 0 otherwise.
    pub iscrowd: u8,
}

/// Segmentation payload of an annotation record.
///
/// Plain annotations carry at most one flattened vertex run; crowds carry
/// a run-length mask over their bounding box. The two shapes are told
/// apart structurally, the way COCO readers do it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// Flattened `[x0, y0, x1, y1, ...]` vertex runs, one per ring.
    Polygons(Vec<Vec<f32>>),
    /// Run-length mask for crowd annotations.
    Rle(RleMask),
}

// ============================================================================
// Date Helpers
// ============================================================================

/// Check if a year is a leap year.
fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Convert days since the Unix epoch to (year, month, day).
fn days_to_ymd(mut days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let month_lengths: [u64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for length in month_lengths {
        if days < length {
            break;
        }
        days -= length;
        month += 1;
    }

    (year, month, days + 1)
}

fn epoch_days() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 86_400
}

/// Today's date as `YYYY-MM-DD`.
pub(crate) fn current_date() -> String {
    let (year, month, day) = days_to_ymd(epoch_days());
    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// The current calendar year.
pub(crate) fn current_year() -> u32 {
    days_to_ymd(epoch_days()).0 as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn test_days_to_ymd() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
        assert_eq!(days_to_ymd(31), (1970, 2, 1));
        assert_eq!(days_to_ymd(365), (1971, 1, 1));
        // 2000-02-29 is day 11016
        assert_eq!(days_to_ymd(11_016), (2000, 2, 29));
    }

    #[test]
    fn test_current_date_shape() {
        let date = current_date();
        assert_eq!(date.len(), 10);
        assert_eq!(date.as_bytes()[4], b'-');
        assert_eq!(date.as_bytes()[7], b'-');
    }

    #[test]
    fn test_info_defaults() {
        let info = DatasetInfo::new();
        assert_eq!(info.version, "0.1.0");
        assert!(info.year >= 2024);
        assert_eq!(info.date_created.len(), 10);
    }

    #[test]
    fn test_segmentation_untagged_round_trip() {
        let polygons = Segmentation::Polygons(vec![vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0]]);
        let json = serde_json::to_string(&polygons).unwrap();
        assert!(json.starts_with('['));
        assert_eq!(
            serde_json::from_str::<Segmentation>(&json).unwrap(),
            polygons
        );

        let rle = Segmentation::Rle(RleMask {
            counts: vec![0, 4],
            size: [2, 2],
        });
        let json = serde_json::to_string(&rle).unwrap();
        assert!(json.contains("\"counts\""));
        assert_eq!(serde_json::from_str::<Segmentation>(&json).unwrap(), rle);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "info": {"year": 2021},
            "images": [],
            "annotations": [],
            "categories": []
        }"#;
        let record: DatasetRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.info.year, 2021);
        assert_eq!(record.info.version, "");
        assert!(record.licenses.is_empty());
    }
}
