//! Hajj / Umrah category classification.
//!
//! Two independently-evolved fields encode the category: `packageType`
//! carries controlled tags (English or Bengali), `customPackageType` carries
//! free text. Neither is guaranteed present or authoritative, so the check is
//! two-tier: exact tag match first, then a case-insensitive substring scan of
//! the custom field.

use serde::Serialize;
use serde_json::Value;

use crate::records::value_str;

const PRIMARY_TYPE_FIELDS: &[&str] = &["packageType", "type"];
const CUSTOM_TYPE_FIELDS: &[&str] = &["customPackageType", "packageCategory"];

/// Bengali tag for Hajj seen on older records.
const HAJJ_BENGALI_TAG: &str = "হজ্জ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageCategory {
    Hajj,
    Umrah,
    Other,
}

impl PackageCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hajj => "hajj",
            Self::Umrah => "umrah",
            Self::Other => "other",
        }
    }
}

pub fn classify(record: &Value) -> PackageCategory {
    for field in PRIMARY_TYPE_FIELDS {
        let tag = value_str(record, field);
        if tag.is_empty() {
            continue;
        }
        if tag == HAJJ_BENGALI_TAG || tag.eq_ignore_ascii_case("hajj") {
            return PackageCategory::Hajj;
        }
        if tag.eq_ignore_ascii_case("umrah") {
            return PackageCategory::Umrah;
        }
    }

    for field in CUSTOM_TYPE_FIELDS {
        let text = value_str(record, field).to_ascii_lowercase();
        if text.contains("hajj") {
            return PackageCategory::Hajj;
        }
        if text.contains("umrah") {
            return PackageCategory::Umrah;
        }
    }

    PackageCategory::Other
}
