//! Static COICOP division mapping between the two weights sources.
//!
//! The multinational API identifies divisions as `CP01`..`CP12`; the national
//! workbook uses four letter series codes. Both are normalized to the national
//! code and description.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMapping {
    pub multinational_id: &'static str,
    pub national_code: &'static str,
    pub description: &'static str,
}

pub const CATEGORY_MAPPINGS: [CategoryMapping; 12] = [
    CategoryMapping {
        multinational_id: "CP01",
        national_code: "CHZR",
        description: "01    Food and non-alcoholic beverages",
    },
    CategoryMapping {
        multinational_id: "CP02",
        national_code: "CHZS",
        description: "02    Alcoholic beverages and tobacco",
    },
    CategoryMapping {
        multinational_id: "CP03",
        national_code: "CHZT",
        description: "03    Clothing and footwear",
    },
    CategoryMapping {
        multinational_id: "CP04",
        national_code: "CHZU",
        description: "04    Housing, water, electricity, gas and other fuels",
    },
    CategoryMapping {
        multinational_id: "CP05",
        national_code: "CHZV",
        description: "05    Furniture, household equipment and maintenance",
    },
    CategoryMapping {
        multinational_id: "CP06",
        national_code: "CHZW",
        description: "06    Health",
    },
    CategoryMapping {
        multinational_id: "CP07",
        national_code: "CHZX",
        description: "07    Transport",
    },
    CategoryMapping {
        multinational_id: "CP08",
        national_code: "CHZY",
        description: "08    Communication",
    },
    CategoryMapping {
        multinational_id: "CP09",
        national_code: "CHZZ",
        description: "09    Recreation and culture",
    },
    CategoryMapping {
        multinational_id: "CP10",
        national_code: "CJUU",
        description: "10    Education",
    },
    CategoryMapping {
        multinational_id: "CP11",
        national_code: "CJUV",
        description: "11    Restaurants and hotels",
    },
    CategoryMapping {
        multinational_id: "CP12",
        national_code: "CJUW",
        description: "12    Miscellaneous goods and services",
    },
];

/// Series code of the all-items row in the national workbook.
pub const OVERVIEW_CODE: &str = "CHZQ";

pub fn by_multinational_id(id: &str) -> Option<&'static CategoryMapping> {
    CATEGORY_MAPPINGS
        .iter()
        .find(|m| m.multinational_id.eq_ignore_ascii_case(id))
}

pub fn by_national_code(code: &str) -> Option<&'static CategoryMapping> {
    CATEGORY_MAPPINGS.iter().find(|m| m.national_code == code)
}

pub fn national_codes() -> impl Iterator<Item = &'static str> {
    CATEGORY_MAPPINGS.iter().map(|m| m.national_code)
}
