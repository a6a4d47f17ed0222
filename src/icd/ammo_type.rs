use serde::{Deserialize, Serialize};

/// ICD ammunition codes. Codes outside the table are kept as `Other` and shown as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum AmmoType {
    #[default]
    None,
    Small,
    Medium,
    Large,
    NineMm,
    FiveFiveSix,
    SevenSixTwo,
    ThreeHundredWinMag,
    ThreeThreeEight,
    FiftyCal,
    TwentyFiveMm,
    ThirtyMm,
    FortyMm,
    SixtyMm,
    NinetyMm,
    OneHundredTwentyMm,
    OneHundredTwentyMmSabot,
    OneHundredTwentyMmHeat,
    Flechette,
    Other(i64),
}

const TABLE: [(AmmoType, &str); 19] = [
    (AmmoType::None, "None"),
    (AmmoType::Small, "Small"),
    (AmmoType::Medium, "Medium"),
    (AmmoType::Large, "Large"),
    (AmmoType::NineMm, "9mm"),
    (AmmoType::FiveFiveSix, "5.56"),
    (AmmoType::SevenSixTwo, "7.62"),
    (AmmoType::ThreeHundredWinMag, ".300 WinMag"),
    (AmmoType::ThreeThreeEight, ".338"),
    (AmmoType::FiftyCal, ".50cal"),
    (AmmoType::TwentyFiveMm, "25mm"),
    (AmmoType::ThirtyMm, "30mm"),
    (AmmoType::FortyMm, "40mm"),
    (AmmoType::SixtyMm, "60mm"),
    (AmmoType::NinetyMm, "90mm"),
    (AmmoType::OneHundredTwentyMm, "120mm"),
    (AmmoType::OneHundredTwentyMmSabot, "120mm Sabot"),
    (AmmoType::OneHundredTwentyMmHeat, "120mm HEAT"),
    (AmmoType::Flechette, "Flechette"),
];

impl AmmoType {
    pub fn display_string(&self) -> &'static str {
        TABLE
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, label)| *label)
            .unwrap_or("None")
    }

    pub fn from_display_string(label: &str) -> Option<Self> {
        TABLE
            .iter()
            .find(|(_, candidate)| *candidate == label)
            .map(|(kind, _)| *kind)
    }

    /// Every display string in code order, for pickers and filters.
    pub fn display_strings() -> impl Iterator<Item = &'static str> {
        TABLE.iter().map(|(_, label)| *label)
    }
}

impl From<i64> for AmmoType {
    fn from(code: i64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|index| TABLE.get(index))
            .map(|(kind, _)| *kind)
            .unwrap_or(AmmoType::Other(code))
    }
}

impl From<AmmoType> for i64 {
    fn from(kind: AmmoType) -> Self {
        match kind {
            AmmoType::Other(code) => code,
            known => TABLE
                .iter()
                .position(|(candidate, _)| *candidate == known)
                .map(|index| index as i64)
                .unwrap_or_default(),
        }
    }
}
