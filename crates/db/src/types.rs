use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LabelColour {
    #[sea_orm(string_value = "fuchsia")]
    Fuchsia,
    #[sea_orm(string_value = "lime")]
    Lime,
    #[sea_orm(string_value = "yellow")]
    Yellow,
    #[sea_orm(string_value = "aqua")]
    Aqua,
    #[sea_orm(string_value = "aquamarine")]
    Aquamarine,
    #[sea_orm(string_value = "gold")]
    Gold,
    #[sea_orm(string_value = "lightsalmon")]
    LightSalmon,
    #[sea_orm(string_value = "orange")]
    Orange,
    #[sea_orm(string_value = "orangered")]
    OrangeRed,
    #[sea_orm(string_value = "pink")]
    Pink,
    #[sea_orm(string_value = "plum")]
    Plum,
    #[sea_orm(string_value = "skyblue")]
    SkyBlue,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use sea_orm::Iterable;

    use super::*;

    #[test]
    fn colour_names_are_lowercase_without_separators() {
        assert_eq!(LabelColour::LightSalmon.to_string(), "lightsalmon");
        assert_eq!(LabelColour::from_str("orangered").unwrap(), LabelColour::OrangeRed);
        assert!(LabelColour::from_str("Light Salmon").is_err());
        assert_eq!(LabelColour::iter().count(), 12);
    }
}
