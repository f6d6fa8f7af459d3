use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: '{value}'")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(PupilState {
    Reactive => "reactive",
    Fixed => "fixed",
    BothFixed => "both-fixed",
});

str_enum!(VasoactiveDrug {
    Dobutamine => "dobutamine",
    Dopamine => "dopamine",
    Epinephrine => "epinephrine",
    Milrinone => "milrinone",
    Norepinephrine => "norepinephrine",
    Vasopressin => "vasopressin",
});

str_enum!(OrganDomain {
    Respiratory => "respiratory",
    Cardiovascular => "cardiovascular",
    Coagulation => "coagulation",
    Neurologic => "neurologic",
    Endocrine => "endocrine",
    Immunologic => "immunologic",
    Renal => "renal",
    Hepatic => "hepatic",
});

str_enum!(ScoreVariant {
    Phoenix => "phoenix",
    Phoenix8 => "phoenix8",
});

impl PupilState {
    /// Lenient reading of free-text pupil descriptions.
    ///
    /// Bilateral wording ("both fixed", "fixed bilaterally") maps to
    /// `BothFixed`; any other mention of fixed pupils maps to `Fixed`.
    /// Unrecognized text yields `None`.
    pub fn parse_lenient(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase().replace('_', "-");
        if let Ok(state) = lower.parse() {
            return Some(state);
        }
        let unreactive = ["unreactive", "non-reactive", "nonreactive", "non reactive"]
            .iter()
            .any(|w| lower.contains(w));
        if unreactive || lower.contains("fixed") {
            let bilateral = lower.contains("both")
                || lower.contains("bilateral")
                || lower.contains("bilaterally");
            return Some(if bilateral { Self::BothFixed } else { Self::Fixed });
        }
        if lower.contains("reactive") || lower.contains("brisk") || lower == "normal" {
            return Some(Self::Reactive);
        }
        None
    }

    /// Fixed-pupil indicator for the 4-domain score: exactly `fixed`.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed)
    }

    /// Fixed-pupil indicator for the 8-domain score.
    pub fn is_both_fixed(&self) -> bool {
        matches!(self, Self::BothFixed)
    }
}

impl VasoactiveDrug {
    pub const ALL: [VasoactiveDrug; 6] = [
        Self::Dobutamine,
        Self::Dopamine,
        Self::Epinephrine,
        Self::Milrinone,
        Self::Norepinephrine,
        Self::Vasopressin,
    ];
}

impl OrganDomain {
    /// Highest sub-score the domain can contribute.
    pub fn max_points(&self) -> u8 {
        match self {
            Self::Respiratory => 3,
            Self::Cardiovascular => 6,
            Self::Coagulation | Self::Neurologic => 2,
            Self::Endocrine | Self::Immunologic | Self::Renal | Self::Hepatic => 1,
        }
    }
}

impl ScoreVariant {
    /// Domains scored by this variant, in report order.
    pub fn domains(&self) -> &'static [OrganDomain] {
        const FOUR: [OrganDomain; 4] = [
            OrganDomain::Respiratory,
            OrganDomain::Cardiovascular,
            OrganDomain::Coagulation,
            OrganDomain::Neurologic,
        ];
        const EIGHT: [OrganDomain; 8] = [
            OrganDomain::Respiratory,
            OrganDomain::Cardiovascular,
            OrganDomain::Coagulation,
            OrganDomain::Neurologic,
            OrganDomain::Endocrine,
            OrganDomain::Immunologic,
            OrganDomain::Renal,
            OrganDomain::Hepatic,
        ];
        match self {
            Self::Phoenix => &FOUR,
            Self::Phoenix8 => &EIGHT,
        }
    }
}
