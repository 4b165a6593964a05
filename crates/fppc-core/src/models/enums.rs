//! Closed, string-valued enumerations for the Document lifecycle (spec
//! section 6/7). Each round-trips through the same string the State Store
//! column stores, via `AsExpression`/`FromSqlRow` against `Text`.

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $s:literal),+ $(,)?
        }
        default = $default:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
            diesel::AsExpression, diesel::FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    other => Err(format!(
                        concat!("unrecognised ", stringify!($name), " value: {}"),
                        other
                    )),
                }
            }
        }

        impl ToSql<Text, Sqlite> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str().to_string());
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $name {
            fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
                let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
                s.parse::<Self>().map_err(|e| e.into())
            }
        }
    };
}

string_enum! {
    DownloadStatus {
        Pending => "pending",
        Downloaded => "downloaded",
        Failed => "failed",
    }
    default = Pending
}

string_enum! {
    ExtractionStatus {
        Pending => "pending",
        Extracted => "extracted",
        Error => "error",
    }
    default = Pending
}

string_enum! {
    FidelityRisk {
        Unassessed => "unassessed",
        Verified => "verified",
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
    default = Unassessed
}

string_enum! {
    ExtractionMethod {
        Embedded => "embedded",
        VisionOcr => "vision-ocr",
        ClassicalOcr => "classical-ocr",
        VisionLlm => "vision-llm",
        /// Embedded text was kept because it tied or beat a vision-OCR
        /// attempt that was made but not adopted (open question decision:
        /// this is the source's "embedded+vision-ocr" label, not a true
        /// composite extraction).
        Composite => "embedded+vision-ocr",
        ClassicalOcrFallback => "classical-ocr-fallback",
    }
    default = Embedded
}

string_enum! {
    FidelityMethod {
        NativeTrusted => "native-trusted",
        Canary => "canary",
        Adjudication => "adjudication",
        StatisticalAcceptance => "statistical-acceptance",
        VisionLlm => "vision-llm",
        ClassicalOcrRepair => "classical-ocr-repair",
    }
    default = NativeTrusted
}

string_enum! {
    /// Provenance tag for the embedding Q&A payload (section 3 / 4.6).
    QaSource {
        Extracted => "extracted",
        Synthetic => "synthetic",
        Mixed => "mixed",
    }
    default = Extracted
}

string_enum! {
    DocumentType {
        AdviceLetter => "advice-letter",
        InformalAdvice => "informal-advice",
        Opinion => "opinion",
        Correspondence => "correspondence",
    }
    default = AdviceLetter
}

string_enum! {
    /// Prior-opinion identifier prefix (spec section 4.5.2/4.5.4).
    LetterPrefix {
        Advice => "A",
        Informal => "I",
        Opinion => "M",
    }
    default = Advice
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_str() {
        for v in [
            DownloadStatus::Pending,
            DownloadStatus::Downloaded,
            DownloadStatus::Failed,
        ] {
            assert_eq!(DownloadStatus::from_str(v.as_str()).unwrap(), v);
        }
    }

    #[test]
    fn composite_method_uses_source_label() {
        assert_eq!(ExtractionMethod::Composite.as_str(), "embedded+vision-ocr");
    }

    #[test]
    fn rejects_unknown_value() {
        assert!(FidelityRisk::from_str("bogus").is_err());
    }
}
