use serde::{Deserialize, Serialize};
use sky_primitives::PropertyId;

///
/// DataType
///
/// The scalar types a property's values can hold. `Factor` is a
/// dictionary-encoded string (spec.md Glossary); Sky does not need to model
/// the dictionary itself here, only the fact that a factor property's wire
/// values are strings.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Factor,
    Integer,
    Float,
    Boolean,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Factor => "factor",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        };
        write!(f, "{s}")
    }
}

///
/// Property
///
/// `transient` properties are present only at the event where they are set
/// and do not carry forward; permanent (non-transient) properties carry
/// forward to every later event in the same object until overwritten.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub transient: bool,
    pub data_type: DataType,
}
