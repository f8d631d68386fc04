//! Civil identifiers, medicament codes, coordinates and display names.
//!
//! These are the validated strings that appear on citizen, doctor,
//! medicament and pharmacy records. Each one is parsed once at the API edge
//! and carried as its own type afterwards.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Validation failures for the types in this module.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CivilError {
    #[error("ucn of citizen is invalid")]
    InvalidUcn,
    #[error("uin of a doctor should be 10 characters long")]
    InvalidUin,
    #[error("atc code is invalid")]
    InvalidAtcCode,
    #[error("coordinates are invalid")]
    InvalidCoordinates,
    #[error("name must contain between {min} and {max} characters")]
    InvalidName { min: usize, max: usize },
}

/// Implements the string plumbing shared by the code newtypes below.
macro_rules! text_code {
    ($name:ident) => {
        impl $name {
            /// Returns the code as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = CivilError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CivilError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self::parse(&s)?)
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

/// Unified civil number of a citizen: exactly ten ASCII digits.
///
/// ```
/// use medico_core::Ucn;
///
/// assert!(Ucn::parse("9001011234").is_ok());
/// assert!(Ucn::parse("90010112").is_err());
/// assert_eq!(Ucn::prefix(" 9001 ").unwrap(), "9001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ucn(String);

impl Ucn {
    /// Number of digits in a UCN.
    pub const LENGTH: usize = 10;

    /// Parse a full UCN.
    ///
    /// # Errors
    ///
    /// Returns [`CivilError::InvalidUcn`] unless the trimmed input is ten digits.
    pub fn parse(s: &str) -> Result<Self, CivilError> {
        let s = s.trim();
        if s.len() == Self::LENGTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(CivilError::InvalidUcn)
        }
    }

    /// Validate a UCN search prefix (1 to 10 digits) and return it trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`CivilError::InvalidUcn`] for an empty, too long or
    /// non-numeric prefix.
    pub fn prefix(s: &str) -> Result<&str, CivilError> {
        let s = s.trim();
        if (1..=Self::LENGTH).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(s)
        } else {
            Err(CivilError::InvalidUcn)
        }
    }
}

text_code!(Ucn);

/// Unique identification number of a doctor: ten ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uin(String);

impl Uin {
    /// Number of characters in a UIN.
    pub const LENGTH: usize = 10;

    /// Parse a UIN.
    ///
    /// # Errors
    ///
    /// Returns [`CivilError::InvalidUin`] unless the trimmed input is ten
    /// ASCII letters or digits.
    pub fn parse(s: &str) -> Result<Self, CivilError> {
        let s = s.trim();
        if s.len() == Self::LENGTH && s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(CivilError::InvalidUin)
        }
    }
}

text_code!(Uin);

/// WHO Anatomical Therapeutic Chemical code at the chemical substance
/// level, e.g. `N02BE01` for paracetamol.
///
/// Input is upper-cased before checking the `A99AA99` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtcCode(String);

impl AtcCode {
    /// Parse an ATC code.
    ///
    /// # Errors
    ///
    /// Returns [`CivilError::InvalidAtcCode`] if the input does not have the
    /// letter, two digits, two letters, two digits layout.
    pub fn parse(s: &str) -> Result<Self, CivilError> {
        let upper = s.trim().to_ascii_uppercase();
        let shape_ok = matches!(
            upper.as_bytes(),
            [group, d1, d2, l1, l2, d3, d4]
                if group.is_ascii_uppercase()
                    && d1.is_ascii_digit()
                    && d2.is_ascii_digit()
                    && l1.is_ascii_uppercase()
                    && l2.is_ascii_uppercase()
                    && d3.is_ascii_digit()
                    && d4.is_ascii_digit()
        );
        if shape_ok {
            Ok(Self(upper))
        } else {
            Err(CivilError::InvalidAtcCode)
        }
    }

    /// The anatomical main group, the first letter of the code.
    #[must_use]
    pub fn anatomical_group(&self) -> char {
        self.0.chars().next().unwrap_or('?')
    }
}

text_code!(AtcCode);

/// A point on the map, used to place pharmacy branches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build checked coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`CivilError::InvalidCoordinates`] for non-finite values or
    /// values outside the geographic ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CivilError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(CivilError::InvalidCoordinates)
        }
    }
}

/// Check that a display name has between `min` and `max` characters after
/// trimming, returning the trimmed name.
///
/// # Errors
///
/// Returns [`CivilError::InvalidName`] carrying the bounds.
///
/// ```
/// use medico_core::validate_name;
///
/// assert_eq!(validate_name("  Aspirin ", 3, 32).unwrap(), "Aspirin");
/// assert!(validate_name("ab", 3, 32).is_err());
/// ```
pub fn validate_name(name: &str, min: usize, max: usize) -> Result<&str, CivilError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if (min..=max).contains(&len) {
        Ok(trimmed)
    } else {
        Err(CivilError::InvalidName { min, max })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ucn() {
        assert_eq!(Ucn::parse(" 8502124455 ").unwrap().as_str(), "8502124455");
        assert_eq!(Ucn::parse("85021244"), Err(CivilError::InvalidUcn));
        assert_eq!(Ucn::parse("85021244AB"), Err(CivilError::InvalidUcn));
        assert_eq!(Ucn::parse("85021244550"), Err(CivilError::InvalidUcn));
    }

    #[test]
    fn test_ucn_prefix() {
        assert_eq!(Ucn::prefix("85").unwrap(), "85");
        assert_eq!(Ucn::prefix("8502124455").unwrap(), "8502124455");
        assert!(Ucn::prefix("").is_err());
        assert!(Ucn::prefix("85a").is_err());
        assert!(Ucn::prefix("85021244551").is_err());
    }

    #[test]
    fn test_uin() {
        assert!(Uin::parse("AB12CD34EF").is_ok());
        assert!(Uin::parse("0000000001").is_ok());
        assert_eq!(Uin::parse("AB12CD34E"), Err(CivilError::InvalidUin));
        assert_eq!(Uin::parse("AB12-D34EF"), Err(CivilError::InvalidUin));
        assert_eq!(
            CivilError::InvalidUin.to_string(),
            "uin of a doctor should be 10 characters long"
        );
    }

    #[test]
    fn test_atc_code() {
        let code = AtcCode::parse("n02be01").unwrap();
        assert_eq!(code.as_str(), "N02BE01");
        assert_eq!(code.anatomical_group(), 'N');

        assert!(AtcCode::parse("N02BE0").is_err());
        assert!(AtcCode::parse("N0ABE01").is_err());
        assert!(AtcCode::parse("N02B101").is_err());
        assert!(AtcCode::parse("102BE01").is_err());
    }

    #[test]
    fn test_atc_code_serde() {
        let code: AtcCode = serde_json::from_str("\"a10ba02\"").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"A10BA02\"");
        assert!(serde_json::from_str::<AtcCode>("\"metformin\"").is_err());
    }

    #[test]
    fn test_coordinates() {
        assert!(Coordinates::new(42.6977, 23.3219).is_ok());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
        assert!(Coordinates::new(90.5, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("Ibuprofen", 3, 32).unwrap(), "Ibuprofen");
        assert_eq!(validate_name("Ана", 3, 32).unwrap(), "Ана");
        assert_eq!(
            validate_name(" x ", 3, 32),
            Err(CivilError::InvalidName { min: 3, max: 32 })
        );
        assert_eq!(
            validate_name(&"y".repeat(33), 3, 32).unwrap_err().to_string(),
            "name must contain between 3 and 32 characters"
        );
    }
}
