//! Serialization of U256 amounts as decimal strings, the form prices take in
//! every directory-service payload.

use {
    primitive_types::U256,
    serde::{de, Deserialize, Deserializer, Serializer},
    std::borrow::Cow,
};

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Cow::<str>::deserialize(deserializer)?;
    U256::from_dec_str(&s)
        .map_err(|err| de::Error::custom(format!("failed to decode {s:?} as decimal u256: {err}")))
}
