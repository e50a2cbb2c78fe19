use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::{Json, Type};

fn json_compatible(ty: &SnowflakeTypeInfo) -> bool {
    // a VARCHAR holding JSON text is fine too
    ty.r#type().is_semi_structured() || matches!(ty.r#type(), SnowflakeType::Text)
}

impl<T> Type<Snowflake> for Json<T> {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Variant)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        json_compatible(ty)
    }
}

impl<T> Encode<'_, Snowflake> for Json<T>
where
    T: Serialize,
{
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&serde_json::to_string(&self.0)?);

        Ok(IsNull::No)
    }
}

impl<'r, T> Decode<'r, Snowflake> for Json<T>
where
    T: 'r + Deserialize<'r>,
{
    fn decode(value: SnowflakeValueRef<'r>) -> Result<Self, BoxDynError> {
        serde_json::from_str(value.as_str()?)
            .map(Json)
            .map_err(Into::into)
    }
}

impl Type<Snowflake> for JsonValue {
    fn type_info() -> SnowflakeTypeInfo {
        <Json<Self> as Type<Snowflake>>::type_info()
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        <Json<Self> as Type<Snowflake>>::compatible(ty)
    }
}

impl Encode<'_, Snowflake> for JsonValue {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&self.to_string());

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for JsonValue {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        <Json<Self> as Decode<Snowflake>>::decode(value).map(|item| item.0)
    }
}
